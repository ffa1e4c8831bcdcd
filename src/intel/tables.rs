use crate::core::types::Platform;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// One row of the offline bidder-profile table.
#[derive(Clone, Debug, Deserialize)]
pub struct BidderProfile {
    pub bidder_id: String,
    pub total_auctions: u32,
    #[serde(default)]
    pub total_bids: u32,
    /// Average dollar jump per bid; normalizes onto the live 0-10 scale.
    #[serde(default)]
    pub avg_bid_increase: f64,
    #[serde(default)]
    pub max_bid: f64,
    #[serde(default)]
    pub avg_reaction_time_s: f64,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    pub late_bid_ratio: f64,
    #[serde(default)]
    pub proxy_usage: f64,
}

impl BidderProfile {
    /// avg_bid_increase is in dollars (roughly 0-100); the live aggression
    /// score is 0-10.
    pub fn aggression_normalized(&self) -> f64 {
        (self.avg_bid_increase / 10.0).clamp(0.0, 10.0)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DomainStats {
    pub domain: String,
    pub avg_final_price: f64,
    #[serde(default)]
    pub volatility: f64,
    #[serde(default)]
    pub p25: f64,
    #[serde(default)]
    pub p50: f64,
    #[serde(default)]
    pub p75: f64,
    #[serde(default)]
    pub p90: f64,
    #[serde(default)]
    pub sample_size: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArchetypeRow {
    pub platform: String,
    #[serde(default)]
    pub avg_late_bid_ratio: f64,
    #[serde(default)]
    pub avg_bid_jump: f64,
    #[serde(default)]
    pub avg_duration_s: f64,
}

/// The three offline statistical tables, indexed for per-call lookups.
/// Immutable once loaded; swapped wholesale on reload.
#[derive(Clone, Debug, Default)]
pub struct IntelTables {
    pub bidders: Vec<BidderProfile>,
    pub bidders_by_id: HashMap<String, usize>,
    pub domains: Vec<DomainStats>,
    pub domains_by_name: HashMap<String, usize>,
    pub archetypes: HashMap<Platform, ArchetypeRow>,
}

impl IntelTables {
    /// Load `bidder_profiles.jsonl`, `domain_stats.jsonl` and
    /// `auction_archetypes.jsonl` from `dir`. A missing file yields an empty
    /// table (the engine fails open); malformed lines are skipped.
    pub fn load(dir: &Path) -> Result<Self> {
        let bidders: Vec<BidderProfile> = read_jsonl(&dir.join("bidder_profiles.jsonl"))?;
        let domains: Vec<DomainStats> = read_jsonl(&dir.join("domain_stats.jsonl"))?;
        let archetype_rows: Vec<ArchetypeRow> = read_jsonl(&dir.join("auction_archetypes.jsonl"))?;

        let mut tables = Self {
            bidders,
            domains,
            ..Default::default()
        };

        for (i, b) in tables.bidders.iter().enumerate() {
            tables.bidders_by_id.insert(b.bidder_id.clone(), i);
        }
        for (i, d) in tables.domains.iter().enumerate() {
            tables.domains_by_name.insert(d.domain.clone(), i);
        }
        for row in archetype_rows {
            match Platform::parse(&row.platform) {
                Some(p) => {
                    tables.archetypes.insert(p, row);
                }
                None => warn!(platform = %row.platform, "Skipping archetype row for unknown platform"),
            }
        }

        info!(
            bidders = tables.bidders.len(),
            domains = tables.domains.len(),
            archetypes = tables.archetypes.len(),
            "Intelligence tables loaded"
        );
        Ok(tables)
    }

    pub fn bidder(&self, id: &str) -> Option<&BidderProfile> {
        self.bidders_by_id.get(id).map(|&i| &self.bidders[i])
    }

    pub fn domain(&self, name: &str) -> Option<&DomainStats> {
        self.domains_by_name.get(name).map(|&i| &self.domains[i])
    }
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!(path = %path.display(), "Intelligence table missing, starting empty");
        return Ok(Vec::new());
    }

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = line_num + 1,
                    error = %e,
                    "Skipping malformed intelligence record"
                );
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tables(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        let mut f = File::create(dir.join("bidder_profiles.jsonl")).unwrap();
        writeln!(
            f,
            r#"{{"bidder_id":"b-1","total_auctions":12,"avg_bid_increase":40.0,"avg_reaction_time_s":30.0,"win_rate":0.5,"late_bid_ratio":0.2}}"#
        )
        .unwrap();
        writeln!(f, "not json at all").unwrap();
        writeln!(
            f,
            r#"{{"bidder_id":"b-2","total_auctions":3,"avg_bid_increase":80.0,"avg_reaction_time_s":2.0,"win_rate":0.7,"late_bid_ratio":0.9}}"#
        )
        .unwrap();

        let mut f = File::create(dir.join("domain_stats.jsonl")).unwrap();
        writeln!(
            f,
            r#"{{"domain":"shop.com","avg_final_price":420.0,"volatility":0.2,"p25":300.0,"p50":400.0,"p75":500.0,"p90":600.0,"sample_size":20}}"#
        )
        .unwrap();

        let mut f = File::create(dir.join("auction_archetypes.jsonl")).unwrap();
        writeln!(
            f,
            r#"{{"platform":"godaddy","avg_late_bid_ratio":0.8,"avg_bid_jump":30.0,"avg_duration_s":86400.0}}"#
        )
        .unwrap();
        writeln!(
            f,
            r#"{{"platform":"ebay","avg_late_bid_ratio":0.1,"avg_bid_jump":10.0,"avg_duration_s":100.0}}"#
        )
        .unwrap();
    }

    #[test]
    fn test_load_skips_bad_lines_and_unknown_platforms() {
        let dir = std::env::temp_dir().join("bidmind_tables_test");
        write_tables(&dir);

        let tables = IntelTables::load(&dir).unwrap();
        assert_eq!(tables.bidders.len(), 2);
        assert!(tables.bidder("b-1").is_some());
        assert!(tables.bidder("nobody").is_none());
        assert_eq!(tables.domains.len(), 1);
        assert!(tables.domain("shop.com").is_some());
        // ebay row dropped, godaddy kept
        assert_eq!(tables.archetypes.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_files_start_empty() {
        let dir = std::env::temp_dir().join("bidmind_tables_missing");
        std::fs::create_dir_all(&dir).unwrap();
        let tables = IntelTables::load(&dir).unwrap();
        assert!(tables.bidders.is_empty());
        assert!(tables.domains.is_empty());
        assert!(tables.archetypes.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_aggression_normalization() {
        let profile = BidderProfile {
            bidder_id: "x".into(),
            total_auctions: 1,
            total_bids: 0,
            avg_bid_increase: 250.0,
            max_bid: 0.0,
            avg_reaction_time_s: 0.0,
            win_rate: 0.0,
            late_bid_ratio: 0.0,
            proxy_usage: 0.0,
        };
        assert!((profile.aggression_normalized() - 10.0).abs() < f64::EPSILON);
    }
}
