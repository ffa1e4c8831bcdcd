use crate::intel::tables::IntelTables;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainMatchType {
    Exact,
    TldPattern,
    ValueTierPattern,
    PlatformAvg,
}

impl DomainMatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainMatchType::Exact => "exact",
            DomainMatchType::TldPattern => "tld_pattern",
            DomainMatchType::ValueTierPattern => "value_tier_pattern",
            DomainMatchType::PlatformAvg => "platform_avg",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct PricePercentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct DomainIntel {
    pub match_type: DomainMatchType,
    pub avg_final_price: f64,
    pub percentiles: Option<PricePercentiles>,
    pub volatility: f64,
    pub sample_size: usize,
    pub confidence: f64,
}

/// Multi-tier lookup: exact name, then TLD pattern, then value-tier pattern
/// (prices within +/-30% of the estimate), then the platform-wide average.
/// Returns None only when the table is completely empty.
pub fn lookup_domain(
    tables: &IntelTables,
    domain: &str,
    estimated_value: f64,
) -> Option<DomainIntel> {
    if let Some(row) = tables.domain(domain) {
        return Some(DomainIntel {
            match_type: DomainMatchType::Exact,
            avg_final_price: row.avg_final_price,
            percentiles: Some(PricePercentiles {
                p25: row.p25,
                p50: row.p50,
                p75: row.p75,
                p90: row.p90,
            }),
            volatility: row.volatility,
            sample_size: row.sample_size as usize,
            confidence: 0.95,
        });
    }

    if let Some(intel) = tld_pattern(tables, domain) {
        return Some(intel);
    }

    if estimated_value > 0.0 {
        if let Some(intel) = value_tier_pattern(tables, estimated_value) {
            return Some(intel);
        }
    }

    platform_average(tables)
}

fn tld_pattern(tables: &IntelTables, domain: &str) -> Option<DomainIntel> {
    let tld = domain.rsplit_once('.').map(|(_, t)| t)?;
    let suffix = format!(".{tld}");

    let rows: Vec<_> = tables
        .domains
        .iter()
        .filter(|d| d.domain.ends_with(&suffix))
        .collect();
    if rows.is_empty() {
        return None;
    }

    let prices: Vec<f64> = rows.iter().map(|d| d.avg_final_price).collect();
    let volatility = rows.iter().map(|d| d.volatility).sum::<f64>() / rows.len() as f64;

    Some(DomainIntel {
        match_type: DomainMatchType::TldPattern,
        avg_final_price: mean(&prices),
        percentiles: Some(percentiles_of(&prices)),
        volatility,
        sample_size: rows.len(),
        confidence: pattern_confidence(rows.len()),
    })
}

fn value_tier_pattern(tables: &IntelTables, estimated_value: f64) -> Option<DomainIntel> {
    let lower = estimated_value * 0.70;
    let upper = estimated_value * 1.30;

    let rows: Vec<_> = tables
        .domains
        .iter()
        .filter(|d| d.avg_final_price >= lower && d.avg_final_price <= upper)
        .collect();
    if rows.is_empty() {
        return None;
    }

    let prices: Vec<f64> = rows.iter().map(|d| d.avg_final_price).collect();
    let volatility = rows.iter().map(|d| d.volatility).sum::<f64>() / rows.len() as f64;

    Some(DomainIntel {
        match_type: DomainMatchType::ValueTierPattern,
        avg_final_price: mean(&prices),
        percentiles: Some(percentiles_of(&prices)),
        volatility,
        sample_size: rows.len(),
        confidence: pattern_confidence(rows.len()),
    })
}

fn platform_average(tables: &IntelTables) -> Option<DomainIntel> {
    if tables.domains.is_empty() {
        return None;
    }

    let prices: Vec<f64> = tables.domains.iter().map(|d| d.avg_final_price).collect();
    let volatility =
        tables.domains.iter().map(|d| d.volatility).sum::<f64>() / tables.domains.len() as f64;

    Some(DomainIntel {
        match_type: DomainMatchType::PlatformAvg,
        avg_final_price: mean(&prices),
        percentiles: None,
        volatility,
        sample_size: tables.domains.len(),
        confidence: 0.30,
    })
}

/// Pattern tiers never reach exact-match confidence: sqrt(n/50), capped 0.75.
fn pattern_confidence(sample_size: usize) -> f64 {
    (sample_size as f64 / 50.0).sqrt().min(0.75)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn percentiles_of(values: &[f64]) -> PricePercentiles {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    PricePercentiles {
        p25: percentile(&sorted, 0.25),
        p50: percentile(&sorted, 0.50),
        p75: percentile(&sorted, 0.75),
        p90: percentile(&sorted, 0.90),
    }
}

/// Linear interpolation over a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                let frac = rank - lo as f64;
                sorted[lo] + (sorted[hi] - sorted[lo]) * frac
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intel::tables::DomainStats;

    fn stats(domain: &str, price: f64, volatility: f64) -> DomainStats {
        DomainStats {
            domain: domain.to_string(),
            avg_final_price: price,
            volatility,
            p25: price * 0.8,
            p50: price,
            p75: price * 1.2,
            p90: price * 1.4,
            sample_size: 10,
        }
    }

    fn tables_with(rows: Vec<DomainStats>) -> IntelTables {
        let mut t = IntelTables {
            domains: rows,
            ..Default::default()
        };
        for (i, d) in t.domains.iter().enumerate() {
            t.domains_by_name.insert(d.domain.clone(), i);
        }
        t
    }

    #[test]
    fn test_exact_match() {
        let tables = tables_with(vec![stats("prime.com", 500.0, 0.1)]);
        let intel = lookup_domain(&tables, "prime.com", 600.0).unwrap();
        assert_eq!(intel.match_type, DomainMatchType::Exact);
        assert!((intel.confidence - 0.95).abs() < 1e-9);
        assert!((intel.percentiles.unwrap().p50 - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_tld_fallback() {
        let tables = tables_with(vec![
            stats("a.xyz", 40.0, 0.4),
            stats("b.xyz", 60.0, 0.2),
            stats("c.com", 900.0, 0.1),
        ]);
        let intel = lookup_domain(&tables, "fresh.xyz", 50.0).unwrap();
        assert_eq!(intel.match_type, DomainMatchType::TldPattern);
        assert_eq!(intel.sample_size, 2);
        assert!((intel.avg_final_price - 50.0).abs() < 1e-9);
        assert!(intel.confidence <= 0.75);
    }

    #[test]
    fn test_value_tier_fallback() {
        // No matching TLD, but prices near the estimate exist.
        let tables = tables_with(vec![
            stats("a.com", 480.0, 0.3),
            stats("b.com", 520.0, 0.3),
            stats("c.com", 5000.0, 0.1),
        ]);
        let intel = lookup_domain(&tables, "fresh.io", 500.0).unwrap();
        assert_eq!(intel.match_type, DomainMatchType::ValueTierPattern);
        assert_eq!(intel.sample_size, 2);
    }

    #[test]
    fn test_platform_average_last_resort() {
        let tables = tables_with(vec![stats("far.com", 10_000.0, 0.2)]);
        // No TLD overlap and nothing within +/-30% of $50.
        let intel = lookup_domain(&tables, "tiny.net", 50.0).unwrap();
        assert_eq!(intel.match_type, DomainMatchType::PlatformAvg);
        assert!((intel.confidence - 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_empty_table_yields_none() {
        let tables = IntelTables::default();
        assert!(lookup_domain(&tables, "any.com", 100.0).is_none());
    }

    #[test]
    fn test_pattern_confidence_capped() {
        assert!((pattern_confidence(50) - 0.75).abs() < 1e-9);
        assert!(pattern_confidence(200) <= 0.75);
        assert!(pattern_confidence(2) < 0.25);
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert!((percentile(&sorted, 0.50) - 25.0).abs() < 1e-9);
        assert!((percentile(&sorted, 0.0) - 10.0).abs() < 1e-9);
        assert!((percentile(&sorted, 1.0) - 40.0).abs() < 1e-9);
    }
}
