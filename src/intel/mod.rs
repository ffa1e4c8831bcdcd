pub mod archetype;
pub mod bidder;
pub mod domain;
pub mod scores;
pub mod tables;

use crate::config::config::IntelCfg;
use crate::core::types::{self, AuctionContext};
use anyhow::Result;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, RwLock};

use archetype::ArchetypeIntel;
use bidder::BidderIntel;
use domain::DomainIntel;
use scores::{ExpectedValueAnalysis, ResourceScore};
use tables::IntelTables;

/// Everything the downstream stages know about the market for one call.
/// Sections degrade independently: a missing table never fails the pipeline.
#[derive(Clone, Debug, Serialize)]
pub struct MarketIntelligence {
    pub bidder: BidderIntel,
    pub domain: Option<DomainIntel>,
    pub archetype: Option<ArchetypeIntel>,
    pub win_probability: f64,
    pub expected_value_analysis: ExpectedValueAnalysis,
    pub resource: ResourceScore,
}

/// Market intelligence service. Tables are shared read-only across concurrent
/// calls; `reload` swaps the whole set in place from a single writer.
pub struct MarketIntel {
    tables: RwLock<Arc<IntelTables>>,
    cfg: IntelCfg,
}

impl MarketIntel {
    pub fn new(tables: IntelTables, cfg: IntelCfg) -> Self {
        Self {
            tables: RwLock::new(Arc::new(tables)),
            cfg,
        }
    }

    pub fn from_dir(dir: &Path, cfg: IntelCfg) -> Result<Self> {
        let tables = IntelTables::load(dir)?;
        Ok(Self::new(tables, cfg))
    }

    pub fn reload(&self, tables: IntelTables) {
        let mut guard = self.tables.write().expect("intel tables lock poisoned");
        *guard = Arc::new(tables);
    }

    fn snapshot(&self) -> Arc<IntelTables> {
        self.tables
            .read()
            .expect("intel tables lock poisoned")
            .clone()
    }

    /// Enrich the auction context. Pure given the loaded tables; fails open.
    pub fn enrich(&self, ctx: &AuctionContext) -> MarketIntelligence {
        let tables = self.snapshot();

        let bidder = bidder::lookup_bidder(
            &tables,
            &self.cfg,
            ctx.last_bidder_id.as_deref(),
            &ctx.bidder_analysis,
        );

        let estimated_value = ctx.estimated_value.to_f64().unwrap_or(0.0);
        let domain = domain::lookup_domain(&tables, &ctx.domain, estimated_value);
        let archetype = archetype::lookup_archetype(&tables, ctx.platform);

        let budget = ctx.budget_available.to_f64().unwrap_or(0.0);
        let safe_max = types::safe_max(ctx.estimated_value).to_f64().unwrap_or(0.0);

        let win_probability =
            scores::win_probability(ctx.num_bidders, budget, safe_max, &bidder, domain.as_ref());
        let expected_value_analysis =
            scores::expected_value(estimated_value, win_probability, domain.as_ref());
        let resource = scores::resource_score(win_probability, &expected_value_analysis, &self.cfg);

        MarketIntelligence {
            bidder,
            domain,
            archetype,
            win_probability,
            expected_value_analysis,
            resource,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BidderAnalysis, Platform};
    use crate::intel::tables::DomainStats;
    use rust_decimal::Decimal;

    fn ctx(value: i64, bidders: u32) -> AuctionContext {
        AuctionContext {
            domain: "example.com".to_string(),
            platform: Platform::Godaddy,
            estimated_value: Decimal::from(value),
            current_bid: Decimal::from(10),
            your_current_proxy: Decimal::ZERO,
            budget_available: Decimal::from(10_000),
            num_bidders: bidders,
            hours_remaining: 4.0,
            bidder_analysis: BidderAnalysis::default(),
            thread_id: "t-1".to_string(),
            last_bidder_id: None,
        }
    }

    #[test]
    fn test_enrich_fails_open_on_empty_tables() {
        let intel = MarketIntel::new(IntelTables::default(), IntelCfg::default());
        let mi = intel.enrich(&ctx(500, 1));

        assert!(!mi.bidder.found);
        assert!(mi.domain.is_none());
        assert!(mi.archetype.is_none());
        assert!((0.0..=1.0).contains(&mi.win_probability));
        // Fallback expected price: 65% of estimate.
        assert!((mi.expected_value_analysis.expected_final_price - 325.0).abs() < 1e-9);
    }

    #[test]
    fn test_enrich_is_pure_given_tables() {
        let intel = MarketIntel::new(IntelTables::default(), IntelCfg::default());
        let c = ctx(750, 2);
        let a = intel.enrich(&c);
        let b = intel.enrich(&c);
        assert_eq!(a.win_probability, b.win_probability);
        assert_eq!(a.resource.score, b.resource.score);
    }

    #[test]
    fn test_reload_swaps_tables() {
        let intel = MarketIntel::new(IntelTables::default(), IntelCfg::default());
        assert!(intel.enrich(&ctx(500, 1)).domain.is_none());

        let mut tables = IntelTables::default();
        tables.domains.push(DomainStats {
            domain: "example.com".to_string(),
            avg_final_price: 400.0,
            volatility: 0.1,
            p25: 350.0,
            p50: 400.0,
            p75: 450.0,
            p90: 480.0,
            sample_size: 12,
        });
        tables.domains_by_name.insert("example.com".to_string(), 0);
        intel.reload(tables);

        let mi = intel.enrich(&ctx(500, 1));
        assert!(mi.domain.is_some());
        assert!((mi.expected_value_analysis.expected_final_price - 400.0).abs() < 1e-9);
    }
}
