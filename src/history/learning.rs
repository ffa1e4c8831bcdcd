use crate::config::config::HistoryCfg;
use crate::core::types::{AuctionContext, Strategy};
use crate::history::{AuctionResult, AuctionRound, HistoryStore, StrategyStats};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::warn;

/// Historical insight attached to a decision call. Everything here is
/// advisory: it shapes the reasoner prompt, never the hard caps.
#[derive(Clone, Debug, Default)]
pub struct HistoricalContext {
    pub similar_count: usize,
    pub win_rate: Option<f64>,
    /// Average final price / estimated value across similar auctions.
    pub avg_price_ratio: Option<f64>,
    pub strategy_stats: Vec<StrategyStats>,
    pub best_strategy: Option<Strategy>,
    pub previous_rounds: Vec<AuctionRound>,
    pub suggested_safe_max_ratio: f64,
}

/// Read-only view over the history store. The recorder owns all writes;
/// keeping this side read-only breaks the intelligence/history cycle.
#[derive(Clone)]
pub struct HistoricalLearning {
    store: Arc<dyn HistoryStore>,
    cfg: HistoryCfg,
}

const BIDDING_STRATEGIES: [Strategy; 5] = [
    Strategy::ProxyMax,
    Strategy::LastMinuteSnipe,
    Strategy::IncrementalTest,
    Strategy::WaitForCloseout,
    Strategy::AggressiveEarly,
];

impl HistoricalLearning {
    pub fn new(store: Arc<dyn HistoryStore>, cfg: HistoryCfg) -> Self {
        Self { store, cfg }
    }

    /// Gather insight for the current auction. Store failures degrade to an
    /// empty context; they never surface to the decision path.
    pub async fn historical_context(&self, ctx: &AuctionContext) -> HistoricalContext {
        let tier = ctx.value_tier();
        let spread = ctx.estimated_value * Decimal::new(30, 2);
        let value_min = (ctx.estimated_value - spread).max(Decimal::ZERO);
        let value_max = ctx.estimated_value + spread;

        let similar = match self
            .store
            .get_similar(ctx.platform, value_min, value_max, self.cfg.similar_limit)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Similar-auction lookup failed, continuing without history");
                Vec::new()
            }
        };

        let win_rate = if similar.is_empty() {
            None
        } else {
            let wins = similar
                .iter()
                .filter(|o| o.result == AuctionResult::Won)
                .count();
            Some(wins as f64 / similar.len() as f64)
        };

        let ratios: Vec<f64> = similar
            .iter()
            .filter_map(|o| {
                let value = o.estimated_value.to_f64()?;
                let price = o.final_price.to_f64()?;
                (value > 0.0 && price > 0.0).then_some(price / value)
            })
            .collect();
        let avg_price_ratio = if ratios.is_empty() {
            None
        } else {
            Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
        };

        let mut strategy_stats = Vec::new();
        for strategy in BIDDING_STRATEGIES {
            match self
                .store
                .get_strategy_stats(strategy, ctx.platform, tier)
                .await
            {
                Ok(stats) if stats.total_uses > 0 => strategy_stats.push(stats),
                Ok(_) => {}
                Err(e) => warn!(error = %e, %strategy, "Strategy stats lookup failed"),
            }
        }

        let best_strategy = match self
            .store
            .get_best_strategy(ctx.platform, tier, self.cfg.min_samples)
            .await
        {
            Ok(best) => best,
            Err(e) => {
                warn!(error = %e, "Best-strategy lookup failed");
                None
            }
        };

        let previous_rounds = match self.store.get_rounds_for_thread(&ctx.thread_id).await {
            Ok(rounds) => rounds,
            Err(e) => {
                warn!(error = %e, thread_id = %ctx.thread_id, "Round history lookup failed");
                Vec::new()
            }
        };

        let suggested_safe_max_ratio = suggest_safe_max_ratio(win_rate, avg_price_ratio);

        HistoricalContext {
            similar_count: similar.len(),
            win_rate,
            avg_price_ratio,
            strategy_stats,
            best_strategy,
            previous_rounds,
            suggested_safe_max_ratio,
        }
    }
}

/// Nudge the advisory safe-max ratio by what similar auctions actually paid
/// and how often we won. Clamped to [0.55, 0.80]; the 0.70 rule target and
/// 0.80 validator ceiling are untouched by this.
pub fn suggest_safe_max_ratio(win_rate: Option<f64>, avg_price_ratio: Option<f64>) -> f64 {
    let mut ratio: f64 = 0.70;

    if let Some(avg) = avg_price_ratio {
        if avg < 0.60 {
            ratio -= 0.05;
        } else if avg > 0.75 {
            ratio += 0.03;
        }
    }

    if let Some(wr) = win_rate {
        if wr < 0.3 {
            ratio += 0.05;
        } else if wr > 0.8 {
            ratio -= 0.03;
        }
    }

    ratio.clamp(0.55, 0.80)
}
