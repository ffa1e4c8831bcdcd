pub mod learning;
pub mod memory;
pub mod postgres;

use crate::core::types::{
    AuctionContext, DecisionSource, FinalDecision, Platform, Strategy, ValueTier,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionResult {
    Won,
    Lost,
    Abandoned,
}

impl AuctionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionResult::Won => "won",
            AuctionResult::Lost => "lost",
            AuctionResult::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "won" => Some(AuctionResult::Won),
            "lost" => Some(AuctionResult::Lost),
            "abandoned" => Some(AuctionResult::Abandoned),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundResult {
    Outbid,
    Won,
    Lost,
}

impl RoundResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundResult::Outbid => "outbid",
            RoundResult::Won => "won",
            RoundResult::Lost => "lost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "outbid" => Some(RoundResult::Outbid),
            "won" => Some(RoundResult::Won),
            "lost" => Some(RoundResult::Lost),
            _ => None,
        }
    }
}

/// Snapshot of one resolved auction. Keyed by `auction_id`; re-recording the
/// same auction replaces the row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuctionOutcome {
    pub auction_id: String,
    pub domain: String,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
    pub estimated_value: Decimal,
    pub current_bid_at_decision: Decimal,
    pub final_price: Decimal,
    pub num_bidders: u32,
    pub hours_remaining_at_decision: f64,
    pub bot_detected: bool,
    pub strategy_used: Strategy,
    pub recommended_bid: Decimal,
    pub decision_source: DecisionSource,
    pub confidence: f64,
    pub result: AuctionResult,
    /// Only meaningful on wins.
    pub profit_margin: Option<f64>,
    pub opponent_hash: Option<String>,
}

impl AuctionOutcome {
    pub fn value_tier(&self) -> ValueTier {
        ValueTier::from_value(self.estimated_value)
    }
}

/// One decision round within a single auction thread.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuctionRound {
    pub thread_id: String,
    pub round_number: u32,
    pub domain: String,
    pub platform: Platform,
    pub estimated_value: Decimal,
    pub current_bid_at_decision: Decimal,
    pub strategy_used: Strategy,
    pub recommended_bid: Decimal,
    pub decision_source: DecisionSource,
    pub confidence: f64,
    pub result: RoundResult,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate performance of one (strategy, platform, tier) cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StrategyStats {
    pub strategy: Strategy,
    pub platform: Platform,
    pub value_tier: ValueTier,
    pub total_uses: u32,
    pub wins: u32,
    pub total_profit: f64,
}

impl StrategyStats {
    pub fn empty(strategy: Strategy, platform: Platform, value_tier: ValueTier) -> Self {
        Self {
            strategy,
            platform,
            value_tier,
            total_uses: 0,
            wins: 0,
            total_profit: 0.0,
        }
    }

    pub fn win_rate(&self) -> f64 {
        self.wins as f64 / self.total_uses.max(1) as f64
    }

    pub fn avg_profit_per_win(&self) -> f64 {
        self.total_profit / self.wins.max(1) as f64
    }
}

/// Injected persistence seam. Implementations must provide their own
/// concurrency control; aggregate updates may not lose increments under
/// concurrent writers.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record_outcome(&self, outcome: &AuctionOutcome) -> Result<()>;
    async fn record_round(&self, round: &AuctionRound) -> Result<()>;
    async fn get_similar(
        &self,
        platform: Platform,
        value_min: Decimal,
        value_max: Decimal,
        limit: u32,
    ) -> Result<Vec<AuctionOutcome>>;
    async fn get_strategy_stats(
        &self,
        strategy: Strategy,
        platform: Platform,
        value_tier: ValueTier,
    ) -> Result<StrategyStats>;
    async fn get_best_strategy(
        &self,
        platform: Platform,
        value_tier: ValueTier,
        min_samples: u32,
    ) -> Result<Option<Strategy>>;
    async fn get_rounds_for_thread(&self, thread_id: &str) -> Result<Vec<AuctionRound>>;
}

/// Write-only view over the store, invoked by the outer loop when an auction
/// resolves or a round completes. Never consulted by the decision pipeline.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Record a resolved auction. The thread id doubles as the auction id,
    /// so re-reporting the same auction replaces rather than duplicates.
    pub async fn record_outcome(
        &self,
        ctx: &AuctionContext,
        decision: &FinalDecision,
        result: AuctionResult,
        final_price: Decimal,
    ) -> Result<()> {
        let profit_margin = match result {
            AuctionResult::Won if ctx.estimated_value > Decimal::ZERO => {
                let value = ctx.estimated_value.to_f64().unwrap_or(0.0);
                let price = final_price.to_f64().unwrap_or(0.0);
                Some((value - price) / value)
            }
            _ => None,
        };

        let outcome = AuctionOutcome {
            auction_id: ctx.thread_id.clone(),
            domain: ctx.domain.clone(),
            platform: ctx.platform,
            timestamp: Utc::now(),
            estimated_value: ctx.estimated_value,
            current_bid_at_decision: ctx.current_bid,
            final_price,
            num_bidders: ctx.num_bidders,
            hours_remaining_at_decision: ctx.hours_remaining,
            bot_detected: ctx.bidder_analysis.bot_detected,
            strategy_used: decision.strategy,
            recommended_bid: decision.recommended_bid_amount,
            decision_source: decision.decision_source,
            confidence: decision.confidence,
            result,
            profit_margin,
            opponent_hash: ctx.last_bidder_id.clone(),
        };

        self.store.record_outcome(&outcome).await
    }

    /// Record an intermediate round (typically after being outbid). The round
    /// number continues the thread's existing sequence.
    pub async fn record_round(
        &self,
        ctx: &AuctionContext,
        decision: &FinalDecision,
        result: RoundResult,
    ) -> Result<()> {
        let existing = match self.store.get_rounds_for_thread(&ctx.thread_id).await {
            Ok(rounds) => rounds.len() as u32,
            Err(e) => {
                warn!(error = %e, thread_id = %ctx.thread_id, "Round lookup failed, starting at 1");
                0
            }
        };

        let round = AuctionRound {
            thread_id: ctx.thread_id.clone(),
            round_number: existing + 1,
            domain: ctx.domain.clone(),
            platform: ctx.platform,
            estimated_value: ctx.estimated_value,
            current_bid_at_decision: ctx.current_bid,
            strategy_used: decision.strategy,
            recommended_bid: decision.recommended_bid_amount,
            decision_source: decision.decision_source,
            confidence: decision.confidence,
            result,
            timestamp: Utc::now(),
        };

        self.store.record_round(&round).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_stats_rates() {
        let mut stats = StrategyStats::empty(Strategy::ProxyMax, Platform::Godaddy, ValueTier::High);
        assert_eq!(stats.win_rate(), 0.0);

        stats.total_uses = 10;
        stats.wins = 4;
        stats.total_profit = 200.0;
        assert!((stats.win_rate() - 0.4).abs() < 1e-9);
        assert!((stats.avg_profit_per_win() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_result_round_trips() {
        for r in [AuctionResult::Won, AuctionResult::Lost, AuctionResult::Abandoned] {
            assert_eq!(AuctionResult::parse(r.as_str()), Some(r));
        }
        for r in [RoundResult::Outbid, RoundResult::Won, RoundResult::Lost] {
            assert_eq!(RoundResult::parse(r.as_str()), Some(r));
        }
    }
}
