use crate::core::types::{Platform, Strategy, ValueTier};
use crate::history::{
    AuctionOutcome, AuctionResult, AuctionRound, HistoryStore, StrategyStats,
};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct MemInner {
    outcomes: HashMap<String, AuctionOutcome>,
    rounds: BTreeMap<(String, u32), AuctionRound>,
    performance: HashMap<(Strategy, Platform, ValueTier), StrategyStats>,
}

/// In-memory history store. Backs tests and storage-less startup; semantics
/// mirror the Postgres store, including aggregate idempotency on replays.
#[derive(Default)]
pub struct MemHistoryStore {
    inner: Mutex<MemInner>,
}

impl MemHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn profit_contribution(outcome: &AuctionOutcome) -> f64 {
    match (outcome.result, outcome.profit_margin) {
        (AuctionResult::Won, Some(margin)) => {
            margin * outcome.final_price.to_f64().unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

#[async_trait]
impl HistoryStore for MemHistoryStore {
    async fn record_outcome(&self, outcome: &AuctionOutcome) -> Result<()> {
        let mut inner = self.inner.lock().expect("history lock poisoned");

        // Replays replace the snapshot without double-counting aggregates.
        let first_time = !inner.outcomes.contains_key(&outcome.auction_id);
        inner
            .outcomes
            .insert(outcome.auction_id.clone(), outcome.clone());

        if first_time {
            let key = (outcome.strategy_used, outcome.platform, outcome.value_tier());
            let cell = inner.performance.entry(key).or_insert_with(|| {
                StrategyStats::empty(outcome.strategy_used, outcome.platform, outcome.value_tier())
            });
            cell.total_uses += 1;
            if outcome.result == AuctionResult::Won {
                cell.wins += 1;
                cell.total_profit += profit_contribution(outcome);
            }
        }
        Ok(())
    }

    async fn record_round(&self, round: &AuctionRound) -> Result<()> {
        let mut inner = self.inner.lock().expect("history lock poisoned");
        inner
            .rounds
            .entry((round.thread_id.clone(), round.round_number))
            .or_insert_with(|| round.clone());
        Ok(())
    }

    async fn get_similar(
        &self,
        platform: Platform,
        value_min: Decimal,
        value_max: Decimal,
        limit: u32,
    ) -> Result<Vec<AuctionOutcome>> {
        let inner = self.inner.lock().expect("history lock poisoned");
        let mut matches: Vec<AuctionOutcome> = inner
            .outcomes
            .values()
            .filter(|o| {
                o.platform == platform
                    && o.estimated_value >= value_min
                    && o.estimated_value <= value_max
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(limit as usize);
        Ok(matches)
    }

    async fn get_strategy_stats(
        &self,
        strategy: Strategy,
        platform: Platform,
        value_tier: ValueTier,
    ) -> Result<StrategyStats> {
        let inner = self.inner.lock().expect("history lock poisoned");
        Ok(inner
            .performance
            .get(&(strategy, platform, value_tier))
            .cloned()
            .unwrap_or_else(|| StrategyStats::empty(strategy, platform, value_tier)))
    }

    async fn get_best_strategy(
        &self,
        platform: Platform,
        value_tier: ValueTier,
        min_samples: u32,
    ) -> Result<Option<Strategy>> {
        let inner = self.inner.lock().expect("history lock poisoned");
        Ok(inner
            .performance
            .values()
            .filter(|s| {
                s.platform == platform && s.value_tier == value_tier && s.total_uses >= min_samples
            })
            .max_by(|a, b| {
                a.win_rate()
                    .partial_cmp(&b.win_rate())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|s| s.strategy))
    }

    async fn get_rounds_for_thread(&self, thread_id: &str) -> Result<Vec<AuctionRound>> {
        let inner = self.inner.lock().expect("history lock poisoned");
        Ok(inner
            .rounds
            .range((thread_id.to_string(), 0)..(thread_id.to_string(), u32::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }
}
