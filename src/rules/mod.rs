use crate::core::types::{
    self, AuctionContext, RiskLevel, Strategy, StrategyDecision, ValueTier,
};
use crate::intel::MarketIntelligence;
use rust_decimal::Decimal;

/// Deterministic strategy selection by value tier and auction conditions.
/// Always produces a decision; this is the pipeline's fallback when the
/// reasoner is unavailable or its output fails validation.
#[derive(Default)]
pub struct RuleSelector;

impl RuleSelector {
    pub fn new() -> Self {
        Self
    }

    pub fn select(
        &self,
        ctx: &AuctionContext,
        intel: Option<&MarketIntelligence>,
    ) -> StrategyDecision {
        match ctx.value_tier() {
            ValueTier::High => self.high_value(ctx, intel),
            ValueTier::Medium => self.medium_value(ctx, intel),
            ValueTier::Low => self.low_value(ctx),
        }
    }

    /// Every rule recommendation is capped by the safe max, the budget and
    /// the hard ceiling at once.
    fn capped_amount(ctx: &AuctionContext) -> Decimal {
        types::safe_max(ctx.estimated_value)
            .min(ctx.budget_available)
            .min(types::hard_ceiling(ctx.estimated_value))
    }

    fn opponent_note(intel: Option<&MarketIntelligence>) -> String {
        match intel {
            Some(mi) if mi.bidder.fold_probability.is_some() => format!(
                " Opponent cluster '{}' folds {:.0}% of the time.",
                mi.bidder.behavioral_cluster.as_str(),
                mi.bidder.fold_probability.unwrap_or(0.5) * 100.0
            ),
            _ => String::new(),
        }
    }

    fn high_value(
        &self,
        ctx: &AuctionContext,
        intel: Option<&MarketIntelligence>,
    ) -> StrategyDecision {
        let amount = Self::capped_amount(ctx);

        if ctx.bidder_analysis.bot_detected {
            return StrategyDecision {
                strategy: Strategy::LastMinuteSnipe,
                recommended_bid_amount: amount,
                confidence: 0.80,
                risk_level: RiskLevel::Medium,
                reasoning: format!(
                    "HIGH-VALUE BOT COUNTER: bot detected with aggression {:.1}/10. Sniping on \
                     {} minimizes the bot's reaction window while the ${} cap protects the \
                     profit margin against a proxy war.{}",
                    ctx.bidder_analysis.aggression_score,
                    ctx.platform,
                    amount,
                    Self::opponent_note(intel)
                ),
            };
        }

        if ctx.num_bidders >= 3 {
            return StrategyDecision {
                strategy: Strategy::LastMinuteSnipe,
                recommended_bid_amount: amount,
                confidence: 0.70,
                risk_level: RiskLevel::High,
                reasoning: format!(
                    "HIGH-VALUE COMPETITION: {} bidders raise escalation risk. Sniping avoids \
                     feeding the bidding war; the ${} cap keeps the profit target intact on \
                     this ${} domain.{}",
                    ctx.num_bidders,
                    amount,
                    ctx.estimated_value,
                    Self::opponent_note(intel)
                ),
            };
        }

        if ctx.num_bidders >= 1 {
            return StrategyDecision {
                strategy: Strategy::ProxyMax,
                recommended_bid_amount: amount,
                confidence: 0.75,
                risk_level: RiskLevel::Medium,
                reasoning: format!(
                    "HIGH-VALUE BALANCED: {} bidder(s) present on a ${} domain. A proxy max of \
                     ${} lets {} auto-bidding absorb incremental competition while the cap \
                     protects the margin.{}",
                    ctx.num_bidders,
                    ctx.estimated_value,
                    amount,
                    ctx.platform,
                    Self::opponent_note(intel)
                ),
            };
        }

        if ctx.hours_remaining < 1.0 {
            return StrategyDecision {
                strategy: Strategy::WaitForCloseout,
                recommended_bid_amount: amount,
                confidence: 0.85,
                risk_level: RiskLevel::Low,
                reasoning: format!(
                    "HIGH-VALUE CLOSEOUT: no bidders with {:.1}h remaining. Waiting for the \
                     closeout avoids advertising interest; ${} stays ready if competition \
                     appears, preserving the profit margin.",
                    ctx.hours_remaining, amount
                ),
            };
        }

        StrategyDecision {
            strategy: Strategy::ProxyMax,
            recommended_bid_amount: amount,
            confidence: 0.75,
            risk_level: RiskLevel::Medium,
            reasoning: format!(
                "HIGH-VALUE QUIET: no competition yet on a ${} domain with {:.1}h to go. An \
                 early proxy max of ${} claims position without escalation risk and keeps the \
                 profit target fixed.",
                ctx.estimated_value, ctx.hours_remaining, amount
            ),
        }
    }

    fn medium_value(
        &self,
        ctx: &AuctionContext,
        intel: Option<&MarketIntelligence>,
    ) -> StrategyDecision {
        let amount = Self::capped_amount(ctx);

        if ctx.platform == types::Platform::Godaddy && ctx.hours_remaining < 1.0 {
            return StrategyDecision {
                strategy: Strategy::LastMinuteSnipe,
                recommended_bid_amount: amount,
                confidence: 0.80,
                risk_level: RiskLevel::Medium,
                reasoning: format!(
                    "MEDIUM-VALUE GODADDY TIMING: under one hour left. Snipe timing respects \
                     the 5-minute extension rule so the bid lands without triggering \
                     auto-extensions; ${} cap holds the profit margin.{}",
                    amount,
                    Self::opponent_note(intel)
                ),
            };
        }

        if ctx.num_bidders >= 3 {
            return StrategyDecision {
                strategy: Strategy::IncrementalTest,
                recommended_bid_amount: amount,
                confidence: 0.70,
                risk_level: RiskLevel::Medium,
                reasoning: format!(
                    "MEDIUM-VALUE COMPETITION: {} bidders signal real interest. Incremental \
                     testing gauges the competition without overcommitting; escalation stays \
                     capped at ${} to protect profit.{}",
                    ctx.num_bidders,
                    amount,
                    Self::opponent_note(intel)
                ),
            };
        }

        StrategyDecision {
            strategy: Strategy::ProxyMax,
            recommended_bid_amount: amount,
            confidence: 0.75,
            risk_level: RiskLevel::Medium,
            reasoning: format!(
                "MEDIUM-VALUE BALANCED: {} bidder(s) on a ${} domain. Proxy max of ${} lets \
                 {} auto-bidding handle routine competition while the cap protects margins.{}",
                ctx.num_bidders,
                ctx.estimated_value,
                amount,
                ctx.platform,
                Self::opponent_note(intel)
            ),
        }
    }

    fn low_value(&self, ctx: &AuctionContext) -> StrategyDecision {
        let amount = Self::capped_amount(ctx);

        if ctx.num_bidders == 0 {
            return StrategyDecision {
                strategy: Strategy::WaitForCloseout,
                recommended_bid_amount: amount,
                confidence: 0.90,
                risk_level: RiskLevel::Low,
                reasoning: format!(
                    "LOW-VALUE CLOSEOUT: no bidders on a ${} domain. Waiting for the closeout \
                     maximizes profit with zero competition risk; ${} stays ready if interest \
                     appears.",
                    ctx.estimated_value, amount
                ),
            };
        }

        StrategyDecision {
            strategy: Strategy::IncrementalTest,
            recommended_bid_amount: amount,
            confidence: 0.70,
            risk_level: RiskLevel::Low,
            reasoning: format!(
                "LOW-VALUE TESTING: {} bidder(s) on a ${} domain. Incremental testing finds \
                 the winning price cheaply; low stakes keep the risk and profit exposure \
                 small, capped at ${}.",
                ctx.num_bidders, ctx.estimated_value, amount
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BidderAnalysis, Platform};

    fn ctx(value: i64, bidders: u32, hours: f64, platform: Platform) -> AuctionContext {
        AuctionContext {
            domain: "example.com".to_string(),
            platform,
            estimated_value: Decimal::from(value),
            current_bid: Decimal::from(10),
            your_current_proxy: Decimal::ZERO,
            budget_available: Decimal::from(10_000),
            num_bidders: bidders,
            hours_remaining: hours,
            bidder_analysis: BidderAnalysis::default(),
            thread_id: "t-1".to_string(),
            last_bidder_id: None,
        }
    }

    #[test]
    fn test_amounts_capped_by_safe_max_budget_and_ceiling() {
        let selector = RuleSelector::new();

        // Safe max binds.
        let d = selector.select(&ctx(1000, 1, 5.0, Platform::Namejet), None);
        assert_eq!(d.recommended_bid_amount, Decimal::from(700));

        // Budget binds.
        let mut tight = ctx(1000, 1, 5.0, Platform::Namejet);
        tight.budget_available = Decimal::from(400);
        let d = selector.select(&tight, None);
        assert_eq!(d.recommended_bid_amount, Decimal::from(400));
    }

    #[test]
    fn test_high_tier_bot_snipes() {
        let mut c = ctx(2500, 1, 5.0, Platform::Godaddy);
        c.bidder_analysis.bot_detected = true;
        let d = RuleSelector::new().select(&c, None);
        assert_eq!(d.strategy, Strategy::LastMinuteSnipe);
        assert_eq!(d.recommended_bid_amount, Decimal::from(1750));
    }

    #[test]
    fn test_high_tier_competition_snipes() {
        let d = RuleSelector::new().select(&ctx(2000, 3, 5.0, Platform::Namejet), None);
        assert_eq!(d.strategy, Strategy::LastMinuteSnipe);
    }

    #[test]
    fn test_high_tier_light_competition_proxies() {
        let d = RuleSelector::new().select(&ctx(2000, 1, 5.0, Platform::Namejet), None);
        assert_eq!(d.strategy, Strategy::ProxyMax);
    }

    #[test]
    fn test_high_tier_empty_late_waits() {
        let d = RuleSelector::new().select(&ctx(2000, 0, 0.5, Platform::Namejet), None);
        assert_eq!(d.strategy, Strategy::WaitForCloseout);

        let d = RuleSelector::new().select(&ctx(2000, 0, 6.0, Platform::Namejet), None);
        assert_eq!(d.strategy, Strategy::ProxyMax);
    }

    #[test]
    fn test_medium_tier_godaddy_late_snipes() {
        let d = RuleSelector::new().select(&ctx(500, 1, 0.5, Platform::Godaddy), None);
        assert_eq!(d.strategy, Strategy::LastMinuteSnipe);

        // Same timing on NameJet is just a proxy max.
        let d = RuleSelector::new().select(&ctx(500, 1, 0.5, Platform::Namejet), None);
        assert_eq!(d.strategy, Strategy::ProxyMax);
    }

    #[test]
    fn test_medium_tier_crowd_tests_incrementally() {
        let d = RuleSelector::new().select(&ctx(500, 4, 5.0, Platform::Namejet), None);
        assert_eq!(d.strategy, Strategy::IncrementalTest);
    }

    #[test]
    fn test_low_tier_branches() {
        let d = RuleSelector::new().select(&ctx(75, 0, 0.5, Platform::Godaddy), None);
        assert_eq!(d.strategy, Strategy::WaitForCloseout);

        let d = RuleSelector::new().select(&ctx(75, 2, 0.5, Platform::Godaddy), None);
        assert_eq!(d.strategy, Strategy::IncrementalTest);
    }

    #[test]
    fn test_always_terminates_with_bounded_confidence() {
        let selector = RuleSelector::new();
        for value in [50, 100, 999, 1000, 5000] {
            for bidders in [0, 1, 3, 8] {
                for hours in [0.2, 3.0] {
                    let d = selector.select(&ctx(value, bidders, hours, Platform::Dynadot), None);
                    assert!((0.70..=0.90).contains(&d.confidence));
                    assert!(d.reasoning.len() >= 50);
                    assert!(d.strategy != Strategy::DoNotBid);
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let selector = RuleSelector::new();
        let c = ctx(500, 2, 1.5, Platform::Dynadot);
        let a = selector.select(&c, None);
        let b = selector.select(&c, None);
        assert_eq!(a.strategy, b.strategy);
        assert_eq!(a.recommended_bid_amount, b.recommended_bid_amount);
        assert_eq!(a.reasoning, b.reasoning);
    }
}
