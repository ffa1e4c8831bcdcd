use crate::config::config::ValidatorCfg;
use crate::core::types::{self, AuctionContext, RiskLevel, Strategy, StrategyDecision};
use rust_decimal::Decimal;

/// Post-hoc checks on reasoner output. A rejection routes the pipeline to the
/// rule selector; the reasoner is never re-invoked.
pub struct Validator {
    cfg: ValidatorCfg,
}

impl Validator {
    pub fn new(cfg: ValidatorCfg) -> Self {
        Self { cfg }
    }

    /// Runs all checks in fixed order; the first failure is returned as a
    /// structured `KIND: details` string for the audit log.
    pub fn validate(&self, decision: &StrategyDecision, ctx: &AuctionContext) -> Result<(), String> {
        self.check_bid_ceiling(decision, ctx)?;
        self.check_budget(decision, ctx)?;
        self.check_logical_consistency(decision, ctx)?;
        self.check_reasoning_quality(decision)?;
        self.check_context_fit(decision, ctx)?;
        Ok(())
    }

    fn check_bid_ceiling(
        &self,
        decision: &StrategyDecision,
        ctx: &AuctionContext,
    ) -> Result<(), String> {
        let ceiling = types::hard_ceiling(ctx.estimated_value);
        if decision.recommended_bid_amount > ceiling {
            return Err(format!(
                "BID_CEILING: recommended bid (${}) exceeds 80% of estimated value (${} max)",
                decision.recommended_bid_amount, ceiling
            ));
        }
        Ok(())
    }

    fn check_budget(
        &self,
        decision: &StrategyDecision,
        ctx: &AuctionContext,
    ) -> Result<(), String> {
        if decision.recommended_bid_amount > ctx.budget_available {
            return Err(format!(
                "BUDGET: recommended bid (${}) exceeds available budget (${})",
                decision.recommended_bid_amount, ctx.budget_available
            ));
        }
        Ok(())
    }

    fn check_logical_consistency(
        &self,
        decision: &StrategyDecision,
        ctx: &AuctionContext,
    ) -> Result<(), String> {
        if decision.strategy == Strategy::DoNotBid
            && decision.recommended_bid_amount > Decimal::ZERO
        {
            return Err(format!(
                "LOGICAL_CONSISTENCY: strategy is do_not_bid but bid amount is ${}",
                decision.recommended_bid_amount
            ));
        }

        if decision.strategy == Strategy::WaitForCloseout && ctx.num_bidders > 2 {
            return Err(format!(
                "LOGICAL_CONSISTENCY: wait_for_closeout with {} active bidders; \
                 a quiet closeout is unlikely under competition",
                ctx.num_bidders
            ));
        }

        if decision.risk_level == RiskLevel::Low && decision.confidence < 0.5 {
            return Err(format!(
                "LOGICAL_CONSISTENCY: low risk claimed with confidence {:.2}; \
                 low-risk calls require confidence >= 0.5",
                decision.confidence
            ));
        }

        Ok(())
    }

    fn check_reasoning_quality(&self, decision: &StrategyDecision) -> Result<(), String> {
        if decision.reasoning.len() < self.cfg.min_reasoning_chars {
            return Err(format!(
                "REASONING_QUALITY: explanation too brief ({} chars, minimum {})",
                decision.reasoning.len(),
                self.cfg.min_reasoning_chars
            ));
        }

        let lower = decision.reasoning.to_lowercase();
        let hits = self
            .cfg
            .required_keywords
            .iter()
            .filter(|k| lower.contains(k.to_lowercase().as_str()))
            .count();
        if hits < self.cfg.min_keyword_hits {
            return Err(format!(
                "REASONING_QUALITY: explanation lacks depth; only {} of {} required themes \
                 ({}) are discussed",
                hits,
                self.cfg.min_keyword_hits,
                self.cfg.required_keywords.join(", ")
            ));
        }

        Ok(())
    }

    fn check_context_fit(
        &self,
        decision: &StrategyDecision,
        ctx: &AuctionContext,
    ) -> Result<(), String> {
        if decision.strategy == Strategy::AggressiveEarly
            && ctx.estimated_value < Decimal::from(500)
        {
            return Err(format!(
                "CONTEXT_FIT: aggressive_early on a ${} domain; reserved for \
                 must-have domains worth $500 or more",
                ctx.estimated_value
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BidderAnalysis, Platform};

    fn ctx(value: i64, budget: i64, bidders: u32) -> AuctionContext {
        AuctionContext {
            domain: "example.com".to_string(),
            platform: Platform::Godaddy,
            estimated_value: Decimal::from(value),
            current_bid: Decimal::from(50),
            your_current_proxy: Decimal::ZERO,
            budget_available: Decimal::from(budget),
            num_bidders: bidders,
            hours_remaining: 2.0,
            bidder_analysis: BidderAnalysis::default(),
            thread_id: "t-1".to_string(),
            last_bidder_id: None,
        }
    }

    fn decision(strategy: Strategy, amount: i64) -> StrategyDecision {
        StrategyDecision {
            strategy,
            recommended_bid_amount: Decimal::from(amount),
            confidence: 0.8,
            risk_level: RiskLevel::Medium,
            reasoning: "Profit margin supports a measured approach; competition is light and \
                        the risk of escalation stays low for this strategy."
                .to_string(),
        }
    }

    fn validator() -> Validator {
        Validator::new(ValidatorCfg::default())
    }

    #[test]
    fn test_valid_decision_passes() {
        let d = decision(Strategy::ProxyMax, 700);
        assert!(validator().validate(&d, &ctx(1000, 5000, 1)).is_ok());
    }

    #[test]
    fn test_ceiling_is_eighty_percent_not_seventy() {
        // $800 on a $1000 domain sits exactly at the hard ceiling: allowed.
        let d = decision(Strategy::ProxyMax, 800);
        assert!(validator().validate(&d, &ctx(1000, 5000, 1)).is_ok());

        let d = decision(Strategy::ProxyMax, 801);
        let err = validator().validate(&d, &ctx(1000, 5000, 1)).unwrap_err();
        assert!(err.starts_with("BID_CEILING:"));
    }

    #[test]
    fn test_budget_feasibility() {
        let d = decision(Strategy::ProxyMax, 700);
        let err = validator().validate(&d, &ctx(1000, 600, 1)).unwrap_err();
        assert!(err.starts_with("BUDGET:"));
    }

    #[test]
    fn test_do_not_bid_with_amount_rejected() {
        let d = decision(Strategy::DoNotBid, 50);
        let err = validator().validate(&d, &ctx(1000, 5000, 1)).unwrap_err();
        assert!(err.starts_with("LOGICAL_CONSISTENCY:"));
    }

    #[test]
    fn test_closeout_needs_quiet_auction() {
        let d = decision(Strategy::WaitForCloseout, 100);
        assert!(validator().validate(&d, &ctx(1000, 5000, 2)).is_ok());
        let err = validator().validate(&d, &ctx(1000, 5000, 3)).unwrap_err();
        assert!(err.starts_with("LOGICAL_CONSISTENCY:"));
    }

    #[test]
    fn test_low_risk_needs_confidence() {
        let mut d = decision(Strategy::ProxyMax, 500);
        d.risk_level = RiskLevel::Low;
        d.confidence = 0.4;
        let err = validator().validate(&d, &ctx(1000, 5000, 1)).unwrap_err();
        assert!(err.starts_with("LOGICAL_CONSISTENCY:"));

        d.confidence = 0.5;
        assert!(validator().validate(&d, &ctx(1000, 5000, 1)).is_ok());
    }

    #[test]
    fn test_reasoning_length_and_keywords() {
        let mut d = decision(Strategy::ProxyMax, 500);
        d.reasoning = "Looks good to me.".to_string();
        let err = validator().validate(&d, &ctx(1000, 5000, 1)).unwrap_err();
        assert!(err.starts_with("REASONING_QUALITY:"));

        // Long enough but content-free: keyword check fires.
        d.reasoning = "x".repeat(120);
        let err = validator().validate(&d, &ctx(1000, 5000, 1)).unwrap_err();
        assert!(err.starts_with("REASONING_QUALITY:"));
        assert!(err.contains("themes"));
    }

    #[test]
    fn test_aggressive_early_needs_value() {
        let d = decision(Strategy::AggressiveEarly, 300);
        let err = validator().validate(&d, &ctx(400, 5000, 1)).unwrap_err();
        assert!(err.starts_with("CONTEXT_FIT:"));

        let d = decision(Strategy::AggressiveEarly, 300);
        assert!(validator().validate(&d, &ctx(500, 5000, 1)).is_ok());
    }
}
