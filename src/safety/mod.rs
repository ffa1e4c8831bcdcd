use crate::core::types::{AuctionContext, DecisionSource, FinalDecision, RiskLevel, Strategy};
use rust_decimal::Decimal;

/// Hard pre-filter constants. No downstream stage can override these.
const MIN_BUDGET: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

fn overpayment_threshold(estimated_value: Decimal) -> Decimal {
    estimated_value * Decimal::new(130, 2)
}

fn concentration_limit(budget_available: Decimal) -> Decimal {
    budget_available * Decimal::new(50, 2)
}

#[derive(Clone, Debug)]
pub struct SafetyBlock {
    pub rule: &'static str,
    pub reason: String,
}

impl SafetyBlock {
    pub fn into_decision(self) -> FinalDecision {
        FinalDecision {
            strategy: Strategy::DoNotBid,
            recommended_bid_amount: Decimal::ZERO,
            should_increase_proxy: false,
            next_bid_amount: None,
            max_budget_for_domain: Decimal::ZERO,
            risk_level: RiskLevel::High,
            confidence: 0.95,
            reasoning: self.reason.clone(),
            proxy: None,
            decision_source: DecisionSource::SafetyBlock,
            block_reason: Some(self.reason),
        }
    }
}

/// Deterministic safety checks run before any strategy reasoning.
/// First failing rule blocks; order is fixed.
#[derive(Default)]
pub struct SafetyGate;

impl SafetyGate {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, ctx: &AuctionContext) -> Option<SafetyBlock> {
        self.check_valuation_validity(ctx)
            .or_else(|| self.check_minimum_budget(ctx))
            .or_else(|| self.check_overpayment(ctx))
            .or_else(|| self.check_portfolio_concentration(ctx))
    }

    /// Without a positive valuation there is no profit calculus at all.
    fn check_valuation_validity(&self, ctx: &AuctionContext) -> Option<SafetyBlock> {
        if ctx.estimated_value <= Decimal::ZERO {
            return Some(SafetyBlock {
                rule: "valuation_validity",
                reason: format!(
                    "VALUATION INVALID: estimated value (${}) is missing or non-positive; \
                     profit margins cannot be calculated. Strategy: do_not_bid",
                    ctx.estimated_value
                ),
            });
        }
        None
    }

    fn check_minimum_budget(&self, ctx: &AuctionContext) -> Option<SafetyBlock> {
        if ctx.budget_available < MIN_BUDGET {
            return Some(SafetyBlock {
                rule: "minimum_budget",
                reason: format!(
                    "MINIMUM BUDGET: available budget (${}) is below the ${} floor for \
                     meaningful participation. Strategy: do_not_bid",
                    ctx.budget_available, MIN_BUDGET
                ),
            });
        }
        None
    }

    /// Winner's-curse guard: bidding past 130% of value can never profit.
    fn check_overpayment(&self, ctx: &AuctionContext) -> Option<SafetyBlock> {
        let threshold = overpayment_threshold(ctx.estimated_value);
        if ctx.current_bid > threshold {
            return Some(SafetyBlock {
                rule: "overpayment_protection",
                reason: format!(
                    "OVERPAYMENT PROTECTION: current bid (${}) exceeds 130% of estimated \
                     value (${}); this is winner's-curse territory. Strategy: do_not_bid",
                    ctx.current_bid, ctx.estimated_value
                ),
            });
        }
        None
    }

    fn check_portfolio_concentration(&self, ctx: &AuctionContext) -> Option<SafetyBlock> {
        let limit = concentration_limit(ctx.budget_available);
        if ctx.estimated_value > limit {
            return Some(SafetyBlock {
                rule: "portfolio_concentration",
                reason: format!(
                    "PORTFOLIO CONCENTRATION: domain value (${}) would consume more than \
                     50% of remaining budget (${}); maximum allowed is ${}. \
                     Strategy: do_not_bid",
                    ctx.estimated_value, ctx.budget_available, limit
                ),
            });
        }
        None
    }
}
