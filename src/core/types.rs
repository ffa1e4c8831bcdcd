use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ----------- Shared monetary vocabulary -----------------

/// Target cap used by the rule selector and the proxy math (70% of value).
pub fn safe_max(estimated_value: Decimal) -> Decimal {
    estimated_value * Decimal::new(70, 2)
}

/// Absolute cap enforced by the validator (80% of value).
pub fn hard_ceiling(estimated_value: Decimal) -> Decimal {
    estimated_value * Decimal::new(80, 2)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Godaddy,
    Namejet,
    Dynadot,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Godaddy => "godaddy",
            Platform::Namejet => "namejet",
            Platform::Dynadot => "dynadot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "godaddy" => Some(Platform::Godaddy),
            "namejet" => Some(Platform::Namejet),
            "dynadot" => Some(Platform::Dynadot),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BidderAnalysis {
    pub bot_detected: bool,
    pub corporate_buyer: bool,
    /// 0-10 scale.
    pub aggression_score: f64,
    /// Seconds.
    pub reaction_time_avg_s: f64,
}

/// Immutable per-call input. One of these per decision round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuctionContext {
    pub domain: String,
    pub platform: Platform,
    pub estimated_value: Decimal,
    pub current_bid: Decimal,
    pub your_current_proxy: Decimal,
    pub budget_available: Decimal,
    pub num_bidders: u32,
    pub hours_remaining: f64,
    #[serde(default)]
    pub bidder_analysis: BidderAnalysis,
    /// Identifies rounds of the same physical auction.
    pub thread_id: String,
    #[serde(default)]
    pub last_bidder_id: Option<String>,
}

impl AuctionContext {
    /// Structural input validation. Callers should reject bad contexts at
    /// construction; `decide()` re-checks and degrades to a system_error
    /// decision instead of panicking.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.estimated_value >= Decimal::ZERO,
            "estimated_value must be non-negative"
        );
        anyhow::ensure!(
            self.current_bid >= Decimal::ZERO,
            "current_bid must be non-negative"
        );
        anyhow::ensure!(
            self.your_current_proxy >= Decimal::ZERO,
            "your_current_proxy must be non-negative"
        );
        anyhow::ensure!(
            self.budget_available >= Decimal::ZERO,
            "budget_available must be non-negative"
        );
        anyhow::ensure!(
            self.hours_remaining >= 0.0 && self.hours_remaining.is_finite(),
            "hours_remaining must be a non-negative number"
        );
        anyhow::ensure!(
            (0.0..=10.0).contains(&self.bidder_analysis.aggression_score),
            "aggression_score must be within 0-10"
        );
        anyhow::ensure!(
            self.bidder_analysis.reaction_time_avg_s >= 0.0,
            "reaction_time_avg_s must be non-negative"
        );
        anyhow::ensure!(!self.domain.is_empty(), "domain must not be empty");
        Ok(())
    }

    pub fn value_tier(&self) -> ValueTier {
        ValueTier::from_value(self.estimated_value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTier {
    High,
    Medium,
    Low,
}

impl ValueTier {
    /// Boundaries resolve to the higher tier: exactly $1000 is high,
    /// exactly $100 is medium.
    pub fn from_value(estimated_value: Decimal) -> Self {
        if estimated_value >= Decimal::from(1000) {
            ValueTier::High
        } else if estimated_value >= Decimal::from(100) {
            ValueTier::Medium
        } else {
            ValueTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueTier::High => "high",
            ValueTier::Medium => "medium",
            ValueTier::Low => "low",
        }
    }

}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ProxyMax,
    LastMinuteSnipe,
    IncrementalTest,
    WaitForCloseout,
    AggressiveEarly,
    DoNotBid,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ProxyMax => "proxy_max",
            Strategy::LastMinuteSnipe => "last_minute_snipe",
            Strategy::IncrementalTest => "incremental_test",
            Strategy::WaitForCloseout => "wait_for_closeout",
            Strategy::AggressiveEarly => "aggressive_early",
            Strategy::DoNotBid => "do_not_bid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proxy_max" => Some(Strategy::ProxyMax),
            "last_minute_snipe" => Some(Strategy::LastMinuteSnipe),
            "incremental_test" => Some(Strategy::IncrementalTest),
            "wait_for_closeout" => Some(Strategy::WaitForCloseout),
            "aggressive_early" => Some(Strategy::AggressiveEarly),
            "do_not_bid" => Some(Strategy::DoNotBid),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Output of strategy selection, from either the reasoner or the rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub strategy: Strategy,
    pub recommended_bid_amount: Decimal,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub reasoning: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyAction {
    AcceptLoss,
    IncreaseProxy,
    MaintainProxy,
    InitialSetup,
}

/// Output of the proxy/outbid calculator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProxyDecision {
    pub current_proxy: Decimal,
    pub current_bid: Decimal,
    pub safe_max: Decimal,
    pub should_increase_proxy: bool,
    pub new_proxy_max: Option<Decimal>,
    pub next_bid_amount: Option<Decimal>,
    pub max_budget_for_domain: Decimal,
    pub proxy_action: ProxyAction,
    pub explanation: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Llm,
    RulesFallback,
    SafetyBlock,
    SystemError,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Llm => "llm",
            DecisionSource::RulesFallback => "rules_fallback",
            DecisionSource::SafetyBlock => "safety_block",
            DecisionSource::SystemError => "system_error",
        }
    }
}

/// Complete decision returned to the caller. Every `decide()` call ends with
/// exactly one of these, whatever happened inside the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalDecision {
    pub strategy: Strategy,
    pub recommended_bid_amount: Decimal,
    pub should_increase_proxy: bool,
    pub next_bid_amount: Option<Decimal>,
    pub max_budget_for_domain: Decimal,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub reasoning: String,
    pub proxy: Option<ProxyDecision>,
    pub decision_source: DecisionSource,
    pub block_reason: Option<String>,
}

impl FinalDecision {
    /// Terminal fallback when the pipeline itself failed. Never bids.
    pub fn system_error(reason: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::DoNotBid,
            recommended_bid_amount: Decimal::ZERO,
            should_increase_proxy: false,
            next_bid_amount: None,
            max_budget_for_domain: Decimal::ZERO,
            risk_level: RiskLevel::High,
            confidence: 0.0,
            reasoning: "System error: emergency safe decision, do not bid.".to_string(),
            proxy: None,
            decision_source: DecisionSource::SystemError,
            block_reason: Some(reason.into()),
        }
    }
}
