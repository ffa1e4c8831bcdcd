pub mod client;
pub mod prompt;

pub use client::{OpenAiReasoner, Reasoner};

use crate::core::types::{AuctionContext, RiskLevel, Strategy, StrategyDecision};
use crate::history::learning::HistoricalContext;
use crate::intel::MarketIntelligence;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::warn;

const MIN_REASONING_CHARS: usize = 50;

/// Wire shape the reasoner is asked to produce.
#[derive(Debug, Deserialize)]
struct RawStrategyResponse {
    strategy: String,
    recommended_bid_amount: f64,
    confidence: f64,
    risk_level: String,
    reasoning: String,
}

/// Adapter between the pipeline and the injected reasoner: builds prompts,
/// enforces the deadline, parses and coerces the reply. Every failure mode
/// collapses to None; the orchestrator falls back to the rule selector and
/// never retries here.
pub struct StrategyReasoner {
    reasoner: Arc<dyn Reasoner>,
}

impl StrategyReasoner {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    pub async fn propose(
        &self,
        ctx: &AuctionContext,
        intel: &MarketIntelligence,
        history: &HistoricalContext,
        deadline: Option<Instant>,
    ) -> Option<StrategyDecision> {
        let system = prompt::system_prompt();
        let user = prompt::user_prompt(ctx, intel, history);

        let call = self.reasoner.reason(&system, &user);
        let raw = match deadline {
            Some(at) => match tokio::time::timeout_at(at, call).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!(error = %e, domain = %ctx.domain, "Reasoner call failed");
                    metrics::counter!("bidmind_reasoner_failures_total", "kind" => "transport")
                        .increment(1);
                    return None;
                }
                Err(_) => {
                    warn!(domain = %ctx.domain, "Reasoner call hit the decide deadline");
                    metrics::counter!("bidmind_reasoner_failures_total", "kind" => "timeout")
                        .increment(1);
                    return None;
                }
            },
            None => match call.await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, domain = %ctx.domain, "Reasoner call failed");
                    metrics::counter!("bidmind_reasoner_failures_total", "kind" => "transport")
                        .increment(1);
                    return None;
                }
            },
        };

        match parse_decision(&raw) {
            Some(decision) => Some(decision),
            None => {
                metrics::counter!("bidmind_reasoner_failures_total", "kind" => "parse")
                    .increment(1);
                None
            }
        }
    }
}

/// Parse and coerce the reasoner's reply. Tolerates markdown fences; rejects
/// schema mismatches and semantic impossibilities.
fn parse_decision(raw: &str) -> Option<StrategyDecision> {
    let clean = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let parsed: RawStrategyResponse = match serde_json::from_str(clean) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "Reasoner output was not valid decision JSON");
            return None;
        }
    };

    let strategy = match Strategy::parse(&parsed.strategy) {
        Some(s) => s,
        None => {
            warn!(strategy = %parsed.strategy, "Reasoner proposed an unknown strategy");
            return None;
        }
    };

    let risk_level = match parsed.risk_level.as_str() {
        "low" => RiskLevel::Low,
        "medium" => RiskLevel::Medium,
        "high" => RiskLevel::High,
        other => {
            warn!(risk = %other, "Reasoner proposed an unknown risk level");
            return None;
        }
    };

    if !parsed.recommended_bid_amount.is_finite() || parsed.recommended_bid_amount < 0.0 {
        warn!(
            amount = parsed.recommended_bid_amount,
            "Reasoner proposed an impossible bid amount"
        );
        return None;
    }
    let recommended_bid_amount = Decimal::from_f64(parsed.recommended_bid_amount)?;

    if !parsed.confidence.is_finite() || !(0.0..=1.0).contains(&parsed.confidence) {
        warn!(confidence = parsed.confidence, "Reasoner confidence out of range");
        return None;
    }

    if parsed.reasoning.len() < MIN_REASONING_CHARS {
        warn!(
            len = parsed.reasoning.len(),
            "Reasoner reasoning too short to be usable"
        );
        return None;
    }

    Some(StrategyDecision {
        strategy,
        recommended_bid_amount,
        confidence: parsed.confidence,
        risk_level,
        reasoning: parsed.reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::IntelCfg;
    use crate::core::types::{BidderAnalysis, Platform};
    use crate::intel::tables::IntelTables;
    use crate::intel::MarketIntel;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::time::Duration;

    const GOOD_REASONING: &str = "Profit margin is strong at the safe max; competition is light \
                                  and the risk of a proxy war stays low for this strategy.";

    fn good_json() -> String {
        format!(
            r#"{{"strategy":"proxy_max","recommended_bid_amount":700.0,"confidence":0.8,"risk_level":"medium","reasoning":"{GOOD_REASONING}"}}"#
        )
    }

    struct StubReasoner {
        reply: String,
        delay: Duration,
    }

    #[async_trait]
    impl Reasoner for StubReasoner {
        async fn reason(&self, _system: &str, _user: &str) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            Ok(self.reply.clone())
        }
    }

    struct FailingReasoner;

    #[async_trait]
    impl Reasoner for FailingReasoner {
        async fn reason(&self, _system: &str, _user: &str) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    fn ctx() -> AuctionContext {
        AuctionContext {
            domain: "example.com".to_string(),
            platform: Platform::Godaddy,
            estimated_value: Decimal::from(1000),
            current_bid: Decimal::from(50),
            your_current_proxy: Decimal::ZERO,
            budget_available: Decimal::from(5000),
            num_bidders: 1,
            hours_remaining: 2.0,
            bidder_analysis: BidderAnalysis::default(),
            thread_id: "t-1".to_string(),
            last_bidder_id: None,
        }
    }

    fn intel() -> MarketIntelligence {
        MarketIntel::new(IntelTables::default(), IntelCfg::default()).enrich(&ctx())
    }

    #[test]
    fn test_parse_plain_json() {
        let decision = parse_decision(&good_json()).unwrap();
        assert_eq!(decision.strategy, Strategy::ProxyMax);
        assert_eq!(decision.recommended_bid_amount, Decimal::from(700));
        assert_eq!(decision.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{}\n```", good_json());
        assert!(parse_decision(&fenced).is_some());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_decision("I think you should probably bid").is_none());
        assert!(parse_decision("{\"strategy\": \"proxy_max\"}").is_none());
    }

    #[test]
    fn test_parse_rejects_semantic_impossibilities() {
        let negative = good_json().replace("700.0", "-50.0");
        assert!(parse_decision(&negative).is_none());

        let overconfident = good_json().replace("0.8", "1.7");
        assert!(parse_decision(&overconfident).is_none());

        let unknown = good_json().replace("proxy_max", "blitz_bid");
        assert!(parse_decision(&unknown).is_none());

        let terse = format!(
            r#"{{"strategy":"proxy_max","recommended_bid_amount":700.0,"confidence":0.8,"risk_level":"medium","reasoning":"ok"}}"#
        );
        assert!(parse_decision(&terse).is_none());
    }

    #[tokio::test]
    async fn test_propose_happy_path() {
        let adapter = StrategyReasoner::new(Arc::new(StubReasoner {
            reply: good_json(),
            delay: Duration::ZERO,
        }));
        let decision = adapter
            .propose(&ctx(), &intel(), &HistoricalContext::default(), None)
            .await
            .unwrap();
        assert_eq!(decision.strategy, Strategy::ProxyMax);
    }

    #[tokio::test]
    async fn test_propose_swallows_transport_errors() {
        let adapter = StrategyReasoner::new(Arc::new(FailingReasoner));
        let decision = adapter
            .propose(&ctx(), &intel(), &HistoricalContext::default(), None)
            .await;
        assert!(decision.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_propose_respects_deadline() {
        let adapter = StrategyReasoner::new(Arc::new(StubReasoner {
            reply: good_json(),
            delay: Duration::from_secs(30),
        }));
        let deadline = Instant::now() + Duration::from_millis(100);
        let decision = adapter
            .propose(&ctx(), &intel(), &HistoricalContext::default(), Some(deadline))
            .await;
        assert!(decision.is_none());
    }
}
