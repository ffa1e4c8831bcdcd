use crate::config::config::AppCfg;
use crate::core::types::{
    AuctionContext, DecisionSource, FinalDecision, ProxyAction, ProxyDecision, RiskLevel,
    Strategy, StrategyDecision,
};
use crate::history::learning::HistoricalLearning;
use crate::history::HistoryStore;
use crate::intel::MarketIntel;
use crate::llm::{Reasoner, StrategyReasoner};
use crate::proxy::ProxyCalculator;
use crate::rules::RuleSelector;
use crate::safety::SafetyGate;
use crate::validator::Validator;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// The decision pipeline. Stateless across calls; safe for concurrent use.
///
/// Stage order: enrich -> safety -> reason -> validate -> (rules on miss)
/// -> proxy -> finalize. Exactly one strategy-selection path fires per call
/// and every call terminates in a FinalDecision.
#[derive(Clone)]
pub struct DecisionEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    intel: Arc<MarketIntel>,
    reasoner: Option<StrategyReasoner>,
    validator: Validator,
    rules: RuleSelector,
    proxy: ProxyCalculator,
    safety: SafetyGate,
    learning: HistoricalLearning,
}

impl DecisionEngine {
    pub fn new(
        cfg: &AppCfg,
        intel: Arc<MarketIntel>,
        reasoner: Option<Arc<dyn Reasoner>>,
        store: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                intel,
                reasoner: reasoner.map(StrategyReasoner::new),
                validator: Validator::new(cfg.validator.clone()),
                rules: RuleSelector::new(),
                proxy: ProxyCalculator::new(),
                safety: SafetyGate::new(),
                learning: HistoricalLearning::new(store, cfg.history.clone()),
            }),
        }
    }

    pub fn rules_only(&self) -> bool {
        self.inner.reasoner.is_none()
    }

    /// Produce a bidding decision for one auction snapshot. Never returns an
    /// error and never panics; pipeline failures of any kind collapse into a
    /// `system_error` do-not-bid decision.
    #[tracing::instrument(skip(self, ctx), fields(domain = %ctx.domain, thread_id = %ctx.thread_id))]
    pub async fn decide(
        &self,
        ctx: AuctionContext,
        deadline: Option<Instant>,
    ) -> FinalDecision {
        let start = std::time::Instant::now();

        // The pipeline runs on its own task so a panic anywhere inside it
        // surfaces as a join error instead of unwinding into the caller.
        let inner = self.inner.clone();
        let call_ctx = ctx.clone();
        let handle = tokio::spawn(async move { inner.run_pipeline(call_ctx, deadline).await });

        let decision = match handle.await {
            Ok(decision) => decision,
            Err(join_err) => {
                error!(?join_err, domain = %ctx.domain, "Decision pipeline panicked");
                FinalDecision::system_error("decision pipeline panicked; see logs")
            }
        };

        metrics::counter!(
            "bidmind_decisions_total",
            "source" => decision.decision_source.as_str()
        )
        .increment(1);
        metrics::histogram!("bidmind_decision_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        decision
    }
}

impl EngineInner {
    async fn run_pipeline(
        &self,
        ctx: AuctionContext,
        deadline: Option<Instant>,
    ) -> FinalDecision {
        if let Err(e) = ctx.validate() {
            warn!(error = %e, domain = %ctx.domain, "Rejected malformed auction context");
            return FinalDecision::system_error(format!("invalid input: {e}"));
        }

        let intel = self.intel.enrich(&ctx);

        if let Some(block) = self.safety.check(&ctx) {
            info!(rule = block.rule, domain = %ctx.domain, "Safety gate blocked auction");
            return block.into_decision();
        }

        // History reads finish before the reasoner is prompted.
        let history = self.learning.historical_context(&ctx).await;

        let mut source = DecisionSource::RulesFallback;
        let mut audit_reason: Option<String> = None;

        let reasoned = match &self.reasoner {
            Some(reasoner) => match reasoner.propose(&ctx, &intel, &history, deadline).await {
                Some(candidate) => match self.validator.validate(&candidate, &ctx) {
                    Ok(()) => {
                        source = DecisionSource::Llm;
                        Some(candidate)
                    }
                    Err(reason) => {
                        warn!(reason = %reason, domain = %ctx.domain, "Reasoner output rejected");
                        audit_reason = Some(reason);
                        None
                    }
                },
                None => None,
            },
            None => None,
        };

        let strategy_decision = match reasoned {
            Some(decision) => decision,
            None => self.rules.select(&ctx, Some(&intel)),
        };

        let proxy = self.proxy.analyze(&ctx);

        finalize(strategy_decision, proxy, source, audit_reason)
    }
}

/// Merge the chosen strategy with the proxy math. The accept-loss override is
/// the single place a later stage overrules an earlier one.
fn finalize(
    decision: StrategyDecision,
    proxy: ProxyDecision,
    source: DecisionSource,
    audit_reason: Option<String>,
) -> FinalDecision {
    let (strategy, amount, confidence, risk_level, reasoning) =
        if proxy.proxy_action == ProxyAction::AcceptLoss {
            (
                Strategy::DoNotBid,
                Decimal::ZERO,
                decision.confidence.min(0.5),
                RiskLevel::High,
                format!(
                    "{} PROXY ANALYSIS OVERRIDE: {}",
                    decision.reasoning, proxy.explanation
                ),
            )
        } else {
            (
                decision.strategy,
                decision.recommended_bid_amount,
                decision.confidence,
                decision.risk_level,
                decision.reasoning,
            )
        };

    FinalDecision {
        strategy,
        recommended_bid_amount: amount,
        should_increase_proxy: proxy.should_increase_proxy,
        next_bid_amount: proxy.next_bid_amount,
        max_budget_for_domain: proxy.max_budget_for_domain,
        risk_level,
        confidence,
        reasoning,
        proxy: Some(proxy),
        decision_source: source,
        block_reason: audit_reason,
    }
}
