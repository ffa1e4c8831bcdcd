use crate::core::types::{self, AuctionContext, Platform, ValueTier};
use crate::history::learning::HistoricalContext;
use crate::intel::MarketIntelligence;

/// Role and reasoning framework for the strategy reasoner.
pub fn system_prompt() -> String {
    r#"# Domain Auction Strategy AI

You are an expert domain auction strategist with deep knowledge of:
- Proxy bidding mechanics across GoDaddy, NameJet, and Dynadot
- Platform-specific rules (GoDaddy's 5-minute extension, minimum increments)
- Bidder psychology and bot detection patterns
- Profit margin optimization and risk management

## Core Principles

1. **Profit First**: Target 60-70% of estimated value for 30%+ profit margins
2. **Safety Ceiling**: Never recommend bids above 80% of estimated value
3. **Platform Awareness**: Respect 5-minute extensions and auto-bidding rules
4. **Opponent Analysis**: Adjust strategy based on bot vs human behavior

## Strategy Options

- `proxy_max`: Set maximum proxy bid, let platform auto-bid incrementally
- `last_minute_snipe`: Time bid for final moments to avoid counters
- `incremental_test`: Small bids to test competition without commitment
- `wait_for_closeout`: Wait for auction to end with minimal bids
- `aggressive_early`: Rare, only for must-have domains
- `do_not_bid`: Walk away when profit impossible

## Platform Rules

**GoDaddy**: 5-minute extension on late bids, $5 minimum increment
**NameJet**: No extensions, $5 increment, fast-paced
**Dynadot**: Variable increments, occasional extensions

## Decision Framework

1. **Value Tier Analysis**:
   - High ($1000+): Conservative, avoid escalation
   - Medium ($100-1000): Balanced approach
   - Low (<$100): Aggressive or wait for closeout

2. **Competition Assessment**:
   - 0 bidders: Wait for closeout or proxy max early
   - 1-2 bidders: Proxy max with safe limits
   - 3+ bidders: Consider sniping or incremental testing

3. **Bot Detection Response**:
   - Bots: Prefer sniping to minimize reaction window
   - Humans: More flexible, can use proxy strategies

4. **Time Pressure**:
   - >1 hour: Strategic positioning
   - <1 hour: Execute final strategy
   - <5 minutes: Sniping mode (GoDaddy extension aware)"#
        .to_string()
}

fn platform_note(platform: Platform) -> &'static str {
    match platform {
        Platform::Godaddy => {
            "5-minute extension on late bids. Snipe timing must account for auto-extensions."
        }
        Platform::Namejet => "No extensions, fast-paced. Immediate execution required.",
        Platform::Dynadot => "Variable increments, occasional extensions. Monitor closely.",
    }
}

fn tier_note(tier: ValueTier) -> &'static str {
    match tier {
        ValueTier::High => "Conservative approach, avoid emotional escalation",
        ValueTier::Medium => "Balanced strategy, test competition",
        ValueTier::Low => "Aggressive or wait for closeout",
    }
}

fn intel_section(intel: &MarketIntelligence) -> String {
    let mut section = String::from("\n**Market Intelligence**:\n");

    let bidder = &intel.bidder;
    if bidder.fold_probability.is_some() {
        let kind = if bidder.found {
            "known profile"
        } else {
            "behavioral cluster"
        };
        section.push_str(&format!(
            "- Opponent ({kind}): cluster={}, win rate={:.0}%, fold probability={:.0}%, samples={}\n",
            bidder.behavioral_cluster.as_str(),
            bidder.win_rate.unwrap_or(0.5) * 100.0,
            bidder.fold_probability.unwrap_or(0.5) * 100.0,
            bidder.sample_size
        ));
        if let Some(counter) = bidder.counter_strategy {
            section.push_str(&format!("- Counter-strategy hint: {counter}\n"));
        }
    } else {
        section.push_str("- Opponent: no profile or cluster match\n");
    }

    if let Some(domain) = &intel.domain {
        section.push_str(&format!(
            "- Domain history ({}): avg final price ${:.2}, volatility {:.2}, samples={}, confidence {:.2}\n",
            domain.match_type.as_str(),
            domain.avg_final_price,
            domain.volatility,
            domain.sample_size,
            domain.confidence
        ));
        if let Some(p) = domain.percentiles {
            section.push_str(&format!(
                "- Price percentiles: p25 ${:.0}, p50 ${:.0}, p75 ${:.0}, p90 ${:.0}\n",
                p.p25, p.p50, p.p75, p.p90
            ));
        }
    }

    if let Some(arch) = &intel.archetype {
        section.push_str(&format!(
            "- Platform archetype: {} escalation, late-bid ratio {:.2}{}{}\n",
            arch.escalation_speed.as_str(),
            arch.avg_late_bid_ratio,
            if arch.sniper_dominated {
                ", sniper dominated"
            } else {
                ""
            },
            if arch.proxy_driven { ", proxy driven" } else { "" },
        ));
    }

    section.push_str(&format!(
        "- Win probability estimate: {:.0}%\n- Expected value: profit ${:.2}, risk-adjusted EV ${:.2}, ROI {:.2} ({})\n- Resource priority: {} (score {:.3})\n",
        intel.win_probability * 100.0,
        intel.expected_value_analysis.expected_profit,
        intel.expected_value_analysis.risk_adjusted_ev,
        intel.expected_value_analysis.roi,
        intel.expected_value_analysis.recommendation.as_str(),
        intel.resource.priority.as_str(),
        intel.resource.score
    ));

    section
}

fn history_section(history: &HistoricalContext) -> String {
    let mut section = String::new();

    if history.similar_count > 0 {
        section.push_str(&format!(
            "\n**Historical Insight**:\n- {} similar auctions on record, our win rate {:.0}%\n",
            history.similar_count,
            history.win_rate.unwrap_or(0.0) * 100.0
        ));
        if let Some(ratio) = history.avg_price_ratio {
            section.push_str(&format!(
                "- Similar domains typically sold for {:.0}% of estimated value\n",
                ratio * 100.0
            ));
        }
        if let Some(best) = history.best_strategy {
            section.push_str(&format!("- Historically best strategy here: {best}\n"));
        }
        section.push_str(&format!(
            "- Suggested working ratio from history: {:.0}% of value (hard ceiling still 80%)\n",
            history.suggested_safe_max_ratio * 100.0
        ));
    }

    if !history.previous_rounds.is_empty() {
        section.push_str("\n**Previous Attempts In This Auction**:\n");
        for round in &history.previous_rounds {
            section.push_str(&format!(
                "- Round {}: {} at ${} ({})\n",
                round.round_number,
                round.strategy_used,
                round.recommended_bid,
                round.result.as_str()
            ));
        }
        section.push_str(
            "The earlier attempts above were already countered; pick a strategy that \
             accounts for them.\n",
        );
    }

    section
}

/// Auction context prompt. The reasoner must answer with pure JSON matching
/// the decision schema.
pub fn user_prompt(
    ctx: &AuctionContext,
    intel: &MarketIntelligence,
    history: &HistoricalContext,
) -> String {
    let safe_max = types::safe_max(ctx.estimated_value);
    let hard_ceiling = types::hard_ceiling(ctx.estimated_value);
    let tier = ctx.value_tier();

    format!(
        r#"## Auction Context

**Domain**: {domain}
**Platform**: {platform}
**Platform Rules**: {platform_note}

**Financials**:
- Estimated Value: ${value}
- Current Bid: ${bid}
- Your Current Proxy: ${proxy} (0 = none)
- Budget Available: ${budget}
- Safe Max (70% of value): ${safe_max}
- Hard Ceiling (80% of value): ${hard_ceiling}

**Competition**:
- Active Bidders: {bidders}
- Hours Remaining: {hours:.1}

**Bidder Analysis**:
- Bot Detected: {bot}
- Corporate Buyer: {corporate}
- Aggression Score: {aggression:.1}/10
- Avg Reaction Time: {reaction:.1}s

**Value Tier**: {tier} - {tier_note}
{intel_section}{history_section}
## Task

Analyze this auction and recommend the optimal bidding strategy. Consider:

1. **Profit Potential**: Can we achieve 30%+ margin within safe limits?
2. **Competition**: How many bidders and their behavior patterns?
3. **Platform Mechanics**: How do {platform} rules affect timing?
4. **Risk Assessment**: What's the likelihood of overpaying?
5. **Timing**: When should we act given remaining time?

## Required Output Format

Respond with ONLY a valid JSON object matching this schema:

```json
{{
  "strategy": "proxy_max|last_minute_snipe|incremental_test|wait_for_closeout|aggressive_early|do_not_bid",
  "recommended_bid_amount": <float>,
  "confidence": <0.0-1.0>,
  "risk_level": "low|medium|high",
  "reasoning": "<detailed explanation with strategy rationale and profit calculations>"
}}
```

**Important**:
- recommended_bid_amount = your proxy maximum (what you set, not next visible bid)
- confidence = certainty in your strategy (0.0-1.0)
- reasoning = minimum 100 characters explaining your logic
- Stay within safe financial boundaries"#,
        domain = ctx.domain,
        platform = ctx.platform,
        platform_note = platform_note(ctx.platform),
        value = ctx.estimated_value,
        bid = ctx.current_bid,
        proxy = ctx.your_current_proxy,
        budget = ctx.budget_available,
        safe_max = safe_max,
        hard_ceiling = hard_ceiling,
        bidders = ctx.num_bidders,
        hours = ctx.hours_remaining,
        bot = ctx.bidder_analysis.bot_detected,
        corporate = ctx.bidder_analysis.corporate_buyer,
        aggression = ctx.bidder_analysis.aggression_score,
        reaction = ctx.bidder_analysis.reaction_time_avg_s,
        tier = tier.as_str().to_uppercase(),
        tier_note = tier_note(tier),
        intel_section = intel_section(intel),
        history_section = history_section(history),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::IntelCfg;
    use crate::core::types::{BidderAnalysis, DecisionSource, Strategy};
    use crate::history::{AuctionRound, RoundResult};
    use crate::intel::tables::IntelTables;
    use crate::intel::MarketIntel;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn ctx() -> AuctionContext {
        AuctionContext {
            domain: "example.com".to_string(),
            platform: Platform::Godaddy,
            estimated_value: Decimal::from(1000),
            current_bid: Decimal::from(50),
            your_current_proxy: Decimal::ZERO,
            budget_available: Decimal::from(5000),
            num_bidders: 2,
            hours_remaining: 3.0,
            bidder_analysis: BidderAnalysis::default(),
            thread_id: "t-1".to_string(),
            last_bidder_id: None,
        }
    }

    fn intel() -> MarketIntelligence {
        MarketIntel::new(IntelTables::default(), IntelCfg::default()).enrich(&ctx())
    }

    #[test]
    fn test_prompt_carries_both_caps() {
        let prompt = user_prompt(&ctx(), &intel(), &HistoricalContext::default());
        assert!(prompt.contains("Safe Max (70% of value): $700"));
        assert!(prompt.contains("Hard Ceiling (80% of value): $800"));
        assert!(prompt.contains("HIGH"));
    }

    #[test]
    fn test_system_prompt_lists_all_strategies() {
        let prompt = system_prompt();
        for label in [
            "proxy_max",
            "last_minute_snipe",
            "incremental_test",
            "wait_for_closeout",
            "aggressive_early",
            "do_not_bid",
        ] {
            assert!(prompt.contains(label), "missing {label}");
        }
    }

    #[test]
    fn test_previous_rounds_rendered() {
        let mut history = HistoricalContext::default();
        history.previous_rounds.push(AuctionRound {
            thread_id: "t-1".to_string(),
            round_number: 1,
            domain: "example.com".to_string(),
            platform: Platform::Godaddy,
            estimated_value: Decimal::from(1000),
            current_bid_at_decision: Decimal::from(50),
            strategy_used: Strategy::ProxyMax,
            recommended_bid: Decimal::from(700),
            decision_source: DecisionSource::Llm,
            confidence: 0.8,
            result: RoundResult::Outbid,
            timestamp: Utc::now(),
        });

        let prompt = user_prompt(&ctx(), &intel(), &history);
        assert!(prompt.contains("Previous Attempts"));
        assert!(prompt.contains("Round 1: proxy_max at $700 (outbid)"));
    }

    #[test]
    fn test_no_history_section_when_empty() {
        let prompt = user_prompt(&ctx(), &intel(), &HistoricalContext::default());
        assert!(!prompt.contains("Previous Attempts"));
        assert!(!prompt.contains("Historical Insight"));
    }
}
