use crate::config::config::IntelCfg;
use crate::intel::bidder::BidderIntel;
use crate::intel::domain::DomainIntel;
use serde::Serialize;

/// Probability of winning the auction, fused from competition level,
/// opponent strength, fold tendency, budget adequacy and price volatility.
pub fn win_probability(
    num_bidders: u32,
    budget_available: f64,
    safe_max: f64,
    bidder: &BidderIntel,
    domain: Option<&DomainIntel>,
) -> f64 {
    let mut prob = match num_bidders {
        0 => 0.95,
        1 => 0.70,
        2 => 0.50,
        _ => 0.30,
    };

    // Exact profile: our chances move inversely with the opponent's record.
    if bidder.found {
        if let Some(wr) = bidder.win_rate {
            prob *= 1.0 - wr * 0.5;
        }
    } else if let Some(fold) = bidder.fold_probability {
        prob += (fold - 0.5) * 0.2;
    }

    let budget_ratio = if safe_max > 0.0 {
        (budget_available / safe_max).min(1.0)
    } else {
        1.0
    };
    prob *= 0.5 + 0.5 * budget_ratio;

    let volatility = domain.map(|d| d.volatility).unwrap_or(0.0);
    prob *= 1.0 - volatility * 0.5;

    prob.clamp(0.0, 1.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidRecommendation {
    StrongBid,
    ModerateBid,
    WeakBid,
}

impl BidRecommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidRecommendation::StrongBid => "STRONG_BID",
            BidRecommendation::ModerateBid => "MODERATE_BID",
            BidRecommendation::WeakBid => "WEAK_BID",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ExpectedValueAnalysis {
    pub expected_final_price: f64,
    pub expected_profit: f64,
    pub expected_margin: f64,
    pub expected_value: f64,
    pub risk_adjusted_ev: f64,
    pub roi: f64,
    pub recommendation: BidRecommendation,
}

pub fn expected_value(
    estimated_value: f64,
    win_prob: f64,
    domain: Option<&DomainIntel>,
) -> ExpectedValueAnalysis {
    let expected_final_price = match domain {
        Some(d) => {
            let p50 = d.percentiles.map(|p| p.p50).unwrap_or(0.0);
            if p50 > 0.0 {
                p50
            } else if d.avg_final_price > 0.0 {
                d.avg_final_price
            } else {
                estimated_value * 0.65
            }
        }
        // No history at all: assume domains settle around 65% of estimate.
        None => estimated_value * 0.65,
    };

    let expected_profit = estimated_value - expected_final_price;
    let expected_margin = if estimated_value > 0.0 {
        expected_profit / estimated_value
    } else {
        0.0
    };

    let ev = win_prob * expected_profit;
    let volatility = domain.map(|d| d.volatility).unwrap_or(0.3);
    let risk_adjusted_ev = ev * (1.0 - volatility * 0.5);
    let roi = if expected_final_price > 0.0 {
        risk_adjusted_ev / expected_final_price
    } else {
        0.0
    };

    let recommendation = if roi > 1.5 {
        BidRecommendation::StrongBid
    } else if roi > 0.8 {
        BidRecommendation::ModerateBid
    } else {
        BidRecommendation::WeakBid
    };

    ExpectedValueAnalysis {
        expected_final_price,
        expected_profit,
        expected_margin,
        expected_value: ev,
        risk_adjusted_ev,
        roi,
        recommendation,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourcePriority {
    High,
    Medium,
    Low,
}

impl ResourcePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourcePriority::High => "HIGH",
            ResourcePriority::Medium => "MEDIUM",
            ResourcePriority::Low => "LOW",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ResourceScore {
    pub score: f64,
    pub priority: ResourcePriority,
}

/// Priority knob: win probability x expected margin x (1 + ROI), floored at 0.
pub fn resource_score(
    win_prob: f64,
    ev: &ExpectedValueAnalysis,
    cfg: &IntelCfg,
) -> ResourceScore {
    let score = (win_prob * ev.expected_margin * (1.0 + ev.roi)).max(0.0);

    let priority = if score > cfg.resource_high_cutoff {
        ResourcePriority::High
    } else if score >= cfg.resource_medium_cutoff {
        ResourcePriority::Medium
    } else {
        ResourcePriority::Low
    };

    ResourceScore { score, priority }
}
