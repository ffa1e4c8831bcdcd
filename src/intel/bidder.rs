use crate::config::config::IntelCfg;
use crate::core::types::BidderAnalysis;
use crate::intel::tables::IntelTables;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BehavioralCluster {
    Casual,
    Aggressive,
    Sniper,
    Bot,
    Corporate,
    Unknown,
}

impl BehavioralCluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehavioralCluster::Casual => "casual",
            BehavioralCluster::Aggressive => "aggressive",
            BehavioralCluster::Sniper => "sniper",
            BehavioralCluster::Bot => "bot",
            BehavioralCluster::Corporate => "corporate",
            BehavioralCluster::Unknown => "unknown",
        }
    }
}

/// Opponent signal for one decision. `found` distinguishes an exact profile
/// hit from a behavioral cluster match; either way the struct is always
/// present and safe to read.
#[derive(Clone, Debug, Serialize)]
pub struct BidderIntel {
    pub found: bool,
    pub behavioral_cluster: BehavioralCluster,
    pub sample_size: usize,
    pub win_rate: Option<f64>,
    pub fold_probability: Option<f64>,
    pub late_bid_ratio: Option<f64>,
    pub counter_strategy: Option<&'static str>,
}

impl BidderIntel {
    pub fn unknown() -> Self {
        Self {
            found: false,
            behavioral_cluster: BehavioralCluster::Unknown,
            sample_size: 0,
            win_rate: None,
            fold_probability: None,
            late_bid_ratio: None,
            counter_strategy: None,
        }
    }
}

/// Exact id lookup first; on a miss, similarity-match the live behavior
/// against the profile table. Clusters below the sample floor stay unknown.
pub fn lookup_bidder(
    tables: &IntelTables,
    cfg: &IntelCfg,
    last_bidder_id: Option<&str>,
    analysis: &BidderAnalysis,
) -> BidderIntel {
    if let Some(id) = last_bidder_id {
        if let Some(profile) = tables.bidder(id) {
            let cluster = classify(
                analysis,
                profile.win_rate,
                profile.late_bid_ratio,
                profile.avg_bid_increase,
            );
            return BidderIntel {
                found: true,
                behavioral_cluster: cluster,
                sample_size: profile.total_auctions as usize,
                win_rate: Some(profile.win_rate),
                fold_probability: Some(1.0 - profile.win_rate),
                late_bid_ratio: Some(profile.late_bid_ratio),
                counter_strategy: Some(counter_strategy(cluster, 1.0 - profile.win_rate)),
            };
        }
    }

    cluster_match(tables, cfg, analysis)
}

fn cluster_match(tables: &IntelTables, cfg: &IntelCfg, analysis: &BidderAnalysis) -> BidderIntel {
    if tables.bidders.is_empty() {
        return BidderIntel::unknown();
    }

    let similar: Vec<_> = tables
        .bidders
        .iter()
        .filter(|p| {
            (p.aggression_normalized() - analysis.aggression_score).abs()
                <= cfg.aggression_tolerance
                && (p.avg_reaction_time_s - analysis.reaction_time_avg_s).abs()
                    <= cfg.reaction_tolerance_s
        })
        .collect();

    // Relax to aggression-only matching before giving up.
    let similar = if similar.is_empty() {
        tables
            .bidders
            .iter()
            .filter(|p| {
                (p.aggression_normalized() - analysis.aggression_score).abs()
                    <= cfg.aggression_tolerance
            })
            .collect()
    } else {
        similar
    };

    if similar.len() < cfg.min_cluster_samples {
        return BidderIntel::unknown();
    }

    let n = similar.len() as f64;
    let avg_win_rate = similar.iter().map(|p| p.win_rate).sum::<f64>() / n;
    let avg_late = similar.iter().map(|p| p.late_bid_ratio).sum::<f64>() / n;
    let avg_increase = similar.iter().map(|p| p.avg_bid_increase).sum::<f64>() / n;
    let fold_probability = 1.0 - avg_win_rate;

    let cluster = classify(analysis, avg_win_rate, avg_late, avg_increase);

    BidderIntel {
        found: false,
        behavioral_cluster: cluster,
        sample_size: similar.len(),
        win_rate: Some(avg_win_rate),
        fold_probability: Some(fold_probability),
        late_bid_ratio: Some(avg_late),
        counter_strategy: Some(counter_strategy(cluster, fold_probability)),
    }
}

/// Live flags dominate; otherwise label from cluster statistics.
fn classify(
    analysis: &BidderAnalysis,
    win_rate: f64,
    late_bid_ratio: f64,
    avg_bid_increase: f64,
) -> BehavioralCluster {
    if analysis.bot_detected {
        BehavioralCluster::Bot
    } else if analysis.corporate_buyer {
        BehavioralCluster::Corporate
    } else if late_bid_ratio > 0.7 {
        BehavioralCluster::Sniper
    } else if analysis.aggression_score > 6.0 || avg_bid_increase > 50.0 {
        BehavioralCluster::Aggressive
    } else if win_rate < 0.15 {
        BehavioralCluster::Casual
    } else {
        BehavioralCluster::Unknown
    }
}

fn counter_strategy(cluster: BehavioralCluster, fold_probability: f64) -> &'static str {
    match cluster {
        BehavioralCluster::Bot => {
            "Proxy wars favor the bot; prefer unpredictable snipe timing over incremental bids."
        }
        BehavioralCluster::Corporate | BehavioralCluster::Aggressive => {
            "Avoid escalation. Set a firm cap and be prepared to walk away."
        }
        BehavioralCluster::Sniper => {
            "Counter-snipe in the final window or anchor an early proxy to discourage."
        }
        BehavioralCluster::Casual => {
            "Opponent likely to fold. Set a moderate cap and bid confidently."
        }
        BehavioralCluster::Unknown => {
            if fold_probability > 0.85 {
                "Opponent likely to fold. Set a moderate cap and bid confidently."
            } else {
                "Standard competitive approach. Monitor and adjust."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intel::tables::BidderProfile;

    fn profile(id: &str, auctions: u32, increase: f64, reaction: f64, win: f64, late: f64) -> BidderProfile {
        BidderProfile {
            bidder_id: id.to_string(),
            total_auctions: auctions,
            total_bids: 0,
            avg_bid_increase: increase,
            max_bid: 0.0,
            avg_reaction_time_s: reaction,
            win_rate: win,
            late_bid_ratio: late,
            proxy_usage: 0.0,
        }
    }

    fn tables_with(profiles: Vec<BidderProfile>) -> IntelTables {
        let mut t = IntelTables {
            bidders: profiles,
            ..Default::default()
        };
        for (i, b) in t.bidders.iter().enumerate() {
            t.bidders_by_id.insert(b.bidder_id.clone(), i);
        }
        t
    }

    fn analysis(aggression: f64, reaction: f64) -> BidderAnalysis {
        BidderAnalysis {
            bot_detected: false,
            corporate_buyer: false,
            aggression_score: aggression,
            reaction_time_avg_s: reaction,
        }
    }

    #[test]
    fn test_exact_match_wins() {
        let tables = tables_with(vec![profile("b-1", 40, 20.0, 90.0, 0.6, 0.1)]);
        let cfg = IntelCfg::default();

        let intel = lookup_bidder(&tables, &cfg, Some("b-1"), &analysis(3.0, 90.0));
        assert!(intel.found);
        assert_eq!(intel.sample_size, 40);
        assert!((intel.fold_probability.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_needs_min_samples() {
        // Only 3 similar profiles, below the floor of 5.
        let tables = tables_with(vec![
            profile("a", 5, 30.0, 50.0, 0.2, 0.1),
            profile("b", 5, 35.0, 55.0, 0.3, 0.1),
            profile("c", 5, 28.0, 60.0, 0.1, 0.1),
        ]);
        let cfg = IntelCfg::default();

        let intel = lookup_bidder(&tables, &cfg, Some("stranger"), &analysis(3.0, 50.0));
        assert!(!intel.found);
        assert_eq!(intel.behavioral_cluster, BehavioralCluster::Unknown);
        assert!(intel.fold_probability.is_none());
    }

    #[test]
    fn test_cluster_match_derives_fold_probability() {
        let profiles = (0..6)
            .map(|i| profile(&format!("p{i}"), 10, 30.0, 45.0, 0.25, 0.2))
            .collect();
        let tables = tables_with(profiles);
        let cfg = IntelCfg::default();

        let intel = lookup_bidder(&tables, &cfg, None, &analysis(3.0, 40.0));
        assert!(!intel.found);
        assert_eq!(intel.sample_size, 6);
        assert!((intel.fold_probability.unwrap() - 0.75).abs() < 1e-9);
        assert!(intel.counter_strategy.is_some());
    }

    #[test]
    fn test_sniper_cluster_label() {
        let profiles = (0..5)
            .map(|i| profile(&format!("s{i}"), 10, 20.0, 10.0, 0.4, 0.9))
            .collect();
        let tables = tables_with(profiles);
        let cfg = IntelCfg::default();

        let intel = lookup_bidder(&tables, &cfg, None, &analysis(2.5, 12.0));
        assert_eq!(intel.behavioral_cluster, BehavioralCluster::Sniper);
    }

    #[test]
    fn test_live_bot_flag_dominates() {
        let profiles = (0..5)
            .map(|i| profile(&format!("s{i}"), 10, 20.0, 10.0, 0.4, 0.9))
            .collect();
        let tables = tables_with(profiles);
        let cfg = IntelCfg::default();
        let mut a = analysis(2.5, 12.0);
        a.bot_detected = true;

        let intel = lookup_bidder(&tables, &cfg, None, &a);
        assert_eq!(intel.behavioral_cluster, BehavioralCluster::Bot);
    }
}
