use crate::core::types::Platform;
use crate::intel::tables::IntelTables;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationSpeed {
    Slow,
    Moderate,
    Fast,
}

impl EscalationSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationSpeed::Slow => "slow",
            EscalationSpeed::Moderate => "moderate",
            EscalationSpeed::Fast => "fast",
        }
    }
}

/// Macro bidding pattern for one platform.
#[derive(Clone, Debug, Serialize)]
pub struct ArchetypeIntel {
    pub avg_late_bid_ratio: f64,
    pub avg_bid_jump: f64,
    pub avg_duration_s: f64,
    pub escalation_speed: EscalationSpeed,
    pub sniper_dominated: bool,
    pub proxy_driven: bool,
}

pub fn lookup_archetype(tables: &IntelTables, platform: Platform) -> Option<ArchetypeIntel> {
    if let Some(row) = tables.archetypes.get(&platform) {
        return Some(classify(
            row.avg_late_bid_ratio,
            row.avg_bid_jump,
            row.avg_duration_s,
        ));
    }

    // No row for this platform: aggregate whatever we have.
    if tables.archetypes.is_empty() {
        return None;
    }
    let n = tables.archetypes.len() as f64;
    let late = tables
        .archetypes
        .values()
        .map(|r| r.avg_late_bid_ratio)
        .sum::<f64>()
        / n;
    let jump = tables
        .archetypes
        .values()
        .map(|r| r.avg_bid_jump)
        .sum::<f64>()
        / n;
    let duration = tables
        .archetypes
        .values()
        .map(|r| r.avg_duration_s)
        .sum::<f64>()
        / n;
    Some(classify(late, jump, duration))
}

fn classify(avg_late_bid_ratio: f64, avg_bid_jump: f64, avg_duration_s: f64) -> ArchetypeIntel {
    let escalation_speed = if avg_bid_jump < 50.0 {
        EscalationSpeed::Slow
    } else if avg_bid_jump > 200.0 {
        EscalationSpeed::Fast
    } else {
        EscalationSpeed::Moderate
    };

    ArchetypeIntel {
        avg_late_bid_ratio,
        avg_bid_jump,
        avg_duration_s,
        escalation_speed,
        sniper_dominated: avg_late_bid_ratio > 0.7,
        proxy_driven: avg_late_bid_ratio < 0.3,
    }
}
