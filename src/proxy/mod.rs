use crate::core::types::{
    self, AuctionContext, Platform, ProxyAction, ProxyDecision,
};
use rust_decimal::Decimal;

/// Mathematical proxy/outbid engine. Decides between accepting a loss,
/// setting up a first proxy, raising an existing one, or holding position.
#[derive(Default)]
pub struct ProxyCalculator;

impl ProxyCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Minimum visible increment for the platform.
    pub fn platform_increment(platform: Platform, current_bid: Decimal) -> Decimal {
        let floor = Decimal::from(5);
        match platform {
            Platform::Godaddy | Platform::Namejet => floor,
            Platform::Dynadot => floor.max(current_bid * Decimal::new(5, 2)),
        }
    }

    pub fn analyze(&self, ctx: &AuctionContext) -> ProxyDecision {
        let safe_max = types::safe_max(ctx.estimated_value);
        let increment = Self::platform_increment(ctx.platform, ctx.current_bid);
        let current_proxy = ctx.your_current_proxy;
        let current_bid = ctx.current_bid;

        // Loss zone first: once the bid reaches the safe max, no proxy level
        // can recover a profit, whatever the upstream strategy says.
        if safe_max <= current_bid {
            return ProxyDecision {
                current_proxy,
                current_bid,
                safe_max,
                should_increase_proxy: false,
                new_proxy_max: None,
                next_bid_amount: None,
                max_budget_for_domain: Decimal::ZERO,
                proxy_action: ProxyAction::AcceptLoss,
                explanation: format!(
                    "PROFIT IMPOSSIBLE: safe max (${safe_max}) does not clear the current \
                     bid (${current_bid}). Accepting the loss prevents a winner's-curse \
                     outcome; the proxy stays at ${current_proxy}."
                ),
            };
        }

        let potential = safe_max
            .min(ctx.budget_available)
            .min(types::hard_ceiling(ctx.estimated_value));

        if current_proxy == Decimal::ZERO {
            let next_bid = current_bid + increment;
            return ProxyDecision {
                current_proxy,
                current_bid,
                safe_max,
                should_increase_proxy: true,
                new_proxy_max: Some(potential),
                next_bid_amount: Some(next_bid),
                max_budget_for_domain: potential,
                proxy_action: ProxyAction::InitialSetup,
                explanation: format!(
                    "INITIAL PROXY SETUP: no proxy set. Safe max is ${safe_max}; setting the \
                     proxy to ${potential}. Next visible bid lands at ${next_bid} \
                     (${current_bid} + ${increment} increment). The domain can never cost \
                     more than ${potential} even fully contested."
                ),
            };
        }

        // Raising the proxy only pays when it buys real headroom.
        let min_increase = increment * Decimal::from(3);
        if potential - current_proxy > min_increase {
            let next_bid = current_bid + increment;
            ProxyDecision {
                current_proxy,
                current_bid,
                safe_max,
                should_increase_proxy: true,
                new_proxy_max: Some(potential),
                next_bid_amount: Some(next_bid),
                max_budget_for_domain: potential,
                proxy_action: ProxyAction::IncreaseProxy,
                explanation: format!(
                    "PROXY INCREASE: safe max (${safe_max}) clears the current bid \
                     (${current_bid}) and the current proxy (${current_proxy}) leaves \
                     insufficient headroom. Raising to ${potential}; next visible bid \
                     ${next_bid}. Cost stays capped at ${potential}."
                ),
            }
        } else {
            ProxyDecision {
                current_proxy,
                current_bid,
                safe_max,
                should_increase_proxy: false,
                new_proxy_max: None,
                next_bid_amount: None,
                max_budget_for_domain: current_proxy,
                proxy_action: ProxyAction::MaintainProxy,
                explanation: format!(
                    "PROXY ADEQUATE: current proxy (${current_proxy}) already covers the \
                     position against the bid (${current_bid}) within the safe max \
                     (${safe_max}). No increase needed; cost stays capped at \
                     ${current_proxy}."
                ),
            }
        }
    }
}
