use crate::exchange::RestingOrder;
use crate::types::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

const PRICE_DIFF_TOLERANCE: Decimal = dec!(0.005);
const SIZE_DIFF_TOLERANCE_RATIO: Decimal = dec!(0.1);
const MIN_BUY_PRICE: Decimal = dec!(0.1);
const MAX_BUY_PRICE: Decimal = dec!(0.9);

/// What the Order Gate decided for one side of one market (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Resting order is within tolerance; do nothing.
    Keep,
    /// Cancel-all-for-asset happened; place the target order.
    CancelAndPlace,
    /// Target is out of the admissible band; no placement, no cancel beyond
    /// whatever `should_cancel` already triggered.
    Skip,
}

/// Target order the caller wants resting on this side.
#[derive(Debug, Clone, Copy)]
pub struct GateTarget {
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

/// Evaluates one side of one market cycle (spec.md §4.2). `resting_same_side`
/// is the existing resting order on `target.side`; `resting_other_side` is
/// the resting order on the opposite side (checked only for "does any
/// resting order exist" in the cancel decision).
pub fn evaluate(
    target: GateTarget,
    resting_same_side: RestingOrder,
    resting_other_side: RestingOrder,
    mid_price: Decimal,
    max_spread: Decimal,
) -> GateDecision {
    let price_diff = if resting_same_side.is_present() {
        (resting_same_side.price - target.price).abs()
    } else {
        Decimal::MAX
    };
    let size_diff = if resting_same_side.is_present() {
        (resting_same_side.size - target.size).abs()
    } else {
        Decimal::MAX
    };

    let should_cancel = price_diff > PRICE_DIFF_TOLERANCE
        || size_diff > SIZE_DIFF_TOLERANCE_RATIO * target.size
        || !resting_same_side.is_present();

    if !should_cancel {
        debug!(side = ?target.side, price_diff = %price_diff, size_diff = %size_diff, "order gate: keeping resting order");
        return GateDecision::Keep;
    }

    let any_resting_exists = resting_same_side.is_present() || resting_other_side.is_present();
    if !any_resting_exists {
        return admit(target, mid_price, max_spread);
    }

    // should_cancel && at least one resting order exists anywhere: the
    // caller is expected to have already issued cancel-all-for-asset before
    // calling back into placement; here we just report the verdict.
    admit(target, mid_price, max_spread)
}

fn admit(target: GateTarget, mid_price: Decimal, max_spread: Decimal) -> GateDecision {
    match target.side {
        Side::Buy => {
            let incentive_floor = mid_price - max_spread / Decimal::from(100);
            if target.price < incentive_floor {
                debug!(price = %target.price, floor = %incentive_floor, "order gate: buy below incentive band, skip");
                return GateDecision::Skip;
            }
            if !(MIN_BUY_PRICE <= target.price && target.price < MAX_BUY_PRICE) {
                debug!(price = %target.price, "order gate: buy outside [0.1, 0.9), skip");
                return GateDecision::Skip;
            }
            GateDecision::CancelAndPlace
        }
        // Sells have no price clamp: they exist to unwind, stop-loss, or
        // take profit, and the price was already chosen by the caller.
        Side::Sell => GateDecision::CancelAndPlace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_e_keeps_resting_order_within_tolerance() {
        let target = GateTarget {
            side: Side::Buy,
            price: dec!(0.452),
            size: dec!(25),
        };
        let resting = RestingOrder {
            price: dec!(0.450),
            size: dec!(24),
        };
        let decision = order_gate_keeps_or_cancels(target, resting);
        assert_eq!(decision, GateDecision::Keep);
    }

    fn order_gate_keeps_or_cancels(target: GateTarget, resting: RestingOrder) -> GateDecision {
        evaluate(
            target,
            resting,
            RestingOrder::default(),
            dec!(0.45),
            dec!(5),
        )
    }

    #[test]
    fn cancels_when_price_drifts_past_tolerance() {
        let target = GateTarget {
            side: Side::Buy,
            price: dec!(0.460),
            size: dec!(25),
        };
        let resting = RestingOrder {
            price: dec!(0.450),
            size: dec!(25),
        };
        let decision = order_gate_keeps_or_cancels(target, resting);
        assert_eq!(decision, GateDecision::CancelAndPlace);
    }

    #[test]
    fn buy_outside_price_band_is_skipped() {
        let target = GateTarget {
            side: Side::Buy,
            price: dec!(0.95),
            size: dec!(10),
        };
        let decision = order_gate_keeps_or_cancels(target, RestingOrder::default());
        assert_eq!(decision, GateDecision::Skip);
    }

    #[test]
    fn buy_below_incentive_band_is_skipped() {
        let target = GateTarget {
            side: Side::Buy,
            price: dec!(0.30),
            size: dec!(10),
        };
        // mid 0.45, max_spread 5 => incentive floor 0.45 - 0.05 = 0.40
        let decision = evaluate(
            target,
            RestingOrder::default(),
            RestingOrder::default(),
            dec!(0.45),
            dec!(5),
        );
        assert_eq!(decision, GateDecision::Skip);
    }

    #[test]
    fn sell_always_admits_regardless_of_price() {
        let target = GateTarget {
            side: Side::Sell,
            price: dec!(0.95),
            size: dec!(10),
        };
        let decision = order_gate_keeps_or_cancels(target, RestingOrder::default());
        assert_eq!(decision, GateDecision::CancelAndPlace);
    }
}
