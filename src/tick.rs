use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// Number of digits after the decimal point in a tick size, e.g. `0.001` -> 3.
pub fn tick_digits(tick_size: Decimal) -> u32 {
    tick_size.normalize().scale()
}

/// Round to `digits` decimal places, banker's-rounding-free (half away from
/// zero), matching how the source system rounds prices before comparison.
pub fn round(value: Decimal, digits: u32) -> Decimal {
    value.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
}

/// Round up to `digits` decimal places. Idempotent at tick resolution
/// (spec.md §8 property 8): a value already expressed with `digits` or fewer
/// decimal places is unchanged.
pub fn round_up(value: Decimal, digits: u32) -> Decimal {
    value.round_dp_with_strategy(digits, RoundingStrategy::AwayFromZero)
}
