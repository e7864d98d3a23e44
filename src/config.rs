use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;

/// Per-outcome cap with no accompanying config field in the source system.
/// See DESIGN.md, Open Question 2.
pub const ABSOLUTE_POSITION_CAP: Decimal = dec!(250);

/// Default arb buffer when a market config row omits `arb_buffer`.
pub const DEFAULT_ARB_BUFFER: Decimal = dec!(0.005);

/// Below this scaled size a merge is not worth the gas/fee round trip.
pub const MIN_MERGE_SIZE: Decimal = dec!(1);

fn de_neg_risk<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.eq_ignore_ascii_case("true"))
}

fn se_neg_risk<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(if *value { "TRUE" } else { "FALSE" })
}

/// One row of market configuration, as recognized by both strategies.
///
/// `neg_risk` round-trips as the uppercase strings "TRUE"/"FALSE" the source
/// system stores it as, but every call site past this struct works with the
/// plain `bool`.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct MarketConfigRow {
    pub market_id: String,
    pub token1: String,
    pub token2: String,
    pub answer1: String,
    pub answer2: String,
    pub tick_size: Decimal,
    #[serde(
        deserialize_with = "de_neg_risk",
        serialize_with = "se_neg_risk"
    )]
    pub neg_risk: bool,
    pub trade_size: Decimal,
    pub max_size: Option<Decimal>,
    pub min_size: Decimal,
    pub max_spread: Decimal,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub param_type: String,
    #[serde(rename = "3_hour")]
    pub three_hour: Decimal,
    pub question: String,
    #[serde(default)]
    pub arb_buffer: Option<Decimal>,
}

impl MarketConfigRow {
    /// `max_size`, falling back to `trade_size` when the config omits it
    /// (spec.md §8 boundary 11).
    pub fn effective_max_size(&self) -> Decimal {
        self.max_size.unwrap_or(self.trade_size)
    }

    pub fn arb_buffer_or_default(&self) -> Decimal {
        self.arb_buffer.unwrap_or(DEFAULT_ARB_BUFFER)
    }

    pub fn token_for(&self, outcome: crate::types::Outcome) -> &str {
        match outcome {
            crate::types::Outcome::Token1 => &self.token1,
            crate::types::Outcome::Token2 => &self.token2,
        }
    }

    /// The reference "sheet" value used as a drift check on a quoted price,
    /// per spec.md §4.4.2 (b): `best_bid` for token1, `1 - best_ask` for
    /// token2 (complementary-outcome parity).
    pub fn sheet_value(&self, outcome: crate::types::Outcome) -> Decimal {
        match outcome {
            crate::types::Outcome::Token1 => self.best_bid,
            crate::types::Outcome::Token2 => Decimal::ONE - self.best_ask,
        }
    }
}

/// Parameter row keyed by `MarketConfigRow::param_type`.
#[derive(Debug, Clone, Copy, serde::Serialize, Deserialize)]
pub struct Params {
    /// Percent; negative values trigger stop-loss.
    pub stop_loss_threshold: Decimal,
    /// Absolute price units.
    pub spread_threshold: Decimal,
    pub volatility_threshold: Decimal,
    /// Percent.
    pub take_profit_threshold: Decimal,
    /// Hours of cooldown after a stop-loss trigger.
    pub sleep_period: Decimal,
}

/// `params[param_type]` lookup table (spec.md §6).
pub type ParamsTable = HashMap<String, Params>;

/// `strategy_config[market_id] -> [strategy_id, ...]` (spec.md §6).
pub type StrategyAssignments = HashMap<String, Vec<String>>;
