use crate::types::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Errors the exchange client surfaces (spec.md §6, §7). Everything else
/// that can go wrong (bad book data, sizing below minimum) is represented
/// by `StrategyError`'s other variants instead, because it never reaches
/// this boundary.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("insufficient balance to merge {raw_amount} units on {market_id}")]
    InsufficientBalance { market_id: String, raw_amount: i64 },

    #[error("exchange rejected request for {market_id}: {reason}")]
    Rejected { market_id: String, reason: String },

    #[error("exchange transport error: {0}")]
    Transport(String),
}

/// A token's position, raw (micro-units, authoritative for merge amounts)
/// and scaled (what a trader sees). `scaled == raw / 10^6` whenever both are
/// present (spec.md §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawPosition(pub i64);

impl RawPosition {
    pub const MICRO_UNITS: i64 = 1_000_000;

    pub fn to_scaled(self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(Self::MICRO_UNITS)
    }
}

/// Abstract exchange capability the core consumes (spec.md §2.2, §6). No
/// concrete network implementation ships in this crate; a host process
/// supplies one.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fire-and-forget order placement.
    async fn create_order(
        &self,
        token: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
        neg_risk: bool,
    ) -> Result<(), ExchangeError>;

    async fn cancel_all_asset(&self, token: &str) -> Result<(), ExchangeError>;

    async fn cancel_all_market(&self, market_id: &str) -> Result<(), ExchangeError>;

    /// Returns the raw (micro-unit) and scaled position for a token.
    async fn get_position(&self, token: &str) -> Result<(RawPosition, Decimal), ExchangeError>;

    async fn get_usdc_balance(&self) -> Result<Decimal, ExchangeError>;

    /// Burns `raw_amount` micro-units of both outcome tokens for USDC.
    async fn merge_positions(
        &self,
        raw_amount: i64,
        market_id: &str,
        neg_risk: bool,
    ) -> Result<(), ExchangeError>;
}

/// Scaled view of a token's position, authoritative for sizing decisions
/// (spec.md §6 "Local position/order cache contract").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionView {
    pub size: Decimal,
    pub avg_price: Decimal,
}

/// One side's resting order, or a zero struct meaning "no resting order"
/// (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestingOrder {
    pub size: Decimal,
    pub price: Decimal,
}

impl RestingOrder {
    pub fn is_present(&self) -> bool {
        self.size > Decimal::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenOrders {
    pub buy: RestingOrder,
    pub sell: RestingOrder,
}

/// A tag recorded alongside a position update, distinguishing ordinary
/// fills from merge annotations (DESIGN.md Open Question 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSourceTag {
    Fill,
    Merge,
}

/// Local position/order cache the core reads and writes under the
/// per-market lock (spec.md §6, §5 "Shared mutable state"). No concrete
/// implementation ships here; a host process backs it (database, in-memory
/// map, whatever it already uses to track fills).
#[async_trait]
pub trait PositionCache: Send + Sync {
    async fn get_position(&self, token: &str) -> PositionView;

    async fn set_position(
        &self,
        token: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
        source: PositionSourceTag,
    );

    async fn get_order(&self, token: &str) -> OpenOrders;
}
