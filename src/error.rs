use crate::exchange::ExchangeError;

/// Error taxonomy named by spec.md §7.
///
/// `StrategyManager::execute_strategies` catches this at the per-strategy
/// boundary: one strategy's error is logged and never stops the next
/// strategy or the next market (spec.md §7 "Propagation policy").
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("book unavailable for {market_id}/{outcome}")]
    BookUnavailable { market_id: String, outcome: String },

    #[error("insufficient liquidity for {market_id}: {detail}")]
    InsufficientLiquidity { market_id: String, detail: String },

    /// Informational, not a hard failure: the caller logs it and continues
    /// (an unwind already ran by the time this is raised).
    #[error("partial fill on {market_id}/{token}: filled {filled}")]
    PartialFill {
        market_id: String,
        token: String,
        filled: rust_decimal::Decimal,
    },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("unknown strategy id: {0}")]
    UnknownStrategy(String),

    #[error("risk-off record io failure")]
    RiskOffIo(#[from] RiskOffIoError),
}

/// Wraps the two failure modes of the risk-off JSON store (spec.md §3.4):
/// filesystem I/O and malformed JSON.
#[derive(Debug, thiserror::Error)]
pub enum RiskOffIoError {
    #[error("risk-off file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("risk-off file malformed: {0}")]
    Json(#[from] serde_json::Error),
}
