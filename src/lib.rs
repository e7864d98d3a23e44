//! Per-market strategy execution core for binary-outcome prediction market
//! bots: a two-leg Dutch arbitrage strategy and a market-maker strategy,
//! serialized per market by a lock registry and dispatched by a strategy
//! manager. See `SPEC_FULL.md` for the full specification this crate
//! implements; this crate has no binary of its own — a host process owns
//! the exchange connection, book feed, and position/order cache, and calls
//! into `StrategyManager::execute_strategies` once per tick per market.

pub mod book_view;
pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod manager;
pub mod order_gate;
pub mod risk_off;
pub mod strategy;
pub mod tick;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
