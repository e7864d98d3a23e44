pub mod dutch_arb;
pub mod market_maker;

use crate::clock::Clock;
use crate::config::{MarketConfigRow, Params};
use crate::error::StrategyError;
use crate::exchange::{ExchangeClient, PositionCache};
use crate::book_view::BookProvider;
use crate::risk_off::RiskOffStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Everything a strategy needs to talk to the outside world. The source
/// system injects a process-wide client singleton (spec.md §9 "Global
/// client and shared state"); here that becomes explicit context built once
/// by the manager and handed to every strategy instance.
#[derive(Clone)]
pub struct StrategyContext {
    pub exchange: Arc<dyn ExchangeClient>,
    pub book_provider: Arc<dyn BookProvider>,
    pub position_cache: Arc<dyn PositionCache>,
    pub risk_off: Arc<RiskOffStore>,
    pub clock: Arc<dyn Clock>,
}

/// `market_data` bundle passed into `execute` (spec.md §2.2 "execute(market,
/// market_data)"): the market's config row plus its resolved parameter row.
pub struct MarketData<'a> {
    pub config: &'a MarketConfigRow,
    pub params: &'a Params,
}

/// Common contract both strategies implement (spec.md §2.2, §9: a tagged
/// variant replaces class-object dispatch, so this trait exists only to let
/// the manager call either variant uniformly — see `manager::Strategy`).
#[async_trait]
pub trait StrategyExec: Send + Sync {
    async fn execute(
        &self,
        market_id: &str,
        market_data: &MarketData<'_>,
    ) -> Result<(), StrategyError>;
}
