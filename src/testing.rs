//! In-memory fakes of the external collaborators (spec.md §6), adapted
//! from the teacher crate's `exec::paper` simulated exchange: a
//! deterministic stand-in that records calls and returns scripted
//! responses, generalized from Kalshi's cents/IOC model to this crate's
//! scaled-decimal/merge model. Used only by tests — never shipped.
#![cfg(any(test, feature = "test-util"))]

use crate::book_view::{BookProvider, TopOfBook};
use crate::exchange::{
    ExchangeClient, ExchangeError, OpenOrders, PositionCache, PositionSourceTag, PositionView,
    RawPosition,
};
use crate::types::{Outcome, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOrder {
    pub token: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub neg_risk: bool,
}

/// Simulated exchange: fills every BUY/SELL immediately against its
/// in-memory position table, so tests can assert on the resulting position
/// without a real matching engine.
pub struct FakeExchange {
    inner: Mutex<FakeExchangeState>,
}

struct FakeExchangeState {
    positions: HashMap<String, (RawPosition, Decimal)>,
    balance: Decimal,
    orders: Vec<RecordedOrder>,
    cancels_asset: Vec<String>,
    cancels_market: Vec<String>,
    merges: Vec<(i64, String, bool)>,
}

impl FakeExchange {
    pub fn new(balance: Decimal) -> Self {
        Self {
            inner: Mutex::new(FakeExchangeState {
                positions: HashMap::new(),
                balance,
                orders: Vec::new(),
                cancels_asset: Vec::new(),
                cancels_market: Vec::new(),
                merges: Vec::new(),
            }),
        }
    }

    pub fn seed_position(&self, token: &str, raw: i64) {
        let mut guard = self.inner.lock().unwrap();
        guard
            .positions
            .insert(token.to_string(), (RawPosition(raw), RawPosition(raw).to_scaled()));
    }

    pub fn orders(&self) -> Vec<RecordedOrder> {
        self.inner.lock().unwrap().orders.clone()
    }

    pub fn cancels_asset(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancels_asset.clone()
    }

    pub fn cancels_market(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancels_market.clone()
    }

    pub fn merges(&self) -> Vec<(i64, String, bool)> {
        self.inner.lock().unwrap().merges.clone()
    }
}

#[async_trait]
impl ExchangeClient for FakeExchange {
    async fn create_order(
        &self,
        token: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
        neg_risk: bool,
    ) -> Result<(), ExchangeError> {
        use rust_decimal::prelude::ToPrimitive;
        let mut guard = self.inner.lock().unwrap();
        guard.orders.push(RecordedOrder {
            token: token.to_string(),
            side,
            price,
            size,
            neg_risk,
        });
        let entry = guard
            .positions
            .entry(token.to_string())
            .or_insert((RawPosition(0), Decimal::ZERO));
        let signed = match side {
            Side::Buy => size,
            Side::Sell => -size,
        };
        entry.1 += signed;
        let raw_delta = (signed * Decimal::from(1_000_000)).to_i64().unwrap_or(0);
        entry.0 = RawPosition(entry.0 .0 + raw_delta);
        Ok(())
    }

    async fn cancel_all_asset(&self, token: &str) -> Result<(), ExchangeError> {
        self.inner.lock().unwrap().cancels_asset.push(token.to_string());
        Ok(())
    }

    async fn cancel_all_market(&self, market_id: &str) -> Result<(), ExchangeError> {
        self.inner
            .lock()
            .unwrap()
            .cancels_market
            .push(market_id.to_string());
        Ok(())
    }

    async fn get_position(&self, token: &str) -> Result<(RawPosition, Decimal), ExchangeError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .positions
            .get(token)
            .copied()
            .unwrap_or((RawPosition(0), Decimal::ZERO)))
    }

    async fn get_usdc_balance(&self) -> Result<Decimal, ExchangeError> {
        Ok(self.inner.lock().unwrap().balance)
    }

    async fn merge_positions(
        &self,
        raw_amount: i64,
        market_id: &str,
        neg_risk: bool,
    ) -> Result<(), ExchangeError> {
        self.inner
            .lock()
            .unwrap()
            .merges
            .push((raw_amount, market_id.to_string(), neg_risk));
        Ok(())
    }
}

/// Scripted book provider: one response queue per outcome; repeats the
/// final entry once exhausted so a test doesn't need to script every call.
pub struct FakeBookProvider {
    queues: Mutex<HashMap<&'static str, Vec<TopOfBook>>>,
}

impl FakeBookProvider {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(mut self, outcome: Outcome, responses: Vec<TopOfBook>) -> Self {
        self.queues.get_mut().unwrap().insert(outcome.as_str(), responses);
        self
    }
}

impl Default for FakeBookProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookProvider for FakeBookProvider {
    async fn best_bid_ask_deets(
        &self,
        _market_id: &str,
        outcome: Outcome,
        _size_hint: Decimal,
        _band_percent: Decimal,
    ) -> TopOfBook {
        let mut guard = self.queues.lock().unwrap();
        let queue = guard.entry(outcome.as_str()).or_insert_with(|| vec![TopOfBook::default()]);
        if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0]
        }
    }
}

/// In-memory local position/order cache.
pub struct FakePositionCache {
    positions: Mutex<HashMap<String, PositionView>>,
    orders: Mutex<HashMap<String, OpenOrders>>,
}

impl FakePositionCache {
    pub fn new() -> Self {
        Self {
            positions: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed_position(&self, token: &str, position: PositionView) {
        self.positions.lock().unwrap().insert(token.to_string(), position);
    }

    pub fn seed_order(&self, token: &str, order: OpenOrders) {
        self.orders.lock().unwrap().insert(token.to_string(), order);
    }
}

impl Default for FakePositionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionCache for FakePositionCache {
    async fn get_position(&self, token: &str) -> PositionView {
        self.positions.lock().unwrap().get(token).copied().unwrap_or_default()
    }

    async fn set_position(
        &self,
        token: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
        _source: PositionSourceTag,
    ) {
        let mut guard = self.positions.lock().unwrap();
        let entry = guard.entry(token.to_string()).or_default();
        entry.size = size;
        if side == Side::Buy {
            entry.avg_price = price;
        }
    }

    async fn get_order(&self, token: &str) -> OpenOrders {
        self.orders.lock().unwrap().get(token).copied().unwrap_or_default()
    }
}
