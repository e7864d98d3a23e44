use super::{MarketData, StrategyContext, StrategyExec};
use crate::book_view::{top_of_book_with_retry, BookProvider, TopOfBook};
use crate::clock::Clock;
use crate::config::{MarketConfigRow, MIN_MERGE_SIZE, ABSOLUTE_POSITION_CAP};
use crate::error::StrategyError;
use crate::exchange::{PositionSourceTag, PositionView};
use crate::order_gate::{self, GateDecision, GateTarget};
use crate::risk_off::RiskOffRecord;
use crate::tick;
use crate::types::{Outcome, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing::{debug, info, warn};

const FIRST_HINT: Decimal = dec!(100);
const RETRY_HINT: Decimal = dec!(20);
const QUOTE_BAND: Decimal = dec!(0.1);
const PRICE_CHANGE_LIMIT: Decimal = dec!(0.05);
const BUY_SIZE_HEADROOM: Decimal = dec!(0.95);
const RESTING_OVERSIZE_RATIO: Decimal = dec!(1.01);
const TP_DIFF_THRESHOLD_PCT: Decimal = dec!(2);
const SELL_UNDER_COVER_RATIO: Decimal = dec!(0.97);
const POST_CYCLE_SLEEP: Duration = Duration::from_secs(2);

/// External price-quoting computation (spec.md §4.4.2 step 5). Kept as a
/// seam, not owned logic, because spec.md explicitly calls it out as
/// external.
pub trait QuotePricer: Send + Sync {
    fn quote(
        &self,
        book: &TopOfBook,
        avg_price: Decimal,
        row: &MarketConfigRow,
    ) -> (Decimal, Decimal);
}

/// External order-sizing computation (spec.md §4.4.2 step 8).
pub trait QuoteSizer: Send + Sync {
    fn size(
        &self,
        position: PositionView,
        bid_price: Decimal,
        row: &MarketConfigRow,
        other_position: PositionView,
    ) -> (Decimal, Decimal);
}

/// Continuously quotes both sides of a book while managing inventory,
/// stop-loss cooldown, and take-profit (spec.md §4.4). Runs under the
/// per-market lock, same as `DutchArb`.
pub struct MarketMaker {
    ctx: StrategyContext,
    pricer: std::sync::Arc<dyn QuotePricer>,
    sizer: std::sync::Arc<dyn QuoteSizer>,
}

impl MarketMaker {
    pub fn new(
        ctx: StrategyContext,
        pricer: std::sync::Arc<dyn QuotePricer>,
        sizer: std::sync::Arc<dyn QuoteSizer>,
    ) -> Self {
        Self { ctx, pricer, sizer }
    }

    /// §4.4.1: merge before quoting if both legs are overfull. Mutates the
    /// local cache to a SELL-merge annotation at price 0 (DESIGN.md Open
    /// Question 3).
    async fn merge_first(&self, market_id: &str, row: &MarketConfigRow) -> Result<(), StrategyError> {
        let pos1 = self.ctx.position_cache.get_position(&row.token1).await;
        let pos2 = self.ctx.position_cache.get_position(&row.token2).await;
        if pos1.size.min(pos2.size) <= MIN_MERGE_SIZE {
            return Ok(());
        }

        let (raw1, _) = self.ctx.exchange.get_position(&row.token1).await?;
        let (raw2, _) = self.ctx.exchange.get_position(&row.token2).await?;
        let merge_raw = raw1.0.min(raw2.0);
        let scaled = Decimal::from(merge_raw) / Decimal::from(1_000_000);
        if scaled <= MIN_MERGE_SIZE {
            return Ok(());
        }

        self.ctx
            .exchange
            .merge_positions(merge_raw, market_id, row.neg_risk)
            .await?;
        info!(market_id, merge_raw, "market_maker: merged before quoting");

        self.ctx
            .position_cache
            .set_position(&row.token1, Side::Sell, scaled, Decimal::ZERO, PositionSourceTag::Merge)
            .await;
        self.ctx
            .position_cache
            .set_position(&row.token2, Side::Sell, scaled, Decimal::ZERO, PositionSourceTag::Merge)
            .await;
        Ok(())
    }

    async fn process_outcome(
        &self,
        market_id: &str,
        row: &MarketConfigRow,
        params: &crate::config::Params,
        tick_digits: u32,
        outcome: Outcome,
    ) -> Result<(), StrategyError> {
        let token = row.token_for(outcome).to_string();
        let other_token = row.token_for(outcome.other()).to_string();

        let mut book = top_of_book_with_retry(
            self.ctx.book_provider.as_ref(),
            market_id,
            outcome,
            FIRST_HINT,
            RETRY_HINT,
            QUOTE_BAND,
        )
        .await;

        book.best_bid = book.best_bid.map(|v| tick::round(v, tick_digits));
        book.best_ask = book.best_ask.map(|v| tick::round(v, tick_digits));
        book.top_bid = book.top_bid.map(|v| tick::round(v, tick_digits));
        book.top_ask = book.top_ask.map(|v| tick::round(v, tick_digits));
        book.second_best_bid = book.second_best_bid.map(|v| tick::round(v, tick_digits));
        book.second_best_ask = book.second_best_ask.map(|v| tick::round(v, tick_digits));

        let overall_ratio = match (book.bid_sum_within_n_percent, book.ask_sum_within_n_percent) {
            (Some(bid_sum), Some(ask_sum)) if ask_sum > Decimal::ZERO => bid_sum / ask_sum,
            _ => Decimal::ZERO,
        };

        let mut position = self.ctx.position_cache.get_position(&token).await;
        position.size = tick::round(position.size, 2);

        let (bid_price, ask_price) = self.pricer.quote(&book, position.avg_price, row);
        let bid_price = tick::round(bid_price, tick_digits);
        let ask_price = tick::round(ask_price, tick_digits);

        let mid_price = book.mid_price().unwrap_or(Decimal::ZERO);

        let other_position = self.ctx.position_cache.get_position(&other_token).await;
        let (buy_amount, sell_amount) = self.sizer.size(position, bid_price, row, other_position);

        let resting = self.ctx.position_cache.get_order(&token).await;

        if self
            .maybe_risk_off(market_id, row, params, outcome, &token, position, sell_amount, tick_digits)
            .await?
        {
            return Ok(());
        }

        if position.size < row.effective_max_size()
            && position.size < ABSOLUTE_POSITION_CAP
            && buy_amount > Decimal::ZERO
            && buy_amount >= row.min_size
        {
            self.maybe_buy(
                market_id,
                row,
                params,
                &token,
                outcome,
                bid_price,
                book.best_bid,
                mid_price,
                overall_ratio,
                position,
                other_position,
                resting,
                buy_amount,
            )
            .await?;
        } else if sell_amount > Decimal::ZERO {
            self.maybe_take_profit(
                market_id,
                row,
                params,
                &token,
                ask_price,
                position,
                resting,
                sell_amount,
                tick_digits,
            )
            .await?;
        }

        Ok(())
    }

    /// §4.4.2 (a): stop-loss / risk-off — takes precedence only when a sell
    /// is warranted (`sell_amount > 0`); a zero `sell_amount` means the sizer
    /// sees nothing to exit, so there's no SELL to place and no cooldown to
    /// start. Returns `true` if this branch fired (caller should move on to
    /// the next outcome).
    #[allow(clippy::too_many_arguments)]
    async fn maybe_risk_off(
        &self,
        market_id: &str,
        row: &MarketConfigRow,
        params: &crate::config::Params,
        outcome: Outcome,
        token: &str,
        position: PositionView,
        sell_amount: Decimal,
        tick_digits: u32,
    ) -> Result<bool, StrategyError> {
        if sell_amount <= Decimal::ZERO {
            return Ok(false);
        }
        if position.avg_price == Decimal::ZERO {
            return Ok(false);
        }

        // Re-fetch fresh (hint 100, no shallower retry) rather than reusing
        // the book already read by `process_outcome`, which may have come
        // back from the hint-20 retry path.
        let snapshot = self
            .ctx
            .book_provider
            .best_bid_ask_deets(market_id, outcome, FIRST_HINT, QUOTE_BAND)
            .await;
        let (Some(best_bid), Some(best_ask)) = (snapshot.best_bid, snapshot.best_ask) else {
            return Ok(false);
        };

        let mid = tick::round_up((best_bid + best_ask) / Decimal::from(2), tick_digits);
        let spread = tick::round(best_ask - best_bid, 2);
        let pnl = (mid - position.avg_price) / position.avg_price * Decimal::from(100);

        let triggered = (pnl < params.stop_loss_threshold && spread <= params.spread_threshold)
            || row.three_hour > params.volatility_threshold;
        if !triggered {
            return Ok(false);
        }

        warn!(market_id, token, %pnl, %spread, "market_maker: risk-off triggered");
        self.ctx
            .exchange
            .create_order(token, Side::Sell, best_bid, sell_amount, row.neg_risk)
            .await?;
        self.ctx.exchange.cancel_all_market(market_id).await?;

        use rust_decimal::prelude::ToPrimitive;
        let sleep_seconds = (params.sleep_period * Decimal::from(3600))
            .round()
            .to_i64()
            .unwrap_or(3600);
        let now = self.ctx.clock.now();
        let record = RiskOffRecord {
            time: now,
            question: row.question.clone(),
            msg: "stop-loss".to_string(),
            sleep_till: now + chrono::Duration::seconds(sleep_seconds),
        };
        self.ctx.risk_off.write(market_id, &record).await?;
        Ok(true)
    }

    /// §4.4.2 (b): buy quote.
    #[allow(clippy::too_many_arguments)]
    async fn maybe_buy(
        &self,
        market_id: &str,
        row: &MarketConfigRow,
        params: &crate::config::Params,
        token: &str,
        outcome: Outcome,
        bid_price: Decimal,
        book_best_bid: Option<Decimal>,
        mid_price: Decimal,
        overall_ratio: Decimal,
        position: PositionView,
        other_position: PositionView,
        resting: crate::exchange::OpenOrders,
        buy_amount: Decimal,
    ) -> Result<(), StrategyError> {
        let sheet_value = tick::round(row.sheet_value(outcome), tick::tick_digits(row.tick_size));
        let price_change = (bid_price - sheet_value).abs();

        if self
            .ctx
            .risk_off
            .is_blocking_buys(market_id, self.ctx.clock.as_ref())
            .await?
        {
            debug!(market_id, token, "market_maker: risk-off cooldown, no buy");
            return Ok(());
        }

        if row.three_hour > params.volatility_threshold || price_change >= PRICE_CHANGE_LIMIT {
            debug!(market_id, token, "market_maker: volatility/drift, cancel and skip buy");
            self.ctx.exchange.cancel_all_asset(token).await?;
            return Ok(());
        }

        if other_position.size > row.min_size {
            debug!(market_id, token, "market_maker: counterpart long, skip buy to avoid double-long");
            if resting.buy.size > MIN_MERGE_SIZE {
                self.ctx.exchange.cancel_all_asset(token).await?;
            }
            return Ok(());
        }

        // overall_ratio is a quotient of two non-negative sums; it is only
        // ever exactly zero (ask_sum missing or zero) or positive. Kept as
        // `< 0` rather than normalized to an explicit zero-check (DESIGN.md
        // Open Question 1).
        if overall_ratio < Decimal::ZERO {
            debug!(market_id, token, "market_maker: overall_ratio negative, skip buy");
            self.ctx.exchange.cancel_all_asset(token).await?;
            return Ok(());
        }

        // Compared against the live rounded book bid, not `row.best_bid`
        // (the static config sheet value used only for the drift check
        // above) — otherwise this never reflects actual book movement.
        let improved_price =
            resting.buy.is_present() && book_best_bid.is_some_and(|b| b > resting.buy.price);
        let under_provisioned =
            position.size + resting.buy.size < BUY_SIZE_HEADROOM * row.effective_max_size();
        let over_sized = resting.buy.is_present()
            && resting.buy.size > RESTING_OVERSIZE_RATIO * buy_amount;

        if !(improved_price || under_provisioned || over_sized) {
            return Ok(());
        }

        let target = GateTarget {
            side: Side::Buy,
            price: bid_price,
            size: buy_amount,
        };
        let decision = order_gate::evaluate(
            target,
            resting.buy,
            resting.sell,
            mid_price,
            row.max_spread,
        );
        self.apply_gate_decision(market_id, token, decision, target, row.neg_risk)
            .await
    }

    /// §4.4.2 (c): sell quote / take-profit.
    #[allow(clippy::too_many_arguments)]
    async fn maybe_take_profit(
        &self,
        market_id: &str,
        row: &MarketConfigRow,
        params: &crate::config::Params,
        token: &str,
        ask_price: Decimal,
        position: PositionView,
        resting: crate::exchange::OpenOrders,
        sell_amount: Decimal,
        tick_digits: u32,
    ) -> Result<(), StrategyError> {
        if position.avg_price == Decimal::ZERO {
            return Ok(());
        }
        let tp_price = tick::round_up(
            position.avg_price * (Decimal::ONE + params.take_profit_threshold / Decimal::from(100)),
            tick_digits,
        );
        let order_price = tick::round_up(ask_price.max(tp_price), tick_digits);

        let diff = if resting.sell.is_present() && tp_price != Decimal::ZERO {
            (resting.sell.price - tp_price).abs() / tp_price * Decimal::from(100)
        } else {
            Decimal::MAX
        };

        let under_covered = resting.sell.size < SELL_UNDER_COVER_RATIO * position.size;
        if !(diff > TP_DIFF_THRESHOLD_PCT || under_covered) {
            return Ok(());
        }

        let target = GateTarget {
            side: Side::Sell,
            price: order_price,
            size: sell_amount,
        };
        let decision = order_gate::evaluate(
            target,
            resting.sell,
            resting.buy,
            Decimal::ZERO,
            row.max_spread,
        );
        self.apply_gate_decision(market_id, token, decision, target, row.neg_risk)
            .await
    }

    async fn apply_gate_decision(
        &self,
        market_id: &str,
        token: &str,
        decision: GateDecision,
        target: GateTarget,
        neg_risk: bool,
    ) -> Result<(), StrategyError> {
        match decision {
            GateDecision::Keep => Ok(()),
            GateDecision::Skip => {
                debug!(market_id, token, "order gate: skip, outside admissible band");
                Ok(())
            }
            GateDecision::CancelAndPlace => {
                self.ctx.exchange.cancel_all_asset(token).await?;
                self.ctx
                    .exchange
                    .create_order(token, target.side, target.price, target.size, neg_risk)
                    .await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl StrategyExec for MarketMaker {
    async fn execute(
        &self,
        market_id: &str,
        market_data: &MarketData<'_>,
    ) -> Result<(), StrategyError> {
        let row = market_data.config;
        let params = market_data.params;
        let tick_digits = tick::tick_digits(row.tick_size);

        self.merge_first(market_id, row).await?;

        self.process_outcome(market_id, row, params, tick_digits, Outcome::Token1)
            .await?;
        self.process_outcome(market_id, row, params, tick_digits, Outcome::Token2)
            .await?;

        tokio::time::sleep(POST_CYCLE_SLEEP).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book_view::BookProvider;
    use crate::clock::{FixedClock, SystemClock};
    use crate::exchange::{ExchangeClient, ExchangeError, OpenOrders, PositionCache, RawPosition};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticBook(TopOfBook);

    #[async_trait]
    impl BookProvider for StaticBook {
        async fn best_bid_ask_deets(
            &self,
            _market_id: &str,
            _outcome: Outcome,
            _size_hint: Decimal,
            _band_percent: Decimal,
        ) -> TopOfBook {
            self.0
        }
    }

    struct RecordingExchange {
        orders: Mutex<Vec<(String, Side, Decimal, Decimal)>>,
        cancels_asset: Mutex<Vec<String>>,
        cancels_market: Mutex<Vec<String>>,
    }

    impl RecordingExchange {
        fn new() -> Self {
            Self {
                orders: Mutex::new(Vec::new()),
                cancels_asset: Mutex::new(Vec::new()),
                cancels_market: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExchangeClient for RecordingExchange {
        async fn create_order(
            &self,
            token: &str,
            side: Side,
            price: Decimal,
            size: Decimal,
            _neg_risk: bool,
        ) -> Result<(), ExchangeError> {
            self.orders
                .lock()
                .unwrap()
                .push((token.to_string(), side, price, size));
            Ok(())
        }
        async fn cancel_all_asset(&self, token: &str) -> Result<(), ExchangeError> {
            self.cancels_asset.lock().unwrap().push(token.to_string());
            Ok(())
        }
        async fn cancel_all_market(&self, market_id: &str) -> Result<(), ExchangeError> {
            self.cancels_market.lock().unwrap().push(market_id.to_string());
            Ok(())
        }
        async fn get_position(&self, _token: &str) -> Result<(RawPosition, Decimal), ExchangeError> {
            Ok((RawPosition(0), Decimal::ZERO))
        }
        async fn get_usdc_balance(&self) -> Result<Decimal, ExchangeError> {
            Ok(dec!(1000))
        }
        async fn merge_positions(
            &self,
            _raw_amount: i64,
            _market_id: &str,
            _neg_risk: bool,
        ) -> Result<(), ExchangeError> {
            Ok(())
        }
    }

    struct StaticCache {
        positions: HashMap<String, PositionView>,
        orders: HashMap<String, OpenOrders>,
    }

    #[async_trait]
    impl PositionCache for StaticCache {
        async fn get_position(&self, token: &str) -> PositionView {
            self.positions.get(token).copied().unwrap_or_default()
        }
        async fn set_position(
            &self,
            _token: &str,
            _side: Side,
            _size: Decimal,
            _price: Decimal,
            _source: PositionSourceTag,
        ) {
        }
        async fn get_order(&self, token: &str) -> OpenOrders {
            self.orders.get(token).copied().unwrap_or_default()
        }
    }

    struct FlatPricer;
    impl QuotePricer for FlatPricer {
        fn quote(&self, book: &TopOfBook, _avg_price: Decimal, _row: &MarketConfigRow) -> (Decimal, Decimal) {
            (
                book.best_bid.unwrap_or(dec!(0.4)),
                book.best_ask.unwrap_or(dec!(0.6)),
            )
        }
    }

    struct FixedSizer {
        buy: Decimal,
        sell: Decimal,
    }
    impl QuoteSizer for FixedSizer {
        fn size(
            &self,
            _position: PositionView,
            _bid_price: Decimal,
            _row: &MarketConfigRow,
            _other_position: PositionView,
        ) -> (Decimal, Decimal) {
            (self.buy, self.sell)
        }
    }

    fn row() -> MarketConfigRow {
        MarketConfigRow {
            market_id: "m1".into(),
            token1: "111".into(),
            token2: "222".into(),
            answer1: "Yes".into(),
            answer2: "No".into(),
            tick_size: dec!(0.01),
            neg_risk: false,
            trade_size: dec!(50),
            max_size: Some(dec!(50)),
            min_size: dec!(1),
            max_spread: dec!(5),
            best_bid: dec!(0.40),
            best_ask: dec!(0.60),
            param_type: "default".into(),
            three_hour: dec!(1),
            question: "Will it happen?".into(),
            arb_buffer: None,
        }
    }

    fn params() -> crate::config::Params {
        crate::config::Params {
            stop_loss_threshold: dec!(-10),
            spread_threshold: dec!(0.03),
            volatility_threshold: dec!(5),
            take_profit_threshold: dec!(10),
            sleep_period: dec!(1),
        }
    }

    #[tokio::test]
    async fn scenario_c_stop_loss_sells_and_writes_cooldown() {
        let book = TopOfBook {
            best_bid: Some(dec!(0.55)),
            best_ask: Some(dec!(0.57)),
            best_bid_size: Some(dec!(10)),
            best_ask_size: Some(dec!(10)),
            top_bid: Some(dec!(0.55)),
            top_ask: Some(dec!(0.57)),
            ..Default::default()
        };
        let exchange = std::sync::Arc::new(RecordingExchange::new());
        let mut positions = HashMap::new();
        positions.insert(
            "111".to_string(),
            PositionView {
                size: dec!(10),
                avg_price: dec!(0.70),
            },
        );
        let cache = std::sync::Arc::new(StaticCache {
            positions,
            orders: HashMap::new(),
        });
        let dir = std::env::temp_dir().join(format!("pm_risk_off_test_{}", uuid::Uuid::new_v4()));
        let ctx = StrategyContext {
            exchange: exchange.clone(),
            book_provider: std::sync::Arc::new(StaticBook(book)),
            position_cache: cache,
            risk_off: std::sync::Arc::new(crate::risk_off::RiskOffStore::new(dir.clone())),
            clock: std::sync::Arc::new(SystemClock),
        };
        let strategy = MarketMaker::new(
            ctx.clone(),
            std::sync::Arc::new(FlatPricer),
            std::sync::Arc::new(FixedSizer {
                buy: dec!(0),
                sell: dec!(10),
            }),
        );
        let row = row();
        let params = params();
        let result = strategy
            .process_outcome(
                "m1",
                &row,
                &params,
                tick::tick_digits(row.tick_size),
                Outcome::Token1,
            )
            .await;
        assert!(result.is_ok());

        let sells: Vec<_> = exchange
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, side, _, _)| *side == Side::Sell)
            .cloned()
            .collect();
        assert_eq!(sells.len(), 1);
        assert!(!exchange.cancels_market.lock().unwrap().is_empty());

        let record = ctx.risk_off.read("m1").await.unwrap();
        assert!(record.is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn scenario_d_active_cooldown_suppresses_buy() {
        let book = TopOfBook {
            best_bid: Some(dec!(0.40)),
            best_ask: Some(dec!(0.42)),
            best_bid_size: Some(dec!(10)),
            best_ask_size: Some(dec!(10)),
            top_bid: Some(dec!(0.40)),
            top_ask: Some(dec!(0.42)),
            ..Default::default()
        };
        let exchange = std::sync::Arc::new(RecordingExchange::new());
        let cache = std::sync::Arc::new(StaticCache {
            positions: HashMap::new(),
            orders: HashMap::new(),
        });
        let dir = std::env::temp_dir().join(format!("pm_risk_off_test_{}", uuid::Uuid::new_v4()));
        let risk_off = std::sync::Arc::new(crate::risk_off::RiskOffStore::new(dir.clone()));
        let clock = std::sync::Arc::new(FixedClock::new(chrono::Utc::now()));
        let now = clock.now();
        risk_off
            .write(
                "m1",
                &RiskOffRecord {
                    time: now,
                    question: "?".into(),
                    msg: "stop-loss".into(),
                    sleep_till: now + chrono::Duration::hours(1),
                },
            )
            .await
            .unwrap();

        let ctx = StrategyContext {
            exchange: exchange.clone(),
            book_provider: std::sync::Arc::new(StaticBook(book)),
            position_cache: cache,
            risk_off,
            clock,
        };
        let strategy = MarketMaker::new(
            ctx,
            std::sync::Arc::new(FlatPricer),
            std::sync::Arc::new(FixedSizer {
                buy: dec!(20),
                sell: dec!(0),
            }),
        );
        let row = row();
        let params = params();
        strategy
            .process_outcome(
                "m1",
                &row,
                &params,
                tick::tick_digits(row.tick_size),
                Outcome::Token1,
            )
            .await
            .unwrap();

        let buys: Vec<_> = exchange
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, side, _, _)| *side == Side::Buy)
            .cloned()
            .collect();
        assert!(buys.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
