use super::{MarketData, StrategyContext, StrategyExec};
use crate::book_view::top_of_book;
use crate::error::StrategyError;
use crate::exchange::RawPosition;
use crate::types::{Outcome, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing::{debug, info, warn};

const SETTLEMENT_SLEEP: Duration = Duration::from_millis(500);
const ARB_BOOK_BAND: Decimal = dec!(0.05);
const MIN_ASK_SUM_DIVISOR: Decimal = dec!(0.000001);
const PAR: Decimal = dec!(1);

/// Two-leg arbitrage: buy both outcomes when their combined asks sum below
/// par, then merge for the realized profit. Entire body runs under the
/// per-market lock the caller (the strategy manager) already holds (spec.md
/// §4.3).
pub struct DutchArb {
    ctx: StrategyContext,
}

impl DutchArb {
    pub fn new(ctx: StrategyContext) -> Self {
        Self { ctx }
    }

    /// §4.3.1: fetch top-of-book, give up silently if there's no bid,
    /// otherwise sell at best bid for `min(size, best_bid_size)`. No
    /// retries — we accept asymmetric fills as the cost of legging, but we
    /// always attempt this before returning (spec.md §8 property 5).
    async fn unwind(&self, market_id: &str, token: &str, outcome: Outcome, size: Decimal) {
        let snapshot = self
            .ctx
            .book_provider
            .best_bid_ask_deets(market_id, outcome, dec!(1), ARB_BOOK_BAND)
            .await;
        let (Some(bid), Some(bid_size)) = (snapshot.best_bid, snapshot.best_bid_size) else {
            warn!(market_id, token, "dutch_arb: unwind has no bid, giving up");
            return;
        };
        let unwind_size = size.min(bid_size);
        if unwind_size <= Decimal::ZERO {
            return;
        }
        match self
            .ctx
            .exchange
            .create_order(token, Side::Sell, bid, unwind_size, false)
            .await
        {
            Ok(()) => info!(market_id, token, price = %bid, size = %unwind_size, "dutch_arb: unwind placed"),
            Err(err) => warn!(market_id, token, error = %err, "dutch_arb: unwind order failed"),
        }
    }
}

#[async_trait]
impl StrategyExec for DutchArb {
    async fn execute(
        &self,
        market_id: &str,
        market_data: &MarketData<'_>,
    ) -> Result<(), StrategyError> {
        let row = market_data.config;
        let buffer = row.arb_buffer_or_default();
        let min_size = row.min_size;
        let max_size = row.effective_max_size();

        let book1 = top_of_book(
            self.ctx.book_provider.as_ref(),
            market_id,
            Outcome::Token1,
            min_size.max(dec!(1)),
            ARB_BOOK_BAND,
        )
        .await;
        let book2 = top_of_book(
            self.ctx.book_provider.as_ref(),
            market_id,
            Outcome::Token2,
            min_size.max(dec!(1)),
            ARB_BOOK_BAND,
        )
        .await;
        let (Some(book1), Some(book2)) = (book1, book2) else {
            debug!(market_id, "dutch_arb: book unavailable for one or both outcomes, exit");
            return Ok(());
        };

        let ask1 = book1.best_ask.expect("has_usable_ask guarantees best_ask");
        let ask2 = book2.best_ask.expect("has_usable_ask guarantees best_ask");
        let ask_size1 = book1.best_ask_size.expect("has_usable_ask guarantees size");
        let ask_size2 = book2.best_ask_size.expect("has_usable_ask guarantees size");

        let ask_sum = ask1 + ask2 + buffer;
        if ask_sum >= PAR {
            debug!(market_id, %ask_sum, "dutch_arb: no arb, exit");
            return Ok(());
        }

        let available = ask_size1.min(ask_size2);
        if available <= Decimal::ZERO {
            debug!(market_id, "dutch_arb: no liquidity on one leg, exit");
            return Ok(());
        }

        let bankroll = self.ctx.exchange.get_usdc_balance().await?;
        let max_by_balance = bankroll / (ask1 + ask2).max(MIN_ASK_SUM_DIVISOR);

        let target = available.min(max_size).min(max_by_balance);
        if target < min_size || target <= Decimal::ZERO {
            debug!(market_id, %target, %min_size, "dutch_arb: target below min_size, exit");
            return Ok(());
        }

        let token1 = &row.token1;
        let token2 = &row.token2;

        let (_pre_raw1, pre_scaled1) = self.ctx.exchange.get_position(token1).await?;

        self.ctx
            .exchange
            .create_order(token1, Side::Buy, ask1, target, row.neg_risk)
            .await?;
        tokio::time::sleep(SETTLEMENT_SLEEP).await;

        let (_post_raw1, post_scaled1) = self.ctx.exchange.get_position(token1).await?;
        let filled1 = (post_scaled1 - pre_scaled1).max(Decimal::ZERO);
        if filled1 <= Decimal::ZERO {
            debug!(market_id, "dutch_arb: leg1 did not fill, nothing to unwind, exit");
            return Ok(());
        }

        let book2_again = top_of_book(
            self.ctx.book_provider.as_ref(),
            market_id,
            Outcome::Token2,
            min_size.max(dec!(1)),
            ARB_BOOK_BAND,
        )
        .await;
        let should_unwind = match &book2_again {
            None => true,
            Some(b) => {
                let new_ask2 = b.best_ask.expect("has_usable_ask guarantees best_ask");
                new_ask2 + ask1 + buffer >= PAR
            }
        };
        if should_unwind {
            info!(market_id, "dutch_arb: second leg moved away, unwinding leg1");
            self.unwind(market_id, token1, Outcome::Token1, filled1)
                .await;
            return Ok(());
        }
        let book2_again = book2_again.expect("should_unwind would be true otherwise");

        let new_ask2 = book2_again.best_ask.expect("has_usable_ask guarantees best_ask");
        let new_ask_size2 = book2_again
            .best_ask_size
            .expect("has_usable_ask guarantees size");
        let size2 = filled1.min(new_ask_size2).min(max_by_balance);

        let (_pre_raw2, pre_scaled2) = self.ctx.exchange.get_position(token2).await?;
        self.ctx
            .exchange
            .create_order(token2, Side::Buy, new_ask2, size2, row.neg_risk)
            .await?;
        tokio::time::sleep(SETTLEMENT_SLEEP).await;

        let (_post_raw2, post_scaled2) = self.ctx.exchange.get_position(token2).await?;
        let filled2 = (post_scaled2 - pre_scaled2).max(Decimal::ZERO);
        if filled2 <= Decimal::ZERO {
            info!(market_id, "dutch_arb: leg2 did not fill, unwinding leg1");
            self.unwind(market_id, token1, Outcome::Token1, filled1)
                .await;
            return Ok(());
        }

        let (raw1, _scaled1) = self.ctx.exchange.get_position(token1).await?;
        let (raw2, _scaled2) = self.ctx.exchange.get_position(token2).await?;
        let merge = raw1.0.min(raw2.0);
        if merge > 0 {
            self.ctx
                .exchange
                .merge_positions(merge, market_id, row.neg_risk)
                .await?;
            info!(market_id, merge, "dutch_arb: merged completed arb");
        }

        Ok(())
    }
}
