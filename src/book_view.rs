use crate::types::Outcome;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Normalized top-of-book record for one outcome of one market (spec.md
/// §3). Every field is optional: a missing field in the underlying
/// snapshot, not a zero, since zero is a meaningful bid/ask price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopOfBook {
    pub best_bid: Option<Decimal>,
    pub best_bid_size: Option<Decimal>,
    pub second_best_bid: Option<Decimal>,
    pub second_best_bid_size: Option<Decimal>,
    /// Best non-self bid price.
    pub top_bid: Option<Decimal>,

    pub best_ask: Option<Decimal>,
    pub best_ask_size: Option<Decimal>,
    pub second_best_ask: Option<Decimal>,
    pub second_best_ask_size: Option<Decimal>,
    pub top_ask: Option<Decimal>,

    /// Aggregate bid size within ±`band_percent` of mid.
    pub bid_sum_within_n_percent: Option<Decimal>,
    /// Aggregate ask size within ±`band_percent` of mid.
    pub ask_sum_within_n_percent: Option<Decimal>,
}

impl TopOfBook {
    /// spec.md §8 boundary 10: a best size of zero collapses the book to
    /// "absent" for arb purposes.
    pub fn has_usable_ask(&self) -> bool {
        matches!(self.best_ask, Some(p) if p > Decimal::ZERO)
            && matches!(self.best_ask_size, Some(s) if s > Decimal::ZERO)
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.top_bid? + self.top_ask?) / Decimal::from(2))
    }
}

/// External order-book snapshot provider (spec.md §2.2, §6). The core never
/// owns book state; it calls into this on every decision.
#[async_trait]
pub trait BookProvider: Send + Sync {
    async fn best_bid_ask_deets(
        &self,
        market_id: &str,
        outcome: Outcome,
        size_hint: Decimal,
        band_percent: Decimal,
    ) -> TopOfBook;
}

/// `top_of_book(market_id, outcome, min_size_hint, band_percent)` (spec.md
/// §4.1). Returns `None` if the snapshot has no usable ask (missing ask
/// price, or ask size `<= 0`).
///
/// Pure with respect to the book snapshot observed at call time; a second
/// call may return different data once the book moves.
pub async fn top_of_book(
    provider: &dyn BookProvider,
    market_id: &str,
    outcome: Outcome,
    min_size_hint: Decimal,
    band_percent: Decimal,
) -> Option<TopOfBook> {
    let snapshot = provider
        .best_bid_ask_deets(market_id, outcome, min_size_hint, band_percent)
        .await;
    if !snapshot.has_usable_ask() {
        return None;
    }
    Some(snapshot)
}

/// Variant used by the Market Maker: retries at a shallower hint (20) if any
/// of the best fields came back null at the first, deeper hint (100)
/// (spec.md §4.1 "Guarantees").
pub async fn top_of_book_with_retry(
    provider: &dyn BookProvider,
    market_id: &str,
    outcome: Outcome,
    first_hint: Decimal,
    retry_hint: Decimal,
    band_percent: Decimal,
) -> TopOfBook {
    let snapshot = provider
        .best_bid_ask_deets(market_id, outcome, first_hint, band_percent)
        .await;
    let incomplete = snapshot.best_bid.is_none()
        || snapshot.best_ask.is_none()
        || snapshot.top_bid.is_none()
        || snapshot.top_ask.is_none();
    if incomplete {
        provider
            .best_bid_ask_deets(market_id, outcome, retry_hint, band_percent)
            .await
    } else {
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        responses: Vec<TopOfBook>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BookProvider for ScriptedProvider {
        async fn best_bid_ask_deets(
            &self,
            _market_id: &str,
            _outcome: Outcome,
            _size_hint: Decimal,
            _band_percent: Decimal,
        ) -> TopOfBook {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses[idx.min(self.responses.len() - 1)]
        }
    }

    #[tokio::test]
    async fn no_ask_size_collapses_to_none() {
        let provider = ScriptedProvider {
            responses: vec![TopOfBook {
                best_ask: Some(dec!(0.5)),
                best_ask_size: Some(dec!(0)),
                ..Default::default()
            }],
            calls: AtomicUsize::new(0),
        };
        let result = top_of_book(&provider, "m1", Outcome::Token1, dec!(1), dec!(0.05)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn retry_falls_back_to_shallower_hint() {
        let provider = ScriptedProvider {
            responses: vec![
                TopOfBook::default(),
                TopOfBook {
                    best_bid: Some(dec!(0.48)),
                    best_ask: Some(dec!(0.50)),
                    best_ask_size: Some(dec!(10)),
                    top_bid: Some(dec!(0.48)),
                    top_ask: Some(dec!(0.50)),
                    ..Default::default()
                },
            ],
            calls: AtomicUsize::new(0),
        };
        let result = top_of_book_with_retry(
            &provider,
            "m1",
            Outcome::Token1,
            dec!(100),
            dec!(20),
            dec!(0.1),
        )
        .await;
        assert_eq!(result.best_ask, Some(dec!(0.50)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
