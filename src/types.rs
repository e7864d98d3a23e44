use crate::config::MarketConfigRow;

/// One of the two complementary outcome tokens of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Token1,
    Token2,
}

impl Outcome {
    pub fn other(self) -> Outcome {
        match self {
            Outcome::Token1 => Outcome::Token2,
            Outcome::Token2 => Outcome::Token1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Token1 => "token1",
            Outcome::Token2 => "token2",
        }
    }
}

/// Order side sent to the exchange client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Resolves a token id to the token id of its complementary outcome.
///
/// spec.md §6 lists this as `REVERSE_TOKENS[token] -> counterpart_token`; a
/// `MarketConfigRow` already carries both token ids, so the only
/// implementation this crate ships is a blanket one over the config row
/// itself.
pub trait CounterpartyResolver {
    fn counterpart(&self, token: &str) -> Option<&str>;
}

impl CounterpartyResolver for MarketConfigRow {
    fn counterpart(&self, token: &str) -> Option<&str> {
        if token == self.token1 {
            Some(&self.token2)
        } else if token == self.token2 {
            Some(&self.token1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row() -> MarketConfigRow {
        MarketConfigRow {
            market_id: "m1".into(),
            token1: "111".into(),
            token2: "222".into(),
            answer1: "Yes".into(),
            answer2: "No".into(),
            tick_size: dec!(0.001),
            neg_risk: false,
            trade_size: dec!(10),
            max_size: None,
            min_size: dec!(1),
            max_spread: dec!(5),
            best_bid: dec!(0.48),
            best_ask: dec!(0.50),
            param_type: "default".into(),
            three_hour: dec!(1),
            question: "?".into(),
            arb_buffer: None,
        }
    }

    #[test]
    fn outcome_other_is_involution() {
        assert_eq!(Outcome::Token1.other(), Outcome::Token2);
        assert_eq!(Outcome::Token2.other(), Outcome::Token1);
    }

    #[test]
    fn counterpart_resolves_either_direction() {
        let row = row();
        assert_eq!(row.counterpart("111"), Some("222"));
        assert_eq!(row.counterpart("222"), Some("111"));
        assert_eq!(row.counterpart("999"), None);
    }
}
