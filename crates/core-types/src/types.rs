// In crates/core-types/src/types.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A trading pair symbol (e.g., "BTCUSDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Parses the `side` field of a Bybit position record.
    ///
    /// Bybit reports position direction as the order side that opened it
    /// ("Buy" for long, "Sell" for short). Anything else (e.g., the empty
    /// string on a flat one-way slot) is not an open position.
    pub fn from_bybit(side: &str) -> Option<Self> {
        match side {
            "Buy" => Some(Side::Long),
            "Sell" => Some(Side::Short),
            _ => None,
        }
    }

    /// The order side that opens or adds to a position of this direction.
    pub fn as_order_side(&self) -> &'static str {
        match self {
            Side::Long => "Buy",
            Side::Short => "Sell",
        }
    }

    /// The order side that reduces a position of this direction.
    pub fn closing_order_side(&self) -> &'static str {
        match self {
            Side::Long => "Sell",
            Side::Short => "Buy",
        }
    }
}

/// The latest known prices for a symbol, fed by the ticker stream.
///
/// Fields default to zero until the first update carrying them arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub last: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
}

/// An open position, rebuilt from exchange state every polling cycle.
///
/// There is no cross-cycle identity beyond the symbol key: each cycle
/// discards the previous generation wholesale, so every decision is
/// re-derived from what the exchange currently reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: Side,
    /// Position size, always > 0 (flat slots are filtered out upstream).
    pub quantity: Decimal,
    /// Hedge-mode slot (0 = one-way, 1 = hedge long, 2 = hedge short).
    pub position_idx: i32,
    pub entry_price: Decimal,
    /// The stop-loss currently resting on the exchange; ZERO means none.
    pub stop_loss: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_percent: Decimal,
    /// Close-side price from the price cache, or entry price as fallback.
    pub current_price: Decimal,
    /// Whether a reduce-only order on the closing side is already open.
    pub has_take_profit: bool,
}

impl Position {
    /// Unrealized PnL as a percentage of position margin (entry × qty),
    /// or zero when the margin is zero.
    pub fn pnl_percent(entry_price: Decimal, quantity: Decimal, unrealized_pnl: Decimal) -> Decimal {
        let margin = entry_price * quantity;
        if margin > Decimal::ZERO {
            unrealized_pnl / margin * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        }
    }

    pub fn has_stop_loss(&self) -> bool {
        !self.stop_loss.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn pnl_percent_of_margin() {
        // entry=50000, qty=0.01 -> margin=500; pnl=25 -> 5%
        let pct = Position::pnl_percent(dec!(50000), dec!(0.01), dec!(25));
        assert_eq!(pct, dec!(5));
    }

    #[test]
    fn pnl_percent_zero_margin() {
        assert_eq!(Position::pnl_percent(dec!(0), dec!(0.01), dec!(25)), Decimal::ZERO);
    }

    #[test]
    fn side_parsing_and_closing_side() {
        assert_eq!(Side::from_bybit("Buy"), Some(Side::Long));
        assert_eq!(Side::from_bybit("Sell"), Some(Side::Short));
        assert_eq!(Side::from_bybit(""), None);
        assert_eq!(Side::from_bybit("None"), None);
        assert_eq!(Side::Long.closing_order_side(), "Sell");
        assert_eq!(Side::Short.closing_order_side(), "Buy");
    }
}
