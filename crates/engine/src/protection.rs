// In crates/engine/src/protection.rs

use app_config::Settings;
use core_types::{Position, Side};
use rust_decimal::Decimal;

use crate::PRICE_DP;

/// Initial-protection parameters: stop-loss percent is configured negative,
/// take-profit percent positive, and both feed the same side-symmetric
/// offset formula.
#[derive(Debug, Clone, Copy)]
pub struct ProtectionSettings {
    pub stop_loss_percent: Decimal,
    pub take_profit_percent: Decimal,
}

impl From<&Settings> for ProtectionSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            stop_loss_percent: settings.stop_loss_percent,
            take_profit_percent: settings.take_profit_percent,
        }
    }
}

/// Offsets a base price by a signed percentage, side-symmetrically:
/// `base * (1 + pct/100)` for Long, `base * (1 - pct/100)` for Short,
/// rounded to the exchange's price precision.
///
/// With a negative percent this lands on the losing side of the base
/// (a stop-loss), with a positive one on the winning side (a take-profit).
pub fn offset_price(side: Side, base: Decimal, percent: Decimal) -> Decimal {
    let offset = percent / Decimal::ONE_HUNDRED;
    let factor = match side {
        Side::Long => Decimal::ONE + offset,
        Side::Short => Decimal::ONE - offset,
    };
    (base * factor).round_dp(PRICE_DP)
}

/// The protective orders a position still needs. `None` fields mean the
/// exchange already carries that protection, so re-running the plan for an
/// already-protected position is a no-op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectionPlan {
    /// Stop-loss price anchored on the entry price, or `None` if one is set.
    pub stop_loss: Option<Decimal>,
    /// Take-profit price anchored on the current price, or `None` if a
    /// reduce-only closing order already exists.
    pub take_profit: Option<Decimal>,
}

impl ProtectionPlan {
    pub fn is_noop(&self) -> bool {
        self.stop_loss.is_none() && self.take_profit.is_none()
    }
}

/// Decides which protective orders a position is missing.
pub fn plan_initial_protection(position: &Position, settings: &ProtectionSettings) -> ProtectionPlan {
    let stop_loss = (!position.has_stop_loss())
        .then(|| offset_price(position.side, position.entry_price, settings.stop_loss_percent));

    let take_profit = (!position.has_take_profit)
        .then(|| offset_price(position.side, position.current_price, settings.take_profit_percent));

    ProtectionPlan { stop_loss, take_profit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Symbol;
    use rust_decimal_macros::dec;

    fn settings() -> ProtectionSettings {
        ProtectionSettings {
            stop_loss_percent: dec!(-2.5),
            take_profit_percent: dec!(5.0),
        }
    }

    fn position(side: Side, entry: Decimal, current: Decimal, stop_loss: Decimal, has_tp: bool) -> Position {
        Position {
            symbol: Symbol("BTCUSDT".into()),
            side,
            quantity: dec!(0.01),
            position_idx: 0,
            entry_price: entry,
            stop_loss,
            unrealized_pnl: Decimal::ZERO,
            unrealized_pnl_percent: Decimal::ZERO,
            current_price: current,
            has_take_profit: has_tp,
        }
    }

    #[test]
    fn long_stop_loss_sits_below_entry() {
        let price = offset_price(Side::Long, dec!(100), dec!(-2.5));
        assert_eq!(price, dec!(97.5));
        assert!(price < dec!(100));
    }

    #[test]
    fn short_stop_loss_sits_above_entry() {
        // entry=100, -2.5% -> loss-limiting stop at 102.5.
        let price = offset_price(Side::Short, dec!(100), dec!(-2.5));
        assert_eq!(price, dec!(102.5));
        assert!(price > dec!(100));
    }

    #[test]
    fn take_profit_sits_on_the_winning_side() {
        assert_eq!(offset_price(Side::Long, dec!(200), dec!(5.0)), dec!(210));
        assert_eq!(offset_price(Side::Short, dec!(200), dec!(5.0)), dec!(190));
    }

    #[test]
    fn offset_rounds_to_six_decimals() {
        let price = offset_price(Side::Long, dec!(0.123456789), dec!(-2.5));
        assert_eq!(price.scale(), 6);
    }

    #[test]
    fn unprotected_position_gets_both_orders() {
        let pos = position(Side::Long, dec!(100), dec!(102), Decimal::ZERO, false);
        let plan = plan_initial_protection(&pos, &settings());
        assert_eq!(plan.stop_loss, Some(dec!(97.5)));
        assert_eq!(plan.take_profit, Some(dec!(107.1)));
    }

    #[test]
    fn fully_protected_position_plans_nothing() {
        let pos = position(Side::Long, dec!(100), dec!(102), dec!(97.5), true);
        let plan = plan_initial_protection(&pos, &settings());
        assert!(plan.is_noop());
        // And re-planning is stable: still a no-op.
        assert!(plan_initial_protection(&pos, &settings()).is_noop());
    }

    #[test]
    fn half_protected_position_plans_the_missing_half() {
        let missing_tp = position(Side::Short, dec!(100), dec!(95), dec!(102.5), false);
        let plan = plan_initial_protection(&missing_tp, &settings());
        assert_eq!(plan.stop_loss, None);
        assert_eq!(plan.take_profit, Some(dec!(90.25)));

        let missing_sl = position(Side::Short, dec!(100), dec!(95), Decimal::ZERO, true);
        let plan = plan_initial_protection(&missing_sl, &settings());
        assert_eq!(plan.stop_loss, Some(dec!(102.5)));
        assert_eq!(plan.take_profit, None);
    }
}
