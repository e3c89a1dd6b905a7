// In crates/engine/src/trailing.rs

use app_config::Settings;
use core_types::{Position, Side};
use rust_decimal::Decimal;

use crate::PRICE_DP;

/// Trailing-stop parameters, both in percent and both positive.
#[derive(Debug, Clone, Copy)]
pub struct TrailingSettings {
    /// Favorable move from entry at which trailing activates.
    pub start_percent: Decimal,
    /// Distance the trailed stop keeps from the current price.
    pub distance_percent: Decimal,
}

impl From<&Settings> for TrailingSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            start_percent: settings.trailing_start_percent,
            distance_percent: settings.trailing_distance_percent,
        }
    }
}

/// The per-position trailing state, re-derived every cycle from what the
/// exchange reports. Nothing is cached across cycles, so a restart
/// re-derives identical decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrailingDecision {
    /// The favorable move has not reached the start threshold.
    BelowStart,
    /// Triggered, but the candidate would loosen protection; dropped.
    Discarded { candidate: Decimal },
    /// Move the stop-loss to this strictly more protective price.
    Ratchet { candidate: Decimal },
}

/// Signed favorable move from entry, in percent. Positive means the
/// position is in profit regardless of side. `None` when the entry price
/// is non-positive (nothing sane can be derived from such a record).
pub fn price_change_percent(side: Side, entry_price: Decimal, current_price: Decimal) -> Option<Decimal> {
    if entry_price <= Decimal::ZERO {
        return None;
    }
    let change = match side {
        Side::Long => (current_price - entry_price) / entry_price,
        Side::Short => (entry_price - current_price) / entry_price,
    };
    Some(change * Decimal::ONE_HUNDRED)
}

/// Evaluates the trailing ratchet for one position.
///
/// The ratchet is one-directional: a Long stop-loss only ever moves up, a
/// Short stop-loss only ever moves down (or is set for the first time).
/// Any candidate that would loosen protection is discarded, never issued.
pub fn evaluate(position: &Position, settings: &TrailingSettings) -> TrailingDecision {
    let Some(change) = price_change_percent(position.side, position.entry_price, position.current_price)
    else {
        return TrailingDecision::BelowStart;
    };

    if change < settings.start_percent {
        return TrailingDecision::BelowStart;
    }

    let distance = settings.distance_percent / Decimal::ONE_HUNDRED;
    let factor = match position.side {
        Side::Long => Decimal::ONE - distance,
        Side::Short => Decimal::ONE + distance,
    };
    let candidate = (position.current_price * factor).round_dp(PRICE_DP);

    let tightens = match position.side {
        Side::Long => candidate > position.stop_loss,
        Side::Short => position.stop_loss.is_zero() || candidate < position.stop_loss,
    };

    if tightens {
        TrailingDecision::Ratchet { candidate }
    } else {
        TrailingDecision::Discarded { candidate }
    }
}
