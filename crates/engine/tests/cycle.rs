// Drives the pure decision seams of the engine through a multi-cycle
// position lifecycle: open unprotected, ratchet while profitable, close.

use std::collections::HashMap;

use core_types::{Position, Side, Symbol};
use engine::protection::{self, ProtectionSettings};
use engine::reconciler;
use engine::trailing::{self, TrailingDecision, TrailingSettings};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn protection_settings() -> ProtectionSettings {
    ProtectionSettings {
        stop_loss_percent: dec!(-2.5),
        take_profit_percent: dec!(5.0),
    }
}

fn trailing_settings() -> TrailingSettings {
    TrailingSettings {
        start_percent: dec!(1.6),
        distance_percent: dec!(0.8),
    }
}

fn long_position(current: Decimal, stop_loss: Decimal, has_tp: bool) -> Position {
    Position {
        symbol: Symbol("BTCUSDT".into()),
        side: Side::Long,
        quantity: dec!(0.01),
        position_idx: 0,
        entry_price: dec!(100),
        stop_loss,
        unrealized_pnl: Decimal::ZERO,
        unrealized_pnl_percent: Decimal::ZERO,
        current_price: current,
        has_take_profit: has_tp,
    }
}

fn snapshot(positions: Vec<Position>) -> HashMap<Symbol, Position> {
    positions
        .into_iter()
        .map(|p| (p.symbol.clone(), p))
        .collect()
}

#[test]
fn position_lifecycle_across_cycles() {
    let mut working_set = HashMap::new();

    // Cycle 1: a fresh unprotected long appears at its entry price.
    let diff = reconciler::observe(
        &mut working_set,
        Ok(snapshot(vec![long_position(dec!(100), Decimal::ZERO, false)])),
    )
    .unwrap();
    assert_eq!(diff.new, vec![Symbol("BTCUSDT".into())]);
    assert!(diff.continuing.is_empty() && diff.closed.is_empty());

    let plan = protection::plan_initial_protection(
        &working_set[&Symbol("BTCUSDT".into())],
        &protection_settings(),
    );
    assert_eq!(plan.stop_loss, Some(dec!(97.5)));
    assert_eq!(plan.take_profit, Some(dec!(105)));

    // Not yet profitable enough to trail.
    assert_eq!(
        trailing::evaluate(&working_set[&Symbol("BTCUSDT".into())], &trailing_settings()),
        TrailingDecision::BelowStart
    );

    // Cycle 2: protection stuck (both orders now resting), price ran to 106.
    let diff = reconciler::observe(
        &mut working_set,
        Ok(snapshot(vec![long_position(dec!(106), dec!(97.5), true)])),
    )
    .unwrap();
    assert_eq!(diff.continuing, vec![Symbol("BTCUSDT".into())]);
    assert!(diff.new.is_empty() && diff.closed.is_empty());

    let position = &working_set[&Symbol("BTCUSDT".into())];
    assert!(
        protection::plan_initial_protection(position, &protection_settings()).is_noop(),
        "re-running initial protection on a protected position must be a no-op"
    );
    assert_eq!(
        trailing::evaluate(position, &trailing_settings()),
        TrailingDecision::Ratchet { candidate: dec!(105.152) }
    );

    // Cycle 3: the exchange was unreachable; nothing may be concluded.
    let failed = Err(api_client::Error::ApiError {
        code: 10006,
        msg: "rate limited".into(),
    });
    assert!(reconciler::observe(&mut working_set, failed).is_err());
    assert!(working_set.contains_key(&Symbol("BTCUSDT".into())));

    // Cycle 4: the position is gone for real.
    let diff = reconciler::observe(&mut working_set, Ok(HashMap::new())).unwrap();
    assert_eq!(diff.closed, vec![Symbol("BTCUSDT".into())]);
    assert!(working_set.is_empty());
}

#[test]
fn unprotected_continuing_position_is_replanned() {
    // A stop-loss placement that failed to stick leaves the position
    // continuing with no resting stop. The next cycle must plan it again
    // from the re-observed exchange state, not treat "already seen" as
    // "already protected".
    let mut working_set = HashMap::new();

    let diff = reconciler::observe(
        &mut working_set,
        Ok(snapshot(vec![long_position(dec!(100), Decimal::ZERO, false)])),
    )
    .unwrap();
    assert_eq!(diff.new, vec![Symbol("BTCUSDT".into())]);

    // Next cycle: the take-profit rested but the stop-loss call failed, so
    // the exchange still reports no stop.
    let diff = reconciler::observe(
        &mut working_set,
        Ok(snapshot(vec![long_position(dec!(100.4), Decimal::ZERO, true)])),
    )
    .unwrap();
    assert_eq!(diff.continuing, vec![Symbol("BTCUSDT".into())]);
    assert!(diff.new.is_empty());

    let position = &working_set[&Symbol("BTCUSDT".into())];
    let plan = protection::plan_initial_protection(position, &protection_settings());
    assert!(!plan.is_noop());
    assert_eq!(plan.stop_loss, Some(dec!(97.5)));
    assert_eq!(plan.take_profit, None, "the resting take-profit must not be duplicated");

    // Below the trailing start, re-planning is the only path back to a stop.
    assert_eq!(
        trailing::evaluate(position, &trailing_settings()),
        TrailingDecision::BelowStart
    );
}

#[test]
fn ratchet_never_loosens_across_a_retreat() {
    // Price runs up, the stop trails it, then price retreats: the stop must
    // hold at its high-water mark while the retreat lasts.
    let settings = trailing_settings();
    let mut stop_loss = Decimal::ZERO;

    for price in [dec!(102), dec!(104), dec!(106), dec!(104), dec!(103)] {
        let position = long_position(price, stop_loss, true);
        match trailing::evaluate(&position, &settings) {
            TrailingDecision::Ratchet { candidate } => {
                assert!(candidate > stop_loss);
                stop_loss = candidate;
            }
            TrailingDecision::Discarded { candidate } => {
                assert!(candidate <= stop_loss);
            }
            TrailingDecision::BelowStart => {}
        }
    }

    // High-water mark from the 106 peak.
    assert_eq!(stop_loss, dec!(105.152));
}
