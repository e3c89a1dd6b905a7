// In crates/engine/src/reconciler.rs

use std::collections::HashMap;

use core_types::{Position, Symbol};

/// The lifecycle classification of one polling cycle: every symbol seen in
/// either generation lands in exactly one bucket.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// In the current generation but not the previous: just opened.
    pub new: Vec<Symbol>,
    /// In both generations.
    pub continuing: Vec<Symbol>,
    /// In the previous generation but not the current: just closed.
    pub closed: Vec<Symbol>,
}

/// Partitions two snapshot generations into new/continuing/closed.
pub fn partition(
    previous: &HashMap<Symbol, Position>,
    current: &HashMap<Symbol, Position>,
) -> SnapshotDiff {
    let mut diff = SnapshotDiff::default();

    for symbol in current.keys() {
        if previous.contains_key(symbol) {
            diff.continuing.push(symbol.clone());
        } else {
            diff.new.push(symbol.clone());
        }
    }
    for symbol in previous.keys() {
        if !current.contains_key(symbol) {
            diff.closed.push(symbol.clone());
        }
    }

    // Deterministic ordering keeps the cycle logs stable.
    diff.new.sort_by(|a, b| a.0.cmp(&b.0));
    diff.continuing.sort_by(|a, b| a.0.cmp(&b.0));
    diff.closed.sort_by(|a, b| a.0.cmp(&b.0));
    diff
}

/// Applies one polled generation to the tracked working set.
///
/// A fetch failure is *not* an empty snapshot: the exchange was
/// unobservable this cycle, which says nothing about whether positions
/// closed. The working set is left untouched and the error is handed back
/// so the loop can apply its backoff; only a successful fetch promotes the
/// generation and produces a diff.
pub fn observe(
    previous: &mut HashMap<Symbol, Position>,
    fetched: api_client::Result<HashMap<Symbol, Position>>,
) -> api_client::Result<SnapshotDiff> {
    let current = fetched?;
    let diff = partition(previous, &current);
    *previous = current;
    Ok(diff)
}
