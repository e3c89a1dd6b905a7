// In crates/engine/src/subscriptions.rs

use std::collections::HashSet;

use core_types::Symbol;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Tracks which symbols have an active ticker subscription and forwards new
/// ones to the WebSocket connector task.
///
/// The set only grows for the life of the process: subscriptions are not
/// torn down when a position closes. Insertion is idempotent, and the
/// set-guarded check makes concurrent callers race-free.
#[derive(Debug)]
pub struct SubscriptionManager {
    subscribed: Mutex<HashSet<Symbol>>,
    subscribe_tx: UnboundedSender<Symbol>,
}

impl SubscriptionManager {
    pub fn new(subscribe_tx: UnboundedSender<Symbol>) -> Self {
        Self {
            subscribed: Mutex::new(HashSet::new()),
            subscribe_tx,
        }
    }

    /// Subscribes the symbol's ticker topic unless it already is.
    ///
    /// The symbol is recorded only after a successful hand-off to the
    /// connector task; a failed hand-off leaves it unrecorded so a later
    /// cycle retries.
    pub async fn ensure_subscribed(&self, symbol: &Symbol) {
        let mut subscribed = self.subscribed.lock().await;
        if subscribed.contains(symbol) {
            return;
        }
        match self.subscribe_tx.send(symbol.clone()) {
            Ok(()) => {
                subscribed.insert(symbol.clone());
            }
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "Error subscribing to tickers.");
            }
        }
    }

    /// The number of symbols handed to the connector so far.
    pub async fn len(&self) -> usize {
        self.subscribed.lock().await.len()
    }
}
