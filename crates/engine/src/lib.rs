// In crates/engine/src/lib.rs

pub mod price_cache;
pub mod protection;
pub mod reconciler;
pub mod snapshot;
pub mod subscriptions;
pub mod trailing;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use api_client::ApiClient;
use app_config::Settings;
use core_types::{Position, Symbol};

use crate::price_cache::PriceCache;
use crate::protection::ProtectionSettings;
use crate::snapshot::PositionFetcher;
use crate::subscriptions::SubscriptionManager;
use crate::trailing::{TrailingDecision, TrailingSettings};

/// Bybit product category for USDT perpetuals.
pub const CATEGORY: &str = "linear";
/// Settlement currency the position list is filtered by.
pub const SETTLE_COIN: &str = "USDT";
/// Exchange price precision used for every computed price.
pub const PRICE_DP: u32 = 6;

/// Nominal polling period of the reconciliation loop.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Delay after a failed cycle. Fixed two-tier backoff, not exponential.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// The reconciliation engine: polls position state, diffs it against the
/// previous generation, and drives protective order placement and the
/// trailing ratchet.
///
/// All decisions are derived from exchange-reported state each cycle, so
/// the loop is idempotent and crash-safe: a restart re-derives the same
/// actions from the same observations.
pub struct Engine {
    api: ApiClient,
    fetcher: PositionFetcher,
    subscriptions: Arc<SubscriptionManager>,
    protection: ProtectionSettings,
    trailing: TrailingSettings,
    /// The previous snapshot generation, keyed by symbol.
    previous: HashMap<Symbol, Position>,
}

impl Engine {
    pub fn new(
        api: ApiClient,
        settings: &Settings,
        price_cache: Arc<PriceCache>,
        subscriptions: Arc<SubscriptionManager>,
    ) -> Self {
        Self {
            fetcher: PositionFetcher::new(api.clone(), price_cache),
            api,
            subscriptions,
            protection: ProtectionSettings::from(settings),
            trailing: TrailingSettings::from(settings),
            previous: HashMap::new(),
        }
    }

    /// The main polling loop. Runs for the life of the process: a failed
    /// cycle is logged and followed by the longer backoff delay, never a
    /// shutdown.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Starting reconciliation loop.");
        loop {
            let delay = match self.cycle().await {
                Ok(()) => POLL_INTERVAL,
                Err(e) => {
                    tracing::error!(error = %e, "Reconciliation cycle failed.");
                    ERROR_BACKOFF
                }
            };
            tokio::time::sleep(delay).await;
        }
    }

    /// One reconciliation pass: fetch, diff, protect, trail, promote.
    async fn cycle(&mut self) -> Result<()> {
        let fetched = self.fetcher.fetch_active_positions().await;
        let diff = reconciler::observe(&mut self.previous, fetched)?;

        if !diff.new.is_empty() {
            tracing::info!(symbols = %join_symbols(&diff.new), "New active symbols.");
        }

        // Protection, subscription, and the ratchet all run over the whole
        // current generation, not just the newly observed symbols. Each is
        // idempotent against exchange state, and that is what makes retry
        // emergent: a placement that failed last cycle is re-planned here
        // until the exchange confirms it, and a position can cross the
        // trailing threshold in the same cycle it is first observed.
        let current: Vec<Position> = self.previous.values().cloned().collect();
        for position in &current {
            self.place_initial_protection(position).await;
            self.subscriptions.ensure_subscribed(&position.symbol).await;
            self.apply_trailing(position).await;
        }

        if !diff.closed.is_empty() {
            tracing::info!(symbols = %join_symbols(&diff.closed), "Closed symbols.");
        }

        Ok(())
    }

    /// Issues the protective orders a freshly observed position is missing.
    ///
    /// The stop-loss and take-profit calls are independent: a failure of
    /// one is logged and does not block the other, and nothing is retried
    /// within the cycle. The next poll re-observes whatever is still
    /// missing.
    async fn place_initial_protection(&self, position: &Position) {
        let plan = protection::plan_initial_protection(position, &self.protection);
        if plan.is_noop() {
            tracing::debug!(symbol = %position.symbol, "Position already fully protected.");
            return;
        }

        if let Some(stop_loss) = plan.stop_loss {
            match self
                .api
                .set_trading_stop(CATEGORY, &position.symbol.0, position.position_idx, stop_loss)
                .await
            {
                Ok(()) => tracing::info!(
                    symbol = %position.symbol,
                    stop_loss = %stop_loss,
                    percent = %self.protection.stop_loss_percent,
                    entry_price = %position.entry_price,
                    "Stop-loss set."
                ),
                Err(e) => tracing::error!(
                    symbol = %position.symbol,
                    error = %e,
                    "Failed to set stop-loss."
                ),
            }
        }

        if let Some(take_profit) = plan.take_profit {
            match self
                .api
                .place_order(
                    CATEGORY,
                    &position.symbol.0,
                    position.side.closing_order_side(),
                    "Limit",
                    position.quantity,
                    take_profit,
                    position.position_idx,
                    "GTC",
                    true,
                )
                .await
            {
                Ok(()) => tracing::info!(
                    symbol = %position.symbol,
                    take_profit = %take_profit,
                    percent = %self.protection.take_profit_percent,
                    current_price = %position.current_price,
                    "Take-profit placed."
                ),
                Err(e) => tracing::error!(
                    symbol = %position.symbol,
                    error = %e,
                    "Failed to place take-profit."
                ),
            }
        }
    }

    /// Evaluates the trailing ratchet for one position and issues the
    /// single stop-loss modify when it tightens protection.
    async fn apply_trailing(&self, position: &Position) {
        match trailing::evaluate(position, &self.trailing) {
            TrailingDecision::BelowStart => {}
            TrailingDecision::Discarded { candidate } => {
                tracing::debug!(
                    symbol = %position.symbol,
                    candidate = %candidate,
                    current_stop = %position.stop_loss,
                    "Trailing candidate discarded; it would loosen protection."
                );
            }
            TrailingDecision::Ratchet { candidate } => {
                match self
                    .api
                    .set_trading_stop(CATEGORY, &position.symbol.0, position.position_idx, candidate)
                    .await
                {
                    Ok(()) => tracing::info!(
                        symbol = %position.symbol,
                        side = ?position.side,
                        old_stop = %position.stop_loss,
                        new_stop = %candidate,
                        distance_percent = %self.trailing.distance_percent,
                        "Stop-loss trailed."
                    ),
                    Err(e) => tracing::error!(
                        symbol = %position.symbol,
                        error = %e,
                        "Failed to update stop-loss."
                    ),
                }
            }
        }
    }
}

fn join_symbols(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(|s| s.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
