// In app/src/main.rs

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use api_client::{ApiClient, LiveConnector};
use app_config::Settings;
use chrono::Utc;
use core_types::Symbol;
use engine::Engine;
use engine::price_cache::PriceCache;
use engine::subscriptions::SubscriptionManager;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;

/// Watched when no position is open yet, so the price cache is warm the
/// moment one appears on a major pair.
const DEFAULT_SYMBOLS: &[&str] = &["BTCUSDT", "ETHUSDT"];

/// Clock drift beyond this makes signed requests fail their recv window.
const MAX_CLOCK_DRIFT_SECS: i64 = 60;

const LOG_FILE_NAME: &str = "protector.log";

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    // Configuration problems must abort before any network activity, and
    // before tracing exists (the log directory itself is configuration).
    let settings = match app_config::load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&settings.log_dir)?;

    tracing::info!("Bot settings:");
    tracing::info!("  Take-profit: {}% of current price", settings.take_profit_percent);
    tracing::info!("  Stop-loss: {}% of entry price", settings.stop_loss_percent);
    tracing::info!("  Trailing start: {}%", settings.trailing_start_percent);
    tracing::info!("  Trailing distance: {}%", settings.trailing_distance_percent);

    let api = ApiClient::new(&settings);

    check_clock_drift(&api).await;
    verify_api_access(&api).await;

    // --- Shared state and the roles that own it ---
    let price_cache = Arc::new(PriceCache::new());
    let (subscribe_tx, subscribe_rx) = mpsc::unbounded_channel();
    let subscriptions = Arc::new(SubscriptionManager::new(subscribe_tx));

    // Subscribe tickers for positions that already exist at startup, or a
    // default watch-list when flat.
    let initial_symbols = initial_symbols(&api, &price_cache).await;
    for symbol in &initial_symbols {
        subscriptions.ensure_subscribed(symbol).await;
    }

    // --- Price-stream role ---
    let connector = LiveConnector::new(settings.ws_url());
    let stream_cache = price_cache.clone();
    tokio::spawn(async move {
        let stream = connector.ticker_updates(subscribe_rx);
        let mut stream = Box::pin(stream);
        while let Some(update) = stream.next().await {
            match update {
                Ok(update) => stream_cache.apply(&update).await,
                Err(e) => tracing::error!(error = %e, "Error handling price update."),
            }
        }
    });

    // --- Polling role ---
    let protector = Engine::new(api, &settings, price_cache, subscriptions);
    tokio::spawn(protector.run());

    tracing::info!("Bot started. Using public WebSocket for prices and HTTP API for positions.");
    tracing::info!("Press Ctrl+C to stop...");

    // The supervisory task only blocks for the shutdown signal. Background
    // tasks are not joined: in-flight exchange calls are abandoned, which
    // is safe because every decision is re-derived from exchange state.
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received. Exiting...");

    Ok(())
}

/// Stdout plus an ANSI-free append-only file under the configured log
/// directory, both filtered by `RUST_LOG` (default `info`).
fn init_tracing(log_dir: &str) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(Path::new(log_dir).join(LOG_FILE_NAME))?;

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(filter());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(filter());

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Warns when the local clock has drifted far enough from the exchange's
/// to break request signatures. Best-effort: failure to read the server
/// time is itself only a warning.
async fn check_clock_drift(api: &ApiClient) {
    match api.get_server_time().await {
        Ok(server_secs) if server_secs > 0 => {
            let drift = (server_secs - Utc::now().timestamp()).abs();
            if drift > MAX_CLOCK_DRIFT_SECS {
                tracing::warn!(
                    drift_secs = drift,
                    "System time differs from the exchange. Synchronize your clock; signed requests may be rejected."
                );
            } else {
                tracing::info!(drift_secs = drift, "System time synchronized with the exchange.");
            }
        }
        Ok(_) => tracing::debug!("Could not parse server time response."),
        Err(e) => tracing::warn!(error = %e, "Could not check server time."),
    }
}

/// Probes the credentials with a wallet-balance call, logging targeted
/// diagnostics for the common key problems. The bot still starts either
/// way; every later call fails just as loudly.
async fn verify_api_access(api: &ApiClient) {
    match api.get_wallet_balance("UNIFIED").await {
        Ok(()) => tracing::info!("API access verified."),
        Err(api_client::Error::ApiError { code: 10003, .. }) => {
            tracing::error!("Invalid API key. Please check your API keys in .env");
        }
        Err(api_client::Error::ApiError { code: 10004, .. }) => {
            tracing::error!("API key does not have the required permissions.");
        }
        Err(e) => tracing::warn!(error = %e, "Could not verify API access."),
    }
}

/// The symbols to stream from the start: every currently open position, or
/// the default watch-list when there are none (or the fetch failed).
async fn initial_symbols(api: &ApiClient, price_cache: &Arc<PriceCache>) -> Vec<Symbol> {
    tracing::info!("Initializing existing positions...");
    let fetcher = engine::snapshot::PositionFetcher::new(api.clone(), price_cache.clone());

    let positions = match fetcher.fetch_active_positions().await {
        Ok(positions) => positions,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize positions.");
            Default::default()
        }
    };

    if positions.is_empty() {
        tracing::info!(
            symbols = %DEFAULT_SYMBOLS.join(", "),
            "No active positions found. Subscribing to default symbols."
        );
        return DEFAULT_SYMBOLS.iter().map(|s| Symbol((*s).to_string())).collect();
    }

    for position in positions.values() {
        tracing::info!(symbol = %position.symbol, side = ?position.side, "Found active position.");
    }
    positions.keys().cloned().collect()
}
