// In crates/api-client/src/live_connector.rs

use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::Result;
use crate::types::{TickerUpdate, WsEnvelope};
use core_types::Symbol;

/// How long to wait before re-dialling a failed or closed connection.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Bybit drops public connections without an application-level ping.
const PING_INTERVAL: Duration = Duration::from_secs(20);

/// A connector for the public Bybit ticker stream.
#[derive(Clone)]
pub struct LiveConnector {
    ws_url: String,
}

impl LiveConnector {
    pub fn new(ws_url: &str) -> Self {
        Self {
            ws_url: ws_url.to_string(),
        }
    }

    /// Opens the public WebSocket and yields ticker updates indefinitely.
    ///
    /// Symbols to watch arrive at runtime over `subscribe_rx`; each is
    /// subscribed as a `tickers.<SYMBOL>` topic and remembered so the full
    /// set is replayed after a reconnect. The stream itself never ends:
    /// connection failures back off and re-dial, keeping the accumulated
    /// subscription list.
    pub fn ticker_updates(
        self,
        mut subscribe_rx: UnboundedReceiver<Symbol>,
    ) -> impl Stream<Item = Result<TickerUpdate>> {
        stream! {
            let mut symbols: Vec<Symbol> = Vec::new();
            loop {
                tracing::info!(url = %self.ws_url, "Connecting to ticker WebSocket...");
                let (ws_stream, _) = match connect_async(&self.ws_url).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!(error = %e, "WebSocket connection failed. Retrying in 5s...");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        continue;
                    }
                };
                tracing::info!("Ticker WebSocket connection successful.");

                let (mut write, mut read) = ws_stream.split();

                // Replay every subscription accumulated so far.
                if !symbols.is_empty() {
                    if let Err(e) = write.send(subscribe_message(&symbols)).await {
                        tracing::error!(error = %e, "Failed to resubscribe after reconnect.");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        continue;
                    }
                    tracing::info!(count = symbols.len(), "Resubscribed ticker topics.");
                }

                let mut ping = tokio::time::interval(PING_INTERVAL);

                loop {
                    tokio::select! {
                        message = read.next() => {
                            match message {
                                Some(Ok(msg)) => {
                                    if let Ok(text) = msg.to_text() {
                                        if let Some(update) = parse_ticker_frame(text) {
                                            yield Ok(update);
                                        }
                                    }
                                }
                                Some(Err(e)) => {
                                    tracing::warn!(error = %e, "Error reading from WebSocket. Reconnecting...");
                                    break;
                                }
                                None => {
                                    tracing::warn!("Ticker WebSocket closed by peer. Reconnecting...");
                                    break;
                                }
                            }
                        }
                        Some(symbol) = subscribe_rx.recv() => {
                            if !symbols.contains(&symbol) {
                                if let Err(e) = write.send(subscribe_message(std::slice::from_ref(&symbol))).await {
                                    tracing::warn!(symbol = %symbol, error = %e, "Subscribe failed. Reconnecting...");
                                    symbols.push(symbol);
                                    break;
                                }
                                tracing::info!(symbol = %symbol, "Subscribed to tickers.");
                                symbols.push(symbol);
                            }
                        }
                        _ = ping.tick() => {
                            if let Err(e) = write.send(Message::text(r#"{"op":"ping"}"#)).await {
                                tracing::warn!(error = %e, "Ping failed. Reconnecting...");
                                break;
                            }
                        }
                    }
                }

                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Builds a `{"op":"subscribe","args":["tickers.SYM", ...]}` frame.
fn subscribe_message(symbols: &[Symbol]) -> Message {
    let args: Vec<String> = symbols.iter().map(|s| format!("tickers.{}", s.0)).collect();
    let payload = serde_json::json!({ "op": "subscribe", "args": args });
    Message::text(payload.to_string())
}

/// Extracts a ticker update from a raw frame, skipping op acks, pongs, and
/// unknown topics.
fn parse_ticker_frame(text: &str) -> Option<TickerUpdate> {
    let envelope: WsEnvelope = serde_json::from_str(text).ok()?;
    if !envelope.topic.starts_with("tickers.") {
        return None;
    }
    let data = envelope.data?;
    serde_json::from_value(data).ok()
}
