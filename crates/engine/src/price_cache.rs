// In crates/engine/src/price_cache.rs

use std::collections::HashMap;

use api_client::TickerUpdate;
use core_types::{PriceQuote, Symbol};
use tokio::sync::Mutex;

/// The process-wide store of latest ticker prices.
///
/// Written by the stream-consumer task, read by the polling loop. The lock
/// is held only for a single map access, never across a network call, so a
/// slow exchange call can never stall price ingestion. Entries are never
/// removed; a quote for a closed position simply goes stale.
#[derive(Debug, Default)]
pub struct PriceCache {
    quotes: Mutex<HashMap<Symbol, PriceQuote>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a ticker update into the cached quote for its symbol.
    ///
    /// Delta frames omit unchanged fields, so only the fields present
    /// overwrite; a first-seen symbol starts from an all-zero quote.
    pub async fn apply(&self, update: &TickerUpdate) {
        if update.symbol.is_empty() {
            return;
        }
        let mut quotes = self.quotes.lock().await;
        let quote = quotes
            .entry(Symbol(update.symbol.clone()))
            .or_default();
        if let Some(last) = update.last_price {
            quote.last = last;
        }
        if let Some(bid) = update.bid_price {
            quote.bid = bid;
        }
        if let Some(ask) = update.ask_price {
            quote.ask = ask;
        }
    }

    /// Returns a copy of the latest quote for a symbol, if any update for
    /// it has ever arrived.
    pub async fn quote(&self, symbol: &Symbol) -> Option<PriceQuote> {
        self.quotes.lock().await.get(symbol).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn update(symbol: &str, last: Option<&str>, bid: Option<&str>, ask: Option<&str>) -> TickerUpdate {
        TickerUpdate {
            symbol: symbol.to_string(),
            last_price: last.map(|v| v.parse().unwrap()),
            bid_price: bid.map(|v| v.parse().unwrap()),
            ask_price: ask.map(|v| v.parse().unwrap()),
        }
    }

    #[tokio::test]
    async fn snapshot_then_delta_merge() {
        let cache = PriceCache::new();
        let btc = Symbol("BTCUSDT".into());

        cache
            .apply(&update("BTCUSDT", Some("100"), Some("99.5"), Some("100.5")))
            .await;
        cache.apply(&update("BTCUSDT", None, Some("99.7"), None)).await;

        let quote = cache.quote(&btc).await.unwrap();
        assert_eq!(quote.last, dec!(100));
        assert_eq!(quote.bid, dec!(99.7));
        assert_eq!(quote.ask, dec!(100.5));
    }

    #[tokio::test]
    async fn unknown_symbol_has_no_quote() {
        let cache = PriceCache::new();
        assert!(cache.quote(&Symbol("ETHUSDT".into())).await.is_none());
    }

    #[tokio::test]
    async fn first_delta_defaults_missing_fields_to_zero() {
        let cache = PriceCache::new();
        cache.apply(&update("ETHUSDT", None, Some("3000"), None)).await;
        let quote = cache.quote(&Symbol("ETHUSDT".into())).await.unwrap();
        assert_eq!(quote.bid, dec!(3000));
        assert!(quote.ask.is_zero());
        assert!(quote.last.is_zero());
    }
}
