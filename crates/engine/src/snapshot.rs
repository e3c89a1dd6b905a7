// In crates/engine/src/snapshot.rs

use std::collections::HashMap;
use std::sync::Arc;

use api_client::{ApiClient, OrderRecord};
use core_types::{Position, Side, Symbol};
use rust_decimal::Decimal;

use crate::price_cache::PriceCache;
use crate::{CATEGORY, SETTLE_COIN};

/// Builds the authoritative per-cycle position snapshot: the exchange's
/// position list, enriched with the cache price and the take-profit flag.
pub struct PositionFetcher {
    api: ApiClient,
    price_cache: Arc<PriceCache>,
}

impl PositionFetcher {
    pub fn new(api: ApiClient, price_cache: Arc<PriceCache>) -> Self {
        Self { api, price_cache }
    }

    /// Fetches all open positions with non-zero size, keyed by symbol.
    ///
    /// A failure of the position query itself propagates: an unobservable
    /// snapshot must stay distinguishable from "no positions exist". A
    /// failed open-order lookup for a single symbol degrades to
    /// `has_take_profit = false` (the worst it causes is a redundant
    /// take-profit attempt that the exchange rejects or that replaces a
    /// missing order).
    pub async fn fetch_active_positions(&self) -> api_client::Result<HashMap<Symbol, Position>> {
        let records = self.api.get_positions(CATEGORY, SETTLE_COIN).await?;

        let mut positions = HashMap::new();
        for record in records {
            if record.size <= Decimal::ZERO || record.symbol.is_empty() {
                continue;
            }
            let Some(side) = Side::from_bybit(&record.side) else {
                continue;
            };
            let symbol = Symbol(record.symbol.clone());

            let current_price = self
                .resolve_current_price(&symbol, side, record.avg_price)
                .await;
            let has_take_profit = self
                .has_take_profit(&symbol, record.position_idx, side)
                .await;
            let unrealized_pnl_percent =
                Position::pnl_percent(record.avg_price, record.size, record.unrealised_pnl);

            positions.insert(
                symbol.clone(),
                Position {
                    symbol,
                    side,
                    quantity: record.size,
                    position_idx: record.position_idx,
                    entry_price: record.avg_price,
                    stop_loss: record.stop_loss,
                    unrealized_pnl: record.unrealised_pnl,
                    unrealized_pnl_percent,
                    current_price,
                    has_take_profit,
                },
            );
        }

        Ok(positions)
    }

    /// The price the position would close at: ask for Long, bid for Short.
    /// Falls back to the entry price when no usable quote has arrived yet.
    async fn resolve_current_price(&self, symbol: &Symbol, side: Side, entry_price: Decimal) -> Decimal {
        match self.price_cache.quote(symbol).await {
            Some(quote) => {
                let price = match side {
                    Side::Long => quote.ask,
                    Side::Short => quote.bid,
                };
                if price > Decimal::ZERO { price } else { entry_price }
            }
            None => entry_price,
        }
    }

    async fn has_take_profit(&self, symbol: &Symbol, position_idx: i32, side: Side) -> bool {
        match self.api.get_open_orders(CATEGORY, &symbol.0, position_idx).await {
            Ok(orders) => any_reduce_only_closing(&orders, side),
            Err(e) => {
                tracing::debug!(symbol = %symbol, error = %e, "Error checking take-profit orders.");
                false
            }
        }
    }
}

/// Whether any open order reduces the position from the closing side,
/// i.e. an existing take-profit (or any other protective reduce-only order).
fn any_reduce_only_closing(orders: &[OrderRecord], side: Side) -> bool {
    orders
        .iter()
        .any(|order| order.side == side.closing_order_side() && order.reduce_only)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: &str, reduce_only: bool) -> OrderRecord {
        OrderRecord {
            symbol: "BTCUSDT".into(),
            side: side.into(),
            reduce_only,
        }
    }

    #[test]
    fn reduce_only_opposite_side_counts_as_take_profit() {
        let orders = vec![order("Sell", true)];
        assert!(any_reduce_only_closing(&orders, Side::Long));
        assert!(!any_reduce_only_closing(&orders, Side::Short));
    }

    #[test]
    fn non_reduce_only_orders_do_not_count() {
        let orders = vec![order("Sell", false), order("Buy", false)];
        assert!(!any_reduce_only_closing(&orders, Side::Long));
        assert!(!any_reduce_only_closing(&orders, Side::Short));
    }

    #[test]
    fn no_orders_means_no_take_profit() {
        assert!(!any_reduce_only_closing(&[], Side::Long));
    }
}
