// In crates/api-client/src/types.rs

use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// The main client for interacting with the Bybit V5 API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The persistent HTTP client.
    pub http_client: Client,
    /// The user's Bybit API key.
    pub api_key: String,
    /// The user's Bybit API secret.
    pub api_secret: String,
    /// The base URL for the Bybit REST API.
    pub base_url: String,
}

/// The `{retCode, retMsg, result}` envelope every V5 response is wrapped in.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg", default)]
    pub ret_msg: String,
    #[serde(default = "none")]
    pub result: Option<T>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T: Default> ApiResponse<T> {
    /// Unwraps the envelope, mapping a non-zero `retCode` to `ApiError`.
    pub fn into_result(self) -> Result<T> {
        if self.ret_code != 0 {
            return Err(Error::ApiError {
                code: self.ret_code,
                msg: self.ret_msg,
            });
        }
        Ok(self.result.unwrap_or_default())
    }
}

/// Bybit serialises numbers as strings and unset prices as `""`.
pub(crate) fn decimal_or_zero<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.trim();
    if s.is_empty() {
        return Ok(Decimal::ZERO);
    }
    s.parse().map_err(serde::de::Error::custom)
}

/// As `decimal_or_zero`, but keeps "absent" distinguishable. Ticker delta
/// frames omit unchanged fields entirely and may carry empty strings.
pub(crate) fn opt_decimal<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// A container for list-shaped `result` payloads.
#[derive(Debug, Deserialize)]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

// Derived `Default` would demand `T: Default`; the empty list needs no such
// bound.
impl<T> Default for ListResult<T> {
    fn default() -> Self {
        Self { list: Vec::new() }
    }
}

/// One row of `GET /v5/position/list`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub symbol: String,
    /// Position size; `"0"` for a flat hedge-mode slot.
    #[serde(deserialize_with = "decimal_or_zero")]
    pub size: Decimal,
    /// Hedge-mode slot (0 = one-way, 1 = hedge long, 2 = hedge short).
    #[serde(rename = "positionIdx", default)]
    pub position_idx: i32,
    /// "Buy", "Sell", or "" when flat.
    #[serde(default)]
    pub side: String,
    #[serde(rename = "avgPrice", deserialize_with = "decimal_or_zero", default)]
    pub avg_price: Decimal,
    /// The resting stop-loss price; `""` when none is set.
    #[serde(rename = "stopLoss", deserialize_with = "decimal_or_zero", default)]
    pub stop_loss: Decimal,
    #[serde(rename = "unrealisedPnl", deserialize_with = "decimal_or_zero", default)]
    pub unrealised_pnl: Decimal,
}

/// One row of `GET /v5/order/realtime`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub side: String,
    #[serde(rename = "reduceOnly", default)]
    pub reduce_only: bool,
}

/// The `result` of `GET /v5/market/time`.
#[derive(Debug, Default, Deserialize)]
pub struct ServerTime {
    /// Unix seconds, serialised as a string.
    #[serde(rename = "timeSecond", deserialize_with = "decimal_or_zero", default)]
    pub time_second: Decimal,
}

/// A parsed ticker update from the public WebSocket.
///
/// Snapshot frames carry every field; delta frames only what changed, so
/// prices are optional and the consumer merges them into its cache.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerUpdate {
    pub symbol: String,
    #[serde(rename = "lastPrice", deserialize_with = "opt_decimal", default)]
    pub last_price: Option<Decimal>,
    #[serde(rename = "bid1Price", deserialize_with = "opt_decimal", default)]
    pub bid_price: Option<Decimal>,
    #[serde(rename = "ask1Price", deserialize_with = "opt_decimal", default)]
    pub ask_price: Option<Decimal>,
}

/// The wire envelope of a public WebSocket frame.
#[derive(Debug, Deserialize)]
pub(crate) struct WsEnvelope {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "none")]
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn position_record_with_empty_stop_loss() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "size": "0.01",
            "positionIdx": 0,
            "side": "Buy",
            "avgPrice": "50000",
            "stopLoss": "",
            "unrealisedPnl": "25"
        }"#;
        let record: PositionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.size, dec!(0.01));
        assert_eq!(record.stop_loss, Decimal::ZERO);
        assert_eq!(record.unrealised_pnl, dec!(25));
    }

    #[test]
    fn envelope_maps_ret_code_to_error() {
        let json = r#"{"retCode": 10003, "retMsg": "API key is invalid.", "result": {}}"#;
        let resp: ApiResponse<ListResult<PositionRecord>> = serde_json::from_str(json).unwrap();
        match resp.into_result() {
            Err(crate::Error::ApiError { code, msg }) => {
                assert_eq!(code, 10003);
                assert!(msg.contains("invalid"));
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn envelope_ok_with_missing_list() {
        let json = r#"{"retCode": 0, "retMsg": "OK", "result": {}}"#;
        let resp: ApiResponse<ListResult<OrderRecord>> = serde_json::from_str(json).unwrap();
        assert!(resp.into_result().unwrap().list.is_empty());
    }

    #[test]
    fn ticker_delta_omits_fields() {
        let json = r#"{"symbol": "ETHUSDT", "bid1Price": "2999.5"}"#;
        let update: TickerUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.bid_price, Some(dec!(2999.5)));
        assert_eq!(update.ask_price, None);
        assert_eq!(update.last_price, None);
    }

    #[test]
    fn ticker_empty_string_price_is_absent() {
        let json = r#"{"symbol": "ETHUSDT", "lastPrice": ""}"#;
        let update: TickerUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.last_price, None);
    }
}
