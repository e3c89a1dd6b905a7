// In crates/api-client/src/lib.rs

use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use serde::de::DeserializeOwned;
use sha2::Sha256;

use app_config::Settings;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

pub mod error;
pub mod live_connector;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use live_connector::LiveConnector;
pub use types::*;

/// The receive window Bybit is told to accept a signed request within, ms.
const RECV_WINDOW: &str = "5000";

impl ApiClient {
    /// Constructs a new ApiClient from the application settings.
    pub fn new(settings: &Settings) -> Self {
        ApiClient {
            http_client: reqwest::Client::new(),
            api_key: settings.bybit_api_key.clone(),
            api_secret: settings.bybit_api_secret.clone(),
            base_url: settings.rest_base_url().to_string(),
        }
    }

    /// Generates the hex HMAC-SHA256 signature for a prepared sign payload.
    fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Sends a signed GET request and decodes the V5 envelope.
    ///
    /// Bybit signs `timestamp + apiKey + recvWindow + queryString` and
    /// carries the signature in headers rather than the query itself.
    async fn signed_get<T: DeserializeOwned + Default>(&self, path: &str, query: &str) -> Result<T> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&format!("{}{}{}{}", timestamp, self.api_key, RECV_WINDOW, query));

        let url = format!("{}{}?{}", self.base_url, path, query);
        let response = self
            .http_client
            .get(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .header("X-BAPI-SIGN", &signature)
            .send()
            .await?;

        let text = response.text().await?;
        let envelope: ApiResponse<T> = serde_json::from_str(&text)?;
        envelope.into_result()
    }

    /// Sends a signed POST request with a JSON body and decodes the envelope.
    /// For POSTs the signed payload is the raw body string.
    async fn signed_post(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let body = body.to_string();
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&format!("{}{}{}{}", timestamp, self.api_key, RECV_WINDOW, body));

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http_client
            .post(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .header("X-BAPI-SIGN", &signature)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let text = response.text().await?;
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_str(&text)?;
        if envelope.ret_code != 0 {
            return Err(Error::ApiError {
                code: envelope.ret_code,
                msg: envelope.ret_msg,
            });
        }
        Ok(())
    }

    /// Fetches all position records for a settlement currency.
    ///
    /// Corresponds to `GET /v5/position/list`. The list includes flat
    /// hedge-mode slots with size 0; filtering is the caller's concern.
    pub async fn get_positions(&self, category: &str, settle_coin: &str) -> Result<Vec<PositionRecord>> {
        let query = format!("category={}&settleCoin={}", category, settle_coin);
        let result: ListResult<PositionRecord> = self.signed_get("/v5/position/list", &query).await?;
        Ok(result.list)
    }

    /// Fetches the open orders for a symbol and hedge-mode slot.
    ///
    /// Corresponds to `GET /v5/order/realtime`.
    pub async fn get_open_orders(
        &self,
        category: &str,
        symbol: &str,
        position_idx: i32,
    ) -> Result<Vec<OrderRecord>> {
        let query = format!(
            "category={}&symbol={}&positionIdx={}",
            category, symbol, position_idx
        );
        let result: ListResult<OrderRecord> = self.signed_get("/v5/order/realtime", &query).await?;
        Ok(result.list)
    }

    /// Sets (or moves) the stop-loss resting on a position.
    ///
    /// Corresponds to `POST /v5/position/trading-stop`.
    pub async fn set_trading_stop(
        &self,
        category: &str,
        symbol: &str,
        position_idx: i32,
        stop_loss: rust_decimal::Decimal,
    ) -> Result<()> {
        let body = serde_json::json!({
            "category": category,
            "symbol": symbol,
            "positionIdx": position_idx,
            "stopLoss": stop_loss.to_string(),
        });
        self.signed_post("/v5/position/trading-stop", body).await
    }

    /// Places a limit order. Corresponds to `POST /v5/order/create`.
    #[allow(clippy::too_many_arguments)]
    pub async fn place_order(
        &self,
        category: &str,
        symbol: &str,
        side: &str,
        order_type: &str,
        qty: rust_decimal::Decimal,
        price: rust_decimal::Decimal,
        position_idx: i32,
        time_in_force: &str,
        reduce_only: bool,
    ) -> Result<()> {
        let body = serde_json::json!({
            "category": category,
            "symbol": symbol,
            "side": side,
            "orderType": order_type,
            "qty": qty.to_string(),
            "price": price.to_string(),
            "positionIdx": position_idx,
            "timeInForce": time_in_force,
            "reduceOnly": reduce_only,
        });
        self.signed_post("/v5/order/create", body).await
    }

    /// Fetches the wallet balance. Used only as a credential probe at
    /// startup; the balance itself is not inspected.
    ///
    /// Corresponds to `GET /v5/account/wallet-balance`.
    pub async fn get_wallet_balance(&self, account_type: &str) -> Result<()> {
        let query = format!("accountType={}", account_type);
        let _: serde_json::Value = self
            .signed_get("/v5/account/wallet-balance", &query)
            .await?;
        Ok(())
    }

    /// Fetches the exchange's clock, in Unix seconds. Public endpoint.
    ///
    /// Corresponds to `GET /v5/market/time`.
    pub async fn get_server_time(&self) -> Result<i64> {
        let url = format!("{}/v5/market/time", self.base_url);
        let response = self.http_client.get(&url).send().await?;
        let text = response.text().await?;
        let envelope: ApiResponse<ServerTime> = serde_json::from_str(&text)?;
        let server_time = envelope.into_result()?;
        Ok(server_time.time_second.to_i64().unwrap_or_default())
    }
}
