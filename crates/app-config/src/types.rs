// In crates/app-config/src/types.rs

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::{Error, Result};

const MAINNET_REST_URL: &str = "https://api.bybit.com";
const TESTNET_REST_URL: &str = "https://api-testnet.bybit.com";
const MAINNET_WS_URL: &str = "wss://stream.bybit.com/v5/public/linear";
const TESTNET_WS_URL: &str = "wss://stream-testnet.bybit.com/v5/public/linear";

/// All runtime settings, sourced from the environment.
///
/// Field names map 1:1 onto the environment variables the `config` crate
/// lowercases (`BYBIT_API_KEY` -> `bybit_api_key`, and so on).
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The API key for Bybit.
    #[serde(default)]
    pub bybit_api_key: String,
    /// The API secret for Bybit.
    #[serde(default)]
    pub bybit_api_secret: String,
    /// Take-profit offset from the current price, in percent (> 0).
    #[serde(default = "default_take_profit_percent")]
    pub take_profit_percent: Decimal,
    /// Stop-loss offset from the entry price, in percent (< 0).
    #[serde(default = "default_stop_loss_percent")]
    pub stop_loss_percent: Decimal,
    /// Favorable move from entry, in percent, at which trailing starts (> 0).
    #[serde(default = "default_trailing_start_percent")]
    pub trailing_start_percent: Decimal,
    /// Distance the trailed stop keeps from the current price, in percent (> 0).
    #[serde(default = "default_trailing_distance_percent")]
    pub trailing_distance_percent: Decimal,
    /// Directory the log file is written to.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    /// Whether to run against the Bybit testnet.
    #[serde(default)]
    pub bybit_testnet: bool,
}

fn default_take_profit_percent() -> Decimal {
    dec!(5.0)
}

fn default_stop_loss_percent() -> Decimal {
    dec!(-2.5)
}

fn default_trailing_start_percent() -> Decimal {
    dec!(1.6)
}

fn default_trailing_distance_percent() -> Decimal {
    dec!(0.8)
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Settings {
    /// Checks every startup invariant, returning a descriptive error for
    /// the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.bybit_api_key.trim().is_empty() || self.bybit_api_secret.trim().is_empty() {
            return Err(Error::Invalid(
                "BYBIT_API_KEY/BYBIT_API_SECRET are not set. Create .env and provide your keys."
                    .to_string(),
            ));
        }
        if self.take_profit_percent <= Decimal::ZERO {
            return Err(Error::Invalid("TAKE_PROFIT_PERCENT must be > 0".to_string()));
        }
        if self.stop_loss_percent >= Decimal::ZERO {
            return Err(Error::Invalid(
                "STOP_LOSS_PERCENT must be < 0 (e.g., -2.5)".to_string(),
            ));
        }
        if self.trailing_start_percent <= Decimal::ZERO {
            return Err(Error::Invalid("TRAILING_START_PERCENT must be > 0".to_string()));
        }
        if self.trailing_distance_percent <= Decimal::ZERO {
            return Err(Error::Invalid(
                "TRAILING_DISTANCE_PERCENT must be > 0".to_string(),
            ));
        }
        if self.log_dir.trim().is_empty() {
            return Err(Error::Invalid("LOG_DIR must not be empty".to_string()));
        }
        Ok(())
    }

    /// The REST base URL for the configured network.
    pub fn rest_base_url(&self) -> &'static str {
        if self.bybit_testnet {
            TESTNET_REST_URL
        } else {
            MAINNET_REST_URL
        }
    }

    /// The public linear WebSocket URL for the configured network.
    pub fn ws_url(&self) -> &'static str {
        if self.bybit_testnet {
            TESTNET_WS_URL
        } else {
            MAINNET_WS_URL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            bybit_api_key: "key".to_string(),
            bybit_api_secret: "secret".to_string(),
            take_profit_percent: default_take_profit_percent(),
            stop_loss_percent: default_stop_loss_percent(),
            trailing_start_percent: default_trailing_start_percent(),
            trailing_distance_percent: default_trailing_distance_percent(),
            log_dir: default_log_dir(),
            bybit_testnet: false,
        }
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn missing_credentials_rejected() {
        let mut s = valid_settings();
        s.bybit_api_key = "  ".to_string();
        assert!(s.validate().is_err());
    }

    #[test]
    fn take_profit_must_be_positive() {
        let mut s = valid_settings();
        s.take_profit_percent = Decimal::ZERO;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("TAKE_PROFIT_PERCENT"));
    }

    #[test]
    fn stop_loss_must_be_negative() {
        let mut s = valid_settings();
        s.stop_loss_percent = dec!(2.5);
        assert!(s.validate().is_err());
    }

    #[test]
    fn trailing_percents_must_be_positive() {
        let mut s = valid_settings();
        s.trailing_start_percent = dec!(-1);
        assert!(s.validate().is_err());

        let mut s = valid_settings();
        s.trailing_distance_percent = Decimal::ZERO;
        assert!(s.validate().is_err());
    }

    #[test]
    fn network_selector_switches_urls() {
        let mut s = valid_settings();
        assert!(s.rest_base_url().contains("api.bybit.com"));
        s.bybit_testnet = true;
        assert!(s.rest_base_url().contains("testnet"));
        assert!(s.ws_url().contains("testnet"));
    }
}
