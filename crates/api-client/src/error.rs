// In crates/api-client/src/error.rs

use thiserror::Error;

/// The explicit failure taxonomy for exchange calls.
///
/// `RequestFailed` is a transport problem, `ApiError` an application-level
/// rejection (non-zero `retCode`). Callers decide per call whether to skip,
/// retry on the next cycle, or abort the cycle; nothing here escapes as a
/// panic.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(#[from] serde_json::Error),
    #[error("Bybit error: retCode {code}, retMsg: {msg}")]
    ApiError { code: i64, msg: String },
}

pub type Result<T> = std::result::Result<T, Error>;
