// In crates/core-types/src/lib.rs

pub mod types;

// Re-export the most important types for easy access from other crates.
pub use types::{Position, PriceQuote, Side, Symbol};
