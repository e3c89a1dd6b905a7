// In crates/app-config/src/lib.rs

use config::{Config, Environment};

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::Settings;

/// Loads the application settings from environment variables.
///
/// The binary is expected to have loaded `.env` (via `dotenvy`) before
/// calling this, so a local `.env` file and real environment variables are
/// interchangeable. Validation runs before anything touches the network:
/// a bad value here must abort startup, not surface mid-cycle.
pub fn load_settings() -> Result<Settings> {
    let settings = Config::builder()
        .add_source(Environment::default())
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}
