//! Observability
//!
//! Structured logging through `tracing`. Application code uses the standard
//! `tracing` macros and [`security_event!`] and does not know which output
//! format is configured.
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::observability::{self, ObservabilityConfig};
//!
//! observability::init(&ObservabilityConfig::from_env())?;
//! ```

mod config;
mod events;
mod providers;

pub use config::{LogFormat, ObservabilityConfig, ObservabilityConfigBuilder};
pub use events::{security_event, SecurityEvent, Severity};

use thiserror::Error;
use tracing::info;

/// Install the global tracing subscriber.
///
/// Call once at startup, before any logging occurs. A second call fails
/// with [`ObservabilityError::Provider`].
pub fn init(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    providers::init_tracing(config)?;

    info!(
        log_format = %config.log_format,
        log_filter = %config.log_filter,
        "Observability initialized"
    );

    Ok(())
}

/// Observability initialization errors
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// Invalid configuration
    #[error("Observability config error: {0}")]
    Config(String),
    /// Subscriber installation failed
    #[error("Provider error: {0}")]
    Provider(String),
}
