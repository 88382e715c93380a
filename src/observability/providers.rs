//! Subscriber setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::{LogFormat, ObservabilityConfig, ObservabilityError};

/// Build the filter and formatter for `config` and install them globally.
///
/// `RUST_LOG` wins over the configured filter when both are present.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| ObservabilityError::Config(format!("Invalid log filter: {}", e)))?;

    let location = config.with_location;

    // Exactly one of these is Some
    let (pretty, json, compact) = match config.log_format {
        LogFormat::Pretty => (
            Some(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(location)
                    .with_line_number(location),
            ),
            None,
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(location)
                    .with_line_number(location),
            ),
            None,
        ),
        LogFormat::Compact => (None, None, Some(fmt::layer().compact().with_target(true))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(compact)
        .try_init()
        .map_err(|e| ObservabilityError::Provider(format!("Failed to init tracing: {}", e)))
}
