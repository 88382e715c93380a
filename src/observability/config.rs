//! Observability Configuration

use std::env;
use std::fmt;
use std::str::FromStr;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output for development
    #[default]
    Pretty,
    /// One JSON object per line for log aggregation
    Json,
    /// Single-line human-readable output
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Compact => write!(f, "compact"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log output format
    pub log_format: LogFormat,
    /// Fallback filter when `RUST_LOG` is unset (e.g. "info", "portcullis=debug,tower_http=info")
    pub log_filter: String,
    /// Include source file and line in each record
    pub with_location: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
            with_location: true,
        }
    }
}

impl ObservabilityConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LOG_FORMAT`: "pretty", "json", or "compact" (default: "pretty")
    /// - `RUST_LOG`: Log filter directive (default: "info")
    /// - `LOG_LOCATION`: Include file and line (default: "true")
    pub fn from_env() -> Self {
        let log_format = match env::var("LOG_FORMAT") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                eprintln!("Warning: {}, falling back to pretty", e);
                LogFormat::Pretty
            }),
            Err(_) => LogFormat::Pretty,
        };

        let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let with_location = env::var("LOG_LOCATION")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            log_format,
            log_filter,
            with_location,
        }
    }

    pub fn builder() -> ObservabilityConfigBuilder {
        ObservabilityConfigBuilder::default()
    }
}

/// Builder for ObservabilityConfig
#[derive(Default)]
pub struct ObservabilityConfigBuilder {
    config: ObservabilityConfig,
}

impl ObservabilityConfigBuilder {
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.log_format = format;
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.log_filter = filter.into();
        self
    }

    pub fn with_location(mut self, enable: bool) -> Self {
        self.config.with_location = enable;
        self
    }

    pub fn build(self) -> ObservabilityConfig {
        self.config
    }
}
