//! Application configuration
//!
//! Everything is read from environment variables with human-readable
//! durations and sizes. Invalid values fall back to the default.
//!
//! # Example
//!
//! ```ignore
//! use portcullis::AppConfig;
//!
//! // Load from environment variables
//! let config = AppConfig::from_env();
//!
//! // Or build programmatically
//! let config = AppConfig::builder()
//!     .bind_addr("127.0.0.1:8080")
//!     .session_ttl(Duration::from_secs(600))
//!     .insecure_cookies()
//!     .build();
//! ```

use std::time::Duration;

use crate::auth::Timeouts;
use crate::cache::CacheConfig;
use crate::database::DatabaseConfig;
use crate::parse::{parse_duration, parse_size};
use crate::password::HashingConfig;
use crate::session::DEFAULT_SESSION_TTL;

fn env_duration(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| parse_duration(&s))
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|s| s.to_lowercase() != "false")
        .unwrap_or(default)
}

/// HTTP boundary settings, applied by [`SecureRouter`](crate::SecureRouter)
/// and the session cookie.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,

    /// Whole-request timeout
    pub request_timeout: Duration,

    /// Mark the session cookie `Secure`. Disable only for plain-HTTP development.
    pub secure_cookies: bool,

    /// Add `Cache-Control`, `X-Content-Type-Options` and `X-Frame-Options`
    pub security_headers_enabled: bool,

    /// Trace every request with `TraceLayer`
    pub tracing_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_request_size: 16 * 1024,
            request_timeout: Duration::from_secs(30),
            secure_cookies: true,
            security_headers_enabled: true,
            tracing_enabled: true,
        }
    }
}

impl HttpConfig {
    /// # Environment Variables
    ///
    /// - `MAX_REQUEST_SIZE`: e.g. "16KB", "1MB" (default: "16KB")
    /// - `REQUEST_TIMEOUT`: e.g. "30s", "1m" (default: "30s")
    /// - `SECURE_COOKIES`: "true"/"false" (default: "true")
    /// - `SECURITY_HEADERS_ENABLED`: "true"/"false" (default: "true")
    /// - `TRACING_ENABLED`: "true"/"false" (default: "true")
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_request_size = std::env::var("MAX_REQUEST_SIZE")
            .ok()
            .and_then(|s| parse_size(&s))
            .unwrap_or(defaults.max_request_size);

        Self {
            max_request_size,
            request_timeout: env_duration("REQUEST_TIMEOUT", defaults.request_timeout),
            secure_cookies: env_flag("SECURE_COOKIES", defaults.secure_cookies),
            security_headers_enabled: env_flag(
                "SECURITY_HEADERS_ENABLED",
                defaults.security_headers_enabled,
            ),
            tracing_enabled: env_flag("TRACING_ENABLED", defaults.tracing_enabled),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address
    pub bind_addr: String,

    pub database: DatabaseConfig,

    pub cache: CacheConfig,

    pub hashing: HashingConfig,

    /// Lifetime of a session in the cache and in the cookie
    pub session_ttl: Duration,

    /// Per-call bounds on store and cache I/O
    pub timeouts: Timeouts,

    pub http: HttpConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            hashing: HashingConfig::default(),
            session_ttl: DEFAULT_SESSION_TTL,
            timeouts: Timeouts::default(),
            http: HttpConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BIND_ADDR`: listen address (default: "0.0.0.0:3000")
    /// - `SESSION_TTL`: session lifetime (default: "600s")
    /// - `STORE_TIMEOUT`: per credential store call (default: "5s")
    /// - `CACHE_TIMEOUT`: per session cache call (default: "10s")
    ///
    /// plus the variables read by [`DatabaseConfig::from_env`],
    /// [`CacheConfig::from_env`], [`HashingConfig::from_env`] and
    /// [`HttpConfig::from_env`].
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session_ttl = match env_duration("SESSION_TTL", defaults.session_ttl) {
            ttl if ttl.is_zero() => defaults.session_ttl,
            ttl => ttl,
        };

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database: DatabaseConfig::from_env(),
            cache: CacheConfig::from_env(),
            hashing: HashingConfig::from_env(),
            session_ttl,
            timeouts: Timeouts {
                store: env_duration("STORE_TIMEOUT", defaults.timeouts.store),
                cache: env_duration("CACHE_TIMEOUT", defaults.timeouts.cache),
            },
            http: HttpConfig::from_env(),
        }
    }

    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// Builder for AppConfig
#[derive(Debug, Clone, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn database(mut self, database: DatabaseConfig) -> Self {
        self.config.database = database;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn hashing(mut self, hashing: HashingConfig) -> Self {
        self.config.hashing = hashing;
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_ttl = ttl;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn max_request_size(mut self, size: usize) -> Self {
        self.config.http.max_request_size = size;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.request_timeout = timeout;
        self
    }

    /// Drop the `Secure` cookie attribute (plain-HTTP development only!).
    pub fn insecure_cookies(mut self) -> Self {
        self.config.http.secure_cookies = false;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.session_ttl, Duration::from_secs(600));
        assert_eq!(config.timeouts.store, Duration::from_secs(5));
        assert_eq!(config.timeouts.cache, Duration::from_secs(10));
        assert_eq!(config.http.max_request_size, 16 * 1024);
        assert_eq!(config.http.request_timeout, Duration::from_secs(30));
        assert!(config.http.secure_cookies);
    }

    #[test]
    fn test_builder() {
        let config = AppConfig::builder()
            .bind_addr("127.0.0.1:8080")
            .session_ttl(Duration::from_secs(120))
            .timeouts(Timeouts {
                store: Duration::from_secs(1),
                cache: Duration::from_secs(2),
            })
            .max_request_size(1024)
            .insecure_cookies()
            .build();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.session_ttl, Duration::from_secs(120));
        assert_eq!(config.timeouts.cache, Duration::from_secs(2));
        assert_eq!(config.http.max_request_size, 1024);
        assert!(!config.http.secure_cookies);
    }
}
