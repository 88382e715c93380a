//! Database Infrastructure
//!
//! SQLite connection pooling and schema setup for the credential store.
//!
//! The pool is the only shared database handle. Every query goes through it,
//! so its acquire timeout is the floor on how long a store call can block
//! before the store-level timeout fires.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::parse::parse_duration;

/// Schema for the credential store.
const CREDENTIALS_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS credentials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
)";

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection URL (from DATABASE_URL env var)
    pub database_url: String,

    /// Maximum number of connections in the pool
    /// Default: 5
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    /// Default: 5 seconds
    pub acquire_timeout: Duration,

    /// Maximum lifetime of a connection before it's closed
    pub max_lifetime: Option<Duration>,

    /// Maximum idle time before a connection is closed
    pub idle_timeout: Option<Duration>,

    /// Create the database file if it does not exist
    pub create_if_missing: bool,

    /// Create the credentials table on connect
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://portcullis.db".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            create_if_missing: true,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: SQLite URL (default: "sqlite://portcullis.db")
    /// - `DB_MAX_CONNECTIONS`: Max pool size (default: 5)
    /// - `DB_ACQUIRE_TIMEOUT`: Connection acquire timeout (default: "5s")
    /// - `DB_AUTO_MIGRATE`: Create the schema on startup (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let database_url = std::env::var("DATABASE_URL").unwrap_or(defaults.database_url);

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_connections);

        let acquire_timeout = std::env::var("DB_ACQUIRE_TIMEOUT")
            .ok()
            .and_then(|s| parse_duration(&s))
            .unwrap_or(defaults.acquire_timeout);

        let auto_migrate = std::env::var("DB_AUTO_MIGRATE")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            database_url,
            max_connections,
            acquire_timeout,
            auto_migrate,
            ..defaults
        }
    }

    /// Create a new builder for programmatic configuration.
    pub fn builder(database_url: impl Into<String>) -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new(database_url)
    }

    /// Whether the URL names an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

/// Builder for DatabaseConfig
#[derive(Debug, Clone)]
pub struct DatabaseConfigBuilder {
    config: DatabaseConfig,
}

impl DatabaseConfigBuilder {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            config: DatabaseConfig {
                database_url: database_url.into(),
                ..Default::default()
            },
        }
    }

    /// Set maximum connections (default: 5)
    pub fn max_connections(mut self, n: u32) -> Self {
        self.config.max_connections = n;
        self
    }

    /// Set connection acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    /// Fail instead of creating a missing database file
    pub fn must_exist(mut self) -> Self {
        self.config.create_if_missing = false;
        self
    }

    /// Disable automatic schema creation
    pub fn without_auto_migrate(mut self) -> Self {
        self.config.auto_migrate = false;
        self
    }

    pub fn build(self) -> DatabaseConfig {
        self.config
    }
}

/// Create a connection pool with the given configuration.
///
/// Creates the schema when `auto_migrate` is set, then runs a health check.
///
/// An in-memory database exists per connection, so the pool is pinned to a
/// single connection that is never recycled.
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        auto_migrate = config.auto_migrate,
        "Initializing database connection pool"
    );

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| DatabaseError::Configuration(format!("Invalid DATABASE_URL: {}", e)))?
        .create_if_missing(config.create_if_missing)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.acquire_timeout);

    let mut options = SqlitePoolOptions::new().acquire_timeout(config.acquire_timeout);
    if config.is_in_memory() {
        warn!("Using an in-memory database; credentials will not survive restart");
        options = options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        options = options
            .max_connections(config.max_connections)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime);
    }

    let pool = options
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Connection(format!("Failed to connect: {}", e)))?;

    if config.auto_migrate {
        ensure_schema(&pool).await?;
    }

    health_check(&pool).await?;

    info!("Database connection pool initialized successfully");

    Ok(pool)
}

/// Create the credentials table if it does not exist.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), DatabaseError> {
    sqlx::query(CREDENTIALS_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    Ok(())
}

/// Perform a health check on the database connection.
pub async fn health_check(pool: &SqlitePool) -> Result<HealthStatus, DatabaseError> {
    let start = std::time::Instant::now();

    let result: (i64,) = sqlx::query_as("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DatabaseError::HealthCheck(format!("Query failed: {}", e)))?;

    if result.0 != 1 {
        return Err(DatabaseError::HealthCheck("Unexpected query result".into()));
    }

    let status = HealthStatus {
        connected: true,
        latency: start.elapsed(),
        pool_size: pool.size(),
        idle_connections: pool.num_idle() as u32,
    };

    info!(latency_ms = ?status.latency.as_millis(), "Database health check passed");

    Ok(status)
}

/// Database health status
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Connection is alive
    pub connected: bool,
    /// Query latency
    pub latency: Duration,
    /// Current pool size
    pub pool_size: u32,
    /// Idle connections in pool
    pub idle_connections: u32,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.connected && self.latency < Duration::from_secs(5)
    }
}

/// Database-specific errors
#[derive(Debug)]
pub enum DatabaseError {
    /// Configuration error (invalid URL, etc.)
    Configuration(String),
    /// Connection error
    Connection(String),
    /// Health check failed
    HealthCheck(String),
    /// Schema creation failed
    Migration(String),
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Database configuration error: {}", msg),
            Self::Connection(msg) => write!(f, "Database connection error: {}", msg),
            Self::HealthCheck(msg) => write!(f, "Database health check failed: {}", msg),
            Self::Migration(msg) => write!(f, "Database migration error: {}", msg),
        }
    }
}

impl std::error::Error for DatabaseError {}
