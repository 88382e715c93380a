//! # Portcullis
//!
//! Username/password authentication with server-side sessions for Axum
//! applications.
//!
//! - **Accounts** live in a durable [`CredentialStore`] (SQLite) as Argon2id
//!   PHC hashes, never plaintext.
//! - **Sessions** are opaque 256-bit tokens in a TTL [`SessionCache`]
//!   (Redis), handed to clients in an `HttpOnly` cookie.
//! - **Signin** checks the presented session first and only falls back to
//!   password verification on a miss.
//!
//! Store and cache failures are reported as internal errors and are never
//! mistaken for "not authenticated".
//!
//! ## Quick Start
//!
//! ```ignore
//! use portcullis::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     observability::init(&observability::ObservabilityConfig::from_env())?;
//!     let config = AppConfig::from_env();
//!
//!     let pool = create_pool(&config.database).await?;
//!     let cache = RedisSessionCache::connect(&config.cache).await?;
//!
//!     let auth = AuthService::new(
//!         Arc::new(SqliteCredentialStore::new(pool)),
//!         SessionManager::new(Arc::new(cache), config.session_ttl, config.timeouts.cache),
//!         PasswordHasher::new(&config.hashing)?,
//!         config.timeouts.store,
//!     );
//!
//!     let app = routes::router(AppState::new(auth, &config.http))
//!         .with_security(config.http.clone());
//!
//!     let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cache;
mod config;
pub mod database;
pub mod error;
mod layers;
pub mod observability;
mod parse;
pub mod password;
pub mod routes;
pub mod session;
pub mod store;
pub mod testing;

// Re-exports
pub use auth::{AuthService, SignIn, Timeouts};
pub use cache::{CacheConfig, CacheError, MemorySessionCache, RedisSessionCache, SessionCache};
pub use config::{AppConfig, AppConfigBuilder, HttpConfig};
pub use database::{
    create_pool, ensure_schema, health_check, DatabaseConfig, DatabaseConfigBuilder,
    DatabaseError, HealthStatus,
};
pub use error::{AuthError, ErrorKind, ErrorResponse};
pub use layers::SecureRouter;
pub use parse::{parse_duration, parse_size};
pub use password::{HashingConfig, PasswordError, PasswordHasher};
pub use routes::AppState;
pub use session::{Session, SessionManager, DEFAULT_SESSION_TTL};
pub use store::{CredentialRecord, CredentialStore, MemoryCredentialStore, SqliteCredentialStore, StoreError};
