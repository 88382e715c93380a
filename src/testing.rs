//! Testing Utilities
//!
//! Test doubles and fixtures for exercising the authentication stack
//! without Redis or a database file.
//!
//! # What This Module Provides
//!
//! - Cache and store doubles that fail or hang on every call
//! - A minimal-cost [`PasswordHasher`] so tests are not dominated by Argon2
//! - A fully in-memory [`AuthService`]
//! - Injection payloads and a user-enumeration check
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::testing::{memory_service, check_user_enumeration};
//!
//! #[tokio::test]
//! async fn test_signin() {
//!     let (auth, _store, _cache) = memory_service();
//!     auth.signup("alice", "pw1").await.unwrap();
//!     assert!(auth.signin("alice", "pw1", None).await.is_ok());
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthService, Timeouts};
use crate::cache::{CacheError, MemorySessionCache, SessionCache};
use crate::password::{HashingConfig, PasswordHasher};
use crate::session::{SessionManager, DEFAULT_SESSION_TTL};
use crate::store::{CredentialRecord, CredentialStore, MemoryCredentialStore, StoreError};

// ============================================================================
// Doubles
// ============================================================================

/// Session cache whose every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCache;

#[async_trait]
impl SessionCache for FailingCache {
    async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// Session cache whose every call hangs forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalledCache;

#[async_trait]
impl SessionCache for StalledCache {
    async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> Result<(), CacheError> {
        std::future::pending().await
    }

    async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
        std::future::pending().await
    }

    async fn delete(&self, _: &str) -> Result<(), CacheError> {
        std::future::pending().await
    }
}

/// Credential store whose every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

#[async_trait]
impl CredentialStore for FailingStore {
    async fn insert(&self, _: &str, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database is locked".into()))
    }

    async fn find_by_username(&self, _: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Err(StoreError::Unavailable("database is locked".into()))
    }
}

/// Credential store whose every call hangs forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalledStore;

#[async_trait]
impl CredentialStore for StalledStore {
    async fn insert(&self, _: &str, _: &str) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn find_by_username(&self, _: &str) -> Result<Option<CredentialRecord>, StoreError> {
        std::future::pending().await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Argon2 hasher at the lowest accepted cost.
pub fn fast_hasher() -> PasswordHasher {
    PasswordHasher::new(&HashingConfig::minimal())
        .expect("minimal Argon2 parameters are valid")
}

/// Build an [`AuthService`] over the given store and cache with test timeouts.
pub fn service_with(
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn SessionCache>,
) -> AuthService {
    let timeouts = Timeouts {
        store: Duration::from_secs(5),
        cache: Duration::from_secs(10),
    };
    let sessions = SessionManager::new(cache, DEFAULT_SESSION_TTL, timeouts.cache);
    AuthService::new(store, sessions, fast_hasher(), timeouts.store)
}

/// An [`AuthService`] backed entirely by memory, plus handles to its parts.
pub fn memory_service() -> (AuthService, Arc<MemoryCredentialStore>, Arc<MemorySessionCache>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let cache = Arc::new(MemorySessionCache::new());
    let auth = service_with(store.clone(), cache.clone());
    (auth, store, cache)
}

// ============================================================================
// Payloads
// ============================================================================

/// SQL injection strings to use as usernames against the store.
pub fn sql_injection_payloads() -> Vec<&'static str> {
    vec![
        "' OR '1'='1",
        "' OR 1=1--",
        "admin'--",
        "' UNION SELECT username, password_hash FROM credentials--",
        "'; DROP TABLE credentials;--",
        "1' AND '1'='1",
    ]
}

/// Usernames commonly probed for account enumeration
pub fn test_usernames() -> Vec<&'static str> {
    vec!["admin", "administrator", "root", "test", "user", "guest"]
}

/// Result of a user enumeration check
#[derive(Debug, Clone)]
pub struct UserEnumerationResult {
    pub vulnerable: bool,
    pub issues: Vec<String>,
}

/// Compare the observable failure for a known user against an unknown one.
///
/// Flags differing messages and timing gaps above `max_timing_gap`.
pub fn check_user_enumeration(
    known_user_message: &str,
    unknown_user_message: &str,
    known_user_timing: Duration,
    unknown_user_timing: Duration,
    max_timing_gap: Duration,
) -> UserEnumerationResult {
    let mut issues = Vec::new();

    if known_user_message != unknown_user_message {
        issues.push(format!(
            "Different failures: {:?} vs {:?}",
            known_user_message, unknown_user_message
        ));
    }

    let gap = if known_user_timing > unknown_user_timing {
        known_user_timing - unknown_user_timing
    } else {
        unknown_user_timing - known_user_timing
    };
    if gap > max_timing_gap {
        issues.push(format!("Timing difference of {:?}", gap));
    }

    UserEnumerationResult {
        vulnerable: !issues.is_empty(),
        issues,
    }
}
