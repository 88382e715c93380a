//! Session Management
//!
//! Issues, validates and revokes opaque session tokens held in the
//! [`SessionCache`].
//!
//! A token is in one of two states:
//!
//! - **absent**: never issued, expired, or revoked
//! - **active**: issued and within its TTL
//!
//! `issue` moves a fresh token to active; TTL expiry or `revoke` moves it
//! back to absent. There are no intermediate states and a token is never
//! re-bound to another username.
//!
//! Validation only consults the cache. It runs before any password hashing
//! so repeat requests within the TTL skip the expensive path.
//!
//! # Usage
//!
//! ```ignore
//! use portcullis::session::SessionManager;
//!
//! let sessions = SessionManager::new(cache, Duration::from_secs(600), Duration::from_secs(10));
//! let session = sessions.issue("alice").await?;
//!
//! assert_eq!(sessions.validate(Some(&session.token)).await?, Some("alice".into()));
//! sessions.revoke(&session.token).await?;
//! assert_eq!(sessions.validate(Some(&session.token)).await?, None);
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheError, SessionCache};
use crate::observability::SecurityEvent;

/// Random bytes per token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Encoded token length: 32 bytes in unpadded base64url
const TOKEN_LEN: usize = 43;

/// Default session lifetime, shared by cache entry and cookie
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(600);

/// An issued session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl Session {
    /// Wall-clock instant the session stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Generate a token from the OS CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether a presented token could have been issued by [`generate_token`].
///
/// Anything else is a guaranteed miss and is rejected without a cache call.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Round up to whole seconds, never below one.
fn whole_seconds(ttl: Duration) -> Duration {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    Duration::from_secs(secs.max(1))
}

/// Issues and checks session tokens against the session cache.
#[derive(Clone)]
pub struct SessionManager {
    cache: Arc<dyn SessionCache>,
    ttl: Duration,
    op_timeout: Duration,
}

impl SessionManager {
    /// `ttl` is the session lifetime; `op_timeout` bounds each cache call.
    ///
    /// The cookie carries the lifetime in whole seconds, so `ttl` is rounded
    /// up to the next whole second (at least one) and the cache uses the
    /// same value.
    pub fn new(cache: Arc<dyn SessionCache>, ttl: Duration, op_timeout: Duration) -> Self {
        Self {
            cache,
            ttl: whole_seconds(ttl),
            op_timeout,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| {
                CacheError::Unavailable(format!(
                    "cache {} timed out after {:?}",
                    op, self.op_timeout
                ))
            })?
    }

    /// Create a session for `username` and store it with the session TTL.
    pub async fn issue(&self, username: &str) -> Result<Session, CacheError> {
        let session = Session {
            token: generate_token(),
            username: username.to_string(),
            created_at: Utc::now(),
            ttl: self.ttl,
        };

        self.bounded(
            "set",
            self.cache.set_with_ttl(&session.token, &session.username, self.ttl),
        )
        .await?;

        log_session_created(&session);
        Ok(session)
    }

    /// Resolve a presented token to its username.
    ///
    /// `Ok(None)` covers no token, an empty or malformed token, and an
    /// expired, revoked or unknown one. Cache failure is an error.
    pub async fn validate(&self, token: Option<&str>) -> Result<Option<String>, CacheError> {
        let token = match token {
            Some(t) if is_well_formed(t) => t,
            _ => return Ok(None),
        };

        let username = self.bounded("get", self.cache.get(token)).await?;
        if username.is_none() {
            tracing::debug!("Session token not found in cache");
        }
        Ok(username)
    }

    /// Delete a session. Succeeds whether or not it was active.
    pub async fn revoke(&self, token: &str) -> Result<(), CacheError> {
        if is_well_formed(token) {
            self.bounded("delete", self.cache.delete(token)).await?;
        }
        log_session_revoked();
        Ok(())
    }
}

// ============================================================================
// Session Event Logging
// ============================================================================

fn log_session_created(session: &Session) {
    crate::security_event!(
        SecurityEvent::SessionCreated,
        username = %session.username,
        ttl_secs = session.ttl.as_secs(),
        expires_at = %session.expires_at().to_rfc3339(),
        "Session created"
    );
}

fn log_session_revoked() {
    crate::security_event!(
        SecurityEvent::SessionDestroyed,
        reason = "user_logout",
        "Session revoked"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemorySessionCache;
    use crate::testing::{FailingCache, StalledCache};
    use std::collections::HashSet;

    fn manager(ttl: Duration) -> SessionManager {
        SessionManager::new(
            Arc::new(MemorySessionCache::new()),
            ttl,
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(is_well_formed(&token));

        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&format!("{}=", &token[..42])));
        assert!(!is_well_formed(&"a".repeat(TOKEN_LEN + 1)));
    }

    #[test]
    fn test_ten_thousand_tokens_are_distinct() {
        let tokens: HashSet<String> = (0..10_000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 10_000);
    }

    #[test]
    fn test_ttl_rounds_up_to_whole_seconds() {
        assert_eq!(manager(Duration::from_millis(500)).ttl(), Duration::from_secs(1));
        assert_eq!(manager(Duration::from_millis(1500)).ttl(), Duration::from_secs(2));
        assert_eq!(manager(Duration::ZERO).ttl(), Duration::from_secs(1));
        assert_eq!(manager(DEFAULT_SESSION_TTL).ttl(), DEFAULT_SESSION_TTL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_entry_lives_for_rounded_ttl() {
        let sessions = manager(Duration::from_millis(1500));
        let session = sessions.issue("alice").await.unwrap();
        assert_eq!(session.ttl, Duration::from_secs(2));

        tokio::time::advance(Duration::from_millis(1900)).await;
        assert!(sessions.validate(Some(&session.token)).await.unwrap().is_some());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(sessions.validate(Some(&session.token)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let sessions = manager(DEFAULT_SESSION_TTL);
        let session = sessions.issue("alice").await.unwrap();

        assert_eq!(session.username, "alice");
        assert_eq!(session.ttl, DEFAULT_SESSION_TTL);
        assert_eq!(
            session.expires_at() - session.created_at,
            chrono::Duration::seconds(600)
        );
        assert_eq!(
            sessions.validate(Some(&session.token)).await.unwrap().as_deref(),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn test_issued_sessions_are_distinct_per_user() {
        let sessions = manager(DEFAULT_SESSION_TTL);
        let a = sessions.issue("alice").await.unwrap();
        let b = sessions.issue("alice").await.unwrap();
        let c = sessions.issue("bob").await.unwrap();

        assert_ne!(a.token, b.token);
        assert_eq!(sessions.validate(Some(&a.token)).await.unwrap().as_deref(), Some("alice"));
        assert_eq!(sessions.validate(Some(&b.token)).await.unwrap().as_deref(), Some("alice"));
        assert_eq!(sessions.validate(Some(&c.token)).await.unwrap().as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_missing_or_malformed_token_is_miss() {
        let sessions = manager(DEFAULT_SESSION_TTL);
        assert_eq!(sessions.validate(None).await.unwrap(), None);
        assert_eq!(sessions.validate(Some("")).await.unwrap(), None);
        assert_eq!(sessions.validate(Some("not a token")).await.unwrap(), None);
        assert_eq!(sessions.validate(Some(&generate_token())).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_token_skips_cache() {
        let sessions = SessionManager::new(
            Arc::new(FailingCache),
            DEFAULT_SESSION_TTL,
            Duration::from_secs(10),
        );
        // Would error if the cache were consulted
        assert_eq!(sessions.validate(Some("garbage")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_after_ttl() {
        let ttl = Duration::from_secs(120);
        let sessions = manager(ttl);
        let session = sessions.issue("alice").await.unwrap();

        tokio::time::advance(ttl - Duration::from_secs(1)).await;
        assert!(sessions.validate(Some(&session.token)).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(sessions.validate(Some(&session.token)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let sessions = manager(DEFAULT_SESSION_TTL);
        let session = sessions.issue("alice").await.unwrap();

        sessions.revoke(&session.token).await.unwrap();
        assert_eq!(sessions.validate(Some(&session.token)).await.unwrap(), None);

        sessions.revoke(&session.token).await.unwrap();
        sessions.revoke(&generate_token()).await.unwrap();
        sessions.revoke("").await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_failure_is_error_not_miss() {
        let sessions = SessionManager::new(
            Arc::new(FailingCache),
            DEFAULT_SESSION_TTL,
            Duration::from_secs(10),
        );

        assert!(sessions.issue("alice").await.is_err());
        assert!(matches!(
            sessions.validate(Some(&generate_token())).await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(sessions.revoke(&generate_token()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_cache_times_out() {
        let sessions = SessionManager::new(
            Arc::new(StalledCache),
            DEFAULT_SESSION_TTL,
            Duration::from_secs(10),
        );

        let err = sessions.validate(Some(&generate_token())).await.unwrap_err();
        let CacheError::Unavailable(msg) = err;
        assert!(msg.contains("timed out"));
    }
}
