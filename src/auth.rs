//! Authentication Service
//!
//! The façade the request boundary calls: [`AuthService::signup`],
//! [`AuthService::signin`] and [`AuthService::signout`].
//!
//! It composes the credential store, the password hasher and the session
//! manager, all injected at construction. Nothing here holds global state,
//! so one `AuthService` is cloned into every request handler.
//!
//! # Signin order
//!
//! 1. A presented session token is validated against the cache. A hit
//!    returns the existing session unchanged (the TTL is not refreshed).
//! 2. On a miss the record is looked up and the password verified.
//!    Unknown users and wrong passwords fail identically with
//!    [`AuthError::InvalidCredentials`].
//! 3. On a match a new session is issued.
//!
//! Cache or store failures surface as errors at any step. They never turn
//! into "not authenticated".

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AuthError, Result};
use crate::observability::SecurityEvent;
use crate::password::PasswordHasher;
use crate::session::{Session, SessionManager};
use crate::store::{CredentialStore, StoreError};

/// Password used only to produce the decoy hash for unknown usernames
const DECOY_PASSWORD: &str = "portcullis-decoy-credential";

/// Per-call bounds on downstream I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound on each credential store call
    pub store: Duration,
    /// Bound on each session cache call
    pub cache: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store: Duration::from_secs(5),
            cache: Duration::from_secs(10),
        }
    }
}

/// Result of a successful signin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    /// The presented token was still active
    Resumed { token: String, username: String },
    /// Credentials were verified and a new session issued
    Issued(Session),
}

impl SignIn {
    pub fn token(&self) -> &str {
        match self {
            Self::Resumed { token, .. } => token,
            Self::Issued(session) => &session.token,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Self::Resumed { username, .. } => username,
            Self::Issued(session) => &session.username,
        }
    }

    /// The new session, if one was issued
    pub fn issued(&self) -> Option<&Session> {
        match self {
            Self::Issued(session) => Some(session),
            Self::Resumed { .. } => None,
        }
    }
}

/// Credential and session façade.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    sessions: SessionManager,
    hasher: PasswordHasher,
    store_timeout: Duration,
    decoy_hash: Option<Arc<str>>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        sessions: SessionManager,
        hasher: PasswordHasher,
        store_timeout: Duration,
    ) -> Self {
        let decoy_hash = match hasher.hash(DECOY_PASSWORD) {
            Ok(hash) => Some(Arc::from(hash)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to prepare decoy hash");
                None
            }
        };

        Self {
            store,
            sessions,
            hasher,
            store_timeout,
            decoy_hash,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Register a new account. No session is created.
    pub async fn signup(&self, username: &str, password: &str) -> Result<()> {
        check_credentials(username, password)?;

        let hasher = self.hasher.clone();
        let plaintext = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await??;

        match self
            .bounded("insert", self.store.insert(username, &password_hash))
            .await
        {
            Ok(()) => {}
            Err(StoreError::Duplicate) => {
                crate::security_event!(
                    SecurityEvent::DuplicateRegistration,
                    username = %username,
                    "Signup rejected for existing username"
                );
                return Err(AuthError::DuplicateAccount);
            }
            Err(e) => return Err(e.into()),
        }

        crate::security_event!(
            SecurityEvent::UserRegistered,
            username = %username,
            "User registered"
        );
        Ok(())
    }

    /// Authenticate by session token first, then by credentials.
    pub async fn signin(
        &self,
        username: &str,
        password: &str,
        presented_token: Option<&str>,
    ) -> Result<SignIn> {
        if let Some(bound) = self.sessions.validate(presented_token).await? {
            crate::security_event!(
                SecurityEvent::AuthenticationSuccess,
                username = %bound,
                method = "session",
                "User authenticated"
            );
            return Ok(SignIn::Resumed {
                // validate only hits for a presented token
                token: presented_token.unwrap_or_default().to_string(),
                username: bound,
            });
        }

        check_credentials(username, password)?;

        let record = self
            .bounded("find_by_username", self.store.find_by_username(username))
            .await?;

        let matched = match record {
            Some(record) => self.verify(record.password_hash, password).await?,
            None => {
                self.verify_decoy(password).await;
                false
            }
        };

        if !matched {
            crate::security_event!(
                SecurityEvent::AuthenticationFailure,
                username = %username,
                reason = "invalid_credentials",
                "Authentication failed"
            );
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.sessions.issue(username).await?;
        crate::security_event!(
            SecurityEvent::AuthenticationSuccess,
            username = %username,
            method = "password",
            "User authenticated"
        );
        Ok(SignIn::Issued(session))
    }

    /// Revoke the presented session. Succeeds even if it was already gone.
    pub async fn signout(&self, presented_token: Option<&str>) -> Result<()> {
        let token = presented_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotAuthenticated)?;

        self.sessions.revoke(token).await?;

        crate::security_event!(SecurityEvent::Logout, "User signed out");
        Ok(())
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> std::result::Result<T, StoreError>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| {
                StoreError::Unavailable(format!(
                    "store {} timed out after {:?}",
                    op, self.store_timeout
                ))
            })?
    }

    async fn verify(&self, stored_hash: String, password: &str) -> Result<bool> {
        let hasher = self.hasher.clone();
        let plaintext = password.to_string();
        let matched =
            tokio::task::spawn_blocking(move || hasher.verify(&stored_hash, &plaintext)).await??;
        Ok(matched)
    }

    /// Spend one verification on a decoy hash so unknown usernames cost the
    /// same as known ones.
    async fn verify_decoy(&self, password: &str) {
        let Some(decoy) = self.decoy_hash.clone() else {
            return;
        };
        let hasher = self.hasher.clone();
        let plaintext = password.to_string();

        let outcome =
            tokio::task::spawn_blocking(move || hasher.verify(&decoy, &plaintext)).await;

        if let Ok(Err(e)) = outcome {
            tracing::debug!(error = %e, "Decoy verification failed");
        }
    }
}

fn check_credentials(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AuthError::weak_input("username must not be empty"));
    }
    if password.is_empty() {
        return Err(AuthError::weak_input("password must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemorySessionCache;
    use crate::store::MemoryCredentialStore;
    use crate::testing::{
        check_user_enumeration, memory_service, service_with, test_usernames, FailingCache,
        FailingStore, StalledStore,
    };
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_signup_then_signin() {
        let (auth, store, _) = memory_service();

        auth.signup("alice", "pw1").await.unwrap();
        let record = store.find_by_username("alice").await.unwrap().unwrap();
        assert_ne!(record.password_hash, "pw1");

        let signin = auth.signin("alice", "pw1", None).await.unwrap();
        assert!(!signin.token().is_empty());
        assert_eq!(signin.username(), "alice");
        assert!(signin.issued().is_some());
    }

    #[tokio::test]
    async fn test_signup_creates_no_session() {
        let (auth, _, cache) = memory_service();
        auth.signup("alice", "pw1").await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_resume_with_active_token() {
        let (auth, _, _) = memory_service();
        auth.signup("alice", "pw1").await.unwrap();

        let first = auth.signin("alice", "pw1", Some("")).await.unwrap();
        let t1 = first.token().to_string();

        let second = auth.signin("alice", "pw1", Some(&t1)).await.unwrap();
        assert_eq!(second.token(), t1);
        assert!(matches!(second, SignIn::Resumed { .. }));
    }

    #[tokio::test]
    async fn test_resume_skips_password_check() {
        let (auth, _, _) = memory_service();
        auth.signup("alice", "pw1").await.unwrap();
        let t1 = auth.signin("alice", "pw1", None).await.unwrap().token().to_string();

        let resumed = auth.signin("", "", Some(&t1)).await.unwrap();
        assert_eq!(resumed.username(), "alice");
    }

    #[tokio::test]
    async fn test_duplicate_signup() {
        let (auth, store, _) = memory_service();
        auth.signup("bob", "pw2").await.unwrap();

        assert!(matches!(
            auth.signup("bob", "pw3").await,
            Err(AuthError::DuplicateAccount)
        ));

        // Original password still works
        assert!(auth.signin("bob", "pw2", None).await.is_ok());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_decoy_hash_prepared_on_construction() {
        let (auth, _, _) = memory_service();
        let decoy = auth.decoy_hash.as_deref().unwrap();
        assert!(decoy.starts_with("$argon2id$"));
        assert!(auth.hasher.verify(decoy, DECOY_PASSWORD).unwrap());
        assert!(!auth.hasher.verify(decoy, "anything-else").unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_is_invalid_credentials() {
        let (auth, _, _) = memory_service();
        assert!(matches!(
            auth.signin("carol", "x", Some("")).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let (auth, _, _) = memory_service();
        auth.signup("alice", "pw1").await.unwrap();

        assert!(matches!(
            auth.signin("alice", "pw2", None).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_wrong_password_are_indistinguishable() {
        let (auth, _, _) = memory_service();
        auth.signup("admin", "real-password").await.unwrap();

        for probe in test_usernames() {
            let known = auth.signin("admin", "guess", None).await.unwrap_err();
            let unknown = auth
                .signin(&format!("{}-missing", probe), "guess", None)
                .await
                .unwrap_err();

            let result = check_user_enumeration(
                &known.public_message(),
                &unknown.public_message(),
                Duration::ZERO,
                Duration::ZERO,
                Duration::from_millis(100),
            );
            assert!(!result.vulnerable, "{:?}", result.issues);
            assert_eq!(known.kind(), unknown.kind());
        }
    }

    #[tokio::test]
    async fn test_revoked_token_falls_through_to_credentials() {
        let (auth, _, _) = memory_service();
        auth.signup("alice", "pw1").await.unwrap();

        let t2 = auth.signin("alice", "pw1", None).await.unwrap().token().to_string();
        auth.signout(Some(&t2)).await.unwrap();

        // Revoked token with a bad password is not authorized
        assert!(matches!(
            auth.signin("alice", "wrong", Some(&t2)).await,
            Err(AuthError::InvalidCredentials)
        ));

        // With the right password a fresh session is issued
        let again = auth.signin("alice", "pw1", Some(&t2)).await.unwrap();
        assert!(again.issued().is_some());
        assert_ne!(again.token(), t2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_falls_through_to_credentials() {
        let (auth, _, _) = memory_service();
        auth.signup("alice", "pw1").await.unwrap();
        let session = auth.signin("alice", "pw1", None).await.unwrap();

        tokio::time::advance(auth.sessions().ttl()).await;

        assert!(matches!(
            auth.signin("alice", "wrong", Some(session.token())).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_signout() {
        let (auth, _, cache) = memory_service();
        auth.signup("alice", "pw1").await.unwrap();
        let token = auth.signin("alice", "pw1", None).await.unwrap().token().to_string();
        assert_eq!(cache.len(), 1);

        auth.signout(Some(&token)).await.unwrap();
        assert!(cache.is_empty());

        // Already absent is still success
        auth.signout(Some(&token)).await.unwrap();
    }

    #[tokio::test]
    async fn test_signout_without_token() {
        let (auth, _, _) = memory_service();
        assert!(matches!(auth.signout(None).await, Err(AuthError::NotAuthenticated)));
        assert!(matches!(auth.signout(Some("")).await, Err(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_empty_fields_are_weak_input() {
        let (auth, _, _) = memory_service();
        assert!(matches!(auth.signup("", "pw").await, Err(AuthError::WeakInput(_))));
        assert!(matches!(auth.signup("   ", "pw").await, Err(AuthError::WeakInput(_))));
        assert!(matches!(auth.signup("alice", "").await, Err(AuthError::WeakInput(_))));
        assert!(matches!(auth.signin("", "pw", None).await, Err(AuthError::WeakInput(_))));
    }

    #[tokio::test]
    async fn test_cache_failure_is_internal_not_unauthorized() {
        let auth = service_with(Arc::new(MemoryCredentialStore::new()), Arc::new(FailingCache));
        auth.signup("alice", "pw1").await.unwrap();

        let err = auth
            .signin("alice", "pw1", Some(&crate::session::generate_token()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CacheUnavailable(_)));

        // Credentials verify but the session cannot be stored
        let err = auth.signin("alice", "pw1", None).await.unwrap_err();
        assert!(matches!(err, AuthError::CacheUnavailable(_)));

        let err = auth
            .signout(Some(&crate::session::generate_token()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CacheUnavailable(_)));
    }

    #[tokio::test]
    async fn test_store_failure_is_internal() {
        let auth = service_with(Arc::new(FailingStore), Arc::new(MemorySessionCache::new()));

        assert!(matches!(
            auth.signup("alice", "pw1").await,
            Err(AuthError::StoreUnavailable(_))
        ));
        assert!(matches!(
            auth.signin("alice", "pw1", None).await,
            Err(AuthError::StoreUnavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_times_out() {
        let auth = service_with(Arc::new(StalledStore), Arc::new(MemorySessionCache::new()));

        let err = auth.signin("alice", "pw1", None).await.unwrap_err();
        match err {
            AuthError::StoreUnavailable(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_signins_get_distinct_tokens() {
        let (auth, _, _) = memory_service();
        auth.signup("alice", "pw1").await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let auth = auth.clone();
                tokio::spawn(async move {
                    auth.signin("alice", "pw1", None).await.map(|s| s.token().to_string())
                })
            })
            .collect();

        let mut tokens = HashSet::new();
        for handle in handles {
            tokens.insert(handle.await.unwrap().unwrap());
        }
        assert_eq!(tokens.len(), 16);
    }
}
