//! Credential Store
//!
//! Durable mapping from username to hashed credential record.
//!
//! The store enforces username uniqueness: inserting an existing username
//! fails with [`StoreError::Duplicate`] and never overwrites. A lookup that
//! matches no row is `Ok(None)`, distinct from an unavailable store.

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::SqlitePool;
use std::collections::HashMap;
use thiserror::Error;

/// A stored account credential.
///
/// `password_hash` is a PHC string, never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CredentialRecord {
    pub username: String,
    pub password_hash: String,
}

/// Credential store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The username is already registered
    #[error("username already exists")]
    Duplicate,

    /// The store could not be reached, failed the query, or timed out
    #[error("{0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate,
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

/// Access contract for the credential store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the
    /// username exists.
    async fn insert(&self, username: &str, password_hash: &str) -> Result<(), StoreError>;

    /// Look up a record by exact username.
    async fn find_by_username(&self, username: &str)
        -> Result<Option<CredentialRecord>, StoreError>;
}

// ============================================================================
// SQLite
// ============================================================================

/// Credential store backed by a pooled SQLite database.
///
/// Expects the `credentials` table created by
/// [`ensure_schema`](crate::database::ensure_schema).
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO credentials (username, password_hash) VALUES (?, ?)")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let record = sqlx::query_as::<_, CredentialRecord>(
            "SELECT username, password_hash FROM credentials WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-process credential store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.contains_key(username) {
            return Err(StoreError::Duplicate);
        }
        records.insert(username.to_string(), password_hash.to_string());
        Ok(())
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .get(username)
            .map(|hash| CredentialRecord {
                username: username.to_string(),
                password_hash: hash.clone(),
            }))
    }
}
