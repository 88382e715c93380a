//! Session Cache
//!
//! Ephemeral key-value storage with per-entry time-to-live.
//!
//! Expiry is the cache's job: once `ttl` has elapsed an entry reads as
//! absent without any caller action. Deleting a missing key succeeds.
//! Transport or server failures are [`CacheError::Unavailable`] and must
//! never be read as a miss.

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::info;

/// Session cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache could not be reached, rejected the command, or timed out
    #[error("{0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Access contract for the session cache.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Store `value` under `key`, readable until `ttl` elapses.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), CacheError>;

    /// Read a live entry. Expired and missing keys are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Remove an entry. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

// ============================================================================
// Redis
// ============================================================================

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL (from `REDIS_URL`)
    pub redis_url: String,

    /// Namespace prepended to every key
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            key_prefix: "session:".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load from `REDIS_URL` and `SESSION_KEY_PREFIX`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: std::env::var("SESSION_KEY_PREFIX").unwrap_or(defaults.key_prefix),
        }
    }
}

/// Session cache backed by Redis.
///
/// Uses a multiplexed [`ConnectionManager`], which reconnects on its own and
/// is cheap to clone per command.
#[derive(Clone)]
pub struct RedisSessionCache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisSessionCache {
    /// Connect to Redis and verify the connection with `PING`.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(key_prefix = %config.key_prefix, "Session cache connected");

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn key(&self, key: &str) -> String {
        namespaced(&self.key_prefix, key)
    }
}

/// Redis key for `key` under `prefix`.
fn namespaced(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

/// `PSETEX` expiry: milliseconds, saturating, and never zero (Redis rejects 0).
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let millis = ttl_millis(ttl);
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("PSETEX")
            .arg(self.key(key))
            .arg(millis)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-process session cache for tests and single-instance deployments.
///
/// Deadlines use the tokio clock, so tests can drive expiry with
/// `tokio::time::pause` and `advance`. Expired entries are evicted when read,
/// and every write sweeps the whole map at most once per [`SWEEP_INTERVAL`],
/// so abandoned sessions do not accumulate.
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    inner: Mutex<MemoryEntries>,
}

/// Minimum time between full sweeps of a [`MemorySessionCache`]
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct MemoryEntries {
    entries: HashMap<String, (String, Instant)>,
    next_sweep: Option<Instant>,
}

impl MemoryEntries {
    fn sweep(&mut self, now: Instant) {
        self.entries.retain(|_, (_, deadline)| *deadline > now);
        self.next_sweep = Some(now + SWEEP_INTERVAL);
    }
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Drop every expired entry now.
    pub fn purge_expired(&self) {
        self.inner.lock().sweep(Instant::now());
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        if inner.next_sweep.map_or(true, |at| now >= at) {
            inner.sweep(now);
        }
        inner
            .entries
            .insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut inner = self.inner.lock();
        let entries = &mut inner.entries;
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.lock().entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_readable_strictly_before_ttl() {
        let cache = MemorySessionCache::new();
        let ttl = Duration::from_secs(600);
        cache.set_with_ttl("tok", "alice", ttl).await.unwrap();

        assert_eq!(cache.get("tok").await.unwrap().as_deref(), Some("alice"));

        tokio::time::advance(ttl - Duration::from_millis(1)).await;
        assert_eq!(cache.get("tok").await.unwrap().as_deref(), Some("alice"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("tok").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_evicted_on_read() {
        let cache = MemorySessionCache::new();
        cache
            .set_with_ttl("tok", "alice", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("tok").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemorySessionCache::new();
        cache.set_with_ttl("short", "a", Duration::from_secs(1)).await.unwrap();
        cache.set_with_ttl("long", "b", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        cache.purge_expired();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_noop() {
        let cache = MemorySessionCache::new();
        cache.delete("never-set").await.unwrap();

        cache.set_with_ttl("tok", "alice", Duration::from_secs(60)).await.unwrap();
        cache.delete("tok").await.unwrap();
        cache.delete("tok").await.unwrap();
        assert_eq!(cache.get("tok").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_entries_are_swept_on_write() {
        let cache = MemorySessionCache::new();
        for i in 0..10_000 {
            cache
                .set_with_ttl(&format!("tok-{}", i), "alice", Duration::from_secs(1))
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 10_000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        cache.set_with_ttl("fresh", "bob", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh").await.unwrap().as_deref(), Some("bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_entries() {
        let cache = MemorySessionCache::new();
        cache.set_with_ttl("long", "a", Duration::from_secs(600)).await.unwrap();
        cache.set_with_ttl("short", "b", Duration::from_secs(1)).await.unwrap();

        tokio::time::advance(SWEEP_INTERVAL).await;
        cache.set_with_ttl("new", "c", Duration::from_secs(600)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("a"));
    }

    #[test]
    fn test_redis_keys_are_namespaced() {
        assert_eq!(namespaced("session:", "abc"), "session:abc");
        assert_eq!(namespaced("", "abc"), "abc");
        assert_eq!(
            namespaced(&CacheConfig::default().key_prefix, "tok"),
            "session:tok"
        );
    }

    #[test]
    fn test_redis_ttl_millis() {
        assert_eq!(ttl_millis(Duration::from_secs(600)), 600_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379/");
        assert_eq!(config.key_prefix, "session:");
    }
}
