//! Cache backend implementations.

use crate::error::Result;
use std::time::Duration;

#[cfg(feature = "inmemory")]
pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::{PoolStats, RedisBackend, RedisConfig};

/// Remaining lifetime of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// Key does not exist.
    Missing,
    /// Key exists and never expires.
    Persistent,
    /// Key expires after the given duration.
    Expires(Duration),
}

/// Trait for cache backend implementations.
///
/// Backends deal in raw keys and raw bytes; namespacing and encoding are
/// done by [`Cache`](crate::cache::Cache).
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow concurrent access.
/// Backend implementations should use interior mutability or external storage.
///
/// A key that does not exist is never an error: `get` returns `Ok(None)`.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve value from cache by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found in cache
    /// - `Ok(None)` - Key not found
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs (connection lost, etc.)
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value in cache with optional TTL.
    ///
    /// # Arguments
    /// - `key`: Cache key
    /// - `value`: Payload bytes
    /// - `ttl`: Time-to-live. None = never expires
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove keys, returning how many existed.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn delete(&self, keys: &[&str]) -> Result<u64>;

    /// Count how many of `keys` exist.
    ///
    /// Default implementation calls `get()` for each key.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn exists(&self, keys: &[&str]) -> Result<u64> {
        let mut count = 0;
        for key in keys {
            if self.get(key).await?.is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Set a new TTL on an existing key. Returns `false` if the key does not exist.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining lifetime of a key.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn ttl(&self, key: &str) -> Result<TtlState>;

    /// Atomically add `delta` to an integer value, creating it at 0 if absent.
    ///
    /// # Errors
    /// Returns `Err` if the stored value is not an integer or the backend fails
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Store value only if the key does not exist. Returns `true` if written.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool>;

    /// Health check - verify backend is accessible.
    ///
    /// Used for readiness probes, circuit breakers, etc.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Optional: Clear all cache (use with caution).
    ///
    /// # Errors
    /// Returns `Err` if operation is not implemented or fails
    async fn clear_all(&self) -> Result<()> {
        Err(crate::error::Error::NotImplemented(
            "clear_all not implemented for this backend".to_string(),
        ))
    }
}
