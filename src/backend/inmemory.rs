//! In-memory cache backend (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Expired entries are removed lazily when touched.

use super::{CacheBackend, TtlState};
use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// In-memory cache entry with optional expiration.
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        CacheEntry { data, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Thread-safe async in-memory cache backend.
///
/// Entries expire on the tokio clock, so tests running with a paused clock
/// can advance time deterministically.
///
/// # Example
///
/// ```no_run
/// use service_kit::backend::{InMemoryBackend, CacheBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.set("key1", b"value".to_vec(), None).await?;
///     assert!(backend.get("key1").await?.is_some());
///
///     backend.set("key2", b"expires".to_vec(), Some(Duration::from_secs(300))).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory cache backend.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn purge_if_expired(&self, key: &str) {
        self.store.remove_if(key, |_, entry| entry.is_expired());
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
        }

        self.purge_if_expired(key);
        debug!("✓ InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.store.insert(key.to_string(), CacheEntry::new(value, ttl));

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ InMemory SET {}", key);
        }
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        let removed = keys
            .iter()
            .filter_map(|k| self.store.remove(*k))
            .filter(|(_, entry)| !entry.is_expired())
            .count() as u64;

        debug!("✓ InMemory DELETE {} keys ({} removed)", keys.len(), removed);
        Ok(removed)
    }

    async fn exists(&self, keys: &[&str]) -> Result<u64> {
        let count = keys
            .iter()
            .filter(|k| self.store.get(**k).is_some_and(|entry| !entry.is_expired()))
            .count();
        Ok(count as u64)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.purge_if_expired(key);
        match self.store.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                debug!("✓ InMemory EXPIRE {} (TTL: {:?})", key, ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<TtlState> {
        self.purge_if_expired(key);
        let state = match self.store.get(key) {
            None => TtlState::Missing,
            Some(entry) => match entry.expires_at {
                None => TtlState::Persistent,
                Some(at) => TtlState::Expires(at.saturating_duration_since(Instant::now())),
            },
        };
        Ok(state)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.purge_if_expired(key);
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry::new(b"0".to_vec(), None));

        let current: i64 = std::str::from_utf8(&entry.data)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                Error::BackendError(format!("Value at {} is not an integer or out of range", key))
            })?;
        let next = current.checked_add(delta).ok_or_else(|| {
            Error::BackendError(format!("Increment of {} would overflow", key))
        })?;

        entry.data = next.to_string().into_bytes();
        debug!("✓ InMemory INCRBY {} {} -> {}", key, delta, next);
        Ok(next)
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let written = match self.store.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CacheEntry::new(value, ttl));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, ttl));
                true
            }
        };

        debug!("✓ InMemory SETNX {} -> {}", key, written);
        Ok(written)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        warn!("⚠ InMemory CLEAR_ALL executed - all cache cleared!");
        Ok(())
    }
}
