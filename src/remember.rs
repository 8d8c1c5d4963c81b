//! Get-or-compute cache population.
//!
//! ```text
//!   read key ──hit──────────────────────────────► return cached value
//!      │
//!      ├─error (backend, timeout, bad payload)──► return error, no compute
//!      │
//!     miss
//!      │
//!   compute ──Err(e)─────────────────────────────► return e, nothing written
//!      │
//!     Ok(v)
//!      │
//!   encode ─► write with TTL ──failure──────────► Error::WriteBack
//!      │
//!   return value
//! ```
//!
//! The TTL is only applied when the value is computed; a hit never extends
//! the lifetime of the entry. Concurrent callers that miss at the same time
//! may each compute; the last write wins.

use crate::backend::CacheBackend;
use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::serialization::{decode_from_cache, encode_for_cache, encode_json};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};

fn write_back(key: &str, cause: Error) -> Error {
    Error::WriteBack {
        key: key.to_string(),
        cause: Box::new(cause),
    }
}

impl<B: CacheBackend> Cache<B> {
    /// Return the string cached at `key`, computing and caching it on a miss.
    ///
    /// A computed string (`String`, `&'static str`, ...) is cached as-is; any
    /// other value is cached as JSON, so it can also be read back with
    /// [`remember_json`](Cache::remember_json).
    /// The returned string is exactly what was cached.
    ///
    /// # Example
    ///
    /// ```
    /// use service_kit::backend::InMemoryBackend;
    /// use service_kit::cache::Cache;
    /// use std::time::Duration;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> service_kit::Result<()> {
    /// let cache = Cache::new(InMemoryBackend::new());
    /// let ttl = Some(Duration::from_secs(3600));
    ///
    /// let first = cache.remember("k1", ttl, || async { Ok("v1") }).await?;
    /// let second = cache.remember("k1", ttl, || async { Ok("v2") }).await?;
    /// assert_eq!(first, "v1");
    /// assert_eq!(second, "v1");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - the compute callback's own error, unchanged, when it fails
    /// - `Error::WriteBack`: the value was computed but could not be cached
    /// - `Error::DeserializationError`: the cached payload is not UTF-8
    /// - `Error::BackendError` / `Error::Timeout`: the read failed (compute is not run)
    pub async fn remember<V, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<String>
    where
        V: Serialize + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(cached) = self.read(key).await? {
            debug!("✓ remember {} -> HIT", key);
            return Ok(cached);
        }

        let value = self.run_compute(key, compute).await?;

        let payload = encode_for_cache(&value).map_err(|e| write_back(key, e))?;
        self.write(key, payload.clone(), ttl)
            .await
            .map_err(|e| write_back(key, e))?;

        debug!("✓ remember {} -> computed and cached", key);
        Ok(payload)
    }

    /// Populate `dest` from the JSON cached at `key`, computing and caching
    /// it on a miss.
    ///
    /// On a miss the computed value is encoded and decoded into `T` before
    /// anything is written, so `dest` always holds exactly what was cached.
    /// `dest` is left untouched when compute or the write fails.
    ///
    /// # Example
    ///
    /// ```
    /// use service_kit::backend::InMemoryBackend;
    /// use service_kit::cache::Cache;
    /// use std::collections::BTreeMap;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> service_kit::Result<()> {
    /// let cache = Cache::new(InMemoryBackend::new());
    ///
    /// let mut stats: BTreeMap<String, u32> = BTreeMap::new();
    /// cache
    ///     .remember_json("stats", None, &mut stats, || async {
    ///         Ok(BTreeMap::from([("users".to_string(), 42_u32)]))
    ///     })
    ///     .await?;
    /// assert_eq!(stats["users"], 42);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - the compute callback's own error, unchanged, when it fails
    /// - `Error::WriteBack`: the value was computed but could not be cached,
    ///   including values whose JSON does not decode into `T`
    /// - `Error::DeserializationError`: the cached payload does not decode into `T`
    /// - `Error::BackendError` / `Error::Timeout`: the read failed (compute is not run)
    pub async fn remember_json<T, V, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        dest: &mut T,
        compute: F,
    ) -> Result<()>
    where
        T: DeserializeOwned,
        V: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(cached) = self.read(key).await? {
            *dest = decode_from_cache(&cached)?;
            debug!("✓ remember_json {} -> HIT", key);
            return Ok(());
        }

        let value = self.run_compute(key, compute).await?;

        let payload = encode_json(&value).map_err(|e| write_back(key, e))?;
        let decoded: T = decode_from_cache(&payload).map_err(|e| write_back(key, e))?;
        self.write(key, payload, ttl)
            .await
            .map_err(|e| write_back(key, e))?;

        *dest = decoded;
        debug!("✓ remember_json {} -> computed and cached", key);
        Ok(())
    }

    async fn run_compute<V, F, Fut>(&self, key: &str, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        debug!("» remember {} -> MISS, computing", key);
        let timer = Instant::now();
        let result = compute().await;
        self.metrics().record_compute(key, timer.elapsed());

        if let Err(e) = &result {
            warn!("✗ compute for {} failed: {}", key, e);
        }
        result
    }
}
