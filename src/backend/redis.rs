//! Redis cache backend implementation.

use super::{CacheBackend, TtlState};
use crate::error::{Error, Result};
use deadpool_redis::{
    redis::AsyncCommands, Config as PoolConfig, Connection, Pool, PoolError, Runtime,
};
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Formula: (CPU cores × 2) + 1
/// For 8-core systems: 16 connections is optimal
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

/// Environment variable overriding the pool size of [`RedisBackend::from_connection_string`].
pub const POOL_SIZE_ENV: &str = "REDIS_POOL_SIZE";

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    /// Bound on waiting for, and creating, a pooled connection.
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Config for a `host:port` address with default settings.
    ///
    /// A missing or unparseable port falls back to 6379.
    pub fn from_addr(addr: &str) -> Self {
        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().unwrap_or(6379)),
            None => (addr, 6379),
        };
        RedisConfig {
            host: host.to_string(),
            port,
            ..Default::default()
        }
    }

    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        if let Some(password) = &self.password {
            if let Some(username) = &self.username {
                format!(
                    "redis://{}:{}@{}:{}/{}",
                    username, password, self.host, self.port, self.database
                )
            } else {
                format!(
                    "redis://default:{}@{}:{}/{}",
                    password, self.host, self.port, self.database
                )
            }
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }
}

/// Pool size from `REDIS_POOL_SIZE`, or the default.
fn pool_size_from_env() -> u32 {
    std::env::var(POOL_SIZE_ENV)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_POOL_SIZE)
}

/// TTL in whole milliseconds, at least 1 so that Redis never rejects it.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis backend with connection pooling and async operations.
///
/// Uses deadpool for efficient async resource management and pooling.
///
/// # Example
///
/// ```no_run
/// # use service_kit::backend::{RedisBackend, RedisConfig, CacheBackend};
/// # use service_kit::error::Result;
/// # async fn example() -> Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default()).await?;
///
/// backend.set("key", b"value".to_vec(), None).await?;
/// let value = backend.get("key").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// The pool connects lazily; use [`CacheBackend::health_check`] to verify
    /// the server is reachable.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = Self::build_pool(
            &config.connection_string(),
            config.pool_size,
            config.connection_timeout,
        )?;

        info!(
            "✓ Redis backend initialized: {}:{} (db: {}, pool size: {})",
            config.host, config.port, config.database, config.pool_size
        );

        Ok(RedisBackend { pool })
    }

    /// Create from connection string directly.
    ///
    /// Pool size is determined by:
    /// 1. `REDIS_POOL_SIZE` environment variable (if set)
    /// 2. `DEFAULT_POOL_SIZE` constant (16)
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn from_connection_string(conn_str: &str) -> Result<Self> {
        let timeout = RedisConfig::default().connection_timeout;
        Self::from_url(conn_str, pool_size_from_env(), timeout).await
    }

    /// Create from connection string with explicit pool settings.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn from_url(
        conn_str: &str,
        pool_size: u32,
        connection_timeout: Duration,
    ) -> Result<Self> {
        let pool = Self::build_pool(conn_str, pool_size, connection_timeout)?;

        info!(
            "✓ Redis backend initialized from connection string (pool size: {})",
            pool_size
        );

        Ok(RedisBackend { pool })
    }

    fn build_pool(conn_str: &str, pool_size: u32, timeout: Duration) -> Result<Pool> {
        let mut pool_config = deadpool_redis::PoolConfig::new(pool_size as usize);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);

        let mut cfg = PoolConfig::from_url(conn_str);
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::BackendError(format!("Failed to create Redis pool: {}", e)))
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool.get().await.map_err(|e| match e {
            PoolError::Timeout(kind) => {
                Error::Timeout(format!("Timed out waiting for a Redis connection ({:?})", kind))
            }
            other => Error::BackendError(format!("Failed to get Redis connection: {}", other)),
        })
    }
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;

        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis GET failed for key {}: {}", key, e)))?;

        if value.is_some() {
            debug!("✓ Redis GET {} -> HIT", key);
        } else {
            debug!("✓ Redis GET {} -> MISS", key);
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection().await?;

        let mut cmd = deadpool_redis::redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(duration) = ttl {
            cmd.arg("PX").arg(ttl_millis(duration));
        }

        cmd.query_async::<()>(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis SET failed for key {}: {}", key, e)))?;

        match ttl {
            Some(d) => debug!("✓ Redis SET {} (TTL: {:?})", key, d),
            None => debug!("✓ Redis SET {}", key),
        }
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;

        let removed: u64 = conn
            .del(keys)
            .await
            .map_err(|e| Error::BackendError(format!("Redis DEL failed: {}", e)))?;

        debug!("✓ Redis DELETE {} keys ({} removed)", keys.len(), removed);
        Ok(removed)
    }

    async fn exists(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;

        let count: u64 = conn
            .exists(keys)
            .await
            .map_err(|e| Error::BackendError(format!("Redis EXISTS failed: {}", e)))?;

        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection().await?;

        let updated: bool = deadpool_redis::redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async(&mut *conn)
            .await
            .map_err(|e| {
                Error::BackendError(format!("Redis PEXPIRE failed for key {}: {}", key, e))
            })?;

        debug!("✓ Redis EXPIRE {} (TTL: {:?}) -> {}", key, ttl, updated);
        Ok(updated)
    }

    async fn ttl(&self, key: &str) -> Result<TtlState> {
        let mut conn = self.connection().await?;

        let millis: i64 = deadpool_redis::redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PTTL failed for key {}: {}", key, e)))?;

        Ok(match millis {
            -2 => TtlState::Missing,
            -1 => TtlState::Persistent,
            ms => TtlState::Expires(Duration::from_millis(ms.max(0) as u64)),
        })
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.connection().await?;

        let value: i64 = conn.incr(key, delta).await.map_err(|e| {
            Error::BackendError(format!("Redis INCRBY failed for key {}: {}", key, e))
        })?;

        debug!("✓ Redis INCRBY {} {} -> {}", key, delta, value);
        Ok(value)
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let mut conn = self.connection().await?;

        let mut cmd = deadpool_redis::redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(duration) = ttl {
            cmd.arg("PX").arg(ttl_millis(duration));
        }

        let reply: Option<String> = cmd.query_async(&mut *conn).await.map_err(|e| {
            Error::BackendError(format!("Redis SET NX failed for key {}: {}", key, e))
        })?;

        let written = reply.is_some();
        debug!("✓ Redis SETNX {} -> {}", key, written);
        Ok(written)
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection().await?;

        let pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong.contains("PONG"))
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.connection().await?;

        deadpool_redis::redis::cmd("FLUSHDB")
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis FLUSHDB failed: {}", e)))?;

        warn!("⚠ Redis FLUSHDB executed - all cache cleared!");
        Ok(())
    }
}
