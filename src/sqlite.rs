//! SQLite pool with production defaults and a transaction helper.
//!
//! Defaults applied by [`open_sqlite`]:
//!
//! | Setting | Default |
//! |---------|---------|
//! | `journal_mode` | `WAL` (with `synchronous=NORMAL`) |
//! | `busy_timeout` | 5 seconds |
//! | `foreign_keys` | on |
//! | max open connections | 25 |
//! | connections kept open | 5 |
//! | connection lifetime | 1 hour |
//! | `cache_size` / `temp_store` | 2 MB / memory |
//!
//! The database file is created if it does not exist.
//!
//! [`sqlite_transaction`] starts transactions with `BEGIN IMMEDIATE`, so the
//! write lock is taken at begin. A transaction that reads and then writes
//! never has to upgrade its lock mid-way; contending writers queue on
//! `busy_timeout` instead of failing with `SQLITE_BUSY`.

use crate::error::{Error, Result};
use crate::transaction::{
    run_in_transaction, run_in_transaction_with_config, TransactionConfig, TransactionSource,
};
use futures::future::BoxFuture;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Executor;
use std::str::FromStr;
use std::time::Duration;

/// Path that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Per-connection tuning: 2 MB page cache, temp tables in memory.
const PERFORMANCE_PRAGMAS: &str = "PRAGMA cache_size=-2000; PRAGMA temp_store=MEMORY;";

/// Open SQLite transaction handed to [`sqlite_transaction`] units of work.
pub type SqliteTx = sqlx::Transaction<'static, sqlx::Sqlite>;

/// Transaction source that begins with `BEGIN IMMEDIATE` on the wrapped pool.
///
/// `sqlx::Pool` on its own begins deferred transactions.
#[derive(Clone, Copy, Debug)]
pub struct SqliteImmediate<'a>(pub &'a SqlitePool);

impl TransactionSource for SqliteImmediate<'_> {
    type Transaction = SqliteTx;

    async fn begin(&self) -> Result<SqliteTx> {
        Ok(self.0.begin_with("BEGIN IMMEDIATE").await?)
    }
}

/// Configuration for SQLite connections.
#[derive(Clone, Debug)]
pub struct SqliteConfig {
    /// Database file path. [`IN_MEMORY`] for an in-memory database.
    pub path: String,
    /// Write-Ahead Logging for concurrent readers.
    pub wal_mode: bool,
    /// How long a connection waits on a locked database.
    pub busy_timeout: Duration,
    /// Maximum number of open connections.
    pub max_open_conns: u32,
    /// Connections the pool keeps open while idle.
    pub max_idle_conns: u32,
    /// How long a connection may be reused. `Duration::ZERO` = forever.
    pub conn_max_lifetime: Duration,
    /// Enforce foreign key constraints.
    pub foreign_keys: bool,
}

impl SqliteConfig {
    /// Production defaults for the database at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        SqliteConfig {
            path: path.into(),
            wal_mode: true,
            busy_timeout: Duration::from_secs(5),
            max_open_conns: 25,
            max_idle_conns: 5,
            conn_max_lifetime: Duration::from_secs(3600),
            foreign_keys: true,
        }
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = if self.path == IN_MEMORY {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
        };

        let mut options = options.foreign_keys(self.foreign_keys);

        if self.wal_mode {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }
        if !self.busy_timeout.is_zero() {
            options = options.busy_timeout(self.busy_timeout);
        }

        Ok(options)
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let mut pool = SqlitePoolOptions::new();
        if self.max_open_conns > 0 {
            pool = pool.max_connections(self.max_open_conns);
        }
        if self.max_idle_conns > 0 {
            let idle = match self.max_open_conns {
                0 => self.max_idle_conns,
                max => self.max_idle_conns.min(max),
            };
            pool = pool.min_connections(idle);
        }
        let lifetime = (!self.conn_max_lifetime.is_zero()).then_some(self.conn_max_lifetime);
        pool.max_lifetime(lifetime).after_connect(|conn, _meta| {
            Box::pin(async move { conn.execute(PERFORMANCE_PRAGMAS).await.map(|_| ()) })
        })
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::new(IN_MEMORY)
    }
}

/// Open a SQLite database with default settings.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> service_kit::Result<()> {
/// let db = service_kit::sqlite::open_sqlite("app.db").await?;
/// sqlx::query("INSERT INTO users (name) VALUES (?)")
///     .bind("John")
///     .execute(&db)
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// Returns `Err` if the file cannot be opened or the database does not answer a ping.
pub async fn open_sqlite(path: impl Into<String>) -> Result<SqlitePool> {
    open_sqlite_with_config(SqliteConfig::new(path)).await
}

/// Open a SQLite database with custom settings.
///
/// # Errors
/// Returns `Err` if the options are invalid, the file cannot be opened or
/// the database does not answer a ping.
pub async fn open_sqlite_with_config(config: SqliteConfig) -> Result<SqlitePool> {
    let pool = config
        .pool_options()
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to open sqlite {}: {}", config.path, e)))?;

    if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
        pool.close().await;
        return Err(Error::DatabaseError(format!("Failed to ping sqlite: {}", e)));
    }

    info!(
        "✓ SQLite opened: {} (wal: {}, max connections: {})",
        config.path, config.wal_mode, config.max_open_conns
    );
    Ok(pool)
}

/// Create an in-memory SQLite database, typically for tests.
///
/// The pool holds exactly one connection for its whole life so every query
/// sees the same database.
///
/// # Errors
/// Returns `Err` if SQLite cannot be initialised.
pub async fn sqlite_in_memory() -> Result<SqlitePool> {
    let config = SqliteConfig {
        wal_mode: false,
        max_open_conns: 1,
        max_idle_conns: 1,
        conn_max_lifetime: Duration::ZERO,
        ..SqliteConfig::new(IN_MEMORY)
    };

    let pool = config
        .pool_options()
        .idle_timeout(None)
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to open in-memory sqlite: {}", e)))?;

    debug!("✓ SQLite in-memory database ready");
    Ok(pool)
}

/// Execute `work` within a SQLite transaction opened with `BEGIN IMMEDIATE`.
///
/// Commits on success, rolls back on error or panic; a panic is resumed
/// after the rollback. See [`crate::transaction`] for the full contract.
///
/// # Example
///
/// ```no_run
/// # async fn example(db: sqlx::SqlitePool) -> service_kit::Result<()> {
/// use service_kit::sqlite::sqlite_transaction;
///
/// sqlite_transaction(&db, |tx| {
///     Box::pin(async move {
///         sqlx::query("INSERT INTO users (name) VALUES (?)")
///             .bind("John")
///             .execute(&mut **tx)
///             .await?;
///         Ok::<_, service_kit::Error>(())
///     })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// See [`run_in_transaction`].
pub async fn sqlite_transaction<F, T>(pool: &SqlitePool, work: F) -> Result<T>
where
    F: for<'t> FnOnce(&'t mut SqliteTx) -> BoxFuture<'t, Result<T>>,
{
    run_in_transaction(&SqliteImmediate(pool), work).await
}

/// [`sqlite_transaction`] bounded by a deadline.
///
/// # Errors
/// See [`run_in_transaction_with_config`].
pub async fn sqlite_transaction_timeout<F, T>(
    pool: &SqlitePool,
    timeout: Duration,
    work: F,
) -> Result<T>
where
    F: for<'t> FnOnce(&'t mut SqliteTx) -> BoxFuture<'t, Result<T>>,
{
    run_in_transaction_with_config(
        &SqliteImmediate(pool),
        TransactionConfig::default().with_timeout(timeout),
        work,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_config_defaults() {
        let config = SqliteConfig::new("app.db");
        assert_eq!(config.path, "app.db");
        assert!(config.wal_mode);
        assert!(config.foreign_keys);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert_eq!(config.max_open_conns, 25);
        assert_eq!(config.max_idle_conns, 5);
        assert_eq!(config.conn_max_lifetime, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_open_sqlite_file_applies_pragmas() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("app.db");

        let pool = open_sqlite(path.to_string_lossy().to_string())
            .await
            .expect("Failed to open sqlite");

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("Failed to read journal_mode");
        assert_eq!(mode.to_lowercase(), "wal");

        let (fk,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("Failed to read foreign_keys");
        assert_eq!(fk, 1);

        assert!(path.exists());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_in_memory_shares_one_database() {
        let pool = sqlite_in_memory().await.expect("Failed to open in-memory");

        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .expect("Failed to create table");
        sqlx::query("INSERT INTO t (id) VALUES (1)")
            .execute(&pool)
            .await
            .expect("Failed to insert");

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .expect("Failed to count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_sqlite_transaction_returns_value() {
        let pool = sqlite_in_memory().await.expect("Failed to open in-memory");
        sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .execute(&pool)
            .await
            .expect("Failed to create table");

        let id = sqlite_transaction(&pool, |tx| {
            Box::pin(async move {
                let result = sqlx::query("INSERT INTO users (name) VALUES (?)")
                    .bind("John")
                    .execute(&mut **tx)
                    .await?;
                Ok::<_, Error>(result.last_insert_rowid())
            })
        })
        .await
        .expect("Transaction should commit");

        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn test_immediate_transaction_holds_write_lock() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("lock.db");
        let config = SqliteConfig {
            busy_timeout: Duration::from_millis(10),
            ..SqliteConfig::new(path.to_string_lossy().to_string())
        };
        let pool = open_sqlite_with_config(config).await.expect("Failed to open sqlite");
        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .expect("Failed to create table");

        // No statement has run yet, but another writer is already locked out.
        let mut held = SqliteImmediate(&pool).begin().await.expect("Failed to begin");
        let blocked = sqlx::query("INSERT INTO t (id) VALUES (1)").execute(&pool).await;
        assert!(blocked.is_err(), "write lock must be held from begin");

        sqlx::query("INSERT INTO t (id) VALUES (2)")
            .execute(&mut *held)
            .await
            .expect("Holder can write");
        held.commit().await.expect("Failed to commit");
        pool.close().await;
    }
}
