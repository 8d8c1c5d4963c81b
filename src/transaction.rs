//! Transaction coordinator - run a unit of work inside one transaction.
//!
//! The protocol is written once and shared by every store:
//!
//! ```text
//! Idle ──begin──▶ Open ──work Ok──▶ commit ──▶ Committed
//!                   │
//!                   ├──work Err──▶ rollback ──▶ RolledBack   (original error returned)
//!                   │
//!                   └──work panics──▶ rollback ──▶ resume_unwind(payload)
//! ```
//!
//! - A begin failure is returned directly; the unit of work never runs.
//! - The unit of work runs exactly once. There are no retries.
//! - A commit failure is returned as [`Error::CommitFailed`]: the outcome is
//!   indeterminate and must be treated as failed.
//! - When rollback fails after the unit of work failed, the result is
//!   [`Error::RollbackFailed`] with the unit of work's error as its `source()`.
//! - A panic is never converted into an error. The transaction is rolled back
//!   (best effort, failures are logged) and the original panic payload is
//!   resumed so the caller's own panic handling still sees it.
//!
//! Stores plug in through [`TransactionSource`] and [`TransactionHandle`].
//! Every `sqlx::Pool<DB>` is a source, so [`crate::postgres::with_transaction`]
//! and [`crate::sqlite::sqlite_transaction`] are thin typed entry points over
//! [`run_in_transaction`].
//!
//! # Example
//!
//! ```ignore
//! use service_kit::transaction::run_in_transaction;
//!
//! let id = run_in_transaction(&pool, |tx| {
//!     Box::pin(async move {
//!         let row: (i64,) = sqlx::query_as("INSERT INTO users (name) VALUES (?) RETURNING id")
//!             .bind("John")
//!             .fetch_one(&mut **tx)
//!             .await?;
//!         Ok(row.0)
//!     })
//! })
//! .await?;
//! ```

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;

/// Something a transaction can be started against (a pool, a connection).
///
/// **ASYNC:** All methods are async and must be awaited.
#[allow(async_fn_in_trait)]
pub trait TransactionSource: Send + Sync {
    /// Open transaction handle produced by [`begin`](TransactionSource::begin).
    type Transaction: TransactionHandle;

    /// Start a new transaction.
    ///
    /// # Errors
    /// Returns `Err` if no connection is available or the store refuses to begin.
    async fn begin(&self) -> Result<Self::Transaction>;
}

/// An open transaction that is resolved exactly once.
#[allow(async_fn_in_trait)]
pub trait TransactionHandle: Send {
    /// Make the transaction's writes durable.
    ///
    /// # Errors
    /// Returns `Err` if the store rejects or loses the commit.
    async fn commit(self) -> Result<()>;

    /// Discard the transaction's writes.
    ///
    /// # Errors
    /// Returns `Err` if the store could not roll back (connection lost, etc.)
    async fn rollback(self) -> Result<()>;
}

impl<DB: sqlx::Database> TransactionSource for sqlx::Pool<DB> {
    type Transaction = sqlx::Transaction<'static, DB>;

    async fn begin(&self) -> Result<Self::Transaction> {
        Ok(sqlx::Pool::begin(self).await?)
    }
}

impl<DB: sqlx::Database> TransactionHandle for sqlx::Transaction<'static, DB> {
    async fn commit(self) -> Result<()> {
        Ok(sqlx::Transaction::commit(self).await?)
    }

    async fn rollback(self) -> Result<()> {
        Ok(sqlx::Transaction::rollback(self).await?)
    }
}

/// Per-call transaction settings.
///
/// # Example
///
/// ```
/// use service_kit::transaction::TransactionConfig;
/// use std::time::Duration;
///
/// let config = TransactionConfig::default().with_timeout(Duration::from_secs(5));
/// assert_eq!(config.timeout, Some(Duration::from_secs(5)));
/// ```
#[derive(Clone, Debug, Default)]
pub struct TransactionConfig {
    /// Deadline for begin, unit of work and commit, measured from the start of
    /// the call. `None` = unbounded.
    ///
    /// Rollback is cleanup and is not bounded by this deadline.
    pub timeout: Option<Duration>,
}

impl TransactionConfig {
    /// Bound the whole call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Run `work` inside a transaction started on `source`.
///
/// Commits when `work` returns `Ok`, rolls back when it returns `Err` or
/// panics. See the [module documentation](self) for the full contract.
///
/// # Errors
///
/// - Begin failure (typically `Error::DatabaseError` or `Error::Timeout`)
/// - The error returned by `work`, unchanged, after a successful rollback
/// - `Error::RollbackFailed` if the rollback after a failed `work` also failed
/// - `Error::CommitFailed` if `work` succeeded but the commit did not
pub async fn run_in_transaction<S, F, T>(source: &S, work: F) -> Result<T>
where
    S: TransactionSource,
    F: for<'t> FnOnce(&'t mut S::Transaction) -> BoxFuture<'t, Result<T>>,
{
    run_in_transaction_with_config(source, TransactionConfig::default(), work).await
}

/// [`run_in_transaction`] with per-call settings.
///
/// With a timeout configured:
/// - a deadline that passes before or during begin yields `Error::Timeout`
///   and `work` never runs;
/// - a deadline that passes during `work` drops the work future and routes
///   `Error::Timeout` through the rollback path;
/// - a deadline that passes during commit yields `Error::CommitFailed`.
///
/// # Errors
///
/// Same as [`run_in_transaction`], plus `Error::Timeout`.
pub async fn run_in_transaction_with_config<S, F, T>(
    source: &S,
    config: TransactionConfig,
    work: F,
) -> Result<T>
where
    S: TransactionSource,
    F: for<'t> FnOnce(&'t mut S::Transaction) -> BoxFuture<'t, Result<T>>,
{
    let deadline = config.timeout.map(|t| Instant::now() + t);

    let mut tx = within(deadline, "begin transaction", source.begin())
        .await
        .inspect_err(|e| warn!("✗ Failed to begin transaction: {}", e))?;
    debug!("» Transaction open");

    let outcome = AssertUnwindSafe(within(deadline, "unit of work", work(&mut tx)))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(value)) => match within(deadline, "commit", tx.commit()).await {
            Ok(()) => {
                debug!("✓ Transaction committed");
                Ok(value)
            }
            Err(e) => {
                error!("✗ Transaction commit failed: {}", e);
                Err(Error::CommitFailed(e.to_string()))
            }
        },
        Ok(Err(err)) => match tx.rollback().await {
            Ok(()) => {
                debug!("✓ Transaction rolled back: {}", err);
                Err(err)
            }
            Err(rb) => {
                error!("✗ Rollback failed after error ({}): {}", err, rb);
                Err(Error::RollbackFailed {
                    original: Box::new(err),
                    rollback_error: rb.to_string(),
                })
            }
        },
        Err(panic) => {
            if let Err(rb) = tx.rollback().await {
                error!("✗ Rollback failed after panic in unit of work: {}", rb);
            } else {
                warn!("⚠ Unit of work panicked, transaction rolled back");
            }
            std::panic::resume_unwind(panic)
        }
    }
}

/// Await `fut`, failing with `Error::Timeout` once `deadline` has passed.
///
/// A deadline already in the past fails without polling `fut`.
async fn within<T>(
    deadline: Option<Instant>,
    step: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(deadline) = deadline else {
        return fut.await;
    };

    if Instant::now() >= deadline {
        return Err(Error::Timeout(format!("deadline passed before {}", step)));
    }

    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| Error::Timeout(format!("deadline passed during {}", step)))?
}
