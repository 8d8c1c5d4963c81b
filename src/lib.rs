//! # service-kit
//!
//! Thin, production-sane wrappers for the plumbing most services repeat:
//! transactional database access, read-through caching, migrations, config
//! loading and small JSON state files.
//!
//! ## Features
//!
//! - **Transactions:** one commit / rollback / panic protocol shared by every store
//!   ([`transaction`], [`postgres`], [`sqlite`])
//! - **Get-or-compute caching:** [`Cache::remember`] and [`Cache::remember_json`]
//!   over any [`CacheBackend`] (in-memory or Redis)
//! - **Migrations:** reversible directory migrations via `sqlx::migrate`
//! - **Config:** file plus environment overrides ([`config`]), platform state files ([`state`])
//!
//! ## Quick Start
//!
//! ### Transactions
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # async fn run() -> service_kit::Result<()> {
//! use service_kit::sqlite::{open_sqlite, sqlite_transaction};
//!
//! let pool = open_sqlite("app.db").await?;
//! sqlite_transaction(&pool, |tx| {
//!     Box::pin(async move {
//!         sqlx::query("UPDATE accounts SET balance = balance - 10 WHERE id = 1")
//!             .execute(&mut **tx)
//!             .await?;
//!         sqlx::query("UPDATE accounts SET balance = balance + 10 WHERE id = 2")
//!             .execute(&mut **tx)
//!             .await?;
//!         Ok(())
//!     })
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Caching
//!
//! ```
//! # #[cfg(feature = "inmemory")]
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> service_kit::Result<()> {
//! use service_kit::{backend::InMemoryBackend, Cache};
//! use std::time::Duration;
//!
//! let cache = Cache::new(InMemoryBackend::new()).with_prefix("svc");
//! let greeting = cache
//!     .remember("greeting", Some(Duration::from_secs(300)), || async {
//!         Ok::<_, service_kit::Error>("hello".to_string())
//!     })
//!     .await?;
//! assert_eq!(greeting, "hello");
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "inmemory"))]
//! # fn main() {}
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod key;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod migrate;
pub mod observability;
#[cfg(feature = "postgres")]
pub mod postgres;
mod remember;
pub mod serialization;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod state;
pub mod transaction;

// Re-exports for convenience
pub use backend::{CacheBackend, TtlState};
pub use cache::{is_miss, Cache, CacheConfig};
pub use error::{Error, Result};
pub use observability::{CacheMetrics, LogMetrics, NoOpMetrics};
pub use transaction::{
    run_in_transaction, run_in_transaction_with_config, TransactionConfig, TransactionHandle,
    TransactionSource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
