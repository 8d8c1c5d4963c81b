//! Error types for the toolkit.

use std::fmt;
use std::path::PathBuf;

/// Result type for toolkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the toolkit.
///
/// Every wrapper in this crate returns `Result<T>`. Variants map onto the
/// failure modes of the wrapped libraries plus the few conditions the
/// transaction and cache helpers add themselves:
#[derive(Debug, Clone)]
pub enum Error {
    /// Serialization failed when converting a value to its cached form.
    ///
    /// Common causes:
    /// - Map keys that are not strings
    /// - A `Serialize` impl that reports an error
    SerializationError(String),

    /// Deserialization failed when converting a cached payload back into a value.
    ///
    /// Common causes:
    /// - The cached payload was written by another program with a different shape
    /// - The payload is not valid UTF-8 / JSON
    DeserializationError(String),

    /// Cache miss: key not found in cache.
    ///
    /// This is the not-found signal. It is never used for malformed data or
    /// infrastructure failures. Check for it with [`crate::cache::is_miss`].
    CacheMiss,

    /// Cache backend error (Redis connection lost, protocol error, wrong type).
    ///
    /// **Recovery:** Retry the operation once the backend is reachable.
    BackendError(String),

    /// Relational store error (pool exhausted, connection refused, query failure).
    DatabaseError(String),

    /// Migration source could not be read or a migration failed to apply.
    MigrationError(String),

    /// The unit of work succeeded but the commit failed.
    ///
    /// The outcome of the transaction is indeterminate; treat it as failed.
    CommitFailed(String),

    /// The unit of work failed and the rollback that followed also failed.
    ///
    /// `original` is the error returned by the unit of work and is exposed
    /// through [`std::error::Error::source`].
    RollbackFailed {
        /// Error returned by the unit of work
        original: Box<Error>,
        /// Why the rollback failed
        rollback_error: String,
    },

    /// A value was computed on a cache miss but could not be persisted.
    ///
    /// Distinct from a failure of the compute callback itself: the business
    /// logic succeeded, the cache layer did not. `cause` is either a
    /// serialization error or a backend error.
    WriteBack {
        /// Cache key (as given by the caller, without prefix)
        key: String,
        /// Underlying serialization or backend error
        cause: Box<Error>,
    },

    /// Operation exceeded its deadline.
    Timeout(String),

    /// Configuration error (invalid URL, missing variable, unreadable config file).
    ///
    /// **Recovery:** Fix configuration and restart.
    ConfigError(String),

    /// State file does not exist yet.
    StateNotFound(PathBuf),

    /// Feature not implemented for this backend.
    NotImplemented(String),

    /// Generic error with custom message.
    ///
    /// Used for errors that don't fit into other variants, typically the
    /// business errors returned by units of work and compute callbacks.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::CacheMiss => write!(f, "Cache miss"),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            Error::MigrationError(msg) => write!(f, "Migration error: {}", msg),
            Error::CommitFailed(msg) => write!(f, "Failed to commit transaction: {}", msg),
            Error::RollbackFailed {
                original,
                rollback_error,
            } => write!(
                f,
                "Rollback failed: {} (original error: {})",
                rollback_error, original
            ),
            Error::WriteBack { key, cause } => {
                write!(f, "Computed value for {} was not cached: {}", key, cause)
            }
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::StateNotFound(path) => write!(f, "State file not found: {}", path.display()),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::RollbackFailed { original, .. } => Some(original.as_ref()),
            Error::WriteBack { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() || e.is_data() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => Error::Timeout("timed out acquiring a connection".into()),
            sqlx::Error::Configuration(msg) => Error::ConfigError(msg.to_string()),
            other => Error::DatabaseError(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Error::MigrationError(e.to_string())
    }
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}
