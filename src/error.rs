//! Error types for metafetch
//!
//! The pipeline distinguishes four classes of failure:
//! - rate limiting, which is a scheduling event and never surfaces as an error
//! - item fetch errors, which are persisted as `Failure` outcomes and never thrown
//! - storage errors, which abort the current scheduler iteration
//! - configuration errors, which are rejected before any work begins
//!
//! Only the last two are represented here.

use thiserror::Error;

/// Result type alias for metafetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for metafetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Failure reported by a non-SQLite durable store
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid endpoint URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Serialization error (persisted records, config files)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A run is already active on this scheduler
    #[error("a run is already in progress")]
    AlreadyRunning,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for a specific setting.
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Returns true if this error came from the durable store.
    ///
    /// Storage errors are propagated uninterpreted; the caller decides whether
    /// to retry `start()`.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Sqlx(_) | Error::Storage(_) | Error::Serialization(_)
        )
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::config("concurrency", "must be at least 1");
        assert_eq!(err.to_string(), "configuration error: must be at least 1");
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("concurrency")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_storage_classification() {
        assert!(Error::Storage("disk full".into()).is_storage());
        assert!(Error::Database(DatabaseError::QueryFailed("locked".into())).is_storage());
        assert!(!Error::AlreadyRunning.is_storage());
        assert!(!Error::config("min_delay", "bad").is_storage());
    }
}
