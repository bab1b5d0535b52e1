//! Core error types for the fin-data-lab cache.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.
//!
//! None of these errors cross the public surface of [`crate::cache::CacheService`]:
//! the service logs them and degrades to a cache miss or a dropped write.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the cache crates.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Cache operation failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Failures specific to the cache backends.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The durable backend could not be opened; the service falls back.
    #[error("Durable cache backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The fallback store rejected a write (quota exceeded).
    #[error("Cache capacity exceeded while writing '{key}'")]
    WriteCapacityExceeded { key: String },

    #[error("Failed to read cache entry '{key}': {reason}")]
    ReadFailure { key: String, reason: String },

    /// A stored entry could not be parsed back into a cache entry.
    #[error("Malformed cache entry '{key}': {reason}")]
    MalformedEntry { key: String, reason: String },

    #[error("Cache read for '{0}' timed out")]
    ReadTimeout(String),

    #[error("Cache lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::Cache(CacheError::LockPoisoned(err.to_string()))
    }
}
