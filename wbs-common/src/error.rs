//! Common error types for WBS

use thiserror::Error;

/// Common result type for WBS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across WBS services
#[derive(Error, Debug)]
pub enum Error {
    /// Session lock could not be acquired within the retry budget.
    ///
    /// Retryable by the caller; never treated as success.
    #[error("System busy: lock on session {token} not acquired after {attempts} attempts")]
    Busy { token: String, attempts: u32 },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the record's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record store backend failure
    #[error("Store error: {0}")]
    Store(String),

    /// Record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Outbound notification was not confirmed by the receiver
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Busy { .. } | Error::Delivery(_))
    }
}
