//! Error types for backend operations.

use crate::backend::TransactionId;
use std::io;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while applying changes to a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A change violated a storage constraint; the whole batch was rejected.
    #[error("constraint violation in {kind}: {message}")]
    ConstraintViolation {
        /// The table the offending change targeted.
        kind: String,
        /// Description of the violation.
        message: String,
    },

    /// The table for a kind has not been created.
    #[error("no schema for {kind}; call ensure_schema first")]
    SchemaMissing {
        /// The missing table.
        kind: String,
    },

    /// The transaction handle is not known to this backend.
    #[error("unknown transaction {0}")]
    UnknownTransaction(TransactionId),

    /// The operation was cancelled before anything was applied.
    #[error("operation cancelled")]
    Cancelled,

    /// Persisted state could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The persisted state is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl BackendError {
    /// Creates a constraint violation error.
    pub fn constraint(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates a schema missing error.
    pub fn schema_missing(kind: impl Into<String>) -> Self {
        Self::SchemaMissing { kind: kind.into() }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Returns true if this error reports a cooperative cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
