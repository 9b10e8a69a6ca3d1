//! Error types for Bitdid core.

use crate::types::{EntityKey, EntityKind};
use bitdid_backend::{BackendError, TransactionId};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in unit-of-work operations.
///
/// Everything except [`CoreError::BackendFailure`] and [`CoreError::Cancelled`]
/// reports misuse of the tracking or transaction discipline and should not be
/// retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The backend rejected or failed an operation. Tracked state is unchanged.
    #[error("backend failure: {0}")]
    BackendFailure(BackendError),

    /// The entity's identity is not attached to the session.
    #[error("entity {key} is not tracked")]
    NotTracked {
        /// The identity that was looked up.
        key: EntityKey,
    },

    /// The identity is already tracked with a different instance.
    #[error("entity {key} is already tracked by a different instance")]
    DuplicateAttachment {
        /// The contested identity.
        key: EntityKey,
    },

    /// `add` was called for an identity the session already tracks.
    #[error("entity {key} is already tracked")]
    AlreadyTracked {
        /// The contested identity.
        key: EntityKey,
    },

    /// A tracked entity's key fields were changed in place.
    #[error("identity of tracked entity {key} changed to {current}")]
    IdentityChanged {
        /// The identity the entity was attached under.
        key: EntityKey,
        /// The identity it reports now.
        current: EntityKey,
    },

    /// The entity kind is not in the session's registry.
    #[error("entity kind {kind} is not registered")]
    UnknownEntityKind {
        /// The unregistered kind.
        kind: EntityKind,
    },

    /// `begin` was called while a transaction is active.
    #[error("transaction {id} is already active")]
    TransactionAlreadyActive {
        /// The active transaction.
        id: TransactionId,
    },

    /// `commit` or `rollback` was called with no active transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// The operation was cancelled; nothing was applied.
    #[error("operation cancelled")]
    Cancelled,

    /// An entity could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a not tracked error.
    pub fn not_tracked(key: EntityKey) -> Self {
        Self::NotTracked { key }
    }

    /// Creates a duplicate attachment error.
    pub fn duplicate_attachment(key: EntityKey) -> Self {
        Self::DuplicateAttachment { key }
    }

    /// Creates an already tracked error.
    pub fn already_tracked(key: EntityKey) -> Self {
        Self::AlreadyTracked { key }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns true for errors the caller may resolve by retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendFailure(_) | Self::Cancelled)
    }
}

impl From<BackendError> for CoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Cancelled => Self::Cancelled,
            other => Self::BackendFailure(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyValue;

    #[test]
    fn backend_cancellation_maps_to_cancelled() {
        let err: CoreError = BackendError::Cancelled.into();
        assert!(matches!(err, CoreError::Cancelled));
        assert!(err.is_retryable());
    }

    #[test]
    fn backend_errors_wrap() {
        let err: CoreError = BackendError::constraint("tags", "row already exists").into();
        assert!(matches!(err, CoreError::BackendFailure(_)));
        assert!(err.to_string().contains("row already exists"));
    }

    #[test]
    fn discipline_errors_not_retryable() {
        let key = EntityKey::new(EntityKind::Tag, KeyValue::Int(1));
        assert!(!CoreError::not_tracked(key.clone()).is_retryable());
        assert!(!CoreError::already_tracked(key).is_retryable());
        assert!(!CoreError::NoActiveTransaction.is_retryable());
    }
}
