//! Transaction coordinator.

use crate::error::{CoreError, CoreResult};
use bitdid_backend::{PersistenceBackend, TransactionId};
use std::sync::Arc;
use tracing::{info, warn};

/// State of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction is open.
    NoTransaction,
    /// A backend transaction is open.
    Active(TransactionId),
}

/// Drives the begin/commit/rollback state machine of one session.
///
/// ```text
/// NoTransaction --begin--> Active --commit|rollback--> NoTransaction
/// ```
///
/// The coordinator holds its own handle to the backend so that dropping it
/// while a transaction is active can roll the transaction back.
pub struct TransactionCoordinator {
    backend: Arc<dyn PersistenceBackend>,
    state: TransactionState,
}

impl TransactionCoordinator {
    /// Creates an idle coordinator over `backend`.
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            state: TransactionState::NoTransaction,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true if a transaction is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, TransactionState::Active(_))
    }

    /// Returns the active transaction, if any.
    #[must_use]
    pub fn current(&self) -> Option<TransactionId> {
        match self.state {
            TransactionState::Active(id) => Some(id),
            TransactionState::NoTransaction => None,
        }
    }

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TransactionAlreadyActive`] if one is open, or
    /// [`CoreError::BackendFailure`] if the backend cannot open one.
    pub fn begin(&mut self) -> CoreResult<TransactionId> {
        if let TransactionState::Active(id) = self.state {
            return Err(CoreError::TransactionAlreadyActive { id });
        }
        let id = self.backend.begin_tx()?;
        self.state = TransactionState::Active(id);
        info!(txn = %id, "transaction started");
        Ok(id)
    }

    /// Commits the active transaction.
    ///
    /// The coordinator is idle afterwards even if the backend fails to commit;
    /// the backend discards the transaction's effects in that case.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] if idle, or
    /// [`CoreError::BackendFailure`] if the commit fails.
    pub fn commit(&mut self) -> CoreResult<()> {
        let id = self.take_active()?;
        match self.backend.commit_tx(id) {
            Ok(()) => {
                info!(txn = %id, "transaction committed");
                Ok(())
            }
            Err(err) => {
                warn!(txn = %id, error = %err, "transaction commit failed");
                Err(CoreError::BackendFailure(err))
            }
        }
    }

    /// Rolls back the active transaction, discarding every write made since
    /// [`begin`](Self::begin).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] if idle, or
    /// [`CoreError::BackendFailure`] if the rollback fails.
    pub fn rollback(&mut self) -> CoreResult<()> {
        let id = self.take_active()?;
        self.backend
            .rollback_tx(id)
            .map_err(CoreError::BackendFailure)?;
        info!(txn = %id, "transaction rolled back");
        Ok(())
    }

    /// Rolls back an active transaction; does nothing when idle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BackendFailure`] if the rollback fails.
    pub fn dispose(&mut self) -> CoreResult<()> {
        if self.is_active() {
            self.rollback()?;
        }
        Ok(())
    }

    fn take_active(&mut self) -> CoreResult<TransactionId> {
        match std::mem::replace(&mut self.state, TransactionState::NoTransaction) {
            TransactionState::Active(id) => Ok(id),
            TransactionState::NoTransaction => Err(CoreError::NoActiveTransaction),
        }
    }
}

impl Drop for TransactionCoordinator {
    fn drop(&mut self) {
        if let TransactionState::Active(id) = self.state {
            warn!(txn = %id, "coordinator dropped with active transaction; rolling back");
            if let Err(err) = self.backend.rollback_tx(id) {
                warn!(txn = %id, error = %err, "implicit rollback failed");
            }
        }
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
