//! Fault-injecting backend.
//!
//! [`FaultyBackend`] wraps an [`InMemoryBackend`], counts the calls it
//! receives and fails them on demand, so tests can observe what a session
//! sends to its backend and how it reacts to rejection.

use bitdid_backend::{
    BackendError, BackendResult, CancellationToken, ChangeBatch, InMemoryBackend,
    PersistenceBackend, TransactionId,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Call counters of a [`FaultyBackend`].
#[derive(Debug, Default)]
pub struct CallCounts {
    apply_batch: AtomicUsize,
    begin_tx: AtomicUsize,
    commit_tx: AtomicUsize,
    rollback_tx: AtomicUsize,
}

impl CallCounts {
    /// Number of `apply_batch` calls.
    pub fn apply_batch(&self) -> usize {
        self.apply_batch.load(Ordering::SeqCst)
    }

    /// Number of `begin_tx` calls.
    pub fn begin_tx(&self) -> usize {
        self.begin_tx.load(Ordering::SeqCst)
    }

    /// Number of `commit_tx` calls.
    pub fn commit_tx(&self) -> usize {
        self.commit_tx.load(Ordering::SeqCst)
    }

    /// Number of `rollback_tx` calls.
    pub fn rollback_tx(&self) -> usize {
        self.rollback_tx.load(Ordering::SeqCst)
    }
}

/// An in-memory backend that records calls and injects failures.
#[derive(Default)]
pub struct FaultyBackend {
    inner: InMemoryBackend,
    calls: CallCounts,
    fail_next_apply: AtomicBool,
    cancel_next_apply: AtomicBool,
    fail_next_commit: AtomicBool,
    batches: Mutex<Vec<ChangeBatch>>,
}

impl FaultyBackend {
    /// Creates a backend that fails nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the call counters.
    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    /// Makes the next `apply_batch` fail with a constraint violation.
    pub fn fail_next_apply(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }

    /// Makes the next `apply_batch` report cancellation.
    pub fn cancel_next_apply(&self) {
        self.cancel_next_apply.store(true, Ordering::SeqCst);
    }

    /// Makes the next `commit_tx` fail; the transaction is discarded.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns every batch that was accepted, in submission order.
    pub fn accepted_batches(&self) -> Vec<ChangeBatch> {
        self.batches.lock().clone()
    }
}

impl PersistenceBackend for FaultyBackend {
    fn apply_batch(
        &self,
        tx: Option<TransactionId>,
        batch: &ChangeBatch,
        cancel: &CancellationToken,
    ) -> BackendResult<usize> {
        self.calls.apply_batch.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(BackendError::constraint("injected", "injected apply failure"));
        }
        if self.cancel_next_apply.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Cancelled);
        }
        let affected = self.inner.apply_batch(tx, batch, cancel)?;
        self.batches.lock().push(batch.clone());
        Ok(affected)
    }

    fn begin_tx(&self) -> BackendResult<TransactionId> {
        self.calls.begin_tx.fetch_add(1, Ordering::SeqCst);
        self.inner.begin_tx()
    }

    fn commit_tx(&self, tx: TransactionId) -> BackendResult<()> {
        self.calls.commit_tx.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            self.inner.rollback_tx(tx)?;
            return Err(BackendError::Io(std::io::Error::other("injected commit failure")));
        }
        self.inner.commit_tx(tx)
    }

    fn rollback_tx(&self, tx: TransactionId) -> BackendResult<()> {
        self.calls.rollback_tx.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback_tx(tx)
    }

    fn ensure_schema(&self, kinds: &[&str]) -> BackendResult<bool> {
        self.inner.ensure_schema(kinds)
    }

    fn get(
        &self,
        tx: Option<TransactionId>,
        kind: &str,
        key: &[u8],
    ) -> BackendResult<Option<Vec<u8>>> {
        self.inner.get(tx, kind, key)
    }

    fn scan(&self, tx: Option<TransactionId>, kind: &str) -> BackendResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.scan(tx, kind)
    }

    fn tables(&self) -> BackendResult<Vec<String>> {
        self.inner.tables()
    }
}

impl std::fmt::Debug for FaultyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultyBackend")
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitdid_backend::Change;

    fn batch() -> ChangeBatch {
        [Change::insert("tags", vec![1], vec![1])].into_iter().collect()
    }

    #[test]
    fn injected_apply_failure_applies_nothing() {
        let backend = FaultyBackend::new();
        backend.ensure_schema(&["tags"]).unwrap();
        backend.fail_next_apply();

        let result = backend.apply_batch(None, &batch(), &CancellationToken::new());

        assert!(result.is_err());
        assert_eq!(backend.inner().row_count("tags"), 0);
        assert_eq!(backend.calls().apply_batch(), 1);

        // Only the next call fails.
        backend
            .apply_batch(None, &batch(), &CancellationToken::new())
            .unwrap();
        assert_eq!(backend.accepted_batches().len(), 1);
    }

    #[test]
    fn injected_commit_failure_discards_transaction() {
        let backend = FaultyBackend::new();
        backend.ensure_schema(&["tags"]).unwrap();
        let tx = backend.begin_tx().unwrap();
        backend
            .apply_batch(Some(tx), &batch(), &CancellationToken::new())
            .unwrap();
        backend.fail_next_commit();

        assert!(backend.commit_tx(tx).is_err());
        assert_eq!(backend.inner().row_count("tags"), 0);
        assert_eq!(backend.inner().active_transactions(), 0);
    }
}
