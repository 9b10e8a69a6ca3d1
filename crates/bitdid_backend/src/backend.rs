//! Persistence backend trait definition.

use crate::batch::ChangeBatch;
use crate::cancel::CancellationToken;
use crate::error::BackendResult;
use std::fmt;

/// Handle of a backend transaction.
///
/// Transaction IDs are monotonically increasing per backend and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Storage that durably applies change batches.
///
/// Backends treat keys and payloads as opaque bytes. Tables are named by the
/// entity kind they hold and must be created with [`ensure_schema`] before use.
///
/// # Invariants
///
/// - `apply_batch` applies every change or none of them
/// - Writes made under a transaction are visible only to reads under the same
///   transaction until `commit_tx`
/// - `rollback_tx` discards every write made under the transaction
/// - Implementations must be `Send + Sync`; several sessions may share one
///
/// [`ensure_schema`]: PersistenceBackend::ensure_schema
pub trait PersistenceBackend: Send + Sync {
    /// Applies a batch atomically, inside `tx` when given.
    ///
    /// Returns the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns an error, with nothing applied, if:
    /// - A change violates a constraint (insert of an existing row, update or
    ///   delete of a missing row)
    /// - A change targets a table that does not exist
    /// - `cancel` was triggered before the batch was applied
    /// - `tx` is unknown
    fn apply_batch(
        &self,
        tx: Option<TransactionId>,
        batch: &ChangeBatch,
        cancel: &CancellationToken,
    ) -> BackendResult<usize>;

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot open a transaction.
    fn begin_tx(&self) -> BackendResult<TransactionId>;

    /// Makes every write of `tx` durable and visible.
    ///
    /// The handle is spent whether or not this succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if `tx` is unknown or the writes cannot be made durable.
    fn commit_tx(&self, tx: TransactionId) -> BackendResult<()>;

    /// Discards every write of `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if `tx` is unknown.
    fn rollback_tx(&self, tx: TransactionId) -> BackendResult<()>;

    /// Creates any missing tables among `kinds`.
    ///
    /// Returns true if at least one table was created. Calling this again with
    /// the same kinds returns false.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables cannot be created.
    fn ensure_schema(&self, kinds: &[&str]) -> BackendResult<bool>;

    /// Reads one row, seeing the uncommitted writes of `tx` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or `tx` is unknown.
    fn get(&self, tx: Option<TransactionId>, kind: &str, key: &[u8])
        -> BackendResult<Option<Vec<u8>>>;

    /// Reads every row of a table as `(key, payload)` pairs ordered by key,
    /// seeing the uncommitted writes of `tx` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or `tx` is unknown.
    fn scan(&self, tx: Option<TransactionId>, kind: &str) -> BackendResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Lists existing tables in name order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table list cannot be read.
    fn tables(&self) -> BackendResult<Vec<String>>;
}
