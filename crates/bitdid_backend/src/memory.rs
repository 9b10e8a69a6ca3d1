//! In-memory persistence backend.

use crate::backend::{PersistenceBackend, TransactionId};
use crate::batch::{ChangeBatch, ChangeOp};
use crate::cancel::CancellationToken;
use crate::error::{BackendError, BackendResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// A row address: (table, key).
type Slot = (String, Vec<u8>);

/// Pending row values; `None` marks a delete.
type Writes = BTreeMap<Slot, Option<Vec<u8>>>;

/// Hook handed the next committed state before it replaces the current one.
/// If it fails, the current state is kept and the error is returned.
pub(crate) type Publish<'a> = Option<&'a dyn Fn(&Tables) -> BackendResult<()>>;

/// Committed tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    tables: BTreeMap<String, Table>,
}

impl Tables {
    fn contains_row(&self, kind: &str, key: &[u8]) -> bool {
        self.tables
            .get(kind)
            .is_some_and(|table| table.contains_key(key))
    }

    fn apply(&mut self, writes: Writes) {
        for ((kind, key), value) in writes {
            let table = self.tables.entry(kind).or_default();
            match value {
                Some(payload) => {
                    table.insert(key, payload);
                }
                None => {
                    table.remove(&key);
                }
            }
        }
    }

    /// Runs `change` in place, or on a copy that replaces `self` once
    /// `publish` accepts it.
    fn update(
        &mut self,
        publish: Publish<'_>,
        change: impl FnOnce(&mut Self),
    ) -> BackendResult<()> {
        match publish {
            None => change(self),
            Some(publish) => {
                let mut next = self.clone();
                change(&mut next);
                publish(&next)?;
                *self = next;
            }
        }
        Ok(())
    }
}

/// Writes staged by one transaction.
#[derive(Debug, Default)]
struct Overlay {
    writes: Writes,
    /// Whether each written row existed in the committed tables when the
    /// transaction first touched it.
    expected: BTreeMap<Slot, bool>,
}

impl Overlay {
    fn merge(&mut self, staged: Overlay) {
        self.writes.extend(staged.writes);
        for (slot, existed) in staged.expected {
            self.expected.entry(slot).or_insert(existed);
        }
    }

    /// Returns the table of the first row another writer inserted or deleted
    /// after this transaction staged it.
    fn conflict(&self, committed: &Tables) -> Option<&str> {
        self.expected
            .iter()
            .find(|((kind, key), existed)| committed.contains_row(kind, key) != **existed)
            .map(|((kind, _), _)| kind.as_str())
    }
}

/// An in-memory persistence backend.
///
/// Suitable for:
/// - Unit and integration tests
/// - Ephemeral stores that don't need persistence
/// - The engine behind [`crate::FileBackend`]
///
/// Writes made under a transaction are staged in a per-transaction overlay
/// and folded into the committed tables on `commit_tx`.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across sessions. The
/// transaction map is always locked before the committed tables.
///
/// # Example
///
/// ```rust
/// use bitdid_backend::{InMemoryBackend, PersistenceBackend};
///
/// let backend = InMemoryBackend::new();
/// assert!(backend.ensure_schema(&["tags"]).unwrap());
/// assert!(!backend.ensure_schema(&["tags"]).unwrap());
/// assert_eq!(backend.row_count("tags"), 0);
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    committed: RwLock<Tables>,
    transactions: Mutex<HashMap<TransactionId, Overlay>>,
    next_txid: AtomicU64,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::from_tables(Tables::default())
    }
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tables(tables: Tables) -> Self {
        Self {
            committed: RwLock::new(tables),
            transactions: Mutex::new(HashMap::new()),
            next_txid: AtomicU64::new(1),
        }
    }

    /// Returns the number of committed rows in a table (0 if it doesn't exist).
    #[must_use]
    pub fn row_count(&self, kind: &str) -> usize {
        self.committed
            .read()
            .tables
            .get(kind)
            .map_or(0, BTreeMap::len)
    }

    /// Returns the number of open transactions.
    #[must_use]
    pub fn active_transactions(&self) -> usize {
        self.transactions.lock().len()
    }

    /// Runs `f` against the committed tables and the overlay of `tx`.
    fn read_view<R>(
        &self,
        tx: Option<TransactionId>,
        f: impl FnOnce(&Tables, Option<&Overlay>) -> BackendResult<R>,
    ) -> BackendResult<R> {
        match tx {
            None => f(&self.committed.read(), None),
            Some(id) => {
                let transactions = self.transactions.lock();
                let overlay = transactions
                    .get(&id)
                    .ok_or(BackendError::UnknownTransaction(id))?;
                let committed = self.committed.read();
                f(&committed, Some(overlay))
            }
        }
    }
}

/// Validates `batch` against the committed tables plus any pending overlay and
/// returns the writes it would make.
fn stage(committed: &Tables, pending: Option<&Overlay>, batch: &ChangeBatch) -> BackendResult<Overlay> {
    let mut staged = Overlay::default();

    for change in batch {
        if !committed.tables.contains_key(&change.kind) {
            return Err(BackendError::schema_missing(&change.kind));
        }

        let slot = (change.kind.clone(), change.key.clone());
        let exists = match staged
            .writes
            .get(&slot)
            .or_else(|| pending.and_then(|overlay| overlay.writes.get(&slot)))
        {
            Some(value) => value.is_some(),
            None => {
                let exists = committed.contains_row(&change.kind, &change.key);
                staged.expected.insert(slot.clone(), exists);
                exists
            }
        };

        let value = match change.op {
            ChangeOp::Insert if exists => {
                return Err(BackendError::constraint(&change.kind, "row already exists"));
            }
            ChangeOp::Update | ChangeOp::Delete if !exists => {
                return Err(BackendError::constraint(&change.kind, "row does not exist"));
            }
            ChangeOp::Insert | ChangeOp::Update => Some(change.payload.clone()),
            ChangeOp::Delete => None,
        };
        staged.writes.insert(slot, value);
    }

    Ok(staged)
}

impl InMemoryBackend {
    /// Applies a batch; an untransacted batch reaches the committed tables
    /// only after `publish` accepts the resulting state.
    pub(crate) fn apply_batch_with(
        &self,
        tx: Option<TransactionId>,
        batch: &ChangeBatch,
        cancel: &CancellationToken,
        publish: Publish<'_>,
    ) -> BackendResult<usize> {
        if cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }

        match tx {
            None => {
                let mut committed = self.committed.write();
                let staged = stage(&committed, None, batch)?;
                if cancel.is_cancelled() {
                    return Err(BackendError::Cancelled);
                }
                committed.update(publish, |tables| tables.apply(staged.writes))?;
            }
            Some(id) => {
                let mut transactions = self.transactions.lock();
                let overlay = transactions
                    .get_mut(&id)
                    .ok_or(BackendError::UnknownTransaction(id))?;
                let staged = stage(&self.committed.read(), Some(&*overlay), batch)?;
                if cancel.is_cancelled() {
                    return Err(BackendError::Cancelled);
                }
                overlay.merge(staged);
            }
        }

        debug!(
            changes = batch.len(),
            inserts = batch.count_of(ChangeOp::Insert),
            updates = batch.count_of(ChangeOp::Update),
            deletes = batch.count_of(ChangeOp::Delete),
            ?tx,
            "applied change batch"
        );
        Ok(batch.len())
    }

    /// Commits `tx` after checking its rows against writes committed since
    /// they were staged. The transaction is spent whether or not this
    /// succeeds.
    pub(crate) fn commit_tx_with(
        &self,
        tx: TransactionId,
        publish: Publish<'_>,
    ) -> BackendResult<()> {
        let overlay = self
            .transactions
            .lock()
            .remove(&tx)
            .ok_or(BackendError::UnknownTransaction(tx))?;

        let mut committed = self.committed.write();
        if let Some(kind) = overlay.conflict(&committed) {
            warn!(%tx, table = kind, "transaction conflicts with a concurrent commit");
            return Err(BackendError::constraint(kind, "row changed by a concurrent commit"));
        }
        let writes = overlay.writes.len();
        committed.update(publish, |tables| tables.apply(overlay.writes))?;
        debug!(%tx, writes, "committed transaction");
        Ok(())
    }

    /// Creates missing tables, publishing the new state first.
    pub(crate) fn ensure_schema_with(
        &self,
        kinds: &[&str],
        publish: Publish<'_>,
    ) -> BackendResult<bool> {
        let mut committed = self.committed.write();
        let missing: Vec<&str> = kinds
            .iter()
            .copied()
            .filter(|kind| !committed.tables.contains_key(*kind))
            .collect();
        if missing.is_empty() {
            return Ok(false);
        }

        committed.update(publish, |tables| {
            for kind in &missing {
                tables.tables.insert((*kind).to_string(), Table::new());
            }
        })?;
        for kind in &missing {
            info!(table = *kind, "created table");
        }
        Ok(true)
    }
}

impl PersistenceBackend for InMemoryBackend {
    fn apply_batch(
        &self,
        tx: Option<TransactionId>,
        batch: &ChangeBatch,
        cancel: &CancellationToken,
    ) -> BackendResult<usize> {
        self.apply_batch_with(tx, batch, cancel, None)
    }

    fn begin_tx(&self) -> BackendResult<TransactionId> {
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        self.transactions.lock().insert(id, Overlay::default());
        Ok(id)
    }

    fn commit_tx(&self, tx: TransactionId) -> BackendResult<()> {
        self.commit_tx_with(tx, None)
    }

    fn rollback_tx(&self, tx: TransactionId) -> BackendResult<()> {
        let overlay = self
            .transactions
            .lock()
            .remove(&tx)
            .ok_or(BackendError::UnknownTransaction(tx))?;
        debug!(%tx, discarded = overlay.writes.len(), "rolled back transaction");
        Ok(())
    }

    fn ensure_schema(&self, kinds: &[&str]) -> BackendResult<bool> {
        self.ensure_schema_with(kinds, None)
    }

    fn get(
        &self,
        tx: Option<TransactionId>,
        kind: &str,
        key: &[u8],
    ) -> BackendResult<Option<Vec<u8>>> {
        self.read_view(tx, |committed, overlay| {
            let table = committed
                .tables
                .get(kind)
                .ok_or_else(|| BackendError::schema_missing(kind))?;
            if let Some(pending) =
                overlay.and_then(|o| o.writes.get(&(kind.to_string(), key.to_vec())))
            {
                return Ok(pending.clone());
            }
            Ok(table.get(key).cloned())
        })
    }

    fn scan(&self, tx: Option<TransactionId>, kind: &str) -> BackendResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.read_view(tx, |committed, overlay| {
            let mut rows = committed
                .tables
                .get(kind)
                .ok_or_else(|| BackendError::schema_missing(kind))?
                .clone();
            for ((table, key), value) in overlay.into_iter().flat_map(|o| &o.writes) {
                if table != kind {
                    continue;
                }
                match value {
                    Some(payload) => {
                        rows.insert(key.clone(), payload.clone());
                    }
                    None => {
                        rows.remove(key);
                    }
                }
            }
            Ok(rows.into_iter().collect())
        })
    }

    fn tables(&self) -> BackendResult<Vec<String>> {
        Ok(self.committed.read().tables.keys().cloned().collect())
    }
}
