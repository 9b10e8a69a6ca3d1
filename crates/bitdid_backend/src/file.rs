//! File-based persistence backend.

use crate::backend::{PersistenceBackend, TransactionId};
use crate::batch::ChangeBatch;
use crate::cancel::CancellationToken;
use crate::error::{BackendError, BackendResult};
use crate::memory::{InMemoryBackend, Tables};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Version of the on-disk layout.
const FORMAT_VERSION: u16 = 1;

#[derive(Deserialize)]
struct StoreFile {
    format_version: u16,
    tables: Tables,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    format_version: u16,
    tables: &'a Tables,
}

/// A file-based persistence backend.
///
/// Reads and transactions are served by an [`InMemoryBackend`]; every change
/// to committed state (an untransacted batch, a commit, or a schema creation)
/// rewrites the whole store to `path` as CBOR. The file is replaced through a
/// temporary sibling and a rename, so a crash leaves either the old or the new
/// state on disk.
///
/// The file is written before the new state becomes visible in memory. If the
/// write fails, readers keep seeing the previous state and the same change can
/// be retried; a failed commit still spends its transaction.
///
/// # Example
///
/// ```no_run
/// use bitdid_backend::{FileBackend, PersistenceBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("market.bitdid")).unwrap();
/// backend.ensure_schema(&["currencies"]).unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: InMemoryBackend,
}

impl FileBackend {
    /// Opens the store at `path`, or starts an empty one if the file is
    /// missing or empty. Nothing is written until the first change.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, cannot be decoded, or was
    /// written by an unsupported format version.
    pub fn open(path: &Path) -> BackendResult<Self> {
        let tables = match fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => {
                let reader = BufReader::new(File::open(path)?);
                let stored: StoreFile = ciborium::from_reader(reader)
                    .map_err(|e| BackendError::Corrupted(e.to_string()))?;
                if stored.format_version != FORMAT_VERSION {
                    return Err(BackendError::Corrupted(format!(
                        "unsupported format version {}",
                        stored.format_version
                    )));
                }
                stored.tables
            }
            Ok(_) => Tables::default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            inner: InMemoryBackend::from_tables(tables),
        })
    }

    /// Opens the store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> BackendResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of committed rows in a table.
    #[must_use]
    pub fn row_count(&self, kind: &str) -> usize {
        self.inner.row_count(kind)
    }

    /// Writes `tables` to the store file. Called with the committed tables
    /// locked, so writers are serialized.
    fn save(&self, tables: &Tables) -> BackendResult<()> {
        let stored = StoreFileRef {
            format_version: FORMAT_VERSION,
            tables,
        };

        let tmp = self.path.with_extension("tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        ciborium::into_writer(&stored, &mut writer)
            .map_err(|e| BackendError::codec(e.to_string()))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "wrote store file");
        Ok(())
    }
}

impl PersistenceBackend for FileBackend {
    fn apply_batch(
        &self,
        tx: Option<TransactionId>,
        batch: &ChangeBatch,
        cancel: &CancellationToken,
    ) -> BackendResult<usize> {
        self.inner
            .apply_batch_with(tx, batch, cancel, Some(&|tables: &Tables| self.save(tables)))
    }

    fn begin_tx(&self) -> BackendResult<TransactionId> {
        self.inner.begin_tx()
    }

    fn commit_tx(&self, tx: TransactionId) -> BackendResult<()> {
        self.inner
            .commit_tx_with(tx, Some(&|tables: &Tables| self.save(tables)))
    }

    fn rollback_tx(&self, tx: TransactionId) -> BackendResult<()> {
        self.inner.rollback_tx(tx)
    }

    fn ensure_schema(&self, kinds: &[&str]) -> BackendResult<bool> {
        self.inner
            .ensure_schema_with(kinds, Some(&|tables: &Tables| self.save(tables)))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Change;
    use tempfile::tempdir;

    fn insert(backend: &FileBackend, tx: Option<TransactionId>, key: u8, payload: u8) {
        let batch: ChangeBatch = vec![Change::insert("tags", vec![key], vec![payload])]
            .into_iter()
            .collect();
        backend
            .apply_batch(tx, &batch, &CancellationToken::new())
            .unwrap();
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(&dir.path().join("store.bitdid")).unwrap();
        assert!(backend.tables().unwrap().is_empty());
        assert!(!backend.path().exists());
    }

    #[test]
    fn committed_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bitdid");

        {
            let backend = FileBackend::open(&path).unwrap();
            backend.ensure_schema(&["tags"]).unwrap();
            insert(&backend, None, 1, 10);
        }

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.tables().unwrap(), vec!["tags"]);
        assert_eq!(reopened.get(None, "tags", &[1]).unwrap(), Some(vec![10]));
    }

    #[test]
    fn uncommitted_transaction_not_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bitdid");

        {
            let backend = FileBackend::open(&path).unwrap();
            backend.ensure_schema(&["tags"]).unwrap();
            let tx = backend.begin_tx().unwrap();
            insert(&backend, Some(tx), 1, 10);
        }

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.row_count("tags"), 0);
    }

    #[test]
    fn commit_is_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bitdid");

        {
            let backend = FileBackend::open(&path).unwrap();
            backend.ensure_schema(&["tags"]).unwrap();
            let tx = backend.begin_tx().unwrap();
            insert(&backend, Some(tx), 1, 10);
            insert(&backend, Some(tx), 2, 20);
            backend.commit_tx(tx).unwrap();
        }

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.row_count("tags"), 2);
    }

    /// Occupies the temporary path with a directory so the next write fails.
    fn block_writes(path: &Path) -> PathBuf {
        let blocker = path.with_extension("tmp");
        fs::create_dir(&blocker).unwrap();
        blocker
    }

    #[test]
    fn failed_write_keeps_batch_out_of_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bitdid");
        let backend = FileBackend::open(&path).unwrap();
        backend.ensure_schema(&["tags"]).unwrap();

        let blocker = block_writes(&path);
        let batch: ChangeBatch = vec![Change::insert("tags", vec![1], vec![10])]
            .into_iter()
            .collect();
        let result = backend.apply_batch(None, &batch, &CancellationToken::new());

        assert!(matches!(result, Err(BackendError::Io(_))));
        assert_eq!(backend.row_count("tags"), 0);
        assert_eq!(backend.get(None, "tags", &[1]).unwrap(), None);

        fs::remove_dir(&blocker).unwrap();
        insert(&backend, None, 1, 10);
        assert_eq!(FileBackend::open(&path).unwrap().row_count("tags"), 1);
    }

    #[test]
    fn failed_commit_write_discards_transaction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bitdid");
        let backend = FileBackend::open(&path).unwrap();
        backend.ensure_schema(&["tags"]).unwrap();
        let tx = backend.begin_tx().unwrap();
        insert(&backend, Some(tx), 1, 10);

        let blocker = block_writes(&path);
        assert!(matches!(backend.commit_tx(tx), Err(BackendError::Io(_))));
        assert_eq!(backend.row_count("tags"), 0);
        assert!(matches!(
            backend.commit_tx(tx),
            Err(BackendError::UnknownTransaction(_))
        ));

        fs::remove_dir(&blocker).unwrap();
        insert(&backend, None, 1, 10);
        assert_eq!(backend.row_count("tags"), 1);
    }

    #[test]
    fn failed_schema_write_creates_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bitdid");
        let backend = FileBackend::open(&path).unwrap();

        let blocker = block_writes(&path);
        assert!(backend.ensure_schema(&["tags"]).is_err());
        assert!(backend.tables().unwrap().is_empty());

        fs::remove_dir(&blocker).unwrap();
        assert!(backend.ensure_schema(&["tags"]).unwrap());
        assert_eq!(FileBackend::open(&path).unwrap().tables().unwrap(), vec!["tags"]);
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.bitdid");
        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        backend.ensure_schema(&["tags"]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn garbage_file_is_corrupted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bitdid");
        fs::write(&path, b"\xff\xff\xff not cbor").unwrap();

        let result = FileBackend::open(&path);
        assert!(matches!(result, Err(BackendError::Corrupted(_))));
    }
}
