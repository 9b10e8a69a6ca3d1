//! Session fixtures and sample records.
//!
//! Provides convenience functions for setting up test sessions with their
//! schema in place.

use bitdid_backend::{FileBackend, InMemoryBackend, PersistenceBackend};
use bitdid_core::{
    Category, Currency, CurrencyTag, EntityRegistry, Exchange, Session, SessionConfig, Tag,
    Tracked, PRICE_SCALE,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A test session with its backend and automatic cleanup.
pub struct TestSession {
    /// The session.
    pub session: Session,
    /// The backend the session writes to.
    pub backend: Arc<dyn PersistenceBackend>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestSession {
    /// Creates a session over a fresh in-memory backend with the schema ready.
    pub fn memory() -> Self {
        Self::over(Arc::new(InMemoryBackend::new()), None)
    }

    /// Creates a session over a file backend in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.bitdid");
        let backend = FileBackend::open(&path).expect("Failed to open file backend");
        Self::over(Arc::new(backend), Some(temp_dir))
    }

    /// Creates a session over `backend` and readies its schema.
    pub fn with_backend(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self::over(backend, None)
    }

    fn over(backend: Arc<dyn PersistenceBackend>, temp_dir: Option<TempDir>) -> Self {
        let session = Session::new(Arc::clone(&backend));
        session
            .ensure_schema_ready()
            .expect("Failed to create schema");
        Self {
            session,
            backend,
            _temp_dir: temp_dir,
        }
    }

    /// Opens another session over the same backend.
    pub fn sibling(&self) -> Session {
        Session::new(Arc::clone(&self.backend))
    }

    /// Opens another session over the same backend with `config`.
    pub fn sibling_with(&self, config: SessionConfig) -> Session {
        Session::with_config(
            Arc::clone(&self.backend),
            Arc::new(EntityRegistry::bitdid()),
            config,
        )
    }

    /// Returns the store path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir
            .as_ref()
            .map(|d| d.path().join("store.bitdid"))
    }

    /// Returns the number of committed rows of `table`, read through a fresh
    /// session-independent scan.
    pub fn committed_rows(&self, table: &str) -> usize {
        self.backend
            .scan(None, table)
            .expect("Failed to scan table")
            .len()
    }
}

impl std::ops::Deref for TestSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl std::ops::DerefMut for TestSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

/// Runs a test with a session over a fresh in-memory backend.
pub fn with_memory_session<F, R>(f: F) -> R
where
    F: FnOnce(&mut Session) -> R,
{
    let mut test_session = TestSession::memory();
    f(&mut test_session.session)
}

/// Runs a test with a session over a temporary file backend.
pub fn with_file_session<F, R>(f: F) -> R
where
    F: FnOnce(&mut Session) -> R,
{
    let mut test_session = TestSession::file();
    f(&mut test_session.session)
}

/// A category named after its ID.
pub fn sample_category(id: i64) -> Category {
    Category::new(id, format!("category-{id}"))
}

/// A ranked currency named after its ID.
pub fn sample_currency(id: i64) -> Currency {
    let mut currency = Currency::new(id, format!("Coin {id}"), format!("C{id}"));
    currency.rank = u32::try_from(id).ok();
    currency
}

/// A tag named after its ID.
pub fn sample_tag(id: i64) -> Tag {
    Tag::new(id, format!("tag {id}"))
}

/// An exchange named after its ID.
pub fn sample_exchange(id: i64) -> Exchange {
    Exchange::new(id, format!("Venue {id}"))
}

/// A currency/tag link.
pub fn sample_link(currency_id: i64, tag_id: i64) -> CurrencyTag {
    CurrencyTag::new(currency_id, tag_id)
}

/// Price of one whole unit, scaled.
pub fn whole_units(units: i64) -> i64 {
    units * PRICE_SCALE
}

/// Wraps each value in its own tracked handle.
pub fn tracked_all<T>(values: impl IntoIterator<Item = T>) -> Vec<Tracked<T>> {
    values.into_iter().map(Tracked::new).collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a session with `count` currencies and tags persisted.
    pub fn populated_session(count: i64) -> TestSession {
        let mut test = TestSession::memory();
        let currencies = tracked_all((1..=count).map(sample_currency));
        let tags = tracked_all((1..=count).map(sample_tag));
        test.add_range(&currencies).expect("Failed to add currencies");
        test.add_range(&tags).expect("Failed to add tags");
        test.persist().expect("Failed to persist");
        test
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_session_has_schema() {
        let test = TestSession::memory();
        assert_eq!(test.committed_rows("currencies"), 0);
    }

    #[test]
    fn file_session_has_path() {
        let test = TestSession::file();
        assert!(test.path().is_some());
        assert!(TestSession::memory().path().is_none());
    }

    #[test]
    fn populated_session_persists_rows() {
        let test = scenarios::populated_session(3);
        assert_eq!(test.committed_rows("currencies"), 3);
        assert_eq!(test.committed_rows("tags"), 3);
    }

    #[test]
    fn sample_currency_is_ranked() {
        assert_eq!(sample_currency(4).rank, Some(4));
        assert_eq!(whole_units(2), 200_000_000);
    }
}
