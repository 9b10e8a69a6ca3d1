//! Session implementation.

use crate::entity::{encode_key, restore, Entity, Tracked};
use crate::error::{CoreError, CoreResult};
use crate::registry::EntityRegistry;
use crate::session::config::{QueryTracking, SessionConfig};
use crate::session::options::PersistOptions;
use crate::session::set::EntitySet;
use crate::tracker::{ChangeEntry, ChangeTracker, TrackingState};
use crate::transaction::TransactionCoordinator;
use crate::types::{EntityKey, KeyValue, SessionId};
use bitdid_backend::{CancellationToken, ChangeBatch, PersistenceBackend, TransactionId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A unit of work over a persistence backend.
///
/// A session tracks the entities it is given or loads, reconciles their
/// in-memory state into one change batch on [`persist`](Self::persist), and
/// optionally spans several persists with an explicit transaction.
///
/// Sessions are single-owner: they are `Send` but meant to be driven from one
/// thread at a time. Several sessions may share one backend.
///
/// # Example
///
/// ```rust
/// use bitdid_backend::InMemoryBackend;
/// use bitdid_core::{Session, Tag, Tracked, TrackingState};
/// use std::sync::Arc;
///
/// let mut session = Session::new(Arc::new(InMemoryBackend::new()));
/// session.ensure_schema_ready().unwrap();
///
/// let tag = Tracked::new(Tag::new(1, "defi"));
/// session.add(&tag).unwrap();
/// assert_eq!(session.persist().unwrap(), 1);
///
/// tag.write().name = "DeFi".into();
/// assert_eq!(session.entry_state(&tag).unwrap(), TrackingState::Modified);
/// assert_eq!(session.persist().unwrap(), 1);
/// ```
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    registry: Arc<EntityRegistry>,
    backend: Arc<dyn PersistenceBackend>,
    tracker: ChangeTracker,
    coordinator: TransactionCoordinator,
}

impl Session {
    /// Creates a session accepting every market-data kind, with the default
    /// configuration.
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self::with_config(
            backend,
            Arc::new(EntityRegistry::bitdid()),
            SessionConfig::default(),
        )
    }

    /// Creates a session with an explicit registry and configuration.
    pub fn with_config(
        backend: Arc<dyn PersistenceBackend>,
        registry: Arc<EntityRegistry>,
        config: SessionConfig,
    ) -> Self {
        let id = SessionId::new();
        debug!(session = %id, kinds = registry.len(), "session opened");
        Self {
            id,
            config,
            registry,
            coordinator: TransactionCoordinator::new(Arc::clone(&backend)),
            backend,
            tracker: ChangeTracker::new(),
        }
    }

    /// Returns the session's ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the registry of accepted kinds.
    #[must_use]
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns true if inspection APIs currently run change detection.
    #[must_use]
    pub fn auto_detect_changes(&self) -> bool {
        self.config.auto_detect_changes
    }

    /// Returns the change tracker.
    #[must_use]
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Returns a typed view of the session for entities of type `T`.
    pub fn set<T: Entity>(&mut self) -> EntitySet<'_, T> {
        EntitySet::new(self)
    }

    // =========================================================================
    // Tracking
    // =========================================================================

    /// Attaches a new entity as Added.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyTracked`] if the identity is already
    /// tracked, or [`CoreError::UnknownEntityKind`] if `T` is not registered.
    pub fn add<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<()> {
        self.registry.require(T::KIND)?;
        let key = entity.read().entity_key();
        if self.tracker.state_of(&key) != TrackingState::Detached {
            return Err(CoreError::already_tracked(key));
        }
        self.tracker.attach(entity, TrackingState::Added)
    }

    /// Attaches every entity as Added, or none of them.
    ///
    /// # Errors
    ///
    /// Fails like [`add`](Self::add) on the first offending entity, including
    /// an identity repeated within `entities`; attachments made by this call
    /// are undone first.
    pub fn add_range<T: Entity>(&mut self, entities: &[Tracked<T>]) -> CoreResult<()> {
        let mut attached = Vec::with_capacity(entities.len());
        for entity in entities {
            match self.add(entity) {
                Ok(()) => attached.push(entity.read().entity_key()),
                Err(err) => {
                    for key in &attached {
                        self.tracker.detach(key);
                    }
                    debug!(session = %self.id, undone = attached.len(), error = %err, "add_range rolled back");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Schedules a tracked entity for deletion.
    ///
    /// An entity that was added and never persisted is detached instead.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotTracked`] if the entity is not attached.
    pub fn remove<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<()> {
        self.registry.require(T::KIND)?;
        self.tracker.mark_removed(entity)
    }

    /// Removes every entity, or none of them.
    ///
    /// # Errors
    ///
    /// Returns the error [`remove`](Self::remove) would return for the first
    /// entity that is not tracked by this exact instance; nothing is marked.
    pub fn remove_range<T: Entity>(&mut self, entities: &[Tracked<T>]) -> CoreResult<()> {
        self.registry.require(T::KIND)?;
        for entity in entities {
            self.ensure_tracked(entity)?;
        }
        for entity in entities {
            let key = entity.read().entity_key();
            // An Added entity repeated in the range is already detached.
            if self.tracker.state_of(&key) != TrackingState::Detached {
                self.tracker.mark_removed(entity)?;
            }
        }
        Ok(())
    }

    /// Forces an entity to Modified so it is written on the next persist.
    ///
    /// An untracked entity is attached as Modified.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateAttachment`] if the identity is tracked
    /// by a different instance.
    pub fn mark_as_changed<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<()> {
        self.registry.require(T::KIND)?;
        let key = entity.read().entity_key();
        if self.tracker.state_of(&key) == TrackingState::Detached {
            return self.tracker.attach(entity, TrackingState::Modified);
        }
        self.tracker.mark_modified(entity)
    }

    /// Stops tracking an entity. Returns true if it was tracked.
    pub fn detach<T: Entity>(&mut self, entity: &Tracked<T>) -> bool {
        let key = entity.read().entity_key();
        match self.tracker.instance::<T>(&key) {
            Some((tracked, _)) if tracked.ptr_eq(entity) => self.tracker.detach(&key),
            _ => false,
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Persists every pending change with default options.
    ///
    /// Returns the number of rows the backend affected; 0 without a backend
    /// call when nothing is pending.
    ///
    /// # Errors
    ///
    /// See [`persist_with`](Self::persist_with).
    pub fn persist(&mut self) -> CoreResult<usize> {
        self.persist_with(PersistOptions::default())
    }

    /// Detects changes, computes the change set and submits it to the backend
    /// as one atomic batch, inside the active transaction if there is one.
    ///
    /// On success, unless disabled in `options`, added and modified entities
    /// become Unchanged and removed entities are detached. On any error the
    /// tracked state is left exactly as it was after detection.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IdentityChanged`] if a tracked entity's key was mutated
    /// - [`CoreError::Cancelled`] if the token was cancelled
    /// - [`CoreError::BackendFailure`] if the backend rejected the batch
    pub fn persist_with(&mut self, options: PersistOptions) -> CoreResult<usize> {
        let detected = self.tracker.detect_changes()?;
        let changes = self.tracker.compute_change_set()?;
        if changes.is_empty() {
            debug!(session = %self.id, "nothing to persist");
            return Ok(0);
        }
        if options.is_cancelled() {
            debug!(session = %self.id, pending = changes.len(), "persist cancelled before submission");
            return Err(CoreError::Cancelled);
        }

        let batch = changes
            .iter()
            .map(ChangeEntry::to_change)
            .collect::<CoreResult<ChangeBatch>>()?;
        let cancel = options.cancellation.clone().unwrap_or_default();
        let affected = self.submit(&batch, &cancel)?;

        if options.accept_all_changes_on_success {
            self.tracker.reset(changes.iter().map(|change| &change.key))?;
        }
        info!(
            session = %self.id,
            txn = ?self.coordinator.current(),
            changes = batch.len(),
            detected,
            affected,
            "persisted"
        );
        Ok(affected)
    }

    /// Applies a batch with auto-detection switched off, restoring it whether
    /// or not the backend succeeds.
    ///
    /// Backends only see the encoded batch, so nothing re-enters the session
    /// during submission today. The flag is still cleared so that a write-back
    /// of backend-generated values (sequence keys, timestamps) can be added
    /// here without those writes being detected as user modifications.
    fn submit(&mut self, batch: &ChangeBatch, cancel: &CancellationToken) -> CoreResult<usize> {
        let previous = std::mem::replace(&mut self.config.auto_detect_changes, false);
        let result = self
            .backend
            .apply_batch(self.coordinator.current(), batch, cancel);
        self.config.auto_detect_changes = previous;
        result.map_err(|err| {
            warn!(session = %self.id, error = %err, "batch rejected");
            CoreError::from(err)
        })
    }

    /// Resets every tracked entity as after a successful persist.
    ///
    /// Used after [`persist_with`](Self::persist_with) with
    /// `accept_all_changes_on_success` disabled.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a baseline cannot be captured.
    pub fn accept_all_changes(&mut self) -> CoreResult<()> {
        self.tracker.accept_all()
    }

    /// Creates the backend tables of every registered kind.
    ///
    /// Returns true if anything was created.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BackendFailure`] if the backend fails.
    pub fn ensure_schema_ready(&self) -> CoreResult<bool> {
        let created = self.backend.ensure_schema(&self.registry.tables())?;
        if created {
            info!(session = %self.id, kinds = self.registry.len(), "schema created");
        }
        Ok(created)
    }

    /// Switches the session to read-only mode. Entities loaded afterwards are
    /// not tracked. There is no way back.
    pub fn set_read_only_mode(&mut self) {
        self.config.query_tracking = QueryTracking::NoTracking;
    }

    /// Returns true if loads do not track entities.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.config.query_tracking == QueryTracking::NoTracking
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Starts an explicit transaction spanning subsequent persists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TransactionAlreadyActive`] if one is open.
    pub fn begin_transaction(&mut self) -> CoreResult<TransactionId> {
        self.coordinator.begin()
    }

    /// Commits the active transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] if none is open, or
    /// [`CoreError::BackendFailure`] if the commit fails.
    pub fn commit_transaction(&mut self) -> CoreResult<()> {
        self.coordinator.commit()
    }

    /// Rolls back the active transaction.
    ///
    /// Tracked state is not reverted: entities persisted inside the
    /// transaction stay Unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] if none is open.
    pub fn rollback_transaction(&mut self) -> CoreResult<()> {
        self.coordinator.rollback()
    }

    /// Returns true if a transaction is active.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.coordinator.is_active()
    }

    /// Returns the active transaction, if any.
    #[must_use]
    pub fn current_transaction(&self) -> Option<TransactionId> {
        self.coordinator.current()
    }

    /// Runs `f` inside a transaction.
    ///
    /// If `f` returns `Ok`, the transaction is committed. If it returns `Err`,
    /// the transaction is rolled back and the original error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, of `begin`, or of `commit`.
    pub fn transaction<F, R>(&mut self, f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut Self) -> CoreResult<R>,
    {
        self.begin_transaction()?;
        match f(self) {
            Ok(result) => {
                self.commit_transaction()?;
                Ok(result)
            }
            Err(err) => {
                if self.in_transaction() {
                    if let Err(rollback_err) = self.rollback_transaction() {
                        warn!(session = %self.id, error = %rollback_err, "rollback after failed closure failed");
                    }
                }
                Err(err)
            }
        }
    }

    /// Disposes of the session, rolling back an active transaction.
    ///
    /// Dropping a session does the same but can only log a rollback failure.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BackendFailure`] if the rollback fails.
    pub fn dispose(mut self) -> CoreResult<()> {
        debug!(session = %self.id, "session disposed");
        self.coordinator.dispose()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Loads the entity of type `T` with identity `key`.
    ///
    /// In tracking mode the already-tracked instance is returned when there is
    /// one (none if it is tracked as Removed); otherwise the row is read and
    /// attached as Unchanged. In read-only mode the row is always read and
    /// returned untracked.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntityKind`] if `T` is not registered,
    /// [`CoreError::BackendFailure`] if the read fails, or a codec error if
    /// the row cannot be decoded.
    pub fn find<T: Entity>(&mut self, key: impl Into<KeyValue>) -> CoreResult<Option<Tracked<T>>> {
        self.registry.require(T::KIND)?;
        let entity_key = EntityKey::new(T::KIND, key);
        let tracking = !self.is_read_only();

        if tracking {
            if let Some((tracked, state)) = self.tracker.instance::<T>(&entity_key) {
                return Ok((state != TrackingState::Removed).then_some(tracked));
            }
        }

        let row_key = encode_key(&entity_key.id)?;
        let payload = self
            .backend
            .get(self.coordinator.current(), T::KIND.table(), &row_key)?;
        let Some(payload) = payload else {
            return Ok(None);
        };

        let entity = self.decode::<T>(&entity_key, &payload)?;
        if tracking {
            self.tracker.attach(&entity, TrackingState::Unchanged)?;
        }
        Ok(Some(entity))
    }

    /// Loads every stored entity of type `T`, in key order.
    ///
    /// Identity resolution and tracking follow [`find`](Self::find). Added
    /// entities that were never persisted are not included.
    ///
    /// # Errors
    ///
    /// Same as [`find`](Self::find).
    pub fn load_all<T: Entity>(&mut self) -> CoreResult<Vec<Tracked<T>>> {
        self.registry.require(T::KIND)?;
        let rows = self
            .backend
            .scan(self.coordinator.current(), T::KIND.table())?;
        let tracking = !self.is_read_only();

        let mut loaded = Vec::with_capacity(rows.len());
        for (_, payload) in rows {
            let entity: T = restore(&payload)?;
            let entity_key = entity.entity_key();
            if tracking {
                if let Some((tracked, state)) = self.tracker.instance::<T>(&entity_key) {
                    if state != TrackingState::Removed {
                        loaded.push(tracked);
                    }
                    continue;
                }
                let tracked = Tracked::new(entity);
                self.tracker.attach(&tracked, TrackingState::Unchanged)?;
                loaded.push(tracked);
            } else {
                loaded.push(Tracked::new(entity));
            }
        }
        debug!(session = %self.id, kind = %T::KIND, count = loaded.len(), "loaded");
        Ok(loaded)
    }

    /// Returns the tracked, non-removed instances of `T` in first-attachment
    /// order, running change detection first if enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if change detection fails.
    pub fn local<T: Entity>(&mut self) -> CoreResult<Vec<Tracked<T>>> {
        self.auto_detect()?;
        Ok(self
            .tracker
            .instances_of::<T>()
            .into_iter()
            .filter(|(_, state)| *state != TrackingState::Removed)
            .map(|(tracked, _)| tracked)
            .collect())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Runs change detection. Returns the number of entities promoted to
    /// Modified.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdentityChanged`] if a tracked key was mutated.
    pub fn detect_changes(&mut self) -> CoreResult<usize> {
        self.tracker.detect_changes()
    }

    /// Returns the pending changes, running change detection first if enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if detection or snapshotting fails.
    pub fn change_set(&mut self) -> CoreResult<Vec<ChangeEntry>> {
        self.auto_detect()?;
        self.tracker.compute_change_set()
    }

    /// Returns true if anything is pending, running change detection first if
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if detection fails.
    pub fn has_changes(&mut self) -> CoreResult<bool> {
        self.auto_detect()?;
        Ok(self.tracker.has_changes())
    }

    /// Returns the state of this exact instance, running change detection
    /// first if enabled. An instance whose identity is tracked by a different
    /// instance is Detached.
    ///
    /// # Errors
    ///
    /// Returns an error if detection fails.
    pub fn entry_state<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<TrackingState> {
        self.auto_detect()?;
        let key = entity.read().entity_key();
        Ok(match self.tracker.instance::<T>(&key) {
            Some((tracked, state)) if tracked.ptr_eq(entity) => state,
            _ => TrackingState::Detached,
        })
    }

    fn auto_detect(&mut self) -> CoreResult<()> {
        if self.config.auto_detect_changes {
            self.tracker.detect_changes()?;
        }
        Ok(())
    }

    fn ensure_tracked<T: Entity>(&self, entity: &Tracked<T>) -> CoreResult<()> {
        let key = entity.read().entity_key();
        match self.tracker.instance::<T>(&key) {
            Some((tracked, _)) if tracked.ptr_eq(entity) => Ok(()),
            Some(_) => Err(CoreError::duplicate_attachment(key)),
            None if self.tracker.state_of(&key) != TrackingState::Detached => {
                Err(CoreError::duplicate_attachment(key))
            }
            None => Err(CoreError::not_tracked(key)),
        }
    }

    fn decode<T: Entity>(&self, expected: &EntityKey, payload: &[u8]) -> CoreResult<Tracked<T>> {
        let entity: T = restore(payload)?;
        let actual = entity.entity_key();
        if actual != *expected {
            return Err(CoreError::codec(format!(
                "row stored under {expected} decodes to {actual}"
            )));
        }
        Ok(Tracked::new(entity))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("tracker", &self.tracker)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Currency, CurrencyTag, Tag};
    use bitdid_backend::InMemoryBackend;

    fn create_session() -> (Arc<InMemoryBackend>, Session) {
        let backend = Arc::new(InMemoryBackend::new());
        let session = Session::new(backend.clone());
        session.ensure_schema_ready().unwrap();
        (backend, session)
    }

    #[test]
    fn session_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Session>();
    }

    #[test]
    fn add_then_persist() {
        let (backend, mut session) = create_session();
        let tag = Tracked::new(Tag::new(1, "defi"));

        session.add(&tag).unwrap();
        assert_eq!(session.entry_state(&tag).unwrap(), TrackingState::Added);

        assert_eq!(session.persist().unwrap(), 1);
        assert_eq!(session.entry_state(&tag).unwrap(), TrackingState::Unchanged);
        assert_eq!(backend.row_count("tags"), 1);
    }

    #[test]
    fn add_twice_fails() {
        let (_backend, mut session) = create_session();
        let first = Tracked::new(Tag::new(1, "defi"));
        let second = Tracked::new(Tag::new(1, "other"));

        session.add(&first).unwrap();
        let result = session.add(&second);

        assert!(matches!(result, Err(CoreError::AlreadyTracked { .. })));
        assert_eq!(session.entry_state(&first).unwrap(), TrackingState::Added);
        assert_eq!(session.entry_state(&second).unwrap(), TrackingState::Detached);
    }

    #[test]
    fn add_unregistered_kind_fails() {
        let backend = Arc::new(InMemoryBackend::new());
        let registry = Arc::new(EntityRegistry::new().with::<Tag>());
        let mut session = Session::with_config(backend, registry, SessionConfig::default());

        let result = session.add(&Tracked::new(Currency::new(1, "Bitcoin", "BTC")));
        assert!(matches!(result, Err(CoreError::UnknownEntityKind { .. })));
    }

    #[test]
    fn add_range_is_all_or_nothing() {
        let (_backend, mut session) = create_session();
        let batch = vec![
            Tracked::new(Tag::new(1, "a")),
            Tracked::new(Tag::new(2, "b")),
            Tracked::new(Tag::new(1, "dup")),
        ];

        let result = session.add_range(&batch);

        assert!(matches!(result, Err(CoreError::AlreadyTracked { .. })));
        assert!(session.tracker().is_empty());
    }

    #[test]
    fn remove_range_validates_first() {
        let (_backend, mut session) = create_session();
        let tracked = Tracked::new(Tag::new(1, "a"));
        let untracked = Tracked::new(Tag::new(2, "b"));
        session.add(&tracked).unwrap();
        session.persist().unwrap();

        let result = session.remove_range(&[tracked.clone(), untracked]);

        assert!(matches!(result, Err(CoreError::NotTracked { .. })));
        assert_eq!(session.entry_state(&tracked).unwrap(), TrackingState::Unchanged);
    }

    #[test]
    fn mark_as_changed_attaches_untracked() {
        let (backend, mut session) = create_session();
        let tag = Tracked::new(Tag::new(1, "a"));
        session.add(&tag).unwrap();
        session.persist().unwrap();

        let mut other = Session::new(backend.clone());
        let copy = Tracked::new(Tag::new(1, "renamed"));
        other.mark_as_changed(&copy).unwrap();
        assert_eq!(other.entry_state(&copy).unwrap(), TrackingState::Modified);
        assert_eq!(other.persist().unwrap(), 1);

        let reloaded: Tag = crate::entity::restore(
            &backend
                .get(None, "tags", &encode_key(&KeyValue::Int(1)).unwrap())
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(reloaded.name, "renamed");
    }

    #[test]
    fn persist_with_nothing_pending_returns_zero() {
        let (_backend, mut session) = create_session();
        assert_eq!(session.persist().unwrap(), 0);
    }

    #[test]
    fn composite_keys_persist() {
        let (backend, mut session) = create_session();
        session.add(&Tracked::new(CurrencyTag::new(1, 2))).unwrap();
        session.add(&Tracked::new(CurrencyTag::new(2, 1))).unwrap();
        assert_eq!(session.persist().unwrap(), 2);
        assert_eq!(backend.row_count("currency_tags"), 2);
    }

    #[test]
    fn auto_detect_restored_after_persist() {
        let (_backend, mut session) = create_session();
        session.add(&Tracked::new(Tag::new(1, "a"))).unwrap();
        session.persist().unwrap();
        assert!(session.auto_detect_changes());
    }

    #[test]
    fn auto_detect_disabled_in_inspection() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut session = Session::with_config(
            backend,
            Arc::new(EntityRegistry::bitdid()),
            SessionConfig::new().auto_detect_changes(false),
        );
        session.ensure_schema_ready().unwrap();
        let tag = Tracked::new(Tag::new(1, "a"));
        session.add(&tag).unwrap();
        session.persist().unwrap();

        tag.write().name = "b".into();
        assert!(!session.has_changes().unwrap());

        // persist still detects, and leaves the configured value in place.
        assert_eq!(session.persist().unwrap(), 1);
        assert!(!session.auto_detect_changes());
    }

    #[test]
    fn find_resolves_identity() {
        let (backend, mut session) = create_session();
        let tag = Tracked::new(Tag::new(1, "a"));
        session.add(&tag).unwrap();
        session.persist().unwrap();

        let found = session.find::<Tag>(1_i64).unwrap().unwrap();
        assert!(found.ptr_eq(&tag));

        let mut other = Session::new(backend);
        let loaded = other.find::<Tag>(1_i64).unwrap().unwrap();
        assert!(!loaded.ptr_eq(&tag));
        assert_eq!(other.entry_state(&loaded).unwrap(), TrackingState::Unchanged);
        assert!(other.find::<Tag>(2_i64).unwrap().is_none());
    }

    #[test]
    fn find_hides_removed() {
        let (_backend, mut session) = create_session();
        let tag = Tracked::new(Tag::new(1, "a"));
        session.add(&tag).unwrap();
        session.persist().unwrap();
        session.remove(&tag).unwrap();

        assert!(session.find::<Tag>(1_i64).unwrap().is_none());
    }

    #[test]
    fn read_only_loads_are_untracked() {
        let (backend, mut session) = create_session();
        session.add(&Tracked::new(Tag::new(1, "a"))).unwrap();
        session.persist().unwrap();

        let mut reader = Session::new(backend);
        reader.set_read_only_mode();
        let loaded = reader.load_all::<Tag>().unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(reader.tracker().is_empty());
        loaded[0].write().name = "changed".into();
        assert_eq!(reader.persist().unwrap(), 0);
    }

    #[test]
    fn transaction_helper_commits() {
        let (backend, mut session) = create_session();
        let count = session
            .transaction(|s| {
                s.add(&Tracked::new(Tag::new(1, "a")))?;
                s.persist()
            })
            .unwrap();

        assert_eq!(count, 1);
        assert!(!session.in_transaction());
        assert_eq!(backend.row_count("tags"), 1);
    }

    #[test]
    fn transaction_helper_rolls_back_on_error() {
        let (backend, mut session) = create_session();
        let result: CoreResult<()> = session.transaction(|s| {
            s.add(&Tracked::new(Tag::new(1, "a")))?;
            s.persist()?;
            Err(CoreError::NoActiveTransaction)
        });

        assert!(matches!(result, Err(CoreError::NoActiveTransaction)));
        assert!(!session.in_transaction());
        assert_eq!(backend.row_count("tags"), 0);
    }

    #[test]
    fn dispose_rolls_back() {
        let (backend, mut session) = create_session();
        session.begin_transaction().unwrap();
        session.add(&Tracked::new(Tag::new(1, "a"))).unwrap();
        session.persist().unwrap();

        session.dispose().unwrap();

        assert_eq!(backend.row_count("tags"), 0);
        assert_eq!(backend.active_transactions(), 0);
    }
}
