//! Typed entity sets.

use crate::entity::{Entity, Tracked};
use crate::error::CoreResult;
use crate::session::unit_of_work::Session;
use crate::types::KeyValue;
use std::marker::PhantomData;

/// A typed view of a session for entities of type `T`.
///
/// Obtained from [`Session::set`]; every method forwards to the session with
/// `T` fixed, so call sites read like a collection:
///
/// ```rust
/// use bitdid_backend::InMemoryBackend;
/// use bitdid_core::{Currency, Session, Tracked};
/// use std::sync::Arc;
///
/// let mut session = Session::new(Arc::new(InMemoryBackend::new()));
/// session.ensure_schema_ready().unwrap();
///
/// let mut currencies = session.set::<Currency>();
/// currencies.add(&Tracked::new(Currency::new(1, "Bitcoin", "BTC"))).unwrap();
/// assert_eq!(currencies.local().unwrap().len(), 1);
/// ```
pub struct EntitySet<'s, T: Entity> {
    session: &'s mut Session,
    _marker: PhantomData<T>,
}

impl<'s, T: Entity> EntitySet<'s, T> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            _marker: PhantomData,
        }
    }

    /// See [`Session::add`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::add`].
    pub fn add(&mut self, entity: &Tracked<T>) -> CoreResult<()> {
        self.session.add(entity)
    }

    /// See [`Session::add_range`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::add_range`].
    pub fn add_range(&mut self, entities: &[Tracked<T>]) -> CoreResult<()> {
        self.session.add_range(entities)
    }

    /// See [`Session::remove`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::remove`].
    pub fn remove(&mut self, entity: &Tracked<T>) -> CoreResult<()> {
        self.session.remove(entity)
    }

    /// See [`Session::remove_range`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::remove_range`].
    pub fn remove_range(&mut self, entities: &[Tracked<T>]) -> CoreResult<()> {
        self.session.remove_range(entities)
    }

    /// See [`Session::find`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::find`].
    pub fn find(&mut self, key: impl Into<KeyValue>) -> CoreResult<Option<Tracked<T>>> {
        self.session.find::<T>(key)
    }

    /// See [`Session::load_all`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::load_all`].
    pub fn load_all(&mut self) -> CoreResult<Vec<Tracked<T>>> {
        self.session.load_all::<T>()
    }

    /// See [`Session::local`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::local`].
    pub fn local(&mut self) -> CoreResult<Vec<Tracked<T>>> {
        self.session.local::<T>()
    }
}

impl<T: Entity> std::fmt::Debug for EntitySet<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySet")
            .field("kind", &T::KIND)
            .field("session", &self.session.id())
            .finish()
    }
}
