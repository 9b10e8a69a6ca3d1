//! Shared handles to live entity instances.

use crate::entity::traits::{snapshot, Entity};
use crate::error::CoreResult;
use crate::types::EntityKey;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A live entity instance shared between the caller and a session.
///
/// The caller mutates the entity through [`Tracked::write`]; the session reads
/// it when detecting changes. Clones refer to the same instance, and a session
/// uses that identity to tell "the same entity again" from "a different
/// entity with the same key".
pub struct Tracked<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Tracked<T> {
    /// Wraps a value in a new instance.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    /// Locks the instance for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    /// Locks the instance for in-place mutation.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    /// Returns true if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T: Clone> Tracked<T> {
    /// Returns a copy of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.read().clone()
    }
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> From<T> for Tracked<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracked").field(&*self.inner.read()).finish()
    }
}

/// Type-erased view of a tracked instance, held by the change tracker.
pub(crate) trait ErasedEntity: Send + Sync {
    /// Identity as currently reported by the instance.
    fn entity_key(&self) -> EntityKey;

    /// Snapshot of the instance's current fields.
    fn snapshot(&self) -> CoreResult<Vec<u8>>;

    /// Address-based identity of the instance.
    fn instance_id(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Entity> ErasedEntity for Tracked<T> {
    fn entity_key(&self) -> EntityKey {
        self.read().entity_key()
    }

    fn snapshot(&self) -> CoreResult<Vec<u8>> {
        snapshot(&*self.read())
    }

    fn instance_id(&self) -> usize {
        self.address()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Tag;

    #[test]
    fn clones_share_instance() {
        let tag = Tracked::new(Tag::new(1, "defi"));
        let alias = tag.clone();
        alias.write().name = "DeFi".into();

        assert!(tag.ptr_eq(&alias));
        assert_eq!(tag.read().name, "DeFi");
    }

    #[test]
    fn equal_values_are_distinct_instances() {
        let a = Tracked::new(Tag::new(1, "defi"));
        let b = Tracked::new(Tag::new(1, "defi"));
        assert!(!a.ptr_eq(&b));
        assert_ne!(
            ErasedEntity::instance_id(&a),
            ErasedEntity::instance_id(&b)
        );
    }

    #[test]
    fn erased_view_downcasts() {
        let tag = Tracked::new(Tag::new(4, "layer-2"));
        let erased: Box<dyn ErasedEntity> = Box::new(tag.clone());

        let back = erased.as_any().downcast_ref::<Tracked<Tag>>().unwrap();
        assert!(back.ptr_eq(&tag));
        assert_eq!(erased.entity_key(), tag.read().entity_key());
    }
}
