//! Entity registry.
//!
//! The registry is the set of kinds a session accepts, together with how each
//! kind's identity is formed and which backend table holds it. It also drives
//! schema creation: `ensure_schema_ready` creates one table per registered
//! kind.

use crate::entity::{
    Category, Currency, CurrencyMetadata, CurrencyPrice, CurrencyTag, Entity, Exchange,
    ExchangeMarketPair, MarketPair, Tag,
};
use crate::error::{CoreError, CoreResult};
use crate::types::EntityKind;

/// Registration record of one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDescriptor {
    /// The kind.
    pub kind: EntityKind,
    /// Backend table holding the kind.
    pub table: &'static str,
    /// Fields forming the identity key.
    pub key_fields: &'static [&'static str],
}

impl KindDescriptor {
    /// Describes the kind implemented by `T`.
    #[must_use]
    pub fn of<T: Entity>() -> Self {
        Self {
            kind: T::KIND,
            table: T::KIND.table(),
            key_fields: T::KEY_FIELDS,
        }
    }
}

/// The kinds a session accepts, in registration order.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    kinds: Vec<KindDescriptor>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every market-data kind.
    #[must_use]
    pub fn bitdid() -> Self {
        let mut registry = Self::new();
        registry
            .register::<Category>()
            .register::<Currency>()
            .register::<CurrencyMetadata>()
            .register::<CurrencyPrice>()
            .register::<Exchange>()
            .register::<ExchangeMarketPair>()
            .register::<MarketPair>()
            .register::<Tag>()
            .register::<CurrencyTag>();
        registry
    }

    /// Registers the kind of `T`. Registering a kind twice keeps the first
    /// registration.
    pub fn register<T: Entity>(&mut self) -> &mut Self {
        if !self.contains(T::KIND) {
            self.kinds.push(KindDescriptor::of::<T>());
        }
        self
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<T: Entity>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Returns true if `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: EntityKind) -> bool {
        self.kinds.iter().any(|d| d.kind == kind)
    }

    /// Returns the descriptor of `kind`.
    #[must_use]
    pub fn descriptor(&self, kind: EntityKind) -> Option<&KindDescriptor> {
        self.kinds.iter().find(|d| d.kind == kind)
    }

    /// Iterates descriptors in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &KindDescriptor> {
        self.kinds.iter()
    }

    /// Returns the table names in registration order.
    #[must_use]
    pub fn tables(&self) -> Vec<&'static str> {
        self.kinds.iter().map(|d| d.table).collect()
    }

    /// Returns the number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub(crate) fn require(&self, kind: EntityKind) -> CoreResult<&KindDescriptor> {
        self.descriptor(kind)
            .ok_or(CoreError::UnknownEntityKind { kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitdid_registers_every_kind_in_order() {
        let registry = EntityRegistry::bitdid();
        let kinds: Vec<_> = registry.kinds().map(|d| d.kind).collect();
        assert_eq!(kinds, EntityKind::ALL.to_vec());
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = EntityRegistry::new();
        registry.register::<Tag>().register::<Tag>();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn descriptor_carries_key_fields() {
        let registry = EntityRegistry::new().with::<CurrencyTag>();
        let descriptor = registry.descriptor(EntityKind::CurrencyTag).unwrap();
        assert_eq!(descriptor.table, "currency_tags");
        assert_eq!(descriptor.key_fields, &["currency_id", "tag_id"]);
    }

    #[test]
    fn require_rejects_unregistered() {
        let registry = EntityRegistry::new().with::<Tag>();
        assert!(registry.require(EntityKind::Tag).is_ok());
        assert!(matches!(
            registry.require(EntityKind::Exchange),
            Err(CoreError::UnknownEntityKind {
                kind: EntityKind::Exchange
            })
        ));
    }

    #[test]
    fn empty_registry() {
        let registry = EntityRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.tables().is_empty());
    }
}
