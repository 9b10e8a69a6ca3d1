//! Entity capability trait and snapshot codec.

use crate::error::{CoreError, CoreResult};
use crate::types::{EntityKey, EntityKind, KeyValue};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for types that can be tracked by a unit-of-work session.
///
/// Implementors provide:
/// - `KIND`: the registry kind the type belongs to
/// - `KEY_FIELDS`: names of the fields forming the identity key
/// - `key()`: the identity key value
///
/// Field values are captured through `serde` as canonical CBOR snapshots; two
/// snapshots are equal exactly when the serialized fields are equal. Field
/// types must therefore serialize deterministically (no hash maps, no floats).
///
/// # Example
///
/// ```rust
/// use bitdid_core::{Entity, EntityKind, KeyValue};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Label {
///     id: i64,
///     text: String,
/// }
///
/// impl Entity for Label {
///     const KIND: EntityKind = EntityKind::Tag;
///     const KEY_FIELDS: &'static [&'static str] = &["id"];
///
///     fn key(&self) -> KeyValue {
///         KeyValue::Int(self.id)
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The registry kind of this type.
    const KIND: EntityKind;

    /// Names of the fields forming the identity key.
    const KEY_FIELDS: &'static [&'static str];

    /// Returns the identity key value.
    ///
    /// The key must not change while the entity is tracked.
    fn key(&self) -> KeyValue;

    /// Returns the full identity (kind plus key).
    fn entity_key(&self) -> EntityKey {
        EntityKey::new(Self::KIND, self.key())
    }
}

/// Encodes an entity's fields as a canonical CBOR snapshot.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if the entity cannot be serialized.
pub fn snapshot<T: Entity>(entity: &T) -> CoreResult<Vec<u8>> {
    encode(entity)
}

/// Decodes an entity from a snapshot.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if the bytes are not a valid snapshot of `T`.
pub fn restore<T: Entity>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}

/// Encodes an identity key the way backends store it.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] if the key cannot be serialized.
pub fn encode_key(key: &KeyValue) -> CoreResult<Vec<u8>> {
    encode(key)
}

fn encode<T: Serialize + ?Sized>(value: &T) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Currency, CurrencyTag};

    #[test]
    fn snapshot_is_deterministic() {
        let a = Currency::new(1, "Bitcoin", "BTC");
        let b = a.clone();
        assert_eq!(snapshot(&a).unwrap(), snapshot(&b).unwrap());
    }

    #[test]
    fn snapshot_differs_on_field_change() {
        let a = Currency::new(1, "Bitcoin", "BTC");
        let mut b = a.clone();
        b.rank = Some(1);
        assert_ne!(snapshot(&a).unwrap(), snapshot(&b).unwrap());
    }

    #[test]
    fn restore_reads_snapshot() {
        let original = Currency::new(7, "Ether", "ETH");
        let restored: Currency = restore(&snapshot(&original).unwrap()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn restore_rejects_garbage() {
        let result: CoreResult<Currency> = restore(&[0xff, 0x00]);
        assert!(matches!(result, Err(CoreError::Codec { .. })));
    }

    #[test]
    fn composite_identity() {
        let link = CurrencyTag::new(3, 9);
        assert_eq!(link.entity_key(), EntityKey::new(EntityKind::CurrencyTag, (3_i64, 9_i64)));
    }

    #[test]
    fn key_encoding_distinguishes_values() {
        let one = encode_key(&KeyValue::Int(1)).unwrap();
        let two = encode_key(&KeyValue::Int(2)).unwrap();
        assert_ne!(one, two);
        assert_eq!(one, encode_key(&KeyValue::Int(1)).unwrap());
    }
}
