//! Core type definitions for Bitdid storage.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The closed set of entity kinds the storage layer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// Currency category (coin, token, ...).
    Category,
    /// A listed currency.
    Currency,
    /// Descriptive metadata of a currency.
    CurrencyMetadata,
    /// A price quote of a currency.
    CurrencyPrice,
    /// A trading venue.
    Exchange,
    /// A market pair as listed on an exchange.
    ExchangeMarketPair,
    /// A base/quote currency pair.
    MarketPair,
    /// A free-form label.
    Tag,
    /// Link between a currency and a tag.
    CurrencyTag,
}

impl EntityKind {
    /// Every kind, in registration order.
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Category,
        EntityKind::Currency,
        EntityKind::CurrencyMetadata,
        EntityKind::CurrencyPrice,
        EntityKind::Exchange,
        EntityKind::ExchangeMarketPair,
        EntityKind::MarketPair,
        EntityKind::Tag,
        EntityKind::CurrencyTag,
    ];

    /// Returns the kind's name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Category => "Category",
            EntityKind::Currency => "Currency",
            EntityKind::CurrencyMetadata => "CurrencyMetadata",
            EntityKind::CurrencyPrice => "CurrencyPrice",
            EntityKind::Exchange => "Exchange",
            EntityKind::ExchangeMarketPair => "ExchangeMarketPair",
            EntityKind::MarketPair => "MarketPair",
            EntityKind::Tag => "Tag",
            EntityKind::CurrencyTag => "CurrencyTag",
        }
    }

    /// Returns the backend table holding this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            EntityKind::Category => "categories",
            EntityKind::Currency => "currencies",
            EntityKind::CurrencyMetadata => "currency_metadata",
            EntityKind::CurrencyPrice => "currency_prices",
            EntityKind::Exchange => "exchanges",
            EntityKind::ExchangeMarketPair => "exchange_market_pairs",
            EntityKind::MarketPair => "market_pairs",
            EntityKind::Tag => "tags",
            EntityKind::CurrencyTag => "currency_tags",
        }
    }

    /// Looks a kind up by name or table name, ignoring ASCII case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s) || kind.table().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The value of an identity key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyValue {
    /// Integer key.
    Int(i64),
    /// Text key.
    Text(String),
    /// Multi-column key.
    Composite(Vec<KeyValue>),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{v}"),
            KeyValue::Text(v) => write!(f, "{v:?}"),
            KeyValue::Composite(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Text(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Text(v)
    }
}

impl From<(i64, i64)> for KeyValue {
    fn from((a, b): (i64, i64)) -> Self {
        KeyValue::Composite(vec![KeyValue::Int(a), KeyValue::Int(b)])
    }
}

/// Identity of a tracked entity: its kind plus its key value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    /// The entity's kind.
    pub kind: EntityKind,
    /// The entity's key value.
    pub id: KeyValue,
}

impl EntityKey {
    /// Creates an entity key.
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<KeyValue>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

/// Identifier of a unit-of-work session, attached to its log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parse_accepts_name_and_table() {
        assert_eq!(EntityKind::parse("currency"), Some(EntityKind::Currency));
        assert_eq!(EntityKind::parse("market_pairs"), Some(EntityKind::MarketPair));
        assert_eq!(EntityKind::parse("CurrencyTag"), Some(EntityKind::CurrencyTag));
        assert_eq!(EntityKind::parse("orders"), None);
    }

    #[test]
    fn tables_are_unique() {
        let mut tables: Vec<_> = EntityKind::ALL.iter().map(|k| k.table()).collect();
        tables.sort_unstable();
        tables.dedup();
        assert_eq!(tables.len(), EntityKind::ALL.len());
    }

    #[test]
    fn key_display() {
        let key = EntityKey::new(EntityKind::Currency, 42_i64);
        assert_eq!(format!("{key}"), "Currency(42)");

        let pair = EntityKey::new(EntityKind::CurrencyTag, (1_i64, 7_i64));
        assert_eq!(format!("{pair}"), "CurrencyTag(1, 7)");

        let text = EntityKey::new(EntityKind::Tag, "defi");
        assert_eq!(format!("{text}"), "Tag(\"defi\")");
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
