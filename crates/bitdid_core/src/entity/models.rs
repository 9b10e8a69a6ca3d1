//! Market-data entity models.
//!
//! Prices, volumes and caps are fixed-point integers scaled by
//! [`PRICE_SCALE`]; timestamps are Unix seconds.

use crate::entity::traits::Entity;
use crate::types::{EntityKind, KeyValue};
use serde::{Deserialize, Serialize};

/// Fixed-point scale of monetary amounts (8 decimal places).
pub const PRICE_SCALE: i64 = 100_000_000;

/// A currency category such as "coin" or "token".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identity.
    pub id: i64,
    /// Short name.
    pub name: String,
    /// Display title.
    pub title: String,
    /// Optional long description.
    pub description: Option<String>,
}

impl Category {
    /// Creates a category whose title equals its name.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            title: name.clone(),
            name,
            description: None,
        }
    }
}

impl Entity for Category {
    const KIND: EntityKind = EntityKind::Category;
    const KEY_FIELDS: &'static [&'static str] = &["id"];

    fn key(&self) -> KeyValue {
        KeyValue::Int(self.id)
    }
}

/// A listed currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Identity.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// URL slug.
    pub slug: String,
    /// Owning category, if classified.
    pub category_id: Option<i64>,
    /// Market-cap rank, if ranked.
    pub rank: Option<u32>,
    /// Whether the currency is actively tracked.
    pub is_active: bool,
    /// Listing time.
    pub date_added: Option<i64>,
}

impl Currency {
    /// Creates an active, unranked currency; the slug is the lowercased name.
    pub fn new(id: i64, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            slug: name.to_lowercase().replace(' ', "-"),
            name,
            symbol: symbol.into(),
            category_id: None,
            rank: None,
            is_active: true,
            date_added: None,
        }
    }
}

impl Entity for Currency {
    const KIND: EntityKind = EntityKind::Currency;
    const KEY_FIELDS: &'static [&'static str] = &["id"];

    fn key(&self) -> KeyValue {
        KeyValue::Int(self.id)
    }
}

/// Descriptive metadata of a currency, one row per currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyMetadata {
    /// Identity; also the currency it describes.
    pub currency_id: i64,
    /// Logo image URL.
    pub logo: Option<String>,
    /// Project website.
    pub website: Option<String>,
    /// Whitepaper URL.
    pub technical_doc: Option<String>,
    /// Source repository URL.
    pub source_code: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

impl Entity for CurrencyMetadata {
    const KIND: EntityKind = EntityKind::CurrencyMetadata;
    const KEY_FIELDS: &'static [&'static str] = &["currency_id"];

    fn key(&self) -> KeyValue {
        KeyValue::Int(self.currency_id)
    }
}

/// A price quote of a currency against a quote symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPrice {
    /// Identity.
    pub id: i64,
    /// Quoted currency.
    pub currency_id: i64,
    /// Quote symbol, e.g. "USD".
    pub quote: String,
    /// Price, scaled by [`PRICE_SCALE`].
    pub price: i64,
    /// 24h volume, scaled by [`PRICE_SCALE`].
    pub volume_24h: i64,
    /// Market cap, scaled by [`PRICE_SCALE`].
    pub market_cap: i64,
    /// Quote time.
    pub last_updated: i64,
}

impl Entity for CurrencyPrice {
    const KIND: EntityKind = EntityKind::CurrencyPrice;
    const KEY_FIELDS: &'static [&'static str] = &["id"];

    fn key(&self) -> KeyValue {
        KeyValue::Int(self.id)
    }
}

/// A trading venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Identity.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Venue website.
    pub website: Option<String>,
    /// Whether the venue is actively tracked.
    pub is_active: bool,
}

impl Exchange {
    /// Creates an active exchange; the slug is the lowercased name.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            slug: name.to_lowercase().replace(' ', "-"),
            name,
            website: None,
            is_active: true,
        }
    }
}

impl Entity for Exchange {
    const KIND: EntityKind = EntityKind::Exchange;
    const KEY_FIELDS: &'static [&'static str] = &["id"];

    fn key(&self) -> KeyValue {
        KeyValue::Int(self.id)
    }
}

/// A base/quote currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPair {
    /// Identity.
    pub id: i64,
    /// Base currency.
    pub base_currency_id: i64,
    /// Quote currency.
    pub quote_currency_id: i64,
    /// Pair symbol, e.g. "BTC/USDT".
    pub symbol: String,
}

impl Entity for MarketPair {
    const KIND: EntityKind = EntityKind::MarketPair;
    const KEY_FIELDS: &'static [&'static str] = &["id"];

    fn key(&self) -> KeyValue {
        KeyValue::Int(self.id)
    }
}

/// A market pair as traded on one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeMarketPair {
    /// Exchange half of the identity.
    pub exchange_id: i64,
    /// Market pair half of the identity.
    pub market_pair_id: i64,
    /// Last price, scaled by [`PRICE_SCALE`].
    pub price: i64,
    /// 24h volume, scaled by [`PRICE_SCALE`].
    pub volume_24h: i64,
    /// Quote time.
    pub last_updated: i64,
}

impl Entity for ExchangeMarketPair {
    const KIND: EntityKind = EntityKind::ExchangeMarketPair;
    const KEY_FIELDS: &'static [&'static str] = &["exchange_id", "market_pair_id"];

    fn key(&self) -> KeyValue {
        KeyValue::from((self.exchange_id, self.market_pair_id))
    }
}

/// A free-form label attached to currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Identity.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
}

impl Tag {
    /// Creates a tag; the slug is the lowercased name.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            slug: name.to_lowercase().replace(' ', "-"),
            name,
        }
    }
}

impl Entity for Tag {
    const KIND: EntityKind = EntityKind::Tag;
    const KEY_FIELDS: &'static [&'static str] = &["id"];

    fn key(&self) -> KeyValue {
        KeyValue::Int(self.id)
    }
}

/// Link between a currency and a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTag {
    /// Currency half of the identity.
    pub currency_id: i64,
    /// Tag half of the identity.
    pub tag_id: i64,
}

impl CurrencyTag {
    /// Creates a link.
    pub fn new(currency_id: i64, tag_id: i64) -> Self {
        Self {
            currency_id,
            tag_id,
        }
    }
}

impl Entity for CurrencyTag {
    const KIND: EntityKind = EntityKind::CurrencyTag;
    const KEY_FIELDS: &'static [&'static str] = &["currency_id", "tag_id"];

    fn key(&self) -> KeyValue {
        KeyValue::from((self.currency_id, self.tag_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKey;

    #[test]
    fn constructors_derive_slugs() {
        assert_eq!(Currency::new(1, "Bitcoin Cash", "BCH").slug, "bitcoin-cash");
        assert_eq!(Exchange::new(1, "Big Venue").slug, "big-venue");
        assert_eq!(Tag::new(1, "Proof Of Work").slug, "proof-of-work");
    }

    #[test]
    fn exchange_market_pair_identity_is_composite() {
        let pair = ExchangeMarketPair {
            exchange_id: 2,
            market_pair_id: 5,
            price: 3 * PRICE_SCALE,
            volume_24h: 0,
            last_updated: 0,
        };
        assert_eq!(
            pair.entity_key(),
            EntityKey::new(EntityKind::ExchangeMarketPair, (2_i64, 5_i64))
        );
    }

    #[test]
    fn metadata_keyed_by_currency() {
        let meta = CurrencyMetadata {
            currency_id: 11,
            ..CurrencyMetadata::default()
        };
        assert_eq!(meta.key(), KeyValue::Int(11));
    }
}
