//! Entity capability trait, tracked handles and the market-data models.

mod models;
mod traits;
mod tracked;

pub use models::{
    Category, Currency, CurrencyMetadata, CurrencyPrice, CurrencyTag, Exchange,
    ExchangeMarketPair, MarketPair, Tag, PRICE_SCALE,
};
pub use traits::{encode_key, restore, snapshot, Entity};
pub use tracked::Tracked;

pub(crate) use tracked::ErasedEntity;
