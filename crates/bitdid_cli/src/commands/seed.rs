//! Seed command implementation.

use bitdid_core::{
    Category, Currency, CurrencyPrice, CurrencyTag, Tag, Tracked, PRICE_SCALE,
};
use std::path::Path;
use tracing::info;

const SAMPLE_CURRENCIES: [(i64, &str, &str, i64); 3] = [
    (1, "Bitcoin", "BTC", 64_250),
    (2, "Ethereum", "ETH", 3_120),
    (3, "Tether", "USDT", 1),
];

const SAMPLE_TAGS: [(i64, &str); 3] = [(1, "Mineable"), (2, "Smart Contracts"), (3, "Stablecoin")];

const SAMPLE_LINKS: [(i64, i64); 3] = [(1, 1), (2, 2), (3, 3)];

/// Inserts the sample data into the store at `path`.
///
/// Returns the number of rows written, or 0 if the store already holds
/// currencies.
pub fn seed(path: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let mut session = super::open_session(path)?;
    session.ensure_schema_ready()?;
    if !session.load_all::<Currency>()?.is_empty() {
        return Ok(0);
    }

    let written = session.transaction(|s| {
        s.set::<Category>().add_range(&[
            Tracked::new(Category::new(1, "coin")),
            Tracked::new(Category::new(2, "token")),
        ])?;

        for (id, name, symbol, price) in SAMPLE_CURRENCIES {
            let mut currency = Currency::new(id, name, symbol);
            currency.rank = u32::try_from(id).ok();
            currency.category_id = Some(if id == 1 { 1 } else { 2 });
            s.add(&Tracked::new(currency))?;
            s.add(&Tracked::new(CurrencyPrice {
                id,
                currency_id: id,
                quote: "USD".to_string(),
                price: price * PRICE_SCALE,
                volume_24h: 0,
                market_cap: 0,
                last_updated: 0,
            }))?;
        }
        for (id, name) in SAMPLE_TAGS {
            s.add(&Tracked::new(Tag::new(id, name)))?;
        }
        for (currency_id, tag_id) in SAMPLE_LINKS {
            s.add(&Tracked::new(CurrencyTag::new(currency_id, tag_id)))?;
        }
        s.persist()
    })?;

    info!(rows = written, "seeded sample data");
    Ok(written)
}

/// Runs the seed command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match seed(path)? {
        0 => println!("Store already seeded: {}", path.display()),
        rows => println!("Seeded {rows} rows into {}", path.display()),
    }
    Ok(())
}
