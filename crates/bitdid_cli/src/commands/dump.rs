//! Dump command implementation.

use bitdid_core::{
    Category, Currency, CurrencyMetadata, CurrencyPrice, CurrencyTag, Entity, EntityKind,
    Exchange, ExchangeMarketPair, MarketPair, Session, Tag,
};
use std::path::Path;

/// Reads every record of `kind` as a JSON value, in key order.
pub fn records(
    session: &mut Session,
    kind: EntityKind,
) -> Result<Vec<serde_json::Value>, Box<dyn std::error::Error>> {
    match kind {
        EntityKind::Category => to_json::<Category>(session),
        EntityKind::Currency => to_json::<Currency>(session),
        EntityKind::CurrencyMetadata => to_json::<CurrencyMetadata>(session),
        EntityKind::CurrencyPrice => to_json::<CurrencyPrice>(session),
        EntityKind::Exchange => to_json::<Exchange>(session),
        EntityKind::ExchangeMarketPair => to_json::<ExchangeMarketPair>(session),
        EntityKind::MarketPair => to_json::<MarketPair>(session),
        EntityKind::Tag => to_json::<Tag>(session),
        EntityKind::CurrencyTag => to_json::<CurrencyTag>(session),
    }
}

fn to_json<T: Entity>(
    session: &mut Session,
) -> Result<Vec<serde_json::Value>, Box<dyn std::error::Error>> {
    session
        .load_all::<T>()?
        .iter()
        .map(|entity| serde_json::to_value(&*entity.read()).map_err(Into::into))
        .collect()
}

/// Runs the dump command.
pub fn run(path: &Path, kind: &str) -> Result<(), Box<dyn std::error::Error>> {
    let kind = EntityKind::parse(kind).ok_or_else(|| format!("Unknown entity kind: {kind}"))?;
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    let mut session = super::open_session(path)?;
    session.set_read_only_mode();

    for record in records(&mut session, kind)? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
