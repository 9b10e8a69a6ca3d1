//! # Bitdid Core
//!
//! Unit-of-work and change-tracking engine for Bitdid market-data storage.
//!
//! This crate provides:
//! - The [`Entity`] capability trait and the market-data models
//! - An [`EntityRegistry`] of accepted kinds
//! - A [`ChangeTracker`] recording the lifecycle state of attached entities
//! - A [`Session`] that reconciles tracked state into atomic change batches
//! - A [`TransactionCoordinator`] for explicit transaction boundaries
//!
//! Callers mutate entities in place through [`Tracked`] handles; the session
//! compares each entity against the baseline snapshot taken when it was
//! attached or last persisted, so no change notification is needed.
//!
//! ## Example
//!
//! ```rust
//! use bitdid_backend::InMemoryBackend;
//! use bitdid_core::{Currency, Session, Tag, Tracked};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(InMemoryBackend::new());
//! let mut session = Session::new(backend);
//! session.ensure_schema_ready().unwrap();
//!
//! let btc = Tracked::new(Currency::new(1, "Bitcoin", "BTC"));
//! let pow = Tracked::new(Tag::new(1, "Proof of Work"));
//! session
//!     .transaction(|s| {
//!         s.add(&btc)?;
//!         s.add(&pow)?;
//!         s.persist()
//!     })
//!     .unwrap();
//!
//! btc.write().rank = Some(1);
//! assert_eq!(session.persist().unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
mod registry;
mod session;
mod tracker;
mod transaction;
mod types;

pub use entity::{
    encode_key, restore, snapshot, Category, Currency, CurrencyMetadata, CurrencyPrice,
    CurrencyTag, Entity, Exchange, ExchangeMarketPair, MarketPair, Tag, Tracked, PRICE_SCALE,
};
pub use error::{CoreError, CoreResult};
pub use registry::{EntityRegistry, KindDescriptor};
pub use session::{EntitySet, PersistOptions, QueryTracking, Session, SessionConfig};
pub use tracker::{ChangeEntry, ChangeTracker, TrackingState};
pub use transaction::{TransactionCoordinator, TransactionState};
pub use types::{EntityKey, EntityKind, KeyValue, SessionId};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export the backend types that appear in this crate's API.
pub use bitdid_backend::{BackendError, CancellationToken, PersistenceBackend, TransactionId};
