//! # Bitdid Backend
//!
//! Persistence backend trait and implementations for Bitdid storage.
//!
//! This crate is the lowest layer of the storage stack. A backend receives
//! fully reconciled [`ChangeBatch`]es from a unit-of-work session and applies
//! them atomically. Backends never see live entities: keys and payloads are
//! opaque canonical CBOR bytes produced by the session layer.
//!
//! ## Design Principles
//!
//! - A batch is applied entirely or not at all
//! - Writes made inside a transaction are invisible outside it until commit
//! - Cancellation is cooperative and never leaves a batch half-applied
//! - Backends must be `Send + Sync` so several sessions can share one
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - Persists committed state to a single CBOR file
//!
//! ## Example
//!
//! ```rust
//! use bitdid_backend::{CancellationToken, Change, ChangeBatch, InMemoryBackend, PersistenceBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.ensure_schema(&["tags"]).unwrap();
//!
//! let mut batch = ChangeBatch::new();
//! batch.push(Change::insert("tags", vec![1], vec![0xa0]));
//! let affected = backend
//!     .apply_batch(None, &batch, &CancellationToken::new())
//!     .unwrap();
//! assert_eq!(affected, 1);
//! assert_eq!(backend.get(None, "tags", &[1]).unwrap(), Some(vec![0xa0]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod batch;
mod cancel;
mod error;
mod file;
mod memory;

pub use backend::{PersistenceBackend, TransactionId};
pub use batch::{Change, ChangeBatch, ChangeOp};
pub use cancel::CancellationToken;
pub use error::{BackendError, BackendResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
