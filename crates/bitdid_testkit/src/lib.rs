//! # Bitdid Testkit
//!
//! Test utilities for Bitdid storage.
//!
//! This crate provides:
//! - Session fixtures over in-memory and file-backed stores
//! - Sample market-data records
//! - A fault-injecting backend for failure and cancellation tests
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bitdid_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_session() {
//!     with_memory_session(|session| {
//!         session.add(&Tracked::new(sample_tag(1))).unwrap();
//!         assert_eq!(session.persist().unwrap(), 1);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use bitdid_core::{Session, Tracked, TrackingState};
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
