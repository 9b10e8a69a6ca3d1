//! Unit-of-work sessions.
//!
//! A [`Session`] is created per logical unit of work. It owns the change
//! tracker and the transaction coordinator; callers own the live entities and
//! share them with the session through [`Tracked`](crate::Tracked) handles.

mod config;
mod options;
mod set;
mod unit_of_work;

pub use config::{QueryTracking, SessionConfig};
pub use options::PersistOptions;
pub use set::EntitySet;
pub use unit_of_work::Session;
