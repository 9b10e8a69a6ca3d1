//! Change tracking.
//!
//! The tracker holds, per attached identity, the live instance, its
//! [`TrackingState`] and a baseline snapshot of its fields. Dirty checking is
//! an explicit comparison of each instance's current snapshot against that
//! baseline, so in-place mutations are picked up without instrumentation.

mod change_tracker;
mod state;

pub use change_tracker::ChangeTracker;
pub use state::{ChangeEntry, TrackingState};
