//! Explicit transaction boundaries.
//!
//! A session owns at most one [`TransactionCoordinator`]. While a transaction
//! is active, every `persist` of the session is applied inside it and only
//! becomes visible to other sessions on commit:
//! - **Atomicity**: all persists of the transaction commit or none do
//! - **Isolation**: uncommitted writes are visible only to the owning session
//! - **Cleanup**: a coordinator dropped while active rolls back

mod coordinator;

pub use coordinator::{TransactionCoordinator, TransactionState};
