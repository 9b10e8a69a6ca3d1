//! Per-call persist options.

use bitdid_backend::CancellationToken;

/// Options of a single [`Session::persist_with`](crate::Session::persist_with)
/// call.
#[derive(Debug, Clone)]
pub struct PersistOptions {
    /// Whether tracked state is reset after the backend accepts the batch.
    ///
    /// When false, entities keep their pending states until
    /// [`Session::accept_all_changes`](crate::Session::accept_all_changes).
    pub accept_all_changes_on_success: bool,

    /// Token checked before submission and by the backend.
    pub cancellation: Option<CancellationToken>,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            accept_all_changes_on_success: true,
            cancellation: None,
        }
    }
}

impl PersistOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether tracked state is reset on success.
    #[must_use]
    pub const fn accept_all_changes_on_success(mut self, value: bool) -> Self {
        self.accept_all_changes_on_success = value;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
