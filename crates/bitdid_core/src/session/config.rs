//! Session configuration.

/// Whether entities loaded by a session are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryTracking {
    /// Loaded entities are attached as Unchanged.
    #[default]
    TrackAll,
    /// Loaded entities are returned untracked.
    NoTracking,
}

/// Configuration of a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Whether inspection APIs (`change_set`, `has_changes`, `entry_state`,
    /// `local`) run change detection first. `persist` always does.
    pub auto_detect_changes: bool,

    /// Tracking behaviour of loads.
    pub query_tracking: QueryTracking,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_detect_changes: true,
            query_tracking: QueryTracking::TrackAll,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether inspection APIs run change detection.
    #[must_use]
    pub const fn auto_detect_changes(mut self, value: bool) -> Self {
        self.auto_detect_changes = value;
        self
    }

    /// Sets the tracking behaviour of loads.
    #[must_use]
    pub const fn query_tracking(mut self, value: QueryTracking) -> Self {
        self.query_tracking = value;
        self
    }

    /// Shorthand for `query_tracking(QueryTracking::NoTracking)`.
    #[must_use]
    pub const fn read_only(self) -> Self {
        self.query_tracking(QueryTracking::NoTracking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert!(config.auto_detect_changes);
        assert_eq!(config.query_tracking, QueryTracking::TrackAll);
    }

    #[test]
    fn builder_pattern() {
        let config = SessionConfig::new().auto_detect_changes(false).read_only();
        assert!(!config.auto_detect_changes);
        assert_eq!(config.query_tracking, QueryTracking::NoTracking);
    }
}
