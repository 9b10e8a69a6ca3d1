//! Tracking states and change-set entries.

use crate::entity::encode_key;
use crate::error::{CoreError, CoreResult};
use crate::types::EntityKey;
use bitdid_backend::Change;

/// Lifecycle state of an entity with respect to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingState {
    /// Tracked and equal to its baseline.
    Unchanged,
    /// Tracked and not yet persisted.
    Added,
    /// Tracked, persisted, and changed since the baseline.
    Modified,
    /// Tracked and scheduled for deletion.
    Removed,
    /// Not tracked.
    Detached,
}

impl TrackingState {
    /// Returns true for states that produce a change on persist.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            TrackingState::Added | TrackingState::Modified | TrackingState::Removed
        )
    }
}

/// One pending change, as computed from tracked state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    /// Identity of the entity.
    pub key: EntityKey,
    /// Its state: Added, Modified or Removed.
    pub state: TrackingState,
    /// Snapshot to write; the baseline for removals.
    pub payload: Vec<u8>,
}

impl ChangeEntry {
    /// Converts the entry into a backend change.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be encoded or the entry is not in a
    /// pending state.
    pub fn to_change(&self) -> CoreResult<Change> {
        let table = self.key.kind.table();
        let key = encode_key(&self.key.id)?;
        let payload = self.payload.clone();
        match self.state {
            TrackingState::Added => Ok(Change::insert(table, key, payload)),
            TrackingState::Modified => Ok(Change::update(table, key, payload)),
            TrackingState::Removed => Ok(Change::delete(table, key, payload)),
            state => Err(CoreError::codec(format!(
                "{} has no change in state {state:?}",
                self.key
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;
    use bitdid_backend::ChangeOp;

    fn entry(state: TrackingState) -> ChangeEntry {
        ChangeEntry {
            key: EntityKey::new(EntityKind::Tag, 1_i64),
            state,
            payload: vec![1, 2],
        }
    }

    #[test]
    fn pending_states() {
        assert!(TrackingState::Added.is_pending());
        assert!(TrackingState::Modified.is_pending());
        assert!(TrackingState::Removed.is_pending());
        assert!(!TrackingState::Unchanged.is_pending());
        assert!(!TrackingState::Detached.is_pending());
    }

    #[test]
    fn states_map_to_operations() {
        assert_eq!(entry(TrackingState::Added).to_change().unwrap().op, ChangeOp::Insert);
        assert_eq!(entry(TrackingState::Modified).to_change().unwrap().op, ChangeOp::Update);
        assert_eq!(entry(TrackingState::Removed).to_change().unwrap().op, ChangeOp::Delete);
        assert!(entry(TrackingState::Unchanged).to_change().is_err());
    }

    #[test]
    fn change_targets_kind_table() {
        let change = entry(TrackingState::Added).to_change().unwrap();
        assert_eq!(change.kind, "tags");
        assert_eq!(change.payload, vec![1, 2]);
    }
}
