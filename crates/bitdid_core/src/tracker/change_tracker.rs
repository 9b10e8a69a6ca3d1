//! Change tracker implementation.

use crate::entity::{Entity, ErasedEntity, Tracked};
use crate::error::{CoreError, CoreResult};
use crate::tracker::state::{ChangeEntry, TrackingState};
use crate::types::EntityKey;
use std::collections::HashMap;
use tracing::debug;

/// A tracked instance with its state and baseline.
struct Entry {
    instance: Box<dyn ErasedEntity>,
    state: TrackingState,
    /// Snapshot as of attachment or the last successful persist.
    baseline: Vec<u8>,
    /// First-attachment sequence; orders change sets.
    order: u64,
}

/// Records the lifecycle state of every entity attached to a session.
///
/// # Invariants
///
/// - Each attached identity maps to exactly one instance and one state
/// - `Detached` is never stored; it is what [`state_of`](Self::state_of)
///   reports for unknown identities
/// - Change sets are ordered by first attachment
#[derive(Default)]
pub struct ChangeTracker {
    entries: HashMap<EntityKey, Entry>,
    next_order: u64,
}

impl ChangeTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `entity` in `state`.
    ///
    /// Attaching an instance that is already tracked moves it to `state`;
    /// attaching in [`TrackingState::Detached`] detaches it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateAttachment`] if the identity is tracked
    /// by a different instance.
    pub fn attach<T: Entity>(&mut self, entity: &Tracked<T>, state: TrackingState) -> CoreResult<()> {
        let key = entity.read().entity_key();

        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.instance.instance_id() != ErasedEntity::instance_id(entity) {
                return Err(CoreError::duplicate_attachment(key));
            }
            if state == TrackingState::Detached {
                self.entries.remove(&key);
                debug!(entity = %key, "detached");
            } else {
                debug!(entity = %key, from = ?entry.state, to = ?state, "state transition");
                entry.state = state;
            }
            return Ok(());
        }

        if state == TrackingState::Detached {
            return Ok(());
        }

        let baseline = ErasedEntity::snapshot(entity)?;
        let order = self.next_order;
        self.next_order += 1;
        debug!(entity = %key, ?state, "attached");
        self.entries.insert(
            key,
            Entry {
                instance: Box::new(entity.clone()),
                state,
                baseline,
                order,
            },
        );
        Ok(())
    }

    /// Marks a tracked entity as modified.
    ///
    /// Unchanged and Removed entities become Modified; Added and Modified
    /// entities are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotTracked`] if the identity is not attached, or
    /// [`CoreError::DuplicateAttachment`] if it is attached by another instance.
    pub fn mark_modified<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<()> {
        let (key, entry) = self.entry_mut(entity)?;
        match entry.state {
            TrackingState::Unchanged | TrackingState::Removed => {
                debug!(entity = %key, from = ?entry.state, "marked modified");
                entry.state = TrackingState::Modified;
            }
            TrackingState::Added | TrackingState::Modified | TrackingState::Detached => {}
        }
        Ok(())
    }

    /// Marks a tracked entity as removed.
    ///
    /// An Added entity was never persisted, so it is detached instead.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotTracked`] if the identity is not attached, or
    /// [`CoreError::DuplicateAttachment`] if it is attached by another instance.
    pub fn mark_removed<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<()> {
        let (key, entry) = self.entry_mut(entity)?;
        if entry.state == TrackingState::Added {
            self.entries.remove(&key);
            debug!(entity = %key, "removed before persist; detached");
        } else {
            debug!(entity = %key, from = ?entry.state, "marked removed");
            entry.state = TrackingState::Removed;
        }
        Ok(())
    }

    /// Promotes every Unchanged entity whose fields differ from its baseline
    /// to Modified. Returns the number of promotions.
    ///
    /// Idempotent: a second call with no mutation in between promotes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdentityChanged`] if a tracked entity's key fields
    /// were mutated, or a codec error if a snapshot cannot be taken.
    pub fn detect_changes(&mut self) -> CoreResult<usize> {
        // Every entry is checked before any is promoted, so an error leaves
        // all states as they were.
        let mut changed = Vec::new();
        for (key, entry) in &self.entries {
            let current = entry.instance.entity_key();
            if current != *key {
                return Err(CoreError::IdentityChanged {
                    key: key.clone(),
                    current,
                });
            }
            if entry.state == TrackingState::Unchanged
                && entry.instance.snapshot()? != entry.baseline
            {
                changed.push(key.clone());
            }
        }

        for key in &changed {
            if let Some(entry) = self.entries.get_mut(key) {
                debug!(entity = %key, "detected change");
                entry.state = TrackingState::Modified;
            }
        }
        Ok(changed.len())
    }

    /// Returns every pending change, ordered by first attachment.
    ///
    /// Added and Modified entries carry the current snapshot; Removed entries
    /// carry their baseline.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a snapshot cannot be taken.
    pub fn compute_change_set(&self) -> CoreResult<Vec<ChangeEntry>> {
        let mut pending: Vec<(&EntityKey, &Entry)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.state.is_pending())
            .collect();
        pending.sort_by_key(|(_, entry)| entry.order);

        pending
            .into_iter()
            .map(|(key, entry)| -> CoreResult<ChangeEntry> {
                let payload = match entry.state {
                    TrackingState::Removed => entry.baseline.clone(),
                    _ => entry.instance.snapshot()?,
                };
                Ok(ChangeEntry {
                    key: key.clone(),
                    state: entry.state,
                    payload,
                })
            })
            .collect()
    }

    /// Accepts persisted changes for `keys`: Added and Modified entities become
    /// Unchanged with a fresh baseline, Removed entities are detached.
    ///
    /// Keys that are not tracked are ignored.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a snapshot cannot be taken.
    pub fn reset<'a>(&mut self, keys: impl IntoIterator<Item = &'a EntityKey>) -> CoreResult<()> {
        for key in keys {
            let Some(entry) = self.entries.get_mut(key) else {
                continue;
            };
            match entry.state {
                TrackingState::Removed => {
                    self.entries.remove(key);
                }
                TrackingState::Added | TrackingState::Modified => {
                    entry.baseline = entry.instance.snapshot()?;
                    entry.state = TrackingState::Unchanged;
                }
                TrackingState::Unchanged | TrackingState::Detached => {}
            }
        }
        Ok(())
    }

    /// Accepts every pending change, as after a successful persist.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a snapshot cannot be taken.
    pub fn accept_all(&mut self) -> CoreResult<()> {
        let keys: Vec<EntityKey> = self.entries.keys().cloned().collect();
        self.reset(&keys)
    }

    /// Returns the state of an identity; `Detached` if it is not tracked.
    #[must_use]
    pub fn state_of(&self, key: &EntityKey) -> TrackingState {
        self.entries
            .get(key)
            .map_or(TrackingState::Detached, |entry| entry.state)
    }

    /// Returns true if any entry is in a pending state.
    ///
    /// This does not run change detection.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.entries.values().any(|entry| entry.state.is_pending())
    }

    /// Returns every tracked identity with its state, ordered by first
    /// attachment.
    #[must_use]
    pub fn entries(&self) -> Vec<(EntityKey, TrackingState)> {
        let mut all: Vec<(&EntityKey, &Entry)> = self.entries.iter().collect();
        all.sort_by_key(|(_, entry)| entry.order);
        all.into_iter()
            .map(|(key, entry)| (key.clone(), entry.state))
            .collect()
    }

    /// Detaches an identity. Returns true if it was tracked.
    pub fn detach(&mut self, key: &EntityKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Detaches everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the tracked instance of `key` if it holds a `T`.
    pub(crate) fn instance<T: Entity>(&self, key: &EntityKey) -> Option<(Tracked<T>, TrackingState)> {
        let entry = self.entries.get(key)?;
        let tracked = entry.instance.as_any().downcast_ref::<Tracked<T>>()?;
        Some((tracked.clone(), entry.state))
    }

    /// Returns every tracked instance of `T`, ordered by first attachment.
    pub(crate) fn instances_of<T: Entity>(&self) -> Vec<(Tracked<T>, TrackingState)> {
        let mut matching: Vec<(&Entry, &Tracked<T>)> = self
            .entries
            .iter()
            .filter(|(key, _)| key.kind == T::KIND)
            .filter_map(|(_, entry)| {
                entry
                    .instance
                    .as_any()
                    .downcast_ref::<Tracked<T>>()
                    .map(|tracked| (entry, tracked))
            })
            .collect();
        matching.sort_by_key(|(entry, _)| entry.order);
        matching
            .into_iter()
            .map(|(entry, tracked)| (tracked.clone(), entry.state))
            .collect()
    }

    /// Finds the entry of `entity`, checking it is the tracked instance.
    fn entry_mut<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<(EntityKey, &mut Entry)> {
        let key = entity.read().entity_key();
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or_else(|| CoreError::not_tracked(key.clone()))?;
        if entry.instance.instance_id() != ErasedEntity::instance_id(entity) {
            return Err(CoreError::duplicate_attachment(key));
        }
        Ok((key, entry))
    }
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("tracked", &self.entries.len())
            .field("has_changes", &self.has_changes())
            .finish_non_exhaustive()
    }
}
