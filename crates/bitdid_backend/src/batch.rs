//! Change batches submitted by a unit of work.

/// The operation a single change performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOp {
    /// Create a row that must not exist yet.
    Insert,
    /// Overwrite a row that must already exist.
    Update,
    /// Remove a row that must already exist.
    Delete,
}

/// One row-level change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Table the change targets (the entity kind's table name).
    pub kind: String,
    /// Canonical encoding of the entity's identity key.
    pub key: Vec<u8>,
    /// Operation to perform.
    pub op: ChangeOp,
    /// Canonical encoding of the entity's fields. For deletes this is the
    /// last persisted state.
    pub payload: Vec<u8>,
}

impl Change {
    /// Creates an insert change.
    pub fn insert(kind: impl Into<String>, key: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            key,
            op: ChangeOp::Insert,
            payload,
        }
    }

    /// Creates an update change.
    pub fn update(kind: impl Into<String>, key: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            key,
            op: ChangeOp::Update,
            payload,
        }
    }

    /// Creates a delete change.
    pub fn delete(kind: impl Into<String>, key: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            key,
            op: ChangeOp::Delete,
            payload,
        }
    }
}

/// An ordered batch of changes applied atomically.
///
/// Order is significant only for diagnostics; a valid batch never touches the
/// same row twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    changes: Vec<Change>,
}

impl ChangeBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change.
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Returns the number of changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns true if the batch holds no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterates the changes in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Counts the changes performing `op`.
    #[must_use]
    pub fn count_of(&self, op: ChangeOp) -> usize {
        self.changes.iter().filter(|c| c.op == op).count()
    }
}

impl FromIterator<Change> for ChangeBatch {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ChangeBatch {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_by_operation() {
        let batch: ChangeBatch = vec![
            Change::insert("tags", vec![1], vec![]),
            Change::insert("tags", vec![2], vec![]),
            Change::delete("tags", vec![3], vec![]),
        ]
        .into_iter()
        .collect();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.count_of(ChangeOp::Insert), 2);
        assert_eq!(batch.count_of(ChangeOp::Update), 0);
        assert_eq!(batch.count_of(ChangeOp::Delete), 1);
    }

    #[test]
    fn preserves_submission_order() {
        let mut batch = ChangeBatch::new();
        batch.push(Change::update("a", vec![2], vec![]));
        batch.push(Change::insert("b", vec![1], vec![]));

        let kinds: Vec<_> = batch.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["a", "b"]);
    }
}
