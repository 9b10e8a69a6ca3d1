//! Integration tests for explicit transactions.

use bitdid_core::{CoreError, Session, Tag, Tracked, TrackingState};
use bitdid_testkit::prelude::*;
use std::sync::Arc;

fn faulty_session() -> (Arc<FaultyBackend>, Session) {
    let backend = Arc::new(FaultyBackend::new());
    let session = Session::new(backend.clone());
    session.ensure_schema_ready().unwrap();
    (backend, session)
}

#[test]
fn double_begin_fails() {
    with_memory_session(|session| {
        let id = session.begin_transaction().unwrap();
        let result = session.begin_transaction();
        assert!(matches!(
            result,
            Err(CoreError::TransactionAlreadyActive { id: active }) if active == id
        ));
        assert!(session.in_transaction());
    });
}

#[test]
fn commit_and_rollback_require_transaction() {
    with_memory_session(|session| {
        assert!(matches!(
            session.commit_transaction(),
            Err(CoreError::NoActiveTransaction)
        ));
        assert!(matches!(
            session.rollback_transaction(),
            Err(CoreError::NoActiveTransaction)
        ));
    });
}

#[test]
fn writes_are_invisible_until_commit() {
    let mut test = TestSession::memory();
    test.begin_transaction().unwrap();

    test.add_range(&tracked_all((1..=2).map(sample_tag))).unwrap();
    assert_eq!(test.persist().unwrap(), 2);

    assert_eq!(test.committed_rows("tags"), 0);
    let mut outsider = test.sibling();
    assert!(outsider.find::<Tag>(1_i64).unwrap().is_none());

    // The owning session reads its own uncommitted writes.
    let mut reader = test.sibling();
    assert!(reader.load_all::<Tag>().unwrap().is_empty());
    assert_eq!(test.load_all::<Tag>().unwrap().len(), 2);

    test.commit_transaction().unwrap();
    assert_eq!(test.committed_rows("tags"), 2);
    assert!(outsider.find::<Tag>(1_i64).unwrap().is_some());
}

#[test]
fn several_persists_commit_atomically() {
    let mut test = TestSession::memory();
    test.begin_transaction().unwrap();

    let tag = Tracked::new(sample_tag(1));
    test.add(&tag).unwrap();
    test.persist().unwrap();
    tag.write().name = "second write".into();
    test.persist().unwrap();
    test.add(&Tracked::new(sample_currency(1))).unwrap();
    test.persist().unwrap();

    test.commit_transaction().unwrap();

    assert_eq!(test.committed_rows("tags"), 1);
    assert_eq!(test.committed_rows("currencies"), 1);
    let stored = test.sibling().find::<Tag>(1_i64).unwrap().unwrap();
    assert_eq!(stored.read().name, "second write");
}

#[test]
fn rollback_discards_persisted_changes() {
    let mut test = TestSession::memory();
    let tag = Tracked::new(sample_tag(1));
    test.begin_transaction().unwrap();
    test.add(&tag).unwrap();
    test.persist().unwrap();

    test.rollback_transaction().unwrap();

    assert_eq!(test.committed_rows("tags"), 0);
    assert!(!test.in_transaction());
    // Tracked state is not reverted by rollback.
    assert_eq!(test.entry_state(&tag).unwrap(), TrackingState::Unchanged);
}

#[test]
fn dropping_session_rolls_back() {
    let test = TestSession::memory();
    {
        let mut session = test.sibling();
        session.begin_transaction().unwrap();
        session.add(&Tracked::new(sample_tag(1))).unwrap();
        session.persist().unwrap();
    }
    assert_eq!(test.committed_rows("tags"), 0);
}

#[test]
fn dispose_rolls_back_and_reports() {
    let (backend, mut session) = faulty_session();
    session.begin_transaction().unwrap();
    session.add(&Tracked::new(sample_tag(1))).unwrap();
    session.persist().unwrap();

    session.dispose().unwrap();

    assert_eq!(backend.calls().rollback_tx(), 1);
    assert_eq!(backend.inner().row_count("tags"), 0);
    assert_eq!(backend.inner().active_transactions(), 0);
}

#[test]
fn failed_commit_returns_to_idle() {
    let (backend, mut session) = faulty_session();
    session.begin_transaction().unwrap();
    session.add(&Tracked::new(sample_tag(1))).unwrap();
    session.persist().unwrap();

    backend.fail_next_commit();
    let result = session.commit_transaction();

    assert!(matches!(result, Err(CoreError::BackendFailure(_))));
    assert!(!session.in_transaction());
    assert_eq!(backend.inner().row_count("tags"), 0);

    // A new transaction can start.
    session.begin_transaction().unwrap();
    session.rollback_transaction().unwrap();
}

#[test]
fn transaction_helper_preserves_closure_error() {
    let (backend, mut session) = faulty_session();

    let result: Result<(), CoreError> = session.transaction(|s| {
        s.add(&Tracked::new(sample_tag(1)))?;
        s.persist()?;
        s.remove(&Tracked::new(sample_tag(2)))
    });

    assert!(matches!(result, Err(CoreError::NotTracked { .. })));
    assert_eq!(backend.calls().begin_tx(), 1);
    assert_eq!(backend.calls().rollback_tx(), 1);
    assert_eq!(backend.calls().commit_tx(), 0);
    assert_eq!(backend.inner().row_count("tags"), 0);
}

#[test]
fn transaction_helper_commits() {
    let (backend, mut session) = faulty_session();

    let affected = session
        .transaction(|s| {
            s.set::<Tag>()
                .add_range(&tracked_all((1..=3).map(sample_tag)))?;
            s.persist()
        })
        .unwrap();

    assert_eq!(affected, 3);
    assert_eq!(backend.calls().commit_tx(), 1);
    assert_eq!(backend.inner().row_count("tags"), 3);
}

#[test]
fn commit_conflicting_with_another_session_fails() {
    let mut test = TestSession::memory();
    test.begin_transaction().unwrap();
    test.add(&Tracked::new(Tag::new(1, "from-a"))).unwrap();
    test.persist().unwrap();

    let mut other = test.sibling();
    other.add(&Tracked::new(Tag::new(1, "from-b"))).unwrap();
    other.persist().unwrap();

    let result = test.commit_transaction();

    assert!(matches!(result, Err(CoreError::BackendFailure(_))));
    assert!(!test.in_transaction());
    assert_eq!(test.committed_rows("tags"), 1);
    let stored = test.sibling().find::<Tag>(1_i64).unwrap().unwrap();
    assert_eq!(stored.read().name, "from-b");
}

#[test]
fn persist_failure_inside_transaction_keeps_it_open() {
    let (backend, mut session) = faulty_session();
    session.begin_transaction().unwrap();
    let tag = Tracked::new(sample_tag(1));
    session.add(&tag).unwrap();

    backend.fail_next_apply();
    assert!(session.persist().is_err());

    assert!(session.in_transaction());
    assert_eq!(session.entry_state(&tag).unwrap(), TrackingState::Added);
    session.persist().unwrap();
    session.commit_transaction().unwrap();
    assert_eq!(backend.inner().row_count("tags"), 1);
}
