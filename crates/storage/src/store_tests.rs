// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeDelta;
use courier_core::{Clock, FakeClock};
use std::sync::Barrier;
use tempfile::TempDir;

fn open() -> (TempDir, DecisionStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = DecisionStore::open(&dir.path().join(crate::DECISIONS_WAL)).unwrap();
    (dir, store)
}

fn now() -> DateTime<Utc> {
    FakeClock::new().utc_now()
}

fn wal_lines(dir: &TempDir) -> usize {
    std::fs::read_to_string(dir.path().join(crate::DECISIONS_WAL))
        .unwrap()
        .lines()
        .count()
}

#[test]
fn enqueue_rejects_duplicate_id() {
    let (_dir, store) = open();
    store.enqueue(Decision::single("dec-1", "hello", now())).unwrap();
    let err = store
        .enqueue(Decision::single("dec-1", "again", now()))
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(id) if id == "dec-1"));
}

#[test]
fn enqueue_rejects_invalid_decision() {
    let (_dir, store) = open();
    let err = store
        .enqueue(Decision::single("dec-1", "", now()))
        .unwrap_err();
    assert!(matches!(err, StoreError::Invalid(DecisionError::EmptyContent(_))));
}

#[test]
fn claim_is_exclusive() {
    let (_dir, store) = open();
    store.enqueue(Decision::single("dec-1", "hello", now())).unwrap();

    assert!(store.claim("dec-1", now()).unwrap().is_some());
    assert!(store.claim("dec-1", now()).unwrap().is_none());
}

#[test]
fn concurrent_claims_yield_one_winner() {
    let (_dir, store) = open();
    store.enqueue(Decision::single("dec-1", "hello", now())).unwrap();

    let callers = 16;
    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                store.claim("dec-1", now()).unwrap().is_some()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn claim_unknown_decision_errors() {
    let (_dir, store) = open();
    assert!(matches!(
        store.claim("missing", now()),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn complete_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(crate::DECISIONS_WAL);
    {
        let store = DecisionStore::open(&path).unwrap();
        store.enqueue(Decision::single("dec-1", "hello", now())).unwrap();
        store.claim("dec-1", now()).unwrap();
        store
            .complete("dec-1", vec!["p-1".into()], now() + TimeDelta::seconds(5))
            .unwrap();
    }

    let store = DecisionStore::open(&path).unwrap();
    let decision = store.get("dec-1").unwrap();
    assert_eq!(decision.status, DecisionStatus::Posted);
    assert_eq!(decision.identifiers, vec!["p-1".to_string()]);
    assert_eq!(decision.posted_at, Some(now() + TimeDelta::seconds(5)));
}

#[test]
fn claim_survives_reopen_as_posting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(crate::DECISIONS_WAL);
    {
        let store = DecisionStore::open(&path).unwrap();
        store.enqueue(Decision::single("dec-1", "hello", now())).unwrap();
        store.claim("dec-1", now()).unwrap();
    }
    let store = DecisionStore::open(&path).unwrap();
    assert_eq!(store.get("dec-1").unwrap().status, DecisionStatus::Posting);
    assert!(store.claim("dec-1", now()).unwrap().is_none());
}

#[test]
fn fail_applies_retry_policy() {
    let (_dir, store) = open();
    store.enqueue(Decision::single("dec-1", "hello", now())).unwrap();
    store.claim("dec-1", now()).unwrap();

    let policy = RetryPolicy::default();
    let decision = store
        .fail(
            "dec-1",
            &PublishError::ChannelUnavailable("offline".into()),
            &policy,
            now(),
        )
        .unwrap();
    assert_eq!(decision.status, DecisionStatus::Queued);
    assert_eq!(decision.retry_after, Some(now() + TimeDelta::seconds(60)));
    assert!(store.due(now()).is_empty());
    assert_eq!(store.due(now() + TimeDelta::seconds(60)).len(), 1);
}

#[test]
fn skip_only_queued() {
    let (_dir, store) = open();
    store.enqueue(Decision::single("dec-1", "hello", now())).unwrap();
    store.enqueue(Decision::single("dec-2", "hello", now())).unwrap();
    store.claim("dec-2", now()).unwrap();

    assert_eq!(
        store.skip("dec-1", "superseded").unwrap().status,
        DecisionStatus::Skipped
    );
    assert!(matches!(
        store.skip("dec-2", "superseded"),
        Err(StoreError::Transition(_))
    ));
}

#[test]
fn force_posted_twice_writes_once() {
    let (dir, store) = open();
    store.enqueue(Decision::single("dec-1", "hello", now())).unwrap();
    store.claim("dec-1", now()).unwrap();
    let before = wal_lines(&dir);

    assert!(store.force_posted("dec-1", vec!["p-1".into()], now()).unwrap());
    assert!(!store.force_posted("dec-1", vec!["p-1".into()], now()).unwrap());
    assert_eq!(wal_lines(&dir), before + 1);
}

#[test]
fn attach_identifiers_once() {
    let (_dir, store) = open();
    store.enqueue(Decision::single("dec-1", "hello", now())).unwrap();
    store.claim("dec-1", now()).unwrap();
    store.complete("dec-1", Vec::new(), now()).unwrap();

    assert!(store.attach_identifiers("dec-1", vec!["p-1".into()]).unwrap());
    assert!(!store.attach_identifiers("dec-1", vec!["p-1".into()]).unwrap());
    assert!(matches!(
        store.attach_identifiers("dec-1", vec!["p-2".into()]),
        Err(StoreError::Transition(TransitionError::Conflict { .. }))
    ));
}

#[test]
fn release_stale_skips_exempt_and_fresh_claims() {
    let (_dir, store) = open();
    let t0 = now();
    for id in ["dec-1", "dec-2", "dec-3"] {
        store.enqueue(Decision::single(id, "hello", t0)).unwrap();
    }
    store.claim("dec-1", t0).unwrap();
    store.claim("dec-2", t0).unwrap();
    store.claim("dec-3", t0 + TimeDelta::minutes(10)).unwrap();

    let released = store
        .release_stale(
            t0 + TimeDelta::minutes(15),
            Duration::from_secs(15 * 60),
            |id| id == "dec-2",
        )
        .unwrap();

    assert_eq!(released, vec!["dec-1".to_string()]);
    assert_eq!(store.get("dec-1").unwrap().status, DecisionStatus::Queued);
    assert_eq!(store.get("dec-1").unwrap().attempts, 0);
    assert_eq!(store.get("dec-2").unwrap().status, DecisionStatus::Posting);
    assert_eq!(store.get("dec-3").unwrap().status, DecisionStatus::Posting);
}

#[test]
fn snapshot_and_counts() {
    let (_dir, store) = open();
    store
        .enqueue(Decision::single("dec-b", "hello", now()))
        .unwrap();
    store
        .enqueue(Decision::single("dec-a", "hello", now()))
        .unwrap();
    store.claim("dec-a", now()).unwrap();

    let ids: Vec<_> = store.snapshot().into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["dec-a", "dec-b"]);
    let counts = store.count_by_status();
    assert_eq!(counts[&DecisionStatus::Queued], 1);
    assert_eq!(counts[&DecisionStatus::Posting], 1);
    assert_eq!(store.with_state(|s| s.decisions.len()), 2);
}

#[test]
fn requeue_unconfirmed_marks_attempt_ambiguous() {
    let (_dir, store) = open();
    let t0 = now();
    store.enqueue(Decision::single("dec-1", "hello", t0)).unwrap();
    store.claim("dec-1", t0).unwrap();
    let later = t0 + TimeDelta::hours(3);

    assert!(store
        .requeue_unconfirmed("dec-1", "receipt orphaned", later)
        .unwrap());

    let row = store.get("dec-1").unwrap();
    assert_eq!(row.status, DecisionStatus::Queued);
    assert_eq!(row.claimed_at, None);
    assert_eq!(row.retry_after, Some(later));
    assert_eq!(row.attempts, 1);
    assert!(row.needs_dedup());
    // Only posting rows move
    assert!(!store
        .requeue_unconfirmed("dec-1", "receipt orphaned", later)
        .unwrap());
}

#[test]
fn requeue_all_unconfirmed_skips_exempt_rows() {
    let (_dir, store) = open();
    let t0 = now();
    for id in ["dec-1", "dec-2", "dec-3"] {
        store.enqueue(Decision::single(id, "hello", t0)).unwrap();
    }
    store.claim("dec-1", t0).unwrap();
    store.claim("dec-2", t0).unwrap();

    let requeued = store
        .requeue_all_unconfirmed("aborted at shutdown", t0, |id| id == "dec-2")
        .unwrap();

    assert_eq!(requeued, vec!["dec-1".to_string()]);
    assert!(store.get("dec-1").unwrap().needs_dedup());
    assert_eq!(store.get("dec-2").unwrap().status, DecisionStatus::Posting);
    assert_eq!(store.get("dec-3").unwrap().last_error, None);
}

#[test]
fn get_is_exact_while_find_accepts_a_prefix() {
    let (_dir, store) = open();
    store.enqueue(Decision::single("d10", "hello", now())).unwrap();

    assert!(store.get("d1").is_none());
    assert_eq!(store.find("d1").map(|d| d.id), Some("d10".to_string()));
}
