// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use courier_core::{
    Category, Decision, DecisionStatus, ErrorKind, FakeClock, FingerprintConfig, Receipt,
};
use tempfile::TempDir;

fn setup() -> (TempDir, DecisionStore, ReceiptLedger, FakeClock, Janitor<FakeClock>) {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let store = DecisionStore::open(&dir.path().join("decisions.wal")).unwrap();
    let ledger = ReceiptLedger::open(&dir.path().join("receipts.wal")).unwrap();
    let janitor = Janitor::new(
        store.clone(),
        ledger.clone(),
        &JanitorConfig::default(),
        clock.clone(),
    );
    (dir, store, ledger, clock, janitor)
}

fn claimed(store: &DecisionStore, clock: &FakeClock, id: &str) {
    store
        .enqueue(Decision::single(id, format!("text {id}"), clock.utc_now()))
        .unwrap();
    store.claim(id, clock.utc_now()).unwrap().unwrap();
}

#[test]
fn fresh_claims_are_kept() {
    let (_dir, store, _ledger, clock, janitor) = setup();
    claimed(&store, &clock, "a");
    clock.advance(Duration::from_secs(14 * 60));

    assert!(janitor.run().unwrap().is_empty());
    assert_eq!(store.get("a").unwrap().status, DecisionStatus::Posting);
}

#[test]
fn stale_claim_without_receipt_is_requeued() {
    let (_dir, store, _ledger, clock, janitor) = setup();
    claimed(&store, &clock, "a");
    clock.advance(Duration::from_secs(15 * 60));

    assert_eq!(janitor.run().unwrap(), vec!["a".to_string()]);
    let row = store.get("a").unwrap();
    assert_eq!(row.status, DecisionStatus::Queued);
    assert_eq!(row.attempts, 0);
}

#[test]
fn stale_claim_with_receipt_is_left_alone() {
    let (_dir, store, ledger, clock, janitor) = setup();
    claimed(&store, &clock, "a");
    ledger
        .record(Receipt::new(
            "a",
            "att-1",
            Category::Single,
            1,
            FingerprintConfig::default().fingerprint("text a"),
            clock.utc_now(),
        ))
        .unwrap();
    clock.advance(Duration::from_secs(60 * 60));

    assert!(janitor.run().unwrap().is_empty());
    assert_eq!(store.get("a").unwrap().status, DecisionStatus::Posting);
}

#[test]
fn aborted_claims_requeued_as_ambiguous_regardless_of_age() {
    let (_dir, store, _ledger, clock, janitor) = setup();
    claimed(&store, &clock, "a");

    assert!(janitor.run().unwrap().is_empty());
    assert_eq!(janitor.requeue_aborted().unwrap(), vec!["a".to_string()]);
    let row = store.get("a").unwrap();
    assert_eq!(row.status, DecisionStatus::Queued);
    assert_eq!(
        row.last_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::ConfirmationTimeout)
    );
    assert!(row.is_due(clock.utc_now()));
}
