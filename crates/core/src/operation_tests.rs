// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::{Clock, FakeClock};

#[test]
fn retry_without_rejection_flag_parses() {
    // Older entries may omit the rejection flag
    let json = r#"{"DecisionRetry":{"id":"dec-1","error":"offline","kind":"channel_unavailable","retry_after":"2026-01-01T00:05:00Z","at":"2026-01-01T00:00:00Z"}}"#;

    let op: Operation = serde_json::from_str(json).unwrap();

    match op {
        Operation::DecisionRetry { rejection, .. } => assert!(!rejection),
        _ => panic!("expected DecisionRetry"),
    }
}

#[test]
fn decision_id_covers_enqueue() {
    let now = FakeClock::new().utc_now();
    let op = Operation::DecisionEnqueue {
        decision: Decision::single("dec-7", "hello", now),
    };
    assert_eq!(op.decision_id(), "dec-7");
    assert_eq!(op.name(), "enqueue");
}

#[test]
fn fields_include_identifiers() {
    let now = FakeClock::new().utc_now();
    let op = Operation::DecisionComplete {
        id: "dec-1".into(),
        identifiers: vec!["a".into(), "b".into()],
        at: now,
    };
    assert_eq!(op.describe(), "decision_id=dec-1 identifiers=a,b");
}
