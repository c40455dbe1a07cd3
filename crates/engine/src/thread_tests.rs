// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::actuator::{Actuator, PublishOutcome};
use crate::pool::{BudgetPolicy, SessionPool};
use crate::resolve::Resolver;
use courier_adapters::{ActivityItem, ChannelError, FakeChannelAdapter, Submission, SubmitOutcome};
use courier_core::{
    Clock, Decision, ErrorKind, FakeClock, FingerprintConfig, LastError, PoolConfig,
    PublishConfig, PublishError, ResolveConfig, SequentialIdGen,
};
use courier_storage::ReceiptLedger;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    channel: FakeChannelAdapter,
    clock: FakeClock,
    ledger: ReceiptLedger,
    actuator: Actuator<FakeChannelAdapter, FakeClock, SequentialIdGen>,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let channel = FakeChannelAdapter::new().with_clock(clock.clone());
    let ledger = ReceiptLedger::open(&dir.path().join("receipts.wal")).unwrap();
    let pool = SessionPool::open(&channel, 1, BudgetPolicy::from(&PoolConfig::default()))
        .await
        .unwrap();
    let actuator = Actuator::new(
        channel.clone(),
        pool,
        ledger.clone(),
        Resolver::new(ResolveConfig::default(), FingerprintConfig::default()),
        PublishConfig::default(),
        clock.clone(),
        SequentialIdGen::new("att"),
    );
    Harness {
        _dir: dir,
        channel,
        clock,
        ledger,
        actuator,
    }
}

fn three_parts(h: &Harness) -> Decision {
    Decision::thread("dec-1", ["one", "two", "three"], h.clock.utc_now())
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn reply(text: &str, target: &str) -> Submission {
    Submission::Reply {
        text: text.to_string(),
        target_id: target.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn native_thread_posts_once() {
    let h = harness().await;
    let decision = three_parts(&h);

    let outcome = h.actuator.publish(&decision).await.unwrap();

    assert_eq!(
        outcome,
        PublishOutcome::Published {
            identifiers: ids(&["post-1", "post-2", "post-3"])
        }
    );
    assert_eq!(h.channel.submissions().len(), 1);
    assert!(matches!(
        h.channel.submissions()[0],
        Submission::Thread { .. }
    ));
    let receipt = h.ledger.get("dec-1").unwrap();
    assert_eq!(receipt.identifiers, ids(&["post-1", "post-2", "post-3"]));
    assert_eq!(receipt.expected_parts, 3);
}

#[tokio::test(start_paused = true)]
async fn unsupported_native_falls_back_to_chain() {
    let h = harness().await;
    h.channel.set_native_threads(false);
    let decision = three_parts(&h);

    let outcome = h.actuator.publish(&decision).await.unwrap();

    assert_eq!(
        outcome,
        PublishOutcome::Published {
            identifiers: ids(&["post-1", "post-2", "post-3"])
        }
    );
    let submissions = h.channel.submissions();
    assert_eq!(submissions.len(), 4);
    assert_eq!(
        submissions[1],
        Submission::Post {
            text: "one".to_string()
        }
    );
    assert_eq!(submissions[2], reply("two", "post-1"));
    assert_eq!(submissions[3], reply("three", "post-2"));
}

#[tokio::test(start_paused = true)]
async fn repeated_native_refusal_falls_back() {
    let h = harness().await;
    h.channel.script_submits([
        SubmitOutcome::Fail(ChannelError::Rejected("composer error".into())),
        SubmitOutcome::Fail(ChannelError::Rejected("composer error".into())),
    ]);
    let decision = three_parts(&h);

    let outcome = h.actuator.publish(&decision).await.unwrap();

    assert!(matches!(outcome, PublishOutcome::Published { ref identifiers } if identifiers.len() == 3));
    let submissions = h.channel.submissions();
    assert_eq!(submissions.len(), 5);
    assert!(matches!(submissions[1], Submission::Thread { .. }));
    assert!(matches!(submissions[2], Submission::Post { .. }));
}

#[tokio::test(start_paused = true)]
async fn ambiguous_native_submit_does_not_fall_back() {
    let h = harness().await;
    h.channel.script_submits([SubmitOutcome::AcceptSilently]);
    let decision = three_parts(&h);

    let err = h.actuator.publish(&decision).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfirmationTimeout);
    assert_eq!(h.channel.submissions().len(), 1);
    assert!(!h.ledger.has_receipt("dec-1"));
}

#[tokio::test(start_paused = true)]
async fn chain_stopping_midway_is_partial() {
    let h = harness().await;
    h.channel.set_native_threads(false);
    let refused = || SubmitOutcome::Fail(ChannelError::Rejected("too fast".into()));
    h.channel
        .script_submits([SubmitOutcome::Accept, refused(), refused(), refused()]);
    let decision = three_parts(&h);

    let err = h.actuator.publish(&decision).await.unwrap_err();

    assert!(matches!(
        err,
        PublishError::PartialThread {
            posted: 1,
            expected: 3,
            ..
        }
    ));
    let receipt = h.ledger.get("dec-1").unwrap();
    assert!(receipt.abandoned);
    assert!(receipt.is_partial());
    assert_eq!(receipt.identifiers, ids(&["post-1"]));
}

#[tokio::test(start_paused = true)]
async fn first_part_failure_is_plain_rejection() {
    let h = harness().await;
    h.channel.set_native_threads(false);
    let refused = || SubmitOutcome::Fail(ChannelError::Rejected("blocked".into()));
    h.channel.script_submits([refused(), refused(), refused()]);
    let decision = three_parts(&h);

    let err = h.actuator.publish(&decision).await.unwrap_err();

    assert_eq!(err, PublishError::SubmitRejected("blocked".into()));
    assert!(!h.ledger.has_receipt("dec-1"));
}

#[tokio::test(start_paused = true)]
async fn failed_part_is_retried_after_delay() {
    let h = harness().await;
    h.channel.set_native_threads(false);
    h.channel.script_submits([
        SubmitOutcome::Accept,
        SubmitOutcome::Fail(ChannelError::Unavailable("hiccup".into())),
    ]);
    let decision = three_parts(&h);
    let started = tokio::time::Instant::now();

    let outcome = h.actuator.publish(&decision).await.unwrap();

    assert_eq!(
        outcome,
        PublishOutcome::Published {
            identifiers: ids(&["post-1", "post-2", "post-3"])
        }
    );
    // Thread, Post, failed Reply, Reply, Reply
    assert_eq!(h.channel.submissions().len(), 5);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn ambiguous_attempt_resumes_after_posted_parts() {
    let h = harness().await;
    let now = h.clock.utc_now();
    h.channel.add_activity(ActivityItem {
        id: "ext-1".to_string(),
        text: "one".to_string(),
        posted_at: now,
        in_reply_to: None,
    });
    let mut decision = three_parts(&h);
    decision.attempts = 1;
    decision.last_error = Some(LastError {
        kind: ErrorKind::ConfirmationTimeout,
        message: "no acknowledgement".to_string(),
        at: now,
    });

    let outcome = h.actuator.publish(&decision).await.unwrap();

    assert_eq!(
        outcome,
        PublishOutcome::Published {
            identifiers: ids(&["ext-1", "post-1", "post-2"])
        }
    );
    assert_eq!(
        h.channel.submissions(),
        vec![reply("two", "ext-1"), reply("three", "post-1")]
    );
    assert_eq!(
        h.ledger.get("dec-1").unwrap().identifiers,
        ids(&["ext-1", "post-1", "post-2"])
    );
}

#[tokio::test(start_paused = true)]
async fn native_thread_with_parts_missing_from_activity_stays_unresolved() {
    let h = harness().await;
    h.channel.set_feed_lag(100);
    let decision = three_parts(&h);

    let outcome = h.actuator.publish(&decision).await.unwrap();

    assert_eq!(outcome, PublishOutcome::ConfirmedUnresolved);
    assert_eq!(h.channel.submissions().len(), 1);
    // Root came from navigation and is kept
    let receipt = h.ledger.get("dec-1").unwrap();
    assert_eq!(receipt.identifiers, ids(&["post-1"]));
    assert!(!receipt.is_complete());
    assert!(!receipt.abandoned);
}

#[tokio::test(start_paused = true)]
async fn chain_root_accepted_but_unresolved_is_not_a_failure() {
    let h = harness().await;
    h.channel.set_native_threads(false);
    h.channel.set_navigation(false);
    h.channel.set_surface(false);
    h.channel.set_feed_lag(100);
    let decision = three_parts(&h);

    let outcome = h.actuator.publish(&decision).await.unwrap();

    assert_eq!(outcome, PublishOutcome::ConfirmedUnresolved);
    // Thread refused, root posted, nothing replied to an unknown id
    assert_eq!(h.channel.submissions().len(), 2);
    let receipt = h.ledger.get("dec-1").unwrap();
    assert!(receipt.identifiers.is_empty());
    assert!(!receipt.abandoned);
    assert_eq!(h.channel.feed().len(), 1);
}
