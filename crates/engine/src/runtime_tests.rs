// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::actuator::Actuator;
use crate::alerts::Alerter;
use crate::governor::RateGovernor;
use crate::pool::{BudgetPolicy, JobClass, SessionPool};
use crate::resolve::Resolver;
use courier_adapters::{FakeChannelAdapter, FakeNotifyAdapter};
use courier_core::{
    Decision, DecisionStatus, ErrorKind, FakeClock, JanitorConfig, NotifyConfig, PoolConfig, PublishConfig,
    RateConfig, ReconcileConfig, ResolveConfig, SequentialIdGen,
};
use courier_storage::{DecisionStore, ReceiptLedger};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: DecisionStore,
    clock: FakeClock,
    pool: Arc<SessionPool>,
    runtime: Runtime<FakeChannelAdapter, FakeClock, SequentialIdGen, FakeNotifyAdapter>,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let channel = FakeChannelAdapter::new().with_clock(clock.clone());
    let notify = Alerter::new(FakeNotifyAdapter::new(), NotifyConfig::default());
    let store = DecisionStore::open(&dir.path().join("decisions.wal")).unwrap();
    let ledger = ReceiptLedger::open(&dir.path().join("receipts.wal")).unwrap();
    let pool = SessionPool::open(&channel, 1, BudgetPolicy::from(&PoolConfig::default()))
        .await
        .unwrap();
    let publish = PublishConfig::default();
    let dispatcher = Dispatcher::new(
        store.clone(),
        RateGovernor::new(RateConfig::default()),
        Actuator::new(
            channel.clone(),
            Arc::clone(&pool),
            ledger.clone(),
            Resolver::new(ResolveConfig::default(), Default::default()),
            publish.clone(),
            clock.clone(),
            SequentialIdGen::new("att"),
        ),
        notify.clone(),
        clock.clone(),
        publish.retry_policy(),
        8,
    );
    let reconciler = Reconciler::new(
        store.clone(),
        ledger.clone(),
        Default::default(),
        ReconcileConfig::default(),
        notify,
        clock.clone(),
    )
    .with_channel(channel, Arc::clone(&pool));
    let janitor = Janitor::new(
        store.clone(),
        ledger,
        &JanitorConfig::default(),
        clock.clone(),
    );
    let runtime = Runtime::new(
        dispatcher,
        reconciler,
        janitor,
        LoopConfig::from(&CourierConfig::default()),
    );
    Harness {
        _dir: dir,
        store,
        clock,
        pool,
        runtime,
    }
}

#[tokio::test(start_paused = true)]
async fn loops_publish_due_decisions() {
    let h = harness().await;
    h.store
        .enqueue(Decision::single("dec-1", "hello", h.clock.utc_now()))
        .unwrap();

    let handle = h.runtime.spawn();
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.shutdown().await;

    let row = h.store.get("dec-1").unwrap();
    assert_eq!(row.status, DecisionStatus::Posted);
    assert_eq!(row.identifiers, vec!["post-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn later_tick_picks_up_new_work() {
    let h = harness().await;
    let handle = h.runtime.spawn();
    tokio::time::sleep(Duration::from_secs(1)).await;

    h.store
        .enqueue(Decision::single("dec-1", "hello", h.clock.utc_now()))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(16)).await;
    handle.shutdown().await;

    assert_eq!(h.store.get("dec-1").unwrap().status, DecisionStatus::Posted);
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_stuck_attempts_and_requeues_them_ambiguous() {
    let h = harness().await;
    // Hold the only session so the attempt waits in the pool
    let held = h.pool.acquire(JobClass::Discovery).await.unwrap();
    h.store
        .enqueue(Decision::single("dec-1", "hello", h.clock.utc_now()))
        .unwrap();

    let handle = h.runtime.spawn();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.get("dec-1").unwrap().status, DecisionStatus::Posting);

    let started = tokio::time::Instant::now();
    handle.shutdown().await;

    // Grace is 30s, the publish budget 90s
    assert_eq!(started.elapsed(), Duration::from_secs(30));
    let row = h.store.get("dec-1").unwrap();
    assert_eq!(row.status, DecisionStatus::Queued);
    assert_eq!(
        row.last_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::ConfirmationTimeout)
    );
    assert!(row.needs_dedup());
    drop(held);
}
