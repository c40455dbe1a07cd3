// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared wiring for engine integration tests: one publication core over
//! the fake channel, stores in a temp dir.

#![allow(dead_code)]

use courier_adapters::{FakeChannelAdapter, FakeNotifyAdapter};
use courier_core::{
    FakeClock, FingerprintConfig, JanitorConfig, NotifyConfig, PoolConfig, PublishConfig,
    RateConfig, RateLimits, ReconcileConfig, ResolveConfig, SequentialIdGen,
};
use courier_engine::{
    Actuator, Alerter, BudgetPolicy, Dispatcher, Janitor, RateGovernor, Reconciler, Resolver,
    SessionPool,
};
use courier_storage::{DecisionStore, ReceiptLedger};
use std::sync::Arc;
use tempfile::TempDir;

pub type TestDispatcher =
    Dispatcher<FakeChannelAdapter, FakeClock, SequentialIdGen, FakeNotifyAdapter>;
pub type TestReconciler = Reconciler<FakeChannelAdapter, FakeClock, FakeNotifyAdapter>;

pub struct Courier {
    _dir: TempDir,
    pub store: DecisionStore,
    pub ledger: ReceiptLedger,
    pub channel: FakeChannelAdapter,
    pub notify: FakeNotifyAdapter,
    pub clock: FakeClock,
    pub pool: Arc<SessionPool>,
    pub dispatcher: Arc<TestDispatcher>,
    pub reconciler: TestReconciler,
    pub janitor: Janitor<FakeClock>,
}

pub fn unlimited() -> RateConfig {
    RateConfig {
        single: RateLimits::default(),
        thread: RateLimits::default(),
        reply: RateLimits::default(),
    }
}

pub fn per_hour(ceiling: u32) -> RateConfig {
    RateConfig {
        single: RateLimits::new(Some(ceiling), None),
        ..unlimited()
    }
}

pub async fn courier(rate: RateConfig, sessions: usize) -> Courier {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let channel = FakeChannelAdapter::new().with_clock(clock.clone());
    let notify = FakeNotifyAdapter::new();
    let alerts = Alerter::new(notify.clone(), NotifyConfig::default());
    let store = DecisionStore::open(&dir.path().join("decisions.wal")).unwrap();
    let ledger = ReceiptLedger::open(&dir.path().join("receipts.wal")).unwrap();
    let pool = SessionPool::open(
        &channel,
        sessions,
        BudgetPolicy::from(&PoolConfig::default()),
    )
    .await
    .unwrap();

    let publish = PublishConfig::default();
    let actuator = Actuator::new(
        channel.clone(),
        Arc::clone(&pool),
        ledger.clone(),
        Resolver::new(ResolveConfig::default(), FingerprintConfig::default()),
        publish.clone(),
        clock.clone(),
        SequentialIdGen::new("att"),
    );
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        RateGovernor::new(rate),
        actuator,
        alerts.clone(),
        clock.clone(),
        publish.retry_policy(),
        8,
    ));
    let reconciler = Reconciler::new(
        store.clone(),
        ledger.clone(),
        FingerprintConfig::default(),
        ReconcileConfig::default(),
        alerts,
        clock.clone(),
    )
    .with_channel(channel.clone(), Arc::clone(&pool));
    let janitor = Janitor::new(
        store.clone(),
        ledger.clone(),
        &JanitorConfig::default(),
        clock.clone(),
    );

    Courier {
        _dir: dir,
        store,
        ledger,
        channel,
        notify,
        clock,
        pool,
        dispatcher,
        reconciler,
        janitor,
    }
}
