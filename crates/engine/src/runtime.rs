// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime: the dispatch, reconciliation and janitor loops
//!
//! Each loop is its own task on a fixed interval. Shutdown is broadcast
//! over a watch channel; a loop finishes the iteration it is in, then
//! exits. Publish attempts still running get `shutdown_grace` before they
//! are aborted, and claims they leave behind without a receipt are
//! released.

use crate::dispatch::Dispatcher;
use crate::janitor::Janitor;
use crate::reconcile::Reconciler;
use courier_adapters::{ChannelAdapter, NotifyAdapter};
use courier_core::{Clock, CourierConfig, IdGen};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Loop intervals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    pub dispatch_tick: Duration,
    pub reconcile_interval: Duration,
    pub janitor_interval: Duration,
    pub shutdown_grace: Duration,
}

impl From<&CourierConfig> for LoopConfig {
    fn from(config: &CourierConfig) -> Self {
        Self {
            dispatch_tick: config.dispatch.tick,
            reconcile_interval: config.reconcile.interval,
            janitor_interval: config.janitor.interval,
            shutdown_grace: config.dispatch.shutdown_grace,
        }
    }
}

pub struct Runtime<C, K, I, N> {
    dispatcher: Arc<Dispatcher<C, K, I, N>>,
    reconciler: Arc<Reconciler<C, K, N>>,
    janitor: Janitor<K>,
    loops: LoopConfig,
}

impl<C, K, I, N> Runtime<C, K, I, N>
where
    C: ChannelAdapter,
    K: Clock,
    I: IdGen,
    N: NotifyAdapter,
{
    pub fn new(
        dispatcher: Dispatcher<C, K, I, N>,
        reconciler: Reconciler<C, K, N>,
        janitor: Janitor<K>,
        loops: LoopConfig,
    ) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            reconciler: Arc::new(reconciler),
            janitor,
            loops,
        }
    }

    /// Start every loop
    pub fn spawn(self) -> RuntimeHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        tasks.spawn(dispatch_loop(
            Arc::clone(&self.dispatcher),
            self.janitor.clone(),
            self.loops.dispatch_tick,
            self.loops.shutdown_grace,
            shutdown_rx.clone(),
        ));
        tasks.spawn(reconcile_loop(
            Arc::clone(&self.reconciler),
            self.loops.reconcile_interval,
            shutdown_rx.clone(),
        ));
        tasks.spawn(janitor_loop(
            self.janitor,
            self.loops.janitor_interval,
            shutdown_rx,
        ));

        tracing::info!(
            dispatch_tick_ms = self.loops.dispatch_tick.as_millis() as u64,
            reconcile_interval_ms = self.loops.reconcile_interval.as_millis() as u64,
            janitor_interval_ms = self.loops.janitor_interval.as_millis() as u64,
            "runtime started"
        );
        RuntimeHandle { shutdown_tx, tasks }
    }
}

/// Handle to the running loops
pub struct RuntimeHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl RuntimeHandle {
    /// Signal shutdown and wait for every loop to exit
    pub async fn shutdown(mut self) {
        // Receivers only go away once their loops have exited
        let _ = self.shutdown_tx.send(true);
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "runtime loop failed");
            }
        }
        tracing::info!("runtime stopped");
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn dispatch_loop<C, K, I, N>(
    dispatcher: Arc<Dispatcher<C, K, I, N>>,
    janitor: Janitor<K>,
    tick: Duration,
    grace: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    C: ChannelAdapter,
    K: Clock,
    I: IdGen,
    N: NotifyAdapter,
{
    let mut ticker = ticker(tick);
    let mut attempts: JoinSet<String> = JoinSet::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => match dispatcher.spawn_due(&mut attempts) {
                Ok(ids) if !ids.is_empty() => {
                    tracing::debug!(
                        claimed = ids.len(),
                        in_flight = attempts.len(),
                        "dispatch tick"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "dispatch tick failed"),
            },
            Some(joined) = attempts.join_next(), if !attempts.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "publish task failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    if attempts.is_empty() {
        return;
    }
    tracing::info!(
        in_flight = attempts.len(),
        grace_ms = grace.as_millis() as u64,
        "waiting for publish attempts"
    );
    let drained = tokio::time::timeout(grace, async {
        while attempts.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(aborted = attempts.len(), "shutdown grace elapsed, aborting attempts");
        attempts.shutdown().await;
        match janitor.requeue_aborted() {
            Ok(requeued) if !requeued.is_empty() => {
                tracing::info!(
                    requeued = requeued.len(),
                    "aborted claims requeued, next attempt checks activity first"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "requeueing aborted claims failed"),
        }
    }
}

async fn reconcile_loop<C, K, N>(
    reconciler: Arc<Reconciler<C, K, N>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    C: ChannelAdapter,
    K: Clock,
    N: NotifyAdapter,
{
    let mut ticker = ticker(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                reconciler.sweep().await;
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn janitor_loop<K: Clock>(
    janitor: Janitor<K>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = ticker(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = janitor.run() {
                    tracing::error!(error = %e, "janitor pass failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
