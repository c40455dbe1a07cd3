// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority session pool
//!
//! A fixed set of automation sessions shared by every job that needs the
//! channel. Requests are served immediately while a session is idle;
//! otherwise they wait in a queue ordered by (priority, arrival). A
//! released session goes straight to the most urgent live waiter.
//!
//! Each wait is bounded by a budget that depends on the job class:
//! critical classes get `max(base × multiplier, floor)`, background
//! classes get `base`. Running out of budget is
//! [`PoolError::Exhausted`], which callers treat as retryable.

use courier_adapters::{ChannelAdapter, ChannelError};
use courier_core::{Category, PoolConfig};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;

/// Kind of work asking for a session; lower priority value is more urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClass {
    Reply,
    Publish,
    Reconcile,
    Discovery,
    Metrics,
    Analytics,
}

impl JobClass {
    pub fn priority(&self) -> u8 {
        match self {
            JobClass::Reply => 0,
            JobClass::Publish => 1,
            JobClass::Reconcile => 4,
            JobClass::Discovery => 5,
            JobClass::Metrics => 6,
            JobClass::Analytics => 7,
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, JobClass::Reply | JobClass::Publish)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobClass::Reply => "reply",
            JobClass::Publish => "publish",
            JobClass::Reconcile => "reconcile",
            JobClass::Discovery => "discovery",
            JobClass::Metrics => "metrics",
            JobClass::Analytics => "analytics",
        }
    }

    /// The class a publish attempt of this category runs under
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Reply => JobClass::Reply,
            Category::Single | Category::Thread => JobClass::Publish,
        }
    }
}

impl std::fmt::Display for JobClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wait budgets per job class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetPolicy {
    pub base: Duration,
    pub critical_multiplier: u32,
    pub critical_floor: Duration,
}

impl BudgetPolicy {
    pub fn budget(&self, class: JobClass) -> Duration {
        if class.is_critical() {
            self.base
                .saturating_mul(self.critical_multiplier)
                .max(self.critical_floor)
        } else {
            self.base
        }
    }
}

impl From<&PoolConfig> for BudgetPolicy {
    fn from(config: &PoolConfig) -> Self {
        Self {
            base: config.base_timeout,
            critical_multiplier: config.critical_multiplier,
            critical_floor: config.critical_floor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("no session for {class} within {}ms", budget.as_millis())]
    Exhausted { class: JobClass, budget: Duration },
    #[error("session pool closed")]
    Closed,
    #[error("failed to open session: {0}")]
    Open(#[from] ChannelError),
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolUtilization {
    pub size: usize,
    pub in_use: usize,
    pub waiting: usize,
}

struct Waiter {
    priority: u8,
    seq: u64,
    tx: oneshot::Sender<String>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Waiter {}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiter {
    // BinaryHeap is a max-heap; the smallest (priority, seq) must pop first
    fn cmp(&self, other: &Self) -> Ordering {
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

#[derive(Default)]
struct PoolState {
    sessions: Vec<String>,
    idle: Vec<String>,
    waiters: BinaryHeap<Waiter>,
    in_use: usize,
    next_seq: u64,
    closed: bool,
}

/// Bounded pool of automation sessions served by priority
pub struct SessionPool {
    state: Mutex<PoolState>,
    budgets: BudgetPolicy,
}

impl SessionPool {
    pub fn new(sessions: Vec<String>, budgets: BudgetPolicy) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PoolState {
                idle: sessions.iter().rev().cloned().collect(),
                sessions,
                ..PoolState::default()
            }),
            budgets,
        })
    }

    /// Open `size` sessions through the channel.
    ///
    /// Sessions opened before a failure are closed again.
    pub async fn open<C: ChannelAdapter>(
        channel: &C,
        size: usize,
        budgets: BudgetPolicy,
    ) -> Result<Arc<Self>, PoolError> {
        let mut sessions = Vec::with_capacity(size);
        for _ in 0..size {
            match channel.open_session().await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    for session in &sessions {
                        let _ = channel.close_session(session).await;
                    }
                    return Err(PoolError::Open(e));
                }
            }
        }
        tracing::info!(size, "session pool opened");
        Ok(Self::new(sessions, budgets))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn budget(&self, class: JobClass) -> Duration {
        self.budgets.budget(class)
    }

    /// Wait for a session within the class budget
    pub async fn acquire(self: &Arc<Self>, class: JobClass) -> Result<SlotLease, PoolError> {
        let budget = self.budgets.budget(class);
        let (mut rx, seq) = {
            let mut state = self.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            if state.waiters.is_empty() {
                if let Some(session) = state.idle.pop() {
                    state.in_use += 1;
                    return Ok(self.lease(session, class));
                }
            }
            let (tx, rx) = oneshot::channel();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.waiters.push(Waiter {
                priority: class.priority(),
                seq,
                tx,
            });
            tracing::debug!(
                class = class.as_str(),
                waiting = state.waiters.len(),
                "waiting for session"
            );
            (rx, seq)
        };

        match tokio::time::timeout(budget, &mut rx).await {
            Ok(Ok(session)) => Ok(self.lease(session, class)),
            Ok(Err(_)) => Err(PoolError::Closed),
            Err(_) => {
                let mut state = self.lock();
                let before = state.waiters.len();
                state.waiters.retain(|w| w.seq != seq);
                if state.waiters.len() < before {
                    tracing::warn!(
                        class = class.as_str(),
                        budget_ms = budget.as_millis() as u64,
                        "session wait budget exhausted"
                    );
                    return Err(PoolError::Exhausted { class, budget });
                }
                // Granted between the timeout firing and taking the lock
                match rx.try_recv() {
                    Ok(session) => Ok(self.lease(session, class)),
                    Err(_) => Err(PoolError::Exhausted { class, budget }),
                }
            }
        }
    }

    fn lease(self: &Arc<Self>, session: String, class: JobClass) -> SlotLease {
        SlotLease {
            pool: Arc::clone(self),
            session: Some(session),
            class,
            acquired_at: Instant::now(),
        }
    }

    /// Hand a session to the next live waiter, or return it to the idle set
    fn release(&self, mut session: String) {
        let mut state = self.lock();
        while let Some(waiter) = state.waiters.pop() {
            match waiter.tx.send(session) {
                Ok(()) => return,
                // Waiter gave up; try the next one
                Err(returned) => session = returned,
            }
        }
        state.in_use = state.in_use.saturating_sub(1);
        if !state.closed {
            state.idle.push(session);
        }
    }

    pub fn utilization(&self) -> PoolUtilization {
        let state = self.lock();
        PoolUtilization {
            size: state.sessions.len(),
            in_use: state.in_use,
            waiting: state.waiters.len(),
        }
    }

    /// Stop granting sessions, fail current waiters, and return every session id
    pub fn close(&self) -> Vec<String> {
        let mut state = self.lock();
        state.closed = true;
        state.waiters.clear();
        state.idle.clear();
        state.sessions.clone()
    }
}

/// Exclusive use of one session; returned to the pool on drop
pub struct SlotLease {
    pool: Arc<SessionPool>,
    session: Option<String>,
    class: JobClass,
    acquired_at: Instant,
}

impl SlotLease {
    pub fn session(&self) -> &str {
        self.session.as_deref().unwrap_or("")
    }

    pub fn class(&self) -> JobClass {
        self.class
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::trace!(
                class = self.class.as_str(),
                held_ms = self.acquired_at.elapsed().as_millis() as u64,
                "session released"
            );
            self.pool.release(session);
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
