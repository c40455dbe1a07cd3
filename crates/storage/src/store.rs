// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decision store and claim protocol
//!
//! Every mutation runs under one lock: look up the row, compute the
//! transition, append the operation to the WAL (fsync), then apply it to
//! the materialized state. A transition that would change nothing is not
//! written, which keeps repeated reconciliation writes idempotent.

use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use chrono::{DateTime, Utc};
use courier_core::{
    to_time_delta, Decision, DecisionError, DecisionStatus, Operation, PublishError, RetryPolicy,
    TracedOperation, TransitionError,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("decision not found: {0}")]
    NotFound(String),
    #[error("decision already exists: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Invalid(#[from] DecisionError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

struct Inner {
    wal: Wal<Operation>,
    state: MaterializedState,
}

impl Inner {
    fn lookup(&self, id: &str) -> Result<&Decision, StoreError> {
        self.state
            .decisions
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Validate, persist, apply. Returns the new row and whether it changed.
    fn commit(&mut self, op: Operation) -> Result<(Decision, bool), StoreError> {
        let current = self.lookup(op.decision_id())?;
        let next = current.transition(&op)?;
        if &next == current {
            return Ok((next, false));
        }
        self.wal.append(&op)?;
        tracing::debug!(op = op.name(), fields = %op.describe(), "decision wal append");
        self.state.apply(&op);
        Ok((next, true))
    }
}

/// Durable decision rows with a conditional claim
#[derive(Clone)]
pub struct DecisionStore {
    inner: Arc<Mutex<Inner>>,
}

impl DecisionStore {
    /// Open the store, replaying the WAL at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let ops = Wal::<Operation>::replay(path)?;
        let mut state = MaterializedState::default();
        for op in &ops {
            state.apply(op);
        }
        let wal = Wal::open(path)?;
        tracing::info!(
            path = %path.display(),
            operations = ops.len(),
            decisions = state.decisions.len(),
            "decision store opened"
        );
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner { wal, state })),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Accept a new decision from the producer
    pub fn enqueue(&self, decision: Decision) -> Result<(), StoreError> {
        decision.validate()?;
        let mut inner = self.lock();
        if inner.state.decisions.contains_key(&decision.id) {
            return Err(StoreError::Duplicate(decision.id));
        }
        let op = Operation::DecisionEnqueue { decision };
        inner.wal.append(&op)?;
        tracing::info!(fields = %op.describe(), "decision enqueued");
        inner.state.apply(&op);
        Ok(())
    }

    /// Conditionally move `queued → posting`.
    ///
    /// Of any number of concurrent callers exactly one receives the row;
    /// the rest get `None`.
    pub fn claim(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Decision>, StoreError> {
        let mut inner = self.lock();
        if inner.lookup(id)?.status != DecisionStatus::Queued {
            return Ok(None);
        }
        let (decision, _) = inner.commit(Operation::DecisionClaim {
            id: id.to_string(),
            at: now,
        })?;
        Ok(Some(decision))
    }

    /// `posting → posted`
    pub fn complete(
        &self,
        id: &str,
        identifiers: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let (decision, _) = self.lock().commit(Operation::DecisionComplete {
            id: id.to_string(),
            identifiers,
            at: now,
        })?;
        Ok(decision)
    }

    /// Record a failed attempt; the error decides retry or terminal failure
    pub fn fail(
        &self,
        id: &str,
        error: &PublishError,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let mut inner = self.lock();
        let op = inner.lookup(id)?.failure_op(error, policy, now);
        let (decision, _) = inner.commit(op)?;
        Ok(decision)
    }

    /// `posting → queued` without counting an attempt
    pub fn release(&self, id: &str, reason: &str) -> Result<Decision, StoreError> {
        let (decision, _) = self.lock().commit(Operation::DecisionRelease {
            id: id.to_string(),
            reason: reason.to_string(),
        })?;
        Ok(decision)
    }

    /// `posting → queued` with an ambiguous error, so the next attempt
    /// checks for an earlier post. Returns `false` if the row is not `posting`.
    pub fn requeue_unconfirmed(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let current = inner.lookup(id)?;
        if current.status != DecisionStatus::Posting {
            return Ok(false);
        }
        let op = current.unconfirmed_op(reason, now);
        let (_, changed) = inner.commit(op)?;
        Ok(changed)
    }

    /// Requeue every `posting` row not `exempt` as unconfirmed. Returns the ids.
    pub fn requeue_all_unconfirmed(
        &self,
        reason: &str,
        now: DateTime<Utc>,
        exempt: impl Fn(&str) -> bool,
    ) -> Result<Vec<String>, StoreError> {
        let mut inner = self.lock();
        let mut ops: Vec<Operation> = inner
            .state
            .with_status(DecisionStatus::Posting)
            .filter(|d| !exempt(&d.id))
            .map(|d| d.unconfirmed_op(reason, now))
            .collect();
        ops.sort_by(|a, b| a.decision_id().cmp(b.decision_id()));
        let mut requeued = Vec::with_capacity(ops.len());
        for op in ops {
            requeued.push(op.decision_id().to_string());
            inner.commit(op)?;
        }
        Ok(requeued)
    }

    /// `queued → skipped`
    pub fn skip(&self, id: &str, reason: &str) -> Result<Decision, StoreError> {
        let (decision, _) = self.lock().commit(Operation::DecisionSkip {
            id: id.to_string(),
            reason: reason.to_string(),
        })?;
        Ok(decision)
    }

    /// Reconciliation: mark posted on evidence. Returns whether anything changed.
    pub fn force_posted(
        &self,
        id: &str,
        identifiers: Vec<String>,
        posted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let (_, changed) = self.lock().commit(Operation::DecisionForcePosted {
            id: id.to_string(),
            identifiers,
            posted_at,
        })?;
        Ok(changed)
    }

    /// Late identifiers for a posted decision. Returns whether anything changed.
    pub fn attach_identifiers(
        &self,
        id: &str,
        identifiers: Vec<String>,
    ) -> Result<bool, StoreError> {
        let (_, changed) = self.lock().commit(Operation::DecisionAttach {
            id: id.to_string(),
            identifiers,
        })?;
        Ok(changed)
    }

    /// Release `posting` claims older than `stale_after`, except those
    /// `exempt` says are covered by other evidence. Returns released ids.
    pub fn release_stale(
        &self,
        now: DateTime<Utc>,
        stale_after: Duration,
        exempt: impl Fn(&str) -> bool,
    ) -> Result<Vec<String>, StoreError> {
        let cutoff = now - to_time_delta(stale_after);
        let mut inner = self.lock();
        let mut stale: Vec<String> = inner
            .state
            .with_status(DecisionStatus::Posting)
            .filter(|d| d.claimed_at.is_some_and(|at| at <= cutoff))
            .filter(|d| !exempt(&d.id))
            .map(|d| d.id.clone())
            .collect();
        stale.sort();
        for id in &stale {
            inner.commit(Operation::DecisionRelease {
                id: id.clone(),
                reason: "stale claim".to_string(),
            })?;
        }
        Ok(stale)
    }

    /// Look up by exact id
    pub fn get(&self, id: &str) -> Option<Decision> {
        self.lock().state.get_decision(id).cloned()
    }

    /// Look up by id or unique prefix
    pub fn find(&self, id: &str) -> Option<Decision> {
        self.lock().state.find_decision(id).cloned()
    }

    /// Copy of every row
    pub fn snapshot(&self) -> Vec<Decision> {
        let mut all: Vec<_> = self.lock().state.decisions.values().cloned().collect();
        all.sort_by(|a, b| (a.scheduled_at, &a.id).cmp(&(b.scheduled_at, &b.id)));
        all
    }

    /// Eligible decisions ordered by scheduled time then id
    pub fn due(&self, now: DateTime<Utc>) -> Vec<Decision> {
        self.lock().state.due(now).into_iter().cloned().collect()
    }

    pub fn count_by_status(&self) -> HashMap<DecisionStatus, usize> {
        self.lock().state.count_by_status()
    }

    /// Run a read-only closure against the materialized state
    pub fn with_state<R>(&self, f: impl FnOnce(&MaterializedState) -> R) -> R {
        f(&self.lock().state)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
