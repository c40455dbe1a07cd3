// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch tick
//!
//! Each tick plans against the rate governor, claims what it admitted,
//! and carries every claimed decision through the actuator. The outcome
//! of an attempt is written back to the decision row here.

use crate::actuator::{Actuator, PublishOutcome};
use crate::alerts::Alerter;
use crate::error::RuntimeError;
use crate::governor::RateGovernor;
use chrono::{DateTime, Utc};
use courier_adapters::{ChannelAdapter, NotifyAdapter};
use courier_core::{Alert, Clock, Decision, DecisionStatus, IdGen, PublishError, RetryPolicy};
use courier_storage::DecisionStore;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

pub struct Dispatcher<C, K, I, N> {
    store: DecisionStore,
    governor: RateGovernor,
    actuator: Actuator<C, K, I>,
    alerts: Alerter<N>,
    clock: K,
    retry: RetryPolicy,
    batch: usize,
}

impl<C, K, I, N> Dispatcher<C, K, I, N>
where
    C: ChannelAdapter,
    K: Clock,
    I: IdGen,
    N: NotifyAdapter,
{
    pub fn new(
        store: DecisionStore,
        governor: RateGovernor,
        actuator: Actuator<C, K, I>,
        alerts: Alerter<N>,
        clock: K,
        retry: RetryPolicy,
        batch: usize,
    ) -> Self {
        Self {
            store,
            governor,
            actuator,
            alerts,
            clock,
            retry,
            batch,
        }
    }

    /// Claim the decisions the governor admits at `now`.
    ///
    /// Planning and claiming both go through the store, so a decision
    /// another caller claimed in between is simply not returned.
    pub fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<Decision>, RuntimeError> {
        let (admitted, denied) = self.store.with_state(|state| {
            let plan = self.governor.plan(state, now, self.batch);
            let denied: Vec<(String, PublishError)> = plan
                .deferred
                .iter()
                .filter_map(|(id, admission)| {
                    let category = state.get_decision(id)?.category;
                    Some((id.clone(), admission.denial(category)?))
                })
                .collect();
            (plan.admitted, denied)
        });
        for (id, reason) in &denied {
            tracing::debug!(decision_id = %id, reason = %reason, "held back");
        }

        let mut claimed = Vec::with_capacity(admitted.len());
        for id in admitted {
            match self.store.claim(&id, now)? {
                Some(decision) => claimed.push(decision),
                None => tracing::debug!(decision_id = %id, "already claimed"),
            }
        }
        Ok(claimed)
    }

    /// Publish one claimed decision and record the outcome.
    ///
    /// Returns the row as it stands afterwards.
    pub async fn run_attempt(&self, decision: Decision) -> Result<Decision, RuntimeError> {
        let span = tracing::info_span!(
            "publish",
            decision_id = %decision.id,
            category = %decision.category,
            attempt = decision.attempts + 1,
        );
        self.attempt(decision).instrument(span).await
    }

    async fn attempt(&self, decision: Decision) -> Result<Decision, RuntimeError> {
        let start = self.clock.now();
        let result = self.actuator.publish(&decision).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let now = self.clock.utc_now();

        match result {
            Ok(PublishOutcome::Published { identifiers })
            | Ok(PublishOutcome::Deduplicated { identifiers }) => {
                tracing::info!(identifiers = ?identifiers, elapsed_ms, "posted");
                let reconciled = self
                    .store
                    .get(&decision.id)
                    .is_some_and(|row| row.status == DecisionStatus::Posted);
                if reconciled {
                    // A sweep found the post while resolution was still running
                    self.store.attach_identifiers(&decision.id, identifiers)?;
                    return Ok(self.store.get(&decision.id).unwrap_or(decision));
                }
                Ok(self.store.complete(&decision.id, identifiers, now)?)
            }
            Ok(PublishOutcome::ConfirmedUnresolved) => {
                // The receipt covers it until reconciliation finds the post
                tracing::warn!(elapsed_ms, "posted but unresolved, left to reconciliation");
                Ok(self.store.get(&decision.id).unwrap_or(decision))
            }
            Err(err) => {
                let row = self.store.fail(&decision.id, &err, &self.retry, now)?;
                match row.status {
                    DecisionStatus::Failed => {
                        tracing::error!(
                            error = %err,
                            kind = err.kind().as_str(),
                            elapsed_ms,
                            "attempt failed for good"
                        );
                        self.alerts
                            .raise(Alert::DecisionFailed {
                                decision_id: row.id.clone(),
                                category: row.category,
                                reason: err.to_string(),
                            })
                            .await;
                    }
                    _ => tracing::warn!(
                        error = %err,
                        kind = err.kind().as_str(),
                        retry_after = ?row.retry_after,
                        elapsed_ms,
                        "attempt failed, requeued"
                    ),
                }
                Ok(row)
            }
        }
    }

    /// Spawn an attempt for every decision claimed at this tick
    pub fn spawn_due(
        self: &Arc<Self>,
        attempts: &mut JoinSet<String>,
    ) -> Result<Vec<String>, RuntimeError> {
        let claimed = self.claim_due(self.clock.utc_now())?;
        let ids: Vec<String> = claimed.iter().map(|d| d.id.clone()).collect();
        for decision in claimed {
            let dispatcher = Arc::clone(self);
            attempts.spawn(async move {
                let id = decision.id.clone();
                if let Err(e) = dispatcher.run_attempt(decision).await {
                    tracing::error!(decision_id = %id, error = %e, "attempt outcome not recorded");
                }
                id
            });
        }
        Ok(ids)
    }

    /// One full pass: claim, publish concurrently, wait for every attempt
    pub async fn dispatch_pass(self: &Arc<Self>) -> Result<Vec<String>, RuntimeError> {
        let mut attempts = JoinSet::new();
        let ids = self.spawn_due(&mut attempts)?;
        while let Some(joined) = attempts.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "publish task failed");
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
