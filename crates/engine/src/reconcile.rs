// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation sweep
//!
//! Walks every unreconciled receipt and brings the decision row in line
//! with the evidence:
//!
//! - posted decision with an identifier per part: the receipt is closed
//! - receipt with an identifier per part: the decision is forced to `posted`
//! - anything short of that: the channel's activity is searched by
//!   fingerprint and the longer chain kept; a full match posts the decision
//! - abandoned partial thread: closed once searched, the failed decision
//!   keeps its partial identifiers on the receipt
//! - still incomplete after the grace period: orphan, operator alerted, and
//!   a `posting` decision is requeued as ambiguous
//!
//! Every step is a no-op when repeated on unchanged data.

use crate::actuator::match_chain;
use crate::alerts::Alerter;
use crate::error::RuntimeError;
use crate::pool::{JobClass, SessionPool};
use chrono::{DateTime, Utc};
use courier_adapters::{ActivityItem, ChannelAdapter, NotifyAdapter};
use courier_core::{
    to_time_delta, Alert, Clock, Decision, DecisionStatus, FingerprintConfig, Receipt,
    ReceiptStatus, ReconcileConfig,
};
use courier_storage::{DecisionStore, ReceiptLedger};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What one sweep changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Receipts examined
    pub examined: usize,
    /// Receipts marked reconciled
    pub reconciled: usize,
    /// Decisions moved to `posted` or given identifiers
    pub repaired: usize,
    /// Receipts whose identifiers were found in channel activity
    pub resolved: usize,
    /// Receipts marked orphan
    pub orphaned: usize,
    /// Receipts left for a later sweep
    pub pending: usize,
    /// Receipts that hit an error
    pub errors: usize,
}

impl SweepReport {
    pub fn changed(&self) -> bool {
        self.reconciled + self.repaired + self.resolved + self.orphaned > 0
    }
}

enum Disposition {
    Reconciled { repaired: bool, resolved: bool },
    Orphaned,
    /// Left for a later sweep, possibly with more identifiers than before
    Pending { resolved: bool },
}

struct LiveChannel<C> {
    channel: C,
    pool: Arc<SessionPool>,
}

pub struct Reconciler<C, K, N> {
    store: DecisionStore,
    ledger: ReceiptLedger,
    live: Option<LiveChannel<C>>,
    fingerprints: FingerprintConfig,
    config: ReconcileConfig,
    alerts: Alerter<N>,
    clock: K,
}

impl<C, K, N> Reconciler<C, K, N>
where
    C: ChannelAdapter,
    K: Clock,
    N: NotifyAdapter,
{
    /// A reconciler doing local repairs only
    pub fn new(
        store: DecisionStore,
        ledger: ReceiptLedger,
        fingerprints: FingerprintConfig,
        config: ReconcileConfig,
        alerts: Alerter<N>,
        clock: K,
    ) -> Self {
        Self {
            store,
            ledger,
            live: None,
            fingerprints,
            config,
            alerts,
            clock,
        }
    }

    /// Also search the channel's activity for unresolved receipts
    pub fn with_channel(mut self, channel: C, pool: Arc<SessionPool>) -> Self {
        self.live = Some(LiveChannel { channel, pool });
        self
    }

    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.utc_now();
        let receipts = self.ledger.unreconciled();
        let mut report = SweepReport {
            examined: receipts.len(),
            ..SweepReport::default()
        };
        // Read at most once per sweep, and only when needed
        let mut activity: Option<Vec<ActivityItem>> = None;

        for receipt in receipts {
            match self.reconcile_one(&receipt, now, &mut activity).await {
                Ok(Disposition::Reconciled { repaired, resolved }) => {
                    report.reconciled += 1;
                    report.repaired += usize::from(repaired);
                    report.resolved += usize::from(resolved);
                }
                Ok(Disposition::Orphaned) => report.orphaned += 1,
                Ok(Disposition::Pending { resolved }) => {
                    report.pending += 1;
                    report.resolved += usize::from(resolved);
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(
                        decision_id = %receipt.decision_id,
                        error = %e,
                        "receipt reconciliation failed"
                    );
                }
            }
        }

        if report.changed() || report.errors > 0 {
            tracing::info!(
                examined = report.examined,
                reconciled = report.reconciled,
                repaired = report.repaired,
                resolved = report.resolved,
                orphaned = report.orphaned,
                pending = report.pending,
                errors = report.errors,
                "reconciliation sweep"
            );
        }
        report
    }

    async fn reconcile_one(
        &self,
        receipt: &Receipt,
        now: DateTime<Utc>,
        activity: &mut Option<Vec<ActivityItem>>,
    ) -> Result<Disposition, RuntimeError> {
        let id = receipt.decision_id.as_str();
        let Some(decision) = self.store.get(id) else {
            return self
                .orphan_if_expired(receipt, None, now, "no decision row")
                .await;
        };

        if decision.status == DecisionStatus::Posted
            && decision.identifiers.len() >= decision.expected_parts()
        {
            if receipt.identifiers != decision.identifiers {
                self.ledger.resolve(id, decision.identifiers.clone())?;
            }
            self.mark(id, "decision already posted")?;
            return Ok(Disposition::Reconciled {
                repaired: false,
                resolved: false,
            });
        }

        if receipt.is_complete() {
            let repaired =
                self.repair(&decision, receipt.identifiers.clone(), receipt.recorded_at)?;
            self.mark(id, "posted from receipt")?;
            return Ok(Disposition::Reconciled {
                repaired,
                resolved: false,
            });
        }

        // Keep whichever chain is longer: recorded or found
        let mut identifiers = receipt.identifiers.clone();
        let mut resolved = false;
        if let Some(found) = self.search(&decision, receipt, activity).await {
            if found.len() > identifiers.len() && found.starts_with(&identifiers) {
                tracing::info!(
                    decision_id = id,
                    identifiers = ?found,
                    "found in channel activity"
                );
                self.ledger.resolve(id, found.clone())?;
                identifiers = found;
                resolved = true;
            }
        }

        if identifiers.len() >= decision.expected_parts() {
            let repaired = self.repair(&decision, identifiers, receipt.recorded_at)?;
            self.mark(id, "matched in channel activity")?;
            return Ok(Disposition::Reconciled { repaired, resolved });
        }

        if receipt.abandoned {
            // The attempt is over; whatever went live is now on the receipt
            self.mark(id, "partial thread")?;
            return Ok(Disposition::Reconciled {
                repaired: false,
                resolved,
            });
        }

        let reason = if identifiers.is_empty() {
            "no match in channel activity"
        } else {
            "thread incomplete in channel activity"
        };
        match self
            .orphan_if_expired(receipt, Some(&decision), now, reason)
            .await?
        {
            Disposition::Pending { .. } => Ok(Disposition::Pending { resolved }),
            other => Ok(other),
        }
    }

    /// Make the decision row carry `identifiers`
    fn repair(
        &self,
        decision: &Decision,
        identifiers: Vec<String>,
        posted_at: DateTime<Utc>,
    ) -> Result<bool, RuntimeError> {
        let changed = match decision.status {
            DecisionStatus::Posted => self.store.attach_identifiers(&decision.id, identifiers)?,
            _ => self
                .store
                .force_posted(&decision.id, identifiers, posted_at)?,
        };
        if changed {
            tracing::info!(
                decision_id = %decision.id,
                from = decision.status.as_str(),
                "decision repaired from evidence"
            );
        }
        Ok(changed)
    }

    fn mark(&self, decision_id: &str, note: &str) -> Result<(), RuntimeError> {
        self.ledger
            .mark(decision_id, ReceiptStatus::Reconciled, Some(note.to_string()))?;
        Ok(())
    }

    /// Past the grace period the receipt is orphaned and the operator
    /// alerted. A decision still `posting` is requeued as ambiguous, so it
    /// stops holding rate capacity and its next attempt checks activity
    /// before it submits.
    async fn orphan_if_expired(
        &self,
        receipt: &Receipt,
        decision: Option<&Decision>,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<Disposition, RuntimeError> {
        let age = now - receipt.recorded_at;
        if age <= to_time_delta(self.config.orphan_grace) {
            return Ok(Disposition::Pending { resolved: false });
        }
        self.ledger.mark(
            &receipt.decision_id,
            ReceiptStatus::Orphan,
            Some(reason.to_string()),
        )?;
        if decision.is_some_and(|d| d.status == DecisionStatus::Posting) {
            let message = format!("receipt orphaned: {reason}");
            if self
                .store
                .requeue_unconfirmed(&receipt.decision_id, &message, now)?
            {
                tracing::warn!(
                    decision_id = %receipt.decision_id,
                    "unconfirmed decision requeued"
                );
            }
        }
        self.alerts
            .raise(Alert::ReceiptOrphaned {
                decision_id: receipt.decision_id.clone(),
                category: receipt.category,
                age_secs: age.num_seconds().max(0) as u64,
            })
            .await;
        Ok(Disposition::Orphaned)
    }

    /// Match the decision against the channel's recent activity
    async fn search(
        &self,
        decision: &Decision,
        receipt: &Receipt,
        activity: &mut Option<Vec<ActivityItem>>,
    ) -> Option<Vec<String>> {
        if activity.is_none() {
            *activity = Some(self.read_activity().await.unwrap_or_default());
        }
        let items = activity.as_deref()?;
        let not_before = receipt.recorded_at - to_time_delta(self.config.match_skew);
        match_chain(items, &self.fingerprints, decision, not_before)
    }

    async fn read_activity(&self) -> Option<Vec<ActivityItem>> {
        let live = self.live.as_ref()?;
        let lease = match live.pool.acquire(JobClass::Reconcile).await {
            Ok(lease) => lease,
            Err(e) => {
                tracing::debug!(error = %e, "no session for reconciliation");
                return None;
            }
        };
        match live
            .channel
            .recent_activity(lease.session(), self.config.activity_limit)
            .await
        {
            Ok(items) => Some(items),
            Err(e) => {
                tracing::warn!(error = %e, "activity read failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
