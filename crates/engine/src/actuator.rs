// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publication actuator
//!
//! Carries one claimed decision to the channel: lease a session, check for
//! an earlier post when the last attempt ended ambiguously, submit, write
//! the receipt, resolve identifiers.
//!
//! The receipt is written right after the first accepted submission and
//! before anything else can fail, so a post that landed is never without
//! durable evidence. The decision row is updated by the caller from the
//! returned outcome.

use crate::pool::{JobClass, PoolError, SessionPool, SlotLease};
use crate::resolve::{find_in_activity, ActivityQuery, Resolver};
use chrono::{DateTime, Utc};
use courier_adapters::{ActivityItem, ChannelAdapter, ChannelError, Submission};
use courier_core::{
    Category, Clock, Content, Decision, FingerprintConfig, IdGen, PublishConfig, PublishError,
    Receipt, ReceiptStatus,
};
use courier_storage::ReceiptLedger;
use std::sync::Arc;

/// How a publish attempt ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Posted now, identifiers resolved (root first)
    Published { identifiers: Vec<String> },
    /// An earlier ambiguous attempt had already posted it
    Deduplicated { identifiers: Vec<String> },
    /// Accepted by the channel, identifier not yet known; left to reconciliation
    ConfirmedUnresolved,
}

impl PublishOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishOutcome::Published { .. } => "published",
            PublishOutcome::Deduplicated { .. } => "deduplicated",
            PublishOutcome::ConfirmedUnresolved => "confirmed_unresolved",
        }
    }
}

impl From<PoolError> for PublishError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Exhausted { class, budget } => PublishError::ResourceExhausted {
                job: class.as_str(),
                budget_ms: budget.as_millis() as u64,
            },
            PoolError::Closed => {
                PublishError::ChannelUnavailable("session pool closed".to_string())
            }
            PoolError::Open(e) => PublishError::ChannelUnavailable(e.to_string()),
        }
    }
}

/// Map a failed submit to the publish taxonomy
pub(crate) fn submit_error(err: ChannelError) -> PublishError {
    match err {
        ChannelError::Rejected(msg) | ChannelError::Unsupported(msg) => {
            PublishError::SubmitRejected(msg)
        }
        ChannelError::Timeout(msg) => PublishError::ConfirmationTimeout(msg),
        other @ (ChannelError::Unavailable(_)
        | ChannelError::SessionNotFound(_)
        | ChannelError::Protocol(_)) => PublishError::ChannelUnavailable(other.to_string()),
    }
}

/// Drives claimed decisions to the channel
#[derive(Clone)]
pub struct Actuator<C, K, I> {
    pub(crate) channel: C,
    pub(crate) pool: Arc<SessionPool>,
    pub(crate) ledger: ReceiptLedger,
    pub(crate) resolver: Resolver,
    pub(crate) config: PublishConfig,
    pub(crate) clock: K,
    pub(crate) attempt_ids: I,
}

impl<C, K, I> Actuator<C, K, I>
where
    C: ChannelAdapter,
    K: Clock,
    I: IdGen,
{
    pub fn new(
        channel: C,
        pool: Arc<SessionPool>,
        ledger: ReceiptLedger,
        resolver: Resolver,
        config: PublishConfig,
        clock: K,
        attempt_ids: I,
    ) -> Self {
        Self {
            channel,
            pool,
            ledger,
            resolver,
            config,
            clock,
            attempt_ids,
        }
    }

    /// Publish a claimed decision
    pub async fn publish(&self, decision: &Decision) -> Result<PublishOutcome, PublishError> {
        let lease = self
            .pool
            .acquire(JobClass::for_category(decision.category))
            .await?;

        let mut earlier = Vec::new();
        if decision.needs_dedup() {
            if let Some(identifiers) = self.find_earlier_post(&lease, decision).await? {
                self.record_receipt(decision, identifiers.clone())?;
                if identifiers.len() >= decision.expected_parts() {
                    tracing::info!(
                        identifiers = ?identifiers,
                        "earlier attempt found in activity, not resubmitting"
                    );
                    return Ok(PublishOutcome::Deduplicated { identifiers });
                }
                tracing::info!(
                    found = identifiers.len(),
                    expected = decision.expected_parts(),
                    "earlier attempt posted part of the thread, resuming"
                );
                earlier = identifiers;
            }
        }

        match (&decision.category, &decision.content) {
            (Category::Thread, Content::Thread(parts)) => {
                self.publish_thread(&lease, decision, parts, earlier).await
            }
            _ => {
                let submission = single_submission(decision)?;
                self.publish_one(&lease, decision, &submission).await
            }
        }
    }

    /// Submit one post or reply and resolve its identifier
    async fn publish_one(
        &self,
        lease: &SlotLease,
        decision: &Decision,
        submission: &Submission,
    ) -> Result<PublishOutcome, PublishError> {
        let not_before = self.clock.utc_now();
        self.submit(lease, submission).await.map_err(submit_error)?;
        self.record_receipt(decision, Vec::new())?;

        let fingerprint = decision.fingerprint(self.resolver.fingerprints());
        let parent = match submission {
            Submission::Reply { target_id, .. } => Some(target_id.as_str()),
            _ => None,
        };
        let query = ActivityQuery {
            fingerprint: &fingerprint,
            not_before,
            exclude: &[],
            in_reply_to: parent,
        };
        match self
            .resolver
            .resolve(&self.channel, lease.session(), query)
            .await
        {
            Some(resolution) => {
                let identifiers = vec![resolution.id];
                self.append_receipt(&decision.id, identifiers.clone());
                Ok(PublishOutcome::Published { identifiers })
            }
            None => Ok(PublishOutcome::ConfirmedUnresolved),
        }
    }

    /// One bounded submit call
    pub(crate) async fn submit(
        &self,
        lease: &SlotLease,
        submission: &Submission,
    ) -> Result<(), ChannelError> {
        let result = match tokio::time::timeout(
            self.config.submit_timeout,
            self.channel.submit(lease.session(), submission),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout(format!(
                "no answer within {}ms",
                self.config.submit_timeout.as_millis()
            ))),
        };
        match &result {
            Ok(()) => tracing::info!(kind = submission.kind(), "submission accepted"),
            Err(e) => tracing::warn!(kind = submission.kind(), error = %e, "submit failed"),
        }
        result
    }

    /// Make the accepted submission durable.
    ///
    /// A ledger failure leaves the post without evidence, so the attempt is
    /// reported as ambiguous and the next one looks for the post first.
    pub(crate) fn record_receipt(
        &self,
        decision: &Decision,
        identifiers: Vec<String>,
    ) -> Result<(), PublishError> {
        let mut receipt = Receipt::new(
            decision.id.clone(),
            self.attempt_ids.next(),
            decision.category,
            decision.expected_parts(),
            decision.fingerprint(self.resolver.fingerprints()),
            self.clock.utc_now(),
        );
        receipt.identifiers = identifiers.clone();
        let attempt_id = receipt.attempt_id.clone();
        let recorded_at = receipt.recorded_at;
        match self.ledger.record(receipt) {
            Ok(true) => Ok(()),
            Ok(false) => {
                // An earlier attempt already left evidence
                tracing::info!(decision_id = %decision.id, "receipt already recorded");
                self.reopen_receipt(&decision.id, &attempt_id, recorded_at);
                if !identifiers.is_empty() {
                    self.append_receipt(&decision.id, identifiers);
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(decision_id = %decision.id, error = %e, "receipt write failed");
                Err(PublishError::ConfirmationTimeout(format!(
                    "accepted but receipt not recorded: {e}"
                )))
            }
        }
    }

    /// A receipt closed as orphan belongs to an earlier attempt; this one
    /// needs it reconciled again
    fn reopen_receipt(&self, decision_id: &str, attempt_id: &str, at: DateTime<Utc>) {
        let orphaned = self
            .ledger
            .get(decision_id)
            .is_some_and(|r| r.status == ReceiptStatus::Orphan);
        if !orphaned {
            return;
        }
        match self.ledger.reopen(decision_id, attempt_id, at) {
            Ok(_) => tracing::info!(decision_id, attempt_id, "orphaned receipt reopened"),
            Err(e) => tracing::warn!(decision_id, error = %e, "receipt reopen failed"),
        }
    }

    /// Add identifiers to the receipt; the decision row carries them regardless
    pub(crate) fn append_receipt(&self, decision_id: &str, identifiers: Vec<String>) {
        if let Err(e) = self.ledger.append(decision_id, identifiers) {
            tracing::warn!(decision_id, error = %e, "receipt append failed");
        }
    }

    /// Look for a post left by an earlier ambiguous attempt
    async fn find_earlier_post(
        &self,
        lease: &SlotLease,
        decision: &Decision,
    ) -> Result<Option<Vec<String>>, PublishError> {
        let items = self
            .channel
            .recent_activity(lease.session(), self.resolver.activity_limit())
            .await
            .map_err(|e| PublishError::ChannelUnavailable(e.to_string()))?;
        Ok(match_chain(
            &items,
            self.resolver.fingerprints(),
            decision,
            decision.scheduled_at,
        ))
    }
}

/// Find every part of `decision` in `items`, root first.
///
/// Returns `None` unless the root matches. For threads the chain stops at
/// the first part that cannot be found.
pub(crate) fn match_chain(
    items: &[ActivityItem],
    config: &FingerprintConfig,
    decision: &Decision,
    not_before: DateTime<Utc>,
) -> Option<Vec<String>> {
    let parts = decision.content.parts();
    let root_parent = decision.reply_to.as_ref().map(|t| t.item_id.as_str());
    let mut identifiers: Vec<String> = Vec::with_capacity(parts.len());
    for (index, part) in parts.iter().enumerate() {
        let fingerprint = config.fingerprint(part);
        let parent = match identifiers.last() {
            Some(prev) => Some(prev.as_str()),
            None => root_parent,
        };
        let query = ActivityQuery {
            fingerprint: &fingerprint,
            not_before,
            exclude: &identifiers,
            in_reply_to: parent,
        };
        match find_in_activity(items, config, &query) {
            Some(item) => identifiers.push(item.id.clone()),
            None if index == 0 => return None,
            None => break,
        }
    }
    Some(identifiers)
}

fn single_submission(decision: &Decision) -> Result<Submission, PublishError> {
    let text = decision.content.root_text().to_string();
    match decision.category {
        Category::Reply => {
            let target = decision.reply_to.as_ref().ok_or_else(|| {
                PublishError::SubmitRejected(format!("{} has no reply target", decision.id))
            })?;
            Ok(Submission::Reply {
                text,
                target_id: target.item_id.clone(),
            })
        }
        _ => Ok(Submission::Post { text }),
    }
}

#[cfg(test)]
#[path = "actuator_tests.rs"]
mod tests;
