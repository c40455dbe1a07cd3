// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thread composition
//!
//! Native multi-part composition is tried first. When the channel does not
//! offer it, or keeps refusing it, the thread is posted as a reply chain:
//! part one as a post, every further part as a reply to the previous
//! part's identifier. Each chained part is retried on its own.
//!
//! An ambiguous native submit does not fall back, since the thread may
//! already be live. A thread whose root, or any native part, is accepted
//! but not found in activity is left unresolved for reconciliation. A
//! chain that stops after posting some parts abandons its receipt, with
//! the identifiers it has, and ends the decision as a partial thread.

use crate::actuator::{submit_error, Actuator, PublishOutcome};
use crate::pool::SlotLease;
use crate::resolve::ActivityQuery;
use chrono::{DateTime, Utc};
use courier_adapters::{ChannelAdapter, ChannelError, Submission};
use courier_core::{Clock, Decision, IdGen, PublishError};

impl<C, K, I> Actuator<C, K, I>
where
    C: ChannelAdapter,
    K: Clock,
    I: IdGen,
{
    /// Publish a thread; `earlier` holds parts a previous attempt already posted
    pub(crate) async fn publish_thread(
        &self,
        lease: &SlotLease,
        decision: &Decision,
        parts: &[String],
        earlier: Vec<String>,
    ) -> Result<PublishOutcome, PublishError> {
        if earlier.is_empty() {
            if let Some(outcome) = self.compose_native(lease, decision, parts).await? {
                return Ok(outcome);
            }
        }
        self.compose_chain(lease, decision, parts, earlier).await
    }

    /// Native composition; `Ok(None)` means fall back to chaining
    async fn compose_native(
        &self,
        lease: &SlotLease,
        decision: &Decision,
        parts: &[String],
    ) -> Result<Option<PublishOutcome>, PublishError> {
        let submission = Submission::Thread {
            parts: parts.to_vec(),
        };
        for attempt in 1..=self.config.native_thread_attempts {
            let not_before = self.clock.utc_now();
            match self.submit(lease, &submission).await {
                Ok(()) => {
                    self.record_receipt(decision, Vec::new())?;
                    return Ok(Some(
                        self.resolve_native(lease, decision, parts, not_before)
                            .await,
                    ));
                }
                Err(ChannelError::Unsupported(reason)) => {
                    tracing::info!(reason, "native threads unsupported, chaining replies");
                    return Ok(None);
                }
                Err(e @ ChannelError::Timeout(_)) => return Err(submit_error(e)),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max = self.config.native_thread_attempts,
                        error = %e,
                        "native thread attempt failed"
                    );
                }
            }
        }
        Ok(None)
    }

    /// Resolve the root, then find the other parts in activity
    async fn resolve_native(
        &self,
        lease: &SlotLease,
        decision: &Decision,
        parts: &[String],
        not_before: DateTime<Utc>,
    ) -> PublishOutcome {
        let fingerprints = self.resolver.fingerprints();
        let Some((first, rest)) = parts.split_first() else {
            return PublishOutcome::ConfirmedUnresolved;
        };
        let root_fingerprint = fingerprints.fingerprint(first);
        let query = ActivityQuery {
            fingerprint: &root_fingerprint,
            not_before,
            exclude: &[],
            in_reply_to: None,
        };
        let Some(root) = self
            .resolver
            .resolve(&self.channel, lease.session(), query)
            .await
        else {
            return PublishOutcome::ConfirmedUnresolved;
        };

        let mut identifiers = vec![root.id];
        for part in rest {
            let fingerprint = fingerprints.fingerprint(part);
            let parent = identifiers.last().cloned();
            let query = ActivityQuery {
                fingerprint: &fingerprint,
                not_before,
                exclude: &identifiers,
                in_reply_to: parent.as_deref(),
            };
            let found = self
                .resolver
                .poll(&self.channel, lease.session(), query)
                .await;
            match found {
                Some(id) => identifiers.push(id),
                None => break,
            }
        }
        self.append_receipt(&decision.id, identifiers.clone());
        if identifiers.len() < parts.len() {
            // The parts were all accepted; reconciliation finds the rest
            tracing::warn!(
                decision_id = %decision.id,
                resolved = identifiers.len(),
                expected = parts.len(),
                "thread parts unresolved"
            );
            return PublishOutcome::ConfirmedUnresolved;
        }
        PublishOutcome::Published { identifiers }
    }

    /// Post parts one by one as a reply chain, starting after `identifiers`
    async fn compose_chain(
        &self,
        lease: &SlotLease,
        decision: &Decision,
        parts: &[String],
        mut identifiers: Vec<String>,
    ) -> Result<PublishOutcome, PublishError> {
        let expected = parts.len();
        for (index, part) in parts.iter().enumerate().skip(identifiers.len()) {
            let submission = match identifiers.last() {
                None => Submission::Post { text: part.clone() },
                Some(prev) => Submission::Reply {
                    text: part.clone(),
                    target_id: prev.clone(),
                },
            };

            let mut last_error = None;
            let mut accepted = None;
            for attempt in 1..=self.config.part_attempts {
                let not_before = self.clock.utc_now();
                match self.submit(lease, &submission).await {
                    Ok(()) => {
                        accepted = Some(not_before);
                        break;
                    }
                    Err(e @ ChannelError::Timeout(_)) => {
                        last_error = Some(submit_error(e));
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            part = index + 1,
                            attempt,
                            max = self.config.part_attempts,
                            error = %e,
                            "thread part failed"
                        );
                        last_error = Some(submit_error(e));
                        if attempt < self.config.part_attempts {
                            tokio::time::sleep(self.config.part_retry_delay).await;
                        }
                    }
                }
            }

            let Some(not_before) = accepted else {
                let error = last_error.unwrap_or_else(|| {
                    PublishError::ChannelUnavailable("no part attempt made".to_string())
                });
                return Err(self.stop_chain(decision, &identifiers, expected, error));
            };

            if identifiers.is_empty() {
                self.record_receipt(decision, Vec::new())?;
            }
            let fingerprint = self.resolver.fingerprints().fingerprint(part);
            let query = ActivityQuery {
                fingerprint: &fingerprint,
                not_before,
                exclude: &identifiers,
                in_reply_to: identifiers.last().map(String::as_str),
            };
            let found = self
                .resolver
                .resolve(&self.channel, lease.session(), query)
                .await;
            match found {
                Some(resolution) => {
                    self.append_receipt(&decision.id, vec![resolution.id.clone()]);
                    identifiers.push(resolution.id);
                }
                None if identifiers.is_empty() => {
                    // The root is live somewhere; reconciliation finds it
                    tracing::warn!(
                        decision_id = %decision.id,
                        expected,
                        "thread root accepted but unresolved"
                    );
                    return Ok(PublishOutcome::ConfirmedUnresolved);
                }
                None => {
                    // Cannot reply to a part whose identifier is unknown
                    let error = PublishError::PartialThread {
                        posted: identifiers.len(),
                        expected,
                        reason: format!("part {} accepted but unresolved", index + 1),
                    };
                    self.abandon(decision, &error);
                    return Err(error);
                }
            }
        }
        Ok(PublishOutcome::Published { identifiers })
    }

    /// The chain cannot continue. Without progress the error stands as is;
    /// after progress the thread is partial.
    fn stop_chain(
        &self,
        decision: &Decision,
        identifiers: &[String],
        expected: usize,
        error: PublishError,
    ) -> PublishError {
        if identifiers.is_empty() {
            return error;
        }
        let partial = PublishError::PartialThread {
            posted: identifiers.len(),
            expected,
            reason: error.to_string(),
        };
        self.abandon(decision, &partial);
        partial
    }

    fn abandon(&self, decision: &Decision, error: &PublishError) {
        tracing::error!(decision_id = %decision.id, error = %error, "thread abandoned");
        if let Err(e) = self.ledger.abandon(&decision.id, &error.to_string()) {
            tracing::warn!(decision_id = %decision.id, error = %e, "receipt abandon failed");
        }
    }
}

#[cfg(test)]
#[path = "thread_tests.rs"]
mod tests;
