// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decision state machine
//!
//! A decision is one unit of intended publication: a single post, a
//! multi-part thread, or a reply to an existing item. Its lifecycle is
//!
//! ```text
//! queued ──claim──▶ posting ──complete──▶ posted
//!   ▲                 │  │
//!   └──retry/release──┘  └──fail──▶ failed
//! queued ──skip──▶ skipped
//! {queued, posting, failed} ──force──▶ posted   (reconciliation)
//! ```
//!
//! Transitions are pure: [`Decision::transition`] returns the next state or
//! an error and never mutates in place. The store persists the operation
//! before applying it.

use crate::clock::to_time_delta;
use crate::error::{ErrorKind, PublishError};
use crate::fingerprint::{Fingerprint, FingerprintConfig};
use crate::id::IdGen;
use crate::operation::Operation;
use crate::traced::TracedOperation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Kind of publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Single,
    Thread,
    Reply,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Single, Category::Thread, Category::Reply];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Single => "single",
            Category::Thread => "thread",
            Category::Reply => "reply",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The item a reply answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub item_id: String,
    pub author: String,
}

/// What gets published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    /// Body of a single post or reply
    Text(String),
    /// Ordered parts of a thread
    Thread(Vec<String>),
}

impl Content {
    /// All parts in publication order; a text body is one part
    pub fn parts(&self) -> &[String] {
        match self {
            Content::Text(text) => std::slice::from_ref(text),
            Content::Thread(parts) => parts,
        }
    }

    /// Text of the first (root) part
    pub fn root_text(&self) -> &str {
        self.parts().first().map(String::as_str).unwrap_or("")
    }
}

/// Lifecycle status of a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Queued,
    Posting,
    Posted,
    Failed,
    Skipped,
}

impl DecisionStatus {
    pub const ALL: [DecisionStatus; 5] = [
        DecisionStatus::Queued,
        DecisionStatus::Posting,
        DecisionStatus::Posted,
        DecisionStatus::Failed,
        DecisionStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Queued => "queued",
            DecisionStatus::Posting => "posting",
            DecisionStatus::Posted => "posted",
            DecisionStatus::Failed => "failed",
            DecisionStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DecisionStatus::Posted | DecisionStatus::Failed | DecisionStatus::Skipped
        )
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent failure recorded against a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Retry and backoff parameters applied when an attempt fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Submit rejections allowed before the decision fails for good
    pub max_rejections: u32,
    /// Base delay before a failed decision becomes eligible again
    pub backoff: Duration,
    /// Upper bound for exponential backoff
    pub backoff_max: Duration,
}

impl RetryPolicy {
    /// `backoff × 2^attempts`, capped at `backoff_max`
    pub fn exponential(&self, attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempts);
        self.backoff.saturating_mul(factor).min(self.backoff_max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rejections: 3,
            backoff: Duration::from_secs(60),
            backoff_max: Duration::from_secs(30 * 60),
        }
    }
}

/// A decision failed validation on enqueue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("decision id must not be empty")]
    EmptyId,
    #[error("decision {0} has empty content")]
    EmptyContent(String),
    #[error("reply decision {0} has no reply target")]
    MissingReplyTarget(String),
    #[error("{category} decision {id} carries {content} content")]
    ContentMismatch {
        id: String,
        category: Category,
        content: &'static str,
    },
}

/// An operation does not apply to the decision's current state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot apply {op} to decision {id} in status {status}")]
    Invalid {
        id: String,
        status: DecisionStatus,
        op: &'static str,
    },
    #[error("decision {id} already posted as {existing:?}")]
    Conflict { id: String, existing: Vec<String> },
}

/// A unit of intended publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub category: Category,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyTarget>,
    pub status: DecisionStatus,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub rejections: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl Decision {
    fn queued(
        id: impl Into<String>,
        category: Category,
        content: Content,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            content,
            reply_to: None,
            status: DecisionStatus::Queued,
            scheduled_at,
            posted_at: None,
            claimed_at: None,
            retry_after: None,
            identifiers: Vec::new(),
            attempts: 0,
            rejections: 0,
            last_error: None,
            skip_reason: None,
        }
    }

    /// A single post
    pub fn single(
        id: impl Into<String>,
        text: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self::queued(id, Category::Single, Content::Text(text.into()), scheduled_at)
    }

    /// A thread with ordered parts
    pub fn thread<S: Into<String>>(
        id: impl Into<String>,
        parts: impl IntoIterator<Item = S>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        let parts = parts.into_iter().map(Into::into).collect();
        Self::queued(id, Category::Thread, Content::Thread(parts), scheduled_at)
    }

    /// A reply to an existing item
    pub fn reply(
        id: impl Into<String>,
        text: impl Into<String>,
        target: ReplyTarget,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reply_to: Some(target),
            ..Self::queued(id, Category::Reply, Content::Text(text.into()), scheduled_at)
        }
    }

    /// Check that the content fits the category
    pub fn validate(&self) -> Result<(), DecisionError> {
        if self.id.trim().is_empty() {
            return Err(DecisionError::EmptyId);
        }
        let mismatch = |content| DecisionError::ContentMismatch {
            id: self.id.clone(),
            category: self.category,
            content,
        };
        match (&self.category, &self.content) {
            (Category::Thread, Content::Text(_)) => return Err(mismatch("text")),
            (Category::Single | Category::Reply, Content::Thread(_)) => {
                return Err(mismatch("thread"))
            }
            _ => {}
        }
        let parts = self.content.parts();
        if parts.is_empty() || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(DecisionError::EmptyContent(self.id.clone()));
        }
        if self.category == Category::Reply && self.reply_to.is_none() {
            return Err(DecisionError::MissingReplyTarget(self.id.clone()));
        }
        Ok(())
    }

    /// Number of posts a successful publish produces
    pub fn expected_parts(&self) -> usize {
        self.content.parts().len()
    }

    /// Eligible for dispatch: queued, scheduled time reached, backoff elapsed.
    ///
    /// Both comparisons are inclusive.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DecisionStatus::Queued
            && self.scheduled_at <= now
            && self.retry_after.is_none_or(|at| at <= now)
    }

    /// Normalized-content fingerprint of the root part
    pub fn fingerprint(&self, config: &FingerprintConfig) -> Fingerprint {
        config.fingerprint(self.content.root_text())
    }

    /// The last failure left it unknown whether the channel accepted a submission
    pub fn needs_dedup(&self) -> bool {
        self.last_error
            .as_ref()
            .is_some_and(|e| e.kind.is_ambiguous())
    }

    /// The operation that records a failed attempt.
    ///
    /// Admission denial releases the claim untouched. Rejections count toward
    /// `max_rejections`; unavailability backs off exponentially; exhaustion and
    /// ambiguous confirmation retry after the base backoff. Partial threads
    /// are terminal.
    pub fn failure_op(
        &self,
        error: &PublishError,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Operation {
        let id = self.id.clone();
        let kind = error.kind();
        let message = error.to_string();
        let retry = |rejection: bool, delay: Duration| Operation::DecisionRetry {
            id: id.clone(),
            error: message.clone(),
            kind,
            rejection,
            retry_after: now + to_time_delta(delay),
            at: now,
        };
        match kind {
            ErrorKind::AdmissionDenied => Operation::DecisionRelease {
                id: id.clone(),
                reason: message.clone(),
            },
            ErrorKind::SubmitRejected if self.rejections + 1 >= policy.max_rejections => {
                Operation::DecisionFail {
                    id: id.clone(),
                    error: message.clone(),
                    kind,
                    at: now,
                }
            }
            ErrorKind::SubmitRejected => retry(true, policy.backoff),
            ErrorKind::ChannelUnavailable => retry(false, policy.exponential(self.attempts)),
            ErrorKind::ResourceExhausted | ErrorKind::ConfirmationTimeout => {
                retry(false, policy.backoff)
            }
            ErrorKind::PartialThread => Operation::DecisionFail {
                id: id.clone(),
                error: message.clone(),
                kind,
                at: now,
            },
        }
    }

    /// Requeue an attempt whose outcome is unknown.
    ///
    /// The ambiguous error makes the next attempt search for an earlier
    /// post before it submits. Due again at `now`.
    pub fn unconfirmed_op(&self, reason: &str, now: DateTime<Utc>) -> Operation {
        Operation::DecisionRetry {
            id: self.id.clone(),
            error: reason.to_string(),
            kind: ErrorKind::ConfirmationTimeout,
            rejection: false,
            retry_after: now,
            at: now,
        }
    }

    /// Apply an operation, returning the next state
    pub fn transition(&self, op: &Operation) -> Result<Decision, TransitionError> {
        let invalid = || TransitionError::Invalid {
            id: self.id.clone(),
            status: self.status,
            op: op.name(),
        };
        match op {
            Operation::DecisionEnqueue { .. } => Err(invalid()),

            Operation::DecisionClaim { at, .. } => match self.status {
                DecisionStatus::Queued => Ok(Decision {
                    status: DecisionStatus::Posting,
                    claimed_at: Some(*at),
                    ..self.clone()
                }),
                _ => Err(invalid()),
            },

            Operation::DecisionComplete {
                identifiers, at, ..
            } => match self.status {
                DecisionStatus::Posting => Ok(Decision {
                    status: DecisionStatus::Posted,
                    posted_at: Some(*at),
                    claimed_at: None,
                    retry_after: None,
                    identifiers: identifiers.clone(),
                    ..self.clone()
                }),
                _ => Err(invalid()),
            },

            Operation::DecisionRetry {
                error,
                kind,
                rejection,
                retry_after,
                at,
                ..
            } => match self.status {
                DecisionStatus::Posting => Ok(Decision {
                    status: DecisionStatus::Queued,
                    claimed_at: None,
                    retry_after: Some(*retry_after),
                    attempts: self.attempts + 1,
                    rejections: self.rejections + u32::from(*rejection),
                    last_error: Some(LastError {
                        kind: *kind,
                        message: error.clone(),
                        at: *at,
                    }),
                    ..self.clone()
                }),
                _ => Err(invalid()),
            },

            Operation::DecisionFail {
                error, kind, at, ..
            } => match self.status {
                DecisionStatus::Posting => Ok(Decision {
                    status: DecisionStatus::Failed,
                    claimed_at: None,
                    attempts: self.attempts + 1,
                    rejections: self.rejections
                        + u32::from(*kind == ErrorKind::SubmitRejected),
                    last_error: Some(LastError {
                        kind: *kind,
                        message: error.clone(),
                        at: *at,
                    }),
                    ..self.clone()
                }),
                _ => Err(invalid()),
            },

            Operation::DecisionRelease { .. } => match self.status {
                DecisionStatus::Posting => Ok(Decision {
                    status: DecisionStatus::Queued,
                    claimed_at: None,
                    ..self.clone()
                }),
                _ => Err(invalid()),
            },

            Operation::DecisionSkip { reason, .. } => match self.status {
                DecisionStatus::Queued => Ok(Decision {
                    status: DecisionStatus::Skipped,
                    skip_reason: Some(reason.clone()),
                    ..self.clone()
                }),
                _ => Err(invalid()),
            },

            Operation::DecisionForcePosted {
                identifiers,
                posted_at,
                ..
            } => match self.status {
                DecisionStatus::Queued | DecisionStatus::Posting | DecisionStatus::Failed => {
                    Ok(Decision {
                        status: DecisionStatus::Posted,
                        posted_at: Some(*posted_at),
                        claimed_at: None,
                        retry_after: None,
                        identifiers: identifiers.clone(),
                        ..self.clone()
                    })
                }
                DecisionStatus::Posted => self.attach(identifiers),
                DecisionStatus::Skipped => Err(invalid()),
            },

            Operation::DecisionAttach { identifiers, .. } => match self.status {
                DecisionStatus::Posted => self.attach(identifiers),
                _ => Err(invalid()),
            },
        }
    }

    /// Identifiers on an already-posted decision.
    ///
    /// Fills an empty list, extends a list the new one starts with, and
    /// ignores a list that is a prefix of what is known. Anything else
    /// conflicts.
    fn attach(&self, identifiers: &[String]) -> Result<Decision, TransitionError> {
        if identifiers.starts_with(&self.identifiers) {
            Ok(Decision {
                identifiers: identifiers.to_vec(),
                ..self.clone()
            })
        } else if self.identifiers.starts_with(identifiers) {
            Ok(self.clone())
        } else {
            Err(TransitionError::Conflict {
                id: self.id.clone(),
                existing: self.identifiers.clone(),
            })
        }
    }
}

/// A decision as submitted by the producer, before an id and schedule are assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDecision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub category: Category,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewDecision {
    /// Fill in a generated id and an immediate schedule where absent, then validate
    pub fn into_decision(
        self,
        id_gen: &impl IdGen,
        now: DateTime<Utc>,
    ) -> Result<Decision, DecisionError> {
        let id = self.id.unwrap_or_else(|| id_gen.next());
        let decision = Decision {
            reply_to: self.reply_to,
            ..Decision::queued(
                id,
                self.category,
                self.content,
                self.scheduled_at.unwrap_or(now),
            )
        };
        decision.validate()?;
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
