// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for the decision write-ahead log

use crate::decision::Decision;
use crate::error::ErrorKind;
use crate::traced::TracedOperation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operations that can be persisted to the decision WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Accept a new decision from the producer
    DecisionEnqueue { decision: Decision },

    /// Claim a queued decision for publishing
    DecisionClaim { id: String, at: DateTime<Utc> },

    /// Publishing succeeded
    DecisionComplete {
        id: String,
        identifiers: Vec<String>,
        at: DateTime<Utc>,
    },

    /// Attempt failed; back to the queue after `retry_after`
    DecisionRetry {
        id: String,
        error: String,
        kind: ErrorKind,
        /// Counts toward the rejection ceiling
        #[serde(default)]
        rejection: bool,
        retry_after: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// Attempt failed for good
    DecisionFail {
        id: String,
        error: String,
        kind: ErrorKind,
        at: DateTime<Utc>,
    },

    /// Give the claim back without counting an attempt
    DecisionRelease { id: String, reason: String },

    /// Producer withdrew the decision
    DecisionSkip { id: String, reason: String },

    /// Reconciliation found evidence the decision was published
    DecisionForcePosted {
        id: String,
        identifiers: Vec<String>,
        posted_at: DateTime<Utc>,
    },

    /// Late-resolved identifiers for a posted decision
    DecisionAttach { id: String, identifiers: Vec<String> },
}

impl Operation {
    /// The decision this operation applies to
    pub fn decision_id(&self) -> &str {
        match self {
            Operation::DecisionEnqueue { decision } => &decision.id,
            Operation::DecisionClaim { id, .. }
            | Operation::DecisionComplete { id, .. }
            | Operation::DecisionRetry { id, .. }
            | Operation::DecisionFail { id, .. }
            | Operation::DecisionRelease { id, .. }
            | Operation::DecisionSkip { id, .. }
            | Operation::DecisionForcePosted { id, .. }
            | Operation::DecisionAttach { id, .. } => id,
        }
    }
}

impl TracedOperation for Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::DecisionEnqueue { .. } => "enqueue",
            Operation::DecisionClaim { .. } => "claim",
            Operation::DecisionComplete { .. } => "complete",
            Operation::DecisionRetry { .. } => "retry",
            Operation::DecisionFail { .. } => "fail",
            Operation::DecisionRelease { .. } => "release",
            Operation::DecisionSkip { .. } => "skip",
            Operation::DecisionForcePosted { .. } => "force_posted",
            Operation::DecisionAttach { .. } => "attach",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("decision_id", self.decision_id().to_string())];
        match self {
            Operation::DecisionEnqueue { decision } => {
                fields.push(("category", decision.category.to_string()));
                fields.push(("scheduled_at", decision.scheduled_at.to_rfc3339()));
            }
            Operation::DecisionComplete { identifiers, .. }
            | Operation::DecisionForcePosted { identifiers, .. }
            | Operation::DecisionAttach { identifiers, .. } => {
                fields.push(("identifiers", identifiers.join(",")));
            }
            Operation::DecisionRetry {
                kind, retry_after, ..
            } => {
                fields.push(("kind", kind.to_string()));
                fields.push(("retry_after", retry_after.to_rfc3339()));
            }
            Operation::DecisionFail { kind, .. } => fields.push(("kind", kind.to_string())),
            Operation::DecisionRelease { reason, .. } | Operation::DecisionSkip { reason, .. } => {
                fields.push(("reason", reason.clone()));
            }
            Operation::DecisionClaim { .. } => {}
        }
        fields
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
