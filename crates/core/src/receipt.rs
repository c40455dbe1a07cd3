// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publish receipts
//!
//! A receipt is written the moment the channel accepts a submission, before
//! the decision row is updated. It is the durable evidence reconciliation
//! uses to repair decisions whose status never caught up with reality.
//! Receipts are updated in place and never deleted.

use crate::decision::Category;
use crate::fingerprint::Fingerprint;
use crate::traced::TracedOperation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reconciliation status of a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Unreconciled,
    Reconciled,
    Orphan,
}

impl ReceiptStatus {
    pub const ALL: [ReceiptStatus; 3] = [
        ReceiptStatus::Unreconciled,
        ReceiptStatus::Reconciled,
        ReceiptStatus::Orphan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Unreconciled => "unreconciled",
            ReceiptStatus::Reconciled => "reconciled",
            ReceiptStatus::Orphan => "orphan",
        }
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record that a submission was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub decision_id: String,
    /// Distinguishes attempts in logs
    pub attempt_id: String,
    pub category: Category,
    /// Resolved post identifiers, root first; empty until resolved
    #[serde(default)]
    pub identifiers: Vec<String>,
    pub expected_parts: usize,
    pub fingerprint: Fingerprint,
    pub recorded_at: DateTime<Utc>,
    pub status: ReceiptStatus,
    /// The attempt stopped before all parts were posted
    #[serde(default)]
    pub abandoned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Receipt {
    pub fn new(
        decision_id: impl Into<String>,
        attempt_id: impl Into<String>,
        category: Category,
        expected_parts: usize,
        fingerprint: Fingerprint,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            decision_id: decision_id.into(),
            attempt_id: attempt_id.into(),
            category,
            identifiers: Vec::new(),
            expected_parts,
            fingerprint,
            recorded_at,
            status: ReceiptStatus::Unreconciled,
            abandoned: false,
            note: None,
        }
    }

    /// Abandoned with fewer identifiers than parts
    pub fn is_partial(&self) -> bool {
        self.abandoned && self.identifiers.len() < self.expected_parts
    }

    pub fn is_resolved(&self) -> bool {
        !self.identifiers.is_empty()
    }

    /// One identifier for every part
    pub fn is_complete(&self) -> bool {
        self.identifiers.len() >= self.expected_parts.max(1)
    }

    /// Apply a ledger operation, returning the next state
    pub fn apply(&self, op: &ReceiptOp) -> Receipt {
        match op {
            ReceiptOp::ReceiptRecord { receipt } => receipt.clone(),
            ReceiptOp::ReceiptAppend { identifiers, .. } => {
                let mut next = self.clone();
                for id in identifiers {
                    if !next.identifiers.contains(id) {
                        next.identifiers.push(id.clone());
                    }
                }
                next
            }
            ReceiptOp::ReceiptResolve { identifiers, .. } => Receipt {
                identifiers: identifiers.clone(),
                ..self.clone()
            },
            ReceiptOp::ReceiptAbandon { reason, .. } => Receipt {
                abandoned: true,
                note: Some(reason.clone()),
                ..self.clone()
            },
            ReceiptOp::ReceiptMark { status, note, .. } => Receipt {
                status: *status,
                note: note.clone().or_else(|| self.note.clone()),
                ..self.clone()
            },
            ReceiptOp::ReceiptReopen { attempt_id, at, .. } => Receipt {
                attempt_id: attempt_id.clone(),
                recorded_at: *at,
                status: ReceiptStatus::Unreconciled,
                abandoned: false,
                note: Some("reopened by a later attempt".to_string()),
                ..self.clone()
            },
        }
    }
}

/// Operations that can be persisted to the receipt WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptOp {
    /// First accepted submission of an attempt
    ReceiptRecord { receipt: Receipt },

    /// Identifiers resolved for further parts
    ReceiptAppend {
        decision_id: String,
        identifiers: Vec<String>,
    },

    /// Identifiers found after the fact, replacing what was recorded
    ReceiptResolve {
        decision_id: String,
        identifiers: Vec<String>,
    },

    /// The attempt stopped partway
    ReceiptAbandon { decision_id: String, reason: String },

    /// Reconciliation outcome
    ReceiptMark {
        decision_id: String,
        status: ReceiptStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },

    /// A later attempt took over a closed receipt
    ReceiptReopen {
        decision_id: String,
        attempt_id: String,
        at: DateTime<Utc>,
    },
}

impl ReceiptOp {
    pub fn decision_id(&self) -> &str {
        match self {
            ReceiptOp::ReceiptRecord { receipt } => &receipt.decision_id,
            ReceiptOp::ReceiptAppend { decision_id, .. }
            | ReceiptOp::ReceiptResolve { decision_id, .. }
            | ReceiptOp::ReceiptAbandon { decision_id, .. }
            | ReceiptOp::ReceiptMark { decision_id, .. }
            | ReceiptOp::ReceiptReopen { decision_id, .. } => decision_id,
        }
    }
}

impl TracedOperation for ReceiptOp {
    fn name(&self) -> &'static str {
        match self {
            ReceiptOp::ReceiptRecord { .. } => "receipt_record",
            ReceiptOp::ReceiptAppend { .. } => "receipt_append",
            ReceiptOp::ReceiptResolve { .. } => "receipt_resolve",
            ReceiptOp::ReceiptAbandon { .. } => "receipt_abandon",
            ReceiptOp::ReceiptMark { .. } => "receipt_mark",
            ReceiptOp::ReceiptReopen { .. } => "receipt_reopen",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("decision_id", self.decision_id().to_string())];
        match self {
            ReceiptOp::ReceiptRecord { receipt } => {
                fields.push(("attempt_id", receipt.attempt_id.clone()));
                fields.push(("expected_parts", receipt.expected_parts.to_string()));
            }
            ReceiptOp::ReceiptAppend { identifiers, .. }
            | ReceiptOp::ReceiptResolve { identifiers, .. } => {
                fields.push(("identifiers", identifiers.join(",")));
            }
            ReceiptOp::ReceiptAbandon { reason, .. } => fields.push(("reason", reason.clone())),
            ReceiptOp::ReceiptMark { status, .. } => fields.push(("status", status.to_string())),
            ReceiptOp::ReceiptReopen { attempt_id, .. } => {
                fields.push(("attempt_id", attempt_id.clone()))
            }
        }
        fields
    }
}

#[cfg(test)]
#[path = "receipt_tests.rs"]
mod tests;
