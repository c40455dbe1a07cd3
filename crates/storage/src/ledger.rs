// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Receipt ledger
//!
//! Append-only evidence of accepted submissions, kept in its own WAL so a
//! receipt can be made durable before the decision row is touched.

use crate::wal::{Wal, WalError};
use chrono::{DateTime, Utc};
use courier_core::{Receipt, ReceiptOp, ReceiptStatus, TracedOperation};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("receipt not found: {0}")]
    NotFound(String),
}

struct Inner {
    wal: Wal<ReceiptOp>,
    receipts: HashMap<String, Receipt>,
}

impl Inner {
    /// Persist and apply; an operation that changes nothing is not written
    fn commit(&mut self, op: ReceiptOp) -> Result<bool, LedgerError> {
        let id = op.decision_id().to_string();
        let current = self
            .receipts
            .get(&id)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        let next = current.apply(&op);
        if &next == current {
            return Ok(false);
        }
        self.wal.append(&op)?;
        tracing::debug!(op = op.name(), fields = %op.describe(), "receipt wal append");
        self.receipts.insert(id, next);
        Ok(true)
    }
}

fn replay(ops: &[ReceiptOp]) -> HashMap<String, Receipt> {
    let mut receipts: HashMap<String, Receipt> = HashMap::new();
    for op in ops {
        match op {
            ReceiptOp::ReceiptRecord { receipt } => {
                receipts
                    .entry(receipt.decision_id.clone())
                    .or_insert_with(|| receipt.clone());
            }
            other => match receipts.get_mut(other.decision_id()) {
                Some(receipt) => *receipt = receipt.apply(other),
                None => tracing::warn!(
                    decision_id = other.decision_id(),
                    "receipt operation before record"
                ),
            },
        }
    }
    receipts
}

/// Durable receipts keyed by decision id
#[derive(Clone)]
pub struct ReceiptLedger {
    inner: Arc<Mutex<Inner>>,
}

impl ReceiptLedger {
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let ops = Wal::<ReceiptOp>::replay(path)?;
        let receipts = replay(&ops);
        let wal = Wal::open(path)?;
        tracing::info!(
            path = %path.display(),
            operations = ops.len(),
            receipts = receipts.len(),
            "receipt ledger opened"
        );
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner { wal, receipts })),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write a receipt for a newly accepted submission.
    ///
    /// Returns `false` without writing if the decision already has one.
    pub fn record(&self, receipt: Receipt) -> Result<bool, LedgerError> {
        let mut inner = self.lock();
        if inner.receipts.contains_key(&receipt.decision_id) {
            return Ok(false);
        }
        let op = ReceiptOp::ReceiptRecord { receipt };
        inner.wal.append(&op)?;
        tracing::info!(fields = %op.describe(), "receipt recorded");
        if let ReceiptOp::ReceiptRecord { receipt } = op {
            inner.receipts.insert(receipt.decision_id.clone(), receipt);
        }
        Ok(true)
    }

    /// Add identifiers resolved for further parts
    pub fn append(&self, decision_id: &str, identifiers: Vec<String>) -> Result<bool, LedgerError> {
        self.lock().commit(ReceiptOp::ReceiptAppend {
            decision_id: decision_id.to_string(),
            identifiers,
        })
    }

    /// Replace identifiers with ones found after the fact
    pub fn resolve(
        &self,
        decision_id: &str,
        identifiers: Vec<String>,
    ) -> Result<bool, LedgerError> {
        self.lock().commit(ReceiptOp::ReceiptResolve {
            decision_id: decision_id.to_string(),
            identifiers,
        })
    }

    /// The attempt stopped partway
    pub fn abandon(&self, decision_id: &str, reason: &str) -> Result<bool, LedgerError> {
        self.lock().commit(ReceiptOp::ReceiptAbandon {
            decision_id: decision_id.to_string(),
            reason: reason.to_string(),
        })
    }

    /// Record a reconciliation outcome
    pub fn mark(
        &self,
        decision_id: &str,
        status: ReceiptStatus,
        note: Option<String>,
    ) -> Result<bool, LedgerError> {
        self.lock().commit(ReceiptOp::ReceiptMark {
            decision_id: decision_id.to_string(),
            status,
            note,
        })
    }

    /// Hand a closed receipt to a new attempt so it is reconciled again
    pub fn reopen(
        &self,
        decision_id: &str,
        attempt_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        self.lock().commit(ReceiptOp::ReceiptReopen {
            decision_id: decision_id.to_string(),
            attempt_id: attempt_id.to_string(),
            at,
        })
    }

    pub fn get(&self, decision_id: &str) -> Option<Receipt> {
        self.lock().receipts.get(decision_id).cloned()
    }

    pub fn has_receipt(&self, decision_id: &str) -> bool {
        self.lock().receipts.contains_key(decision_id)
    }

    /// Receipts awaiting reconciliation, oldest first
    pub fn unreconciled(&self) -> Vec<Receipt> {
        self.with_status(ReceiptStatus::Unreconciled)
    }

    pub fn with_status(&self, status: ReceiptStatus) -> Vec<Receipt> {
        self.filtered(|r| r.status == status)
    }

    /// Every receipt, oldest first
    pub fn all(&self) -> Vec<Receipt> {
        self.filtered(|_| true)
    }

    fn filtered(&self, keep: impl Fn(&Receipt) -> bool) -> Vec<Receipt> {
        let mut receipts: Vec<_> = self
            .lock()
            .receipts
            .values()
            .filter(|r| keep(r))
            .cloned()
            .collect();
        receipts.sort_by(|a, b| {
            (a.recorded_at, &a.decision_id).cmp(&(b.recorded_at, &b.decision_id))
        });
        receipts
    }

    pub fn counts(&self) -> HashMap<ReceiptStatus, usize> {
        let mut counts = HashMap::new();
        for receipt in self.lock().receipts.values() {
            *counts.entry(receipt.status).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
