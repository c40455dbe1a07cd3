// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stale claim janitor
//!
//! A `posting` row whose claim outlived `stale_after` belonged to an
//! attempt that died (crash, restart, lost task). Without a receipt
//! nothing was accepted, so the row goes back to `queued`. With a
//! receipt it is left to reconciliation.

use crate::error::RuntimeError;
use courier_core::{Clock, JanitorConfig};
use courier_storage::{DecisionStore, ReceiptLedger};
use std::time::Duration;

#[derive(Clone)]
pub struct Janitor<K> {
    store: DecisionStore,
    ledger: ReceiptLedger,
    stale_after: Duration,
    clock: K,
}

impl<K: Clock> Janitor<K> {
    pub fn new(
        store: DecisionStore,
        ledger: ReceiptLedger,
        config: &JanitorConfig,
        clock: K,
    ) -> Self {
        Self {
            store,
            ledger,
            stale_after: config.stale_after,
            clock,
        }
    }

    /// Release stale claims; returns the released decision ids
    pub fn run(&self) -> Result<Vec<String>, RuntimeError> {
        let released = self.store.release_stale(
            self.clock.utc_now(),
            self.stale_after,
            |id| self.ledger.has_receipt(id),
        )?;
        for id in &released {
            tracing::warn!(decision_id = %id, "stale claim released");
        }
        Ok(released)
    }

    /// Requeue every claim without a receipt after its attempt was aborted.
    ///
    /// The abort may have cut a submit short, so each row is marked
    /// ambiguous and its next attempt checks activity first. Only safe once
    /// no attempt is running.
    pub fn requeue_aborted(&self) -> Result<Vec<String>, RuntimeError> {
        Ok(self.store.requeue_all_unconfirmed(
            "attempt aborted at shutdown",
            self.clock.utc_now(),
            |id| self.ledger.has_receipt(id),
        )?)
    }
}

#[cfg(test)]
#[path = "janitor_tests.rs"]
mod tests;
