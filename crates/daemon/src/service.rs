// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request handling state shared by every connection

use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_core::{Clock, IdGen, NewDecision, SystemClock, UuidIdGen};
use courier_engine::{Mode, RateGovernor, SessionPool, StatusReport};
use courier_storage::{DecisionStore, ReceiptLedger, StoreError};
use thiserror::Error;
use tracing::info;

use crate::protocol::{DecisionSummary, Query, Response};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("daemon is read-only: {0}")]
    ReadOnly(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stores and reporting handles the socket server answers from
pub struct Service<K = SystemClock, I = UuidIdGen> {
    store: DecisionStore,
    ledger: ReceiptLedger,
    governor: RateGovernor,
    pool: Option<Arc<SessionPool>>,
    /// Set when configuration blocks publishing
    blocked: Option<String>,
    clock: K,
    ids: I,
    started: Instant,
}

impl<K: Clock, I: IdGen> Service<K, I> {
    pub fn new(
        store: DecisionStore,
        ledger: ReceiptLedger,
        governor: RateGovernor,
        clock: K,
        ids: I,
    ) -> Self {
        Self {
            store,
            ledger,
            governor,
            pool: None,
            blocked: None,
            clock,
            ids,
            started: Instant::now(),
        }
    }

    pub fn with_pool(mut self, pool: Arc<SessionPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn read_only(mut self, reason: impl Into<String>) -> Self {
        self.blocked = Some(reason.into());
        self
    }

    pub fn mode(&self) -> Mode {
        match self.blocked {
            Some(_) => Mode::ReadOnly,
            None => Mode::Active,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn status(&self) -> StatusReport {
        let report = StatusReport::collect(
            &self.store,
            &self.ledger,
            &self.governor,
            self.pool.as_ref().map(|p| p.utilization()),
            self.clock.utc_now(),
        );
        match &self.blocked {
            Some(reason) => report.read_only(reason.clone()),
            None => report,
        }
    }

    fn writable(&self) -> Result<(), ServiceError> {
        match &self.blocked {
            Some(reason) => Err(ServiceError::ReadOnly(reason.clone())),
            None => Ok(()),
        }
    }

    /// Persist a producer's decision; returns its id
    pub fn enqueue(&self, new: NewDecision) -> Result<String, ServiceError> {
        self.writable()?;
        let decision = new
            .into_decision(&self.ids, self.clock.utc_now())
            .map_err(StoreError::from)?;
        let id = decision.id.clone();
        self.store.enqueue(decision)?;
        Ok(id)
    }

    pub fn skip(&self, id: &str, reason: &str) -> Result<(), ServiceError> {
        self.writable()?;
        let decision = self.store.skip(id, reason)?;
        info!(decision_id = %decision.id, reason, "decision skipped by producer");
        Ok(())
    }

    pub fn query(&self, query: Query) -> Response {
        match query {
            Query::GetDecision { id } => Response::Decision {
                decision: self.store.find(&id).map(Box::new),
            },
            Query::ListDecisions { status } => Response::Decisions {
                decisions: self
                    .store
                    .snapshot()
                    .iter()
                    .filter(|d| status.is_none_or(|s| d.status == s))
                    .map(DecisionSummary::from)
                    .collect(),
            },
            Query::GetReceipt { id } => Response::Receipt {
                receipt: self.ledger.get(&id).map(Box::new),
            },
            Query::ListReceipts { status } => Response::Receipts {
                receipts: match status {
                    Some(status) => self.ledger.with_status(status),
                    None => self.ledger.all(),
                },
            },
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
