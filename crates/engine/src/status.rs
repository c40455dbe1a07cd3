// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status report served to operators and producers

use crate::governor::{RateGovernor, Window};
use crate::pool::PoolUtilization;
use chrono::{DateTime, Utc};
use courier_core::{Category, DecisionStatus, ReceiptStatus};
use courier_storage::{DecisionStore, ReceiptLedger};
use serde::{Deserialize, Serialize};

/// Whether the daemon is publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Active,
    /// Configuration blocks publishing; only queries are served
    ReadOnly,
}

/// Rolling count against its ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCount {
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceiling: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStatus {
    pub category: Category,
    pub queued: usize,
    pub posting: usize,
    pub hour: WindowCount,
    pub day: WindowCount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptCounts {
    pub unreconciled: usize,
    pub reconciled: usize,
    pub orphan: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub mode: Mode,
    /// Why publishing is blocked, in read-only mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub categories: Vec<CategoryStatus>,
    pub receipts: ReceiptCounts,
    /// Absent when no sessions were opened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolUtilization>,
    pub generated_at: DateTime<Utc>,
}

impl StatusReport {
    pub fn collect(
        store: &DecisionStore,
        ledger: &ReceiptLedger,
        governor: &RateGovernor,
        pool: Option<PoolUtilization>,
        now: DateTime<Utc>,
    ) -> Self {
        let categories = store.with_state(|state| {
            Category::ALL
                .iter()
                .map(|&category| {
                    let usage = governor.window_usage(state, category, now);
                    CategoryStatus {
                        category,
                        queued: state.count(category, DecisionStatus::Queued),
                        posting: state.count(category, DecisionStatus::Posting),
                        hour: WindowCount {
                            count: usage.hour,
                            ceiling: governor.ceiling(category, Window::Hour),
                        },
                        day: WindowCount {
                            count: usage.day,
                            ceiling: governor.ceiling(category, Window::Day),
                        },
                    }
                })
                .collect()
        });

        let counts = ledger.counts();
        let count = |status: ReceiptStatus| counts.get(&status).copied().unwrap_or(0);
        let receipts = ReceiptCounts {
            unreconciled: count(ReceiptStatus::Unreconciled),
            reconciled: count(ReceiptStatus::Reconciled),
            orphan: count(ReceiptStatus::Orphan),
        };

        Self {
            mode: Mode::Active,
            reason: None,
            categories,
            receipts,
            pool,
            generated_at: now,
        }
    }

    /// Mark the report as coming from a daemon that cannot publish
    pub fn read_only(mut self, reason: impl Into<String>) -> Self {
        self.mode = Mode::ReadOnly;
        self.reason = Some(reason.into());
        self
    }

    pub fn category(&self, category: Category) -> Option<&CategoryStatus> {
        self.categories.iter().find(|c| c.category == category)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
