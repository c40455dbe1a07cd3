// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized decision state from WAL replay

use chrono::{DateTime, Utc};
use courier_core::{Category, Decision, DecisionStatus, Operation};
use std::collections::HashMap;

/// Materialized state built from decision WAL operations
#[derive(Debug, Default)]
pub struct MaterializedState {
    pub decisions: HashMap<String, Decision>,
}

impl MaterializedState {
    /// Get a decision by exact id
    pub fn get_decision(&self, id: &str) -> Option<&Decision> {
        self.decisions.get(id)
    }

    /// Find a decision by id or unique prefix (like git commit hashes)
    ///
    /// Operator lookups only; internal callers hold full ids.
    pub fn find_decision(&self, id: &str) -> Option<&Decision> {
        if let Some(decision) = self.decisions.get(id) {
            return Some(decision);
        }

        // Only return if exactly one match (unambiguous)
        let mut matches = self.decisions.iter().filter(|(k, _)| k.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some((_, decision)), None) => Some(decision),
            _ => None,
        }
    }

    /// Apply an operation to update the state
    ///
    /// Operations that do not apply to the current state are logged and
    /// ignored; the store validates before it appends, so this only
    /// happens for logs written by an older build.
    pub fn apply(&mut self, op: &Operation) {
        if let Operation::DecisionEnqueue { decision } = op {
            self.decisions
                .entry(decision.id.clone())
                .or_insert_with(|| decision.clone());
            return;
        }

        let id = op.decision_id();
        let Some(current) = self.decisions.get(id) else {
            tracing::warn!(decision_id = id, "operation for unknown decision");
            return;
        };
        match current.transition(op) {
            Ok(next) => {
                self.decisions.insert(id.to_string(), next);
            }
            Err(e) => tracing::warn!(decision_id = id, error = %e, "skipping operation"),
        }
    }

    /// Decisions eligible for dispatch, ordered by scheduled time then id
    pub fn due(&self, now: DateTime<Utc>) -> Vec<&Decision> {
        let mut due: Vec<_> = self.decisions.values().filter(|d| d.is_due(now)).collect();
        due.sort_by(|a, b| (a.scheduled_at, &a.id).cmp(&(b.scheduled_at, &b.id)));
        due
    }

    pub fn with_status(&self, status: DecisionStatus) -> impl Iterator<Item = &Decision> {
        self.decisions.values().filter(move |d| d.status == status)
    }

    pub fn count_by_status(&self) -> HashMap<DecisionStatus, usize> {
        let mut counts = HashMap::new();
        for decision in self.decisions.values() {
            *counts.entry(decision.status).or_insert(0) += 1;
        }
        counts
    }

    /// Count of decisions in a category and status
    pub fn count(&self, category: Category, status: DecisionStatus) -> usize {
        self.decisions
            .values()
            .filter(|d| d.category == category && d.status == status)
            .count()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
