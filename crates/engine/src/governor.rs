// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate governor
//!
//! Per-category hourly and daily ceilings over rolling windows. A window
//! ending at `now` counts posted decisions whose `posted_at` falls in
//! `[now - span, now]`, plus in-flight (`posting`) decisions whose
//! `claimed_at` falls in the same range.
//!
//! Admission is pure over a state snapshot. Within one dispatch pass the
//! planner reserves capacity as it admits, so a pass never admits more
//! than the remaining headroom.

use chrono::{DateTime, TimeDelta, Utc};
use courier_core::{Category, DecisionStatus, PublishError, RateConfig};
use courier_storage::MaterializedState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Hour,
    Day,
}

impl Window {
    pub const ALL: [Window; 2] = [Window::Hour, Window::Day];

    pub fn span(&self) -> TimeDelta {
        match self {
            Window::Hour => TimeDelta::hours(1),
            Window::Day => TimeDelta::days(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Hour => "hour",
            Window::Day => "day",
        }
    }
}

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Denied {
        window: Window,
        count: u32,
        ceiling: u32,
    },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    /// The denial as a publish error, `None` when admitted
    pub fn denial(&self, category: Category) -> Option<PublishError> {
        match *self {
            Admission::Admitted => None,
            Admission::Denied {
                window,
                count,
                ceiling,
            } => Some(PublishError::AdmissionDenied {
                category,
                window: window.as_str(),
                count,
                ceiling,
            }),
        }
    }
}

/// Usage of one category in both windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowUsage {
    pub hour: u32,
    pub day: u32,
}

impl WindowUsage {
    fn get(&self, window: Window) -> u32 {
        match window {
            Window::Hour => self.hour,
            Window::Day => self.day,
        }
    }
}

/// Outcome of planning one dispatch pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchPlan {
    /// Decision ids to claim, in dispatch order
    pub admitted: Vec<String>,
    /// Due decisions held back, with the reason
    pub deferred: Vec<(String, Admission)>,
}

#[derive(Debug, Clone)]
pub struct RateGovernor {
    limits: RateConfig,
}

impl RateGovernor {
    pub fn new(limits: RateConfig) -> Self {
        Self { limits }
    }

    /// Count toward each window for `category` as of `now`
    pub fn window_usage(
        &self,
        state: &MaterializedState,
        category: Category,
        now: DateTime<Utc>,
    ) -> WindowUsage {
        let mut usage = WindowUsage::default();
        for decision in state.decisions.values().filter(|d| d.category == category) {
            // In-flight claims may land at any moment; count them from the claim
            let at = match decision.status {
                DecisionStatus::Posted => decision.posted_at,
                DecisionStatus::Posting => decision.claimed_at,
                _ => None,
            };
            let Some(at) = at else {
                continue;
            };
            if at > now {
                continue;
            }
            if at >= now - Window::Hour.span() {
                usage.hour += 1;
            }
            if at >= now - Window::Day.span() {
                usage.day += 1;
            }
        }
        usage
    }

    fn check(&self, category: Category, usage: WindowUsage) -> Admission {
        for window in Window::ALL {
            if let Some(ceiling) = self.ceiling(category, window) {
                let count = usage.get(window);
                if count >= ceiling {
                    return Admission::Denied {
                        window,
                        count,
                        ceiling,
                    };
                }
            }
        }
        Admission::Admitted
    }

    /// Whether one more decision of `category` may start now
    pub fn admit(
        &self,
        state: &MaterializedState,
        category: Category,
        now: DateTime<Utc>,
    ) -> Admission {
        self.check(category, self.window_usage(state, category, now))
    }

    /// Pick up to `limit` due decisions to claim, in (scheduled_at, id) order.
    ///
    /// Each admission reserves one unit in both windows of its category.
    pub fn plan(&self, state: &MaterializedState, now: DateTime<Utc>, limit: usize) -> DispatchPlan {
        let mut usage: HashMap<Category, WindowUsage> = HashMap::new();
        let mut plan = DispatchPlan::default();
        for decision in state.due(now) {
            let current = usage
                .entry(decision.category)
                .or_insert_with(|| self.window_usage(state, decision.category, now));
            let admission = self.check(decision.category, *current);
            if admission.is_admitted() && plan.admitted.len() < limit {
                current.hour += 1;
                current.day += 1;
                plan.admitted.push(decision.id.clone());
            } else if !admission.is_admitted() {
                plan.deferred.push((decision.id.clone(), admission));
            }
        }
        if !plan.deferred.is_empty() {
            tracing::debug!(
                admitted = plan.admitted.len(),
                deferred = plan.deferred.len(),
                "rate ceilings deferred decisions"
            );
        }
        plan
    }

    /// Ceiling for a category and window, `None` when unlimited
    pub fn ceiling(&self, category: Category, window: Window) -> Option<u32> {
        let limits = self.limits.limits(category);
        match window {
            Window::Hour => limits.per_hour,
            Window::Day => limits.per_day,
        }
    }
}

#[cfg(test)]
#[path = "governor_tests.rs"]
mod tests;
