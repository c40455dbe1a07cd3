// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator alerts and the notifications they render to

use crate::decision::Category;
use serde::{Deserialize, Serialize};

/// Something an operator should look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// A receipt could not be tied to a post within the grace period
    ReceiptOrphaned {
        decision_id: String,
        category: Category,
        age_secs: u64,
    },
    /// A decision reached terminal `failed`
    DecisionFailed {
        decision_id: String,
        category: Category,
        reason: String,
    },
}

impl Alert {
    pub fn name(&self) -> &'static str {
        match self {
            Alert::ReceiptOrphaned { .. } => "receipt:orphaned",
            Alert::DecisionFailed { .. } => "decision:failed",
        }
    }

    pub fn decision_id(&self) -> &str {
        match self {
            Alert::ReceiptOrphaned { decision_id, .. }
            | Alert::DecisionFailed { decision_id, .. } => decision_id,
        }
    }
}

/// Notification urgency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyUrgency {
    /// No sound
    Normal,
    /// Default sound
    Important,
}

/// A notification to display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub urgency: NotifyUrgency,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            urgency: NotifyUrgency::Normal,
        }
    }

    pub fn with_urgency(mut self, urgency: NotifyUrgency) -> Self {
        self.urgency = urgency;
        self
    }
}

impl From<&Alert> for Notification {
    fn from(alert: &Alert) -> Self {
        match alert {
            Alert::ReceiptOrphaned {
                decision_id,
                category,
                age_secs,
            } => Notification::new(
                "Orphaned Receipt",
                format!(
                    "{category} {decision_id} unresolved after {}m; check the channel by hand",
                    age_secs / 60
                ),
            )
            .with_urgency(NotifyUrgency::Important),
            Alert::DecisionFailed {
                decision_id,
                category,
                reason,
            } => Notification::new(
                "Publish Failed",
                format!("{category} {decision_id}: {reason}"),
            )
            .with_urgency(NotifyUrgency::Important),
        }
    }
}
