// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification configuration
//!
//! Decides which operator alerts turn into desktop notifications.

use crate::alert::{Alert, Notification};
use serde::{Deserialize, Serialize};

/// Configuration for which alerts trigger notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Deliver notifications to the desktop at all
    pub desktop: bool,
    /// Notify when a receipt becomes an orphan
    pub orphaned: bool,
    /// Notify when a decision fails for good
    pub failed: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            desktop: true,
            orphaned: true,
            failed: true,
        }
    }
}

impl NotifyConfig {
    /// Check if an alert should trigger a notification
    pub fn should_notify(&self, alert: &Alert) -> bool {
        match alert {
            Alert::ReceiptOrphaned { .. } => self.orphaned,
            Alert::DecisionFailed { .. } => self.failed,
        }
    }

    /// Convert an alert to a notification if configured
    pub fn to_notification(&self, alert: &Alert) -> Option<Notification> {
        self.should_notify(alert).then(|| Notification::from(alert))
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
