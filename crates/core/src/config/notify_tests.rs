// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::alert::NotifyUrgency;
use crate::decision::Category;

fn orphaned() -> Alert {
    Alert::ReceiptOrphaned {
        decision_id: "dec-1".into(),
        category: Category::Single,
        age_secs: 7200,
    }
}

fn failed() -> Alert {
    Alert::DecisionFailed {
        decision_id: "dec-2".into(),
        category: Category::Thread,
        reason: "thread stopped after 1 of 3 parts".into(),
    }
}

#[test]
fn default_config_notifies_on_orphan_and_failure() {
    let config = NotifyConfig::default();
    assert!(config.should_notify(&orphaned()));
    assert!(config.should_notify(&failed()));
}

#[test]
fn disabled_rule_suppresses_notification() {
    let config = NotifyConfig {
        failed: false,
        ..NotifyConfig::default()
    };
    assert!(config.to_notification(&failed()).is_none());
    assert!(config.to_notification(&orphaned()).is_some());
}

#[test]
fn orphan_notification_reports_age_in_minutes() {
    let notification = NotifyConfig::default()
        .to_notification(&orphaned())
        .unwrap();
    assert_eq!(notification.title, "Orphaned Receipt");
    assert!(notification.message.contains("unresolved after 120m"));
    assert_eq!(notification.urgency, NotifyUrgency::Important);
}

#[test]
fn failure_notification_names_decision() {
    let notification = Notification::from(&failed());
    assert_eq!(
        notification.message,
        "thread dec-2: thread stopped after 1 of 3 parts"
    );
}
