// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn applescript_escapes_quotes() {
    let notification = Notification::new("Publish \"Failed\"", r"path C:\x");
    let script = build_script(&notification);
    assert_eq!(
        script,
        r#"display notification "path C:\\x" with title "Publish \"Failed\"""#
    );
}

#[test]
fn important_notification_plays_sound() {
    let notification =
        Notification::new("Orphaned Receipt", "check").with_urgency(NotifyUrgency::Important);
    assert!(build_script(&notification).ends_with(r#"sound name "default""#));
}

#[test]
fn notify_send_arguments_carry_title_and_urgency() {
    if cfg!(target_os = "macos") {
        return;
    }
    let adapter = DesktopNotifyAdapter::default();
    let notification =
        Notification::new("Publish Failed", "thread dec-1").with_urgency(NotifyUrgency::Important);
    let cmd = adapter.command(&notification);
    let args: Vec<_> = cmd
        .as_std()
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    assert_eq!(
        args,
        vec![
            "--app-name",
            "courier",
            "--urgency",
            "critical",
            "Publish Failed",
            "thread dec-1"
        ]
    );
}
