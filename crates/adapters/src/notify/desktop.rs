// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desktop notifications via the platform notifier
//!
//! macOS uses `osascript`, everything else `notify-send`.

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;
use courier_core::{Notification, NotifyUrgency};
use tokio::process::Command;

/// Desktop notification adapter
#[derive(Clone, Debug)]
pub struct DesktopNotifyAdapter {
    app_name: String,
}

impl Default for DesktopNotifyAdapter {
    fn default() -> Self {
        Self::new("courier")
    }
}

impl DesktopNotifyAdapter {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    fn command(&self, notification: &Notification) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(build_script(notification));
            cmd
        } else {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name")
                .arg(&self.app_name)
                .arg("--urgency")
                .arg(match notification.urgency {
                    NotifyUrgency::Normal => "normal",
                    NotifyUrgency::Important => "critical",
                })
                .arg(&notification.title)
                .arg(&notification.message);
            cmd
        }
    }
}

fn build_script(notification: &Notification) -> String {
    let mut script = format!(
        r#"display notification "{}" with title "{}""#,
        escape_applescript(&notification.message),
        escape_applescript(&notification.title),
    );
    if notification.urgency == NotifyUrgency::Important {
        script.push_str(r#" sound name "default""#);
    }
    script
}

/// Escape special characters for AppleScript strings
fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl NotifyAdapter for DesktopNotifyAdapter {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let output = self
            .command(notification)
            .output()
            .await
            .map_err(|e| NotifyError::Failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::Failed(stderr.trim().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "desktop_tests.rs"]
mod tests;
