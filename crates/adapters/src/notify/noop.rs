// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op notification adapter

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;
use courier_core::Notification;

/// Notification adapter that only logs
#[derive(Clone, Debug, Default)]
pub struct NoOpNotifyAdapter;

impl NoOpNotifyAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifyAdapter for NoOpNotifyAdapter {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            title = notification.title.as_str(),
            message = notification.message.as_str(),
            "notification suppressed"
        );
        Ok(())
    }
}
