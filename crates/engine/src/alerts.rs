// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator alerts: always logged, delivered as notifications when configured

use courier_adapters::NotifyAdapter;
use courier_core::{Alert, NotifyConfig};

#[derive(Clone)]
pub struct Alerter<N> {
    notify: N,
    config: NotifyConfig,
}

impl<N: NotifyAdapter> Alerter<N> {
    pub fn new(notify: N, config: NotifyConfig) -> Self {
        Self { notify, config }
    }

    pub async fn raise(&self, alert: Alert) {
        tracing::warn!(
            alert = alert.name(),
            decision_id = alert.decision_id(),
            "operator alert"
        );
        let Some(notification) = self.config.to_notification(&alert) else {
            return;
        };
        if let Err(e) = self.notify.notify(&notification).await {
            tracing::warn!(alert = alert.name(), error = %e, "notification failed");
        }
    }
}
