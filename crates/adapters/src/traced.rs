// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::channel::{ActivityItem, ChannelAdapter, ChannelError, SessionId, Submission};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Wrapper that adds tracing to any ChannelAdapter
#[derive(Clone)]
pub struct TracedChannelAdapter<C> {
    inner: C,
}

impl<C> TracedChannelAdapter<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[async_trait]
impl<C: ChannelAdapter> ChannelAdapter for TracedChannelAdapter<C> {
    async fn open_session(&self) -> Result<SessionId, ChannelError> {
        let span = tracing::info_span!("channel.open_session");
        async {
            let start = Instant::now();
            let result = self.inner.open_session().await;
            match &result {
                Ok(session) => tracing::info!(
                    session = session.as_str(),
                    elapsed_ms = elapsed_ms(start),
                    "session opened"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "open failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn close_session(&self, session: &str) -> Result<(), ChannelError> {
        let span = tracing::info_span!("channel.close_session", session);
        async {
            let result = self.inner.close_session(session).await;
            // Closing a session the driver already dropped is routine
            match &result {
                Ok(()) => tracing::info!("session closed"),
                Err(e) => tracing::warn!(error = %e, "close failed (may be expected)"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn submit(&self, session: &str, submission: &Submission) -> Result<(), ChannelError> {
        let span = tracing::info_span!("channel.submit", session, kind = submission.kind());
        async {
            tracing::info!(text_len = submission.root_text().len(), "submitting");
            let start = Instant::now();
            let result = self.inner.submit(session, submission).await;
            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed_ms(start), "submission accepted"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed_ms(start),
                    error = %e,
                    "submit failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn observe_navigation(
        &self,
        session: &str,
        wait: Duration,
    ) -> Result<Option<String>, ChannelError> {
        let span = tracing::debug_span!("channel.navigation", session);
        async {
            let start = Instant::now();
            let result = self.inner.observe_navigation(session, wait).await;
            tracing::debug!(
                found = ?result.as_ref().ok().and_then(|id| id.as_deref()),
                elapsed_ms = elapsed_ms(start),
                "observed"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn confirmation_surface(
        &self,
        session: &str,
        wait: Duration,
    ) -> Result<Option<String>, ChannelError> {
        let span = tracing::debug_span!("channel.surface", session);
        async {
            let start = Instant::now();
            let result = self.inner.confirmation_surface(session, wait).await;
            tracing::debug!(
                found = ?result.as_ref().ok().and_then(|id| id.as_deref()),
                elapsed_ms = elapsed_ms(start),
                "read surface"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn recent_activity(
        &self,
        session: &str,
        limit: usize,
    ) -> Result<Vec<ActivityItem>, ChannelError> {
        let result = self.inner.recent_activity(session, limit).await;
        tracing::trace!(
            session,
            limit,
            count = result.as_ref().map(|v| v.len()).ok(),
            "read activity"
        );
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
