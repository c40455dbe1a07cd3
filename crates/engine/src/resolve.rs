// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier resolution
//!
//! After the channel accepts a submission the assigned identifier has to be
//! recovered from one of three sources, raced against each other:
//!
//! - the session navigating to the new item
//! - a transient confirmation surface carrying a link to it
//! - the account's recent activity, matched by content fingerprint
//!
//! The first source to answer wins and the other futures are dropped. No
//! submission is in flight at this point, so dropping them is harmless.

use chrono::{DateTime, Utc};
use courier_adapters::{ActivityItem, ChannelAdapter};
use courier_core::{Fingerprint, FingerprintConfig, ResolveConfig};
use std::time::Duration;

/// Where a resolved identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveSource {
    Navigation,
    Surface,
    Activity,
}

impl ResolveSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveSource::Navigation => "navigation",
            ResolveSource::Surface => "surface",
            ResolveSource::Activity => "activity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub id: String,
    pub source: ResolveSource,
}

/// What to look for in the activity record
#[derive(Debug, Clone, Copy)]
pub struct ActivityQuery<'a> {
    pub fingerprint: &'a Fingerprint,
    /// Items posted before this are ignored
    pub not_before: DateTime<Utc>,
    /// Identifiers already accounted for
    pub exclude: &'a [String],
    /// Required parent, for thread parts and replies
    pub in_reply_to: Option<&'a str>,
}

/// The oldest activity item matching `query`.
///
/// `items` is newest first, as the channel returns it.
pub fn find_in_activity<'i>(
    items: &'i [ActivityItem],
    config: &FingerprintConfig,
    query: &ActivityQuery<'_>,
) -> Option<&'i ActivityItem> {
    items.iter().rev().find(|item| {
        item.posted_at >= query.not_before
            && !query.exclude.contains(&item.id)
            && query
                .in_reply_to
                .is_none_or(|parent| item.in_reply_to.as_deref() == Some(parent))
            && config.matches(query.fingerprint, &item.text)
    })
}

/// Races the resolution strategies under a hard timeout
#[derive(Debug, Clone)]
pub struct Resolver {
    config: ResolveConfig,
    fingerprints: FingerprintConfig,
}

impl Resolver {
    pub fn new(config: ResolveConfig, fingerprints: FingerprintConfig) -> Self {
        Self {
            config,
            fingerprints,
        }
    }

    pub fn fingerprints(&self) -> &FingerprintConfig {
        &self.fingerprints
    }

    pub fn activity_limit(&self) -> usize {
        self.config.activity_limit
    }

    /// Resolve the identifier of the item just submitted on `session`.
    ///
    /// `None` means every strategy gave up before the hard timeout; the
    /// submission may still have landed.
    pub async fn resolve<C: ChannelAdapter>(
        &self,
        channel: &C,
        session: &str,
        query: ActivityQuery<'_>,
    ) -> Option<Resolution> {
        let navigation = async {
            match channel
                .observe_navigation(session, self.config.navigation_timeout)
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    tracing::debug!(error = %e, "navigation watch failed");
                    None
                }
            }
        };
        let surface = async {
            match channel
                .confirmation_surface(session, self.config.surface_timeout)
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    tracing::debug!(error = %e, "confirmation surface failed");
                    None
                }
            }
        };
        let polling = self.poll_activity(channel, session, query);
        tokio::pin!(navigation, surface, polling);

        let race = async {
            let (mut navigation_done, mut surface_done, mut polling_done) = (false, false, false);
            loop {
                let (found, source) = tokio::select! {
                    found = &mut navigation, if !navigation_done => {
                        navigation_done = true;
                        (found, ResolveSource::Navigation)
                    }
                    found = &mut surface, if !surface_done => {
                        surface_done = true;
                        (found, ResolveSource::Surface)
                    }
                    found = &mut polling, if !polling_done => {
                        polling_done = true;
                        (found, ResolveSource::Activity)
                    }
                    else => return None,
                };
                if let Some(id) = found {
                    return Some(Resolution { id, source });
                }
            }
        };

        match tokio::time::timeout(self.config.hard_timeout, race).await {
            Ok(Some(resolution)) => {
                tracing::info!(
                    id = %resolution.id,
                    source = resolution.source.as_str(),
                    "identifier resolved"
                );
                Some(resolution)
            }
            Ok(None) => {
                tracing::warn!("all resolution strategies exhausted");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.hard_timeout.as_millis() as u64,
                    "identifier resolution timed out"
                );
                None
            }
        }
    }

    /// Activity polling alone, for items nothing navigates to
    pub async fn poll<C: ChannelAdapter>(
        &self,
        channel: &C,
        session: &str,
        query: ActivityQuery<'_>,
    ) -> Option<String> {
        tokio::time::timeout(
            self.config.hard_timeout,
            self.poll_activity(channel, session, query),
        )
        .await
        .ok()
        .flatten()
    }

    /// Poll recent activity with growing delays
    async fn poll_activity<C: ChannelAdapter>(
        &self,
        channel: &C,
        session: &str,
        query: ActivityQuery<'_>,
    ) -> Option<String> {
        let mut delay = self.config.poll_initial_delay;
        for attempt in 1..=self.config.poll_attempts {
            tokio::time::sleep(delay).await;
            match channel
                .recent_activity(session, self.config.activity_limit)
                .await
            {
                Ok(items) => {
                    if let Some(item) = find_in_activity(&items, &self.fingerprints, &query) {
                        return Some(item.id.clone());
                    }
                    tracing::debug!(attempt, "no activity match yet");
                }
                Err(e) => tracing::debug!(attempt, error = %e, "activity poll failed"),
            }
            delay = next_delay(delay, self.config.poll_backoff_factor);
        }
        None
    }
}

fn next_delay(delay: Duration, factor: u32) -> Duration {
    delay.saturating_mul(factor)
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
