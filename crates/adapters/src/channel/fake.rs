// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake channel adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ActivityItem, ChannelAdapter, ChannelError, SessionId, Submission};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::{Clock, FakeClock};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded channel call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    OpenSession,
    CloseSession { session: String },
    Submit { session: String, submission: Submission },
    ObserveNavigation { session: String },
    ConfirmationSurface { session: String },
    RecentActivity { session: String, limit: usize },
}

/// Scripted result of one submit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Posted and acknowledged
    Accept,
    /// Posted, but the acknowledgement never arrives
    AcceptSilently,
    /// Not posted
    Fail(ChannelError),
}

#[derive(Default)]
struct FakeState {
    sessions: HashSet<String>,
    next_session: u64,
    next_post: u64,
    script: VecDeque<SubmitOutcome>,
    /// Account activity, oldest first
    feed: Vec<ActivityItem>,
    /// Root id of the last accepted submission per session
    last_root: Vec<(String, String)>,
    navigation: bool,
    surface: bool,
    native_threads: bool,
    unavailable: bool,
    /// Activity reads that still hide recent posts
    feed_lag: u32,
    /// Posts made while `feed_lag` was non-zero are hidden until it drains
    hidden_from: Option<usize>,
    calls: Vec<ChannelCall>,
}

/// Fake channel adapter for testing
#[derive(Clone)]
pub struct FakeChannelAdapter {
    state: Arc<Mutex<FakeState>>,
    clock: Option<FakeClock>,
}

impl Default for FakeChannelAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChannelAdapter {
    /// Navigation and confirmation surface both resolve; native threads supported
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                navigation: true,
                surface: true,
                native_threads: true,
                ..FakeState::default()
            })),
            clock: None,
        }
    }

    /// Stamp posts with a fake clock instead of system time
    pub fn with_clock(mut self, clock: FakeClock) -> Self {
        self.clock = Some(clock);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn now(&self) -> DateTime<Utc> {
        match &self.clock {
            Some(clock) => clock.utc_now(),
            None => Utc::now(),
        }
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.lock().calls.clone()
    }

    /// Submissions in call order
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ChannelCall::Submit { submission, .. } => Some(submission.clone()),
                _ => None,
            })
            .collect()
    }

    /// Queue outcomes for upcoming submit calls; unscripted calls accept
    pub fn script_submits(&self, outcomes: impl IntoIterator<Item = SubmitOutcome>) {
        self.lock().script.extend(outcomes);
    }

    pub fn set_navigation(&self, enabled: bool) {
        self.lock().navigation = enabled;
    }

    pub fn set_surface(&self, enabled: bool) {
        self.lock().surface = enabled;
    }

    pub fn set_native_threads(&self, enabled: bool) {
        self.lock().native_threads = enabled;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Hide posts made from now on for the next `reads` activity reads
    pub fn set_feed_lag(&self, reads: u32) {
        let mut state = self.lock();
        state.feed_lag = reads;
        state.hidden_from = (reads > 0).then_some(state.feed.len());
    }

    /// Put an item into the account's activity directly
    pub fn add_activity(&self, item: ActivityItem) {
        self.lock().feed.push(item);
    }

    /// Everything posted so far, oldest first
    pub fn feed(&self) -> Vec<ActivityItem> {
        self.lock().feed.clone()
    }

    pub fn open_sessions(&self) -> Vec<String> {
        let mut sessions: Vec<_> = self.lock().sessions.iter().cloned().collect();
        sessions.sort();
        sessions
    }

    fn post(&self, state: &mut FakeState, text: &str, in_reply_to: Option<String>) -> String {
        state.next_post += 1;
        let id = format!("post-{}", state.next_post);
        state.feed.push(ActivityItem {
            id: id.clone(),
            text: text.to_string(),
            posted_at: self.now(),
            in_reply_to,
        });
        id
    }

    fn publish(&self, state: &mut FakeState, submission: &Submission) -> String {
        match submission {
            Submission::Post { text } => self.post(state, text, None),
            Submission::Reply { text, target_id } => {
                self.post(state, text, Some(target_id.clone()))
            }
            Submission::Thread { parts } => {
                let mut root = String::new();
                let mut parent: Option<String> = None;
                for part in parts {
                    let id = self.post(state, part, parent.clone());
                    if root.is_empty() {
                        root = id.clone();
                    }
                    parent = Some(id);
                }
                root
            }
        }
    }

    fn check(&self, state: &FakeState, session: &str) -> Result<(), ChannelError> {
        if state.unavailable {
            return Err(ChannelError::Unavailable("channel offline".to_string()));
        }
        if !state.sessions.contains(session) {
            return Err(ChannelError::SessionNotFound(session.to_string()));
        }
        Ok(())
    }

    fn last_root(state: &FakeState, session: &str) -> Option<String> {
        state
            .last_root
            .iter()
            .rev()
            .find(|(s, _)| s == session)
            .map(|(_, id)| id.clone())
    }
}

#[async_trait]
impl ChannelAdapter for FakeChannelAdapter {
    async fn open_session(&self) -> Result<SessionId, ChannelError> {
        let mut state = self.lock();
        state.calls.push(ChannelCall::OpenSession);
        if state.unavailable {
            return Err(ChannelError::Unavailable("channel offline".to_string()));
        }
        state.next_session += 1;
        let id = format!("session-{}", state.next_session);
        state.sessions.insert(id.clone());
        Ok(id)
    }

    async fn close_session(&self, session: &str) -> Result<(), ChannelError> {
        let mut state = self.lock();
        state.calls.push(ChannelCall::CloseSession {
            session: session.to_string(),
        });
        if state.sessions.remove(session) {
            Ok(())
        } else {
            Err(ChannelError::SessionNotFound(session.to_string()))
        }
    }

    async fn submit(&self, session: &str, submission: &Submission) -> Result<(), ChannelError> {
        let mut state = self.lock();
        state.calls.push(ChannelCall::Submit {
            session: session.to_string(),
            submission: submission.clone(),
        });
        self.check(&state, session)?;
        if matches!(submission, Submission::Thread { .. }) && !state.native_threads {
            return Err(ChannelError::Unsupported(
                "native threads not offered".to_string(),
            ));
        }
        match state.script.pop_front().unwrap_or(SubmitOutcome::Accept) {
            SubmitOutcome::Accept => {
                let root = self.publish(&mut state, submission);
                state.last_root.push((session.to_string(), root));
                Ok(())
            }
            SubmitOutcome::AcceptSilently => {
                let root = self.publish(&mut state, submission);
                state.last_root.push((session.to_string(), root));
                Err(ChannelError::Timeout("no acknowledgement".to_string()))
            }
            SubmitOutcome::Fail(e) => Err(e),
        }
    }

    async fn observe_navigation(
        &self,
        session: &str,
        wait: Duration,
    ) -> Result<Option<String>, ChannelError> {
        let found = {
            let mut state = self.lock();
            state.calls.push(ChannelCall::ObserveNavigation {
                session: session.to_string(),
            });
            self.check(&state, session)?;
            if state.navigation {
                Self::last_root(&state, session)
            } else {
                None
            }
        };
        if found.is_none() {
            tokio::time::sleep(wait).await;
        }
        Ok(found)
    }

    async fn confirmation_surface(
        &self,
        session: &str,
        wait: Duration,
    ) -> Result<Option<String>, ChannelError> {
        let found = {
            let mut state = self.lock();
            state.calls.push(ChannelCall::ConfirmationSurface {
                session: session.to_string(),
            });
            self.check(&state, session)?;
            if state.surface {
                Self::last_root(&state, session)
            } else {
                None
            }
        };
        if found.is_none() {
            tokio::time::sleep(wait).await;
        }
        Ok(found)
    }

    async fn recent_activity(
        &self,
        session: &str,
        limit: usize,
    ) -> Result<Vec<ActivityItem>, ChannelError> {
        let mut state = self.lock();
        state.calls.push(ChannelCall::RecentActivity {
            session: session.to_string(),
            limit,
        });
        self.check(&state, session)?;
        let hidden_from = state.hidden_from;
        let visible = match hidden_from {
            Some(cutoff) if state.feed_lag > 0 => {
                state.feed_lag -= 1;
                cutoff
            }
            _ => {
                state.hidden_from = None;
                state.feed.len()
            }
        };
        Ok(state.feed[..visible]
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
