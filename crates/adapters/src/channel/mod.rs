// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publication channel adapters
//!
//! The channel is driven through browser-style automation sessions. A
//! submission being accepted says nothing about the identifier the channel
//! assigned; that is recovered afterwards by watching navigation, reading a
//! confirmation surface, or scanning the account's recent activity.

mod driver;

pub use driver::DriverChannelAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ChannelCall, FakeChannelAdapter, SubmitOutcome};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Handle to an open automation session
pub type SessionId = String;

/// Errors from channel operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel refused the submission
    #[error("rejected: {0}")]
    Rejected(String),
    /// The channel or driver could not be reached
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// No answer in time; the submission may or may not have landed
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    /// The channel does not offer this kind of submission
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// One submission to the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submission {
    /// A standalone post
    Post { text: String },
    /// A reply to an existing item
    Reply { text: String, target_id: String },
    /// A multi-part thread composed natively in one go
    Thread { parts: Vec<String> },
}

impl Submission {
    pub fn kind(&self) -> &'static str {
        match self {
            Submission::Post { .. } => "post",
            Submission::Reply { .. } => "reply",
            Submission::Thread { .. } => "thread",
        }
    }

    /// Text of the first post this submission creates
    pub fn root_text(&self) -> &str {
        match self {
            Submission::Post { text } | Submission::Reply { text, .. } => text,
            Submission::Thread { parts } => parts.first().map(String::as_str).unwrap_or(""),
        }
    }
}

/// An item in the account's activity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: String,
    pub text: String,
    pub posted_at: DateTime<Utc>,
    /// Item this one replies to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

/// Adapter for driving the publication channel
#[async_trait]
pub trait ChannelAdapter: Clone + Send + Sync + 'static {
    /// Open an automation session
    async fn open_session(&self) -> Result<SessionId, ChannelError>;

    /// Close an automation session
    async fn close_session(&self, session: &str) -> Result<(), ChannelError>;

    /// Submit content; `Ok` means the channel accepted it
    async fn submit(&self, session: &str, submission: &Submission) -> Result<(), ChannelError>;

    /// Wait up to `wait` for the session to navigate to the new item, returning its id
    async fn observe_navigation(
        &self,
        session: &str,
        wait: Duration,
    ) -> Result<Option<String>, ChannelError>;

    /// Wait up to `wait` for a confirmation element carrying the new item's id
    async fn confirmation_surface(
        &self,
        session: &str,
        wait: Duration,
    ) -> Result<Option<String>, ChannelError>;

    /// The account's most recent items, newest first
    async fn recent_activity(
        &self,
        session: &str,
        limit: usize,
    ) -> Result<Vec<ActivityItem>, ChannelError>;
}
