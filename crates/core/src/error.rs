// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publish error taxonomy
//!
//! Every failed publish attempt resolves to one of these errors. The
//! disposition (retry, backoff, terminal) is decided by
//! [`crate::Decision::failure_op`], never by the caller.

use crate::decision::Category;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminant of a [`PublishError`], persisted with the decision's last error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AdmissionDenied,
    ResourceExhausted,
    SubmitRejected,
    ConfirmationTimeout,
    ChannelUnavailable,
    PartialThread,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AdmissionDenied => "admission_denied",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::SubmitRejected => "submit_rejected",
            ErrorKind::ConfirmationTimeout => "confirmation_timeout",
            ErrorKind::ChannelUnavailable => "channel_unavailable",
            ErrorKind::PartialThread => "partial_thread",
        }
    }

    /// The submission may or may not have been accepted by the channel.
    ///
    /// A retry after an ambiguous failure must look for the earlier post
    /// before submitting again.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ErrorKind::ConfirmationTimeout)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a publish attempt did not produce a post
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("rate ceiling reached for {category}: {count}/{ceiling} per {window}")]
    AdmissionDenied {
        category: Category,
        window: &'static str,
        count: u32,
        ceiling: u32,
    },

    #[error("no session slot for {job} within {budget_ms}ms")]
    ResourceExhausted { job: &'static str, budget_ms: u64 },

    #[error("submission rejected: {0}")]
    SubmitRejected(String),

    #[error("submission outcome unknown: {0}")]
    ConfirmationTimeout(String),

    #[error("channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("thread stopped after {posted} of {expected} parts: {reason}")]
    PartialThread {
        posted: usize,
        expected: usize,
        reason: String,
    },
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::AdmissionDenied { .. } => ErrorKind::AdmissionDenied,
            PublishError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            PublishError::SubmitRejected(_) => ErrorKind::SubmitRejected,
            PublishError::ConfirmationTimeout(_) => ErrorKind::ConfirmationTimeout,
            PublishError::ChannelUnavailable(_) => ErrorKind::ChannelUnavailable,
            PublishError::PartialThread { .. } => ErrorKind::PartialThread,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.kind().is_ambiguous()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
