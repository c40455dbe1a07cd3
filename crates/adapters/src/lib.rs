// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O

pub mod channel;
pub mod notify;
pub mod traced;

pub use channel::{
    ActivityItem, ChannelAdapter, ChannelError, DriverChannelAdapter, SessionId, Submission,
};
pub use notify::{DesktopNotifyAdapter, NoOpNotifyAdapter, NotifyAdapter, NotifyError};
pub use traced::TracedChannelAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use channel::{ChannelCall, FakeChannelAdapter, SubmitOutcome};
#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotifyAdapter;
