// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! courier-core: domain types for the courier publication core
//!
//! This crate provides:
//! - The decision state machine and the operations persisted to the decision log
//! - Receipts and the operations persisted to the receipt ledger
//! - Content fingerprinting for matching against the channel's activity record
//! - The publish error taxonomy and retry policy
//! - Configuration loaded from `courier.toml`

pub mod alert;
pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod fingerprint;
pub mod id;
pub mod operation;
pub mod receipt;
pub mod traced;

pub use alert::{Alert, Notification, NotifyUrgency};
pub use clock::{to_time_delta, Clock, FakeClock, SystemClock};
pub use config::{
    ChannelConfig, ChannelSettings, ConfigError, CourierConfig, DispatchConfig, JanitorConfig,
    NotifyConfig, PoolConfig, PublishConfig, RateConfig, RateLimits, ReconcileConfig,
    ResolveConfig, CONFIG_FILE,
};
pub use decision::{
    Category, Content, Decision, DecisionError, DecisionStatus, LastError, NewDecision,
    ReplyTarget, RetryPolicy, TransitionError,
};
pub use error::{ErrorKind, PublishError};
pub use fingerprint::{hex_encode, Fingerprint, FingerprintConfig};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use operation::Operation;
pub use receipt::{Receipt, ReceiptOp, ReceiptStatus};
pub use traced::TracedOperation;
