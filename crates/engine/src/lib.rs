// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Courier publication engine

mod actuator;
mod alerts;
mod dispatch;
mod error;
mod governor;
mod janitor;
mod pool;
mod reconcile;
mod resolve;
mod runtime;
mod status;
mod thread;

pub use actuator::{Actuator, PublishOutcome};
pub use alerts::Alerter;
pub use dispatch::Dispatcher;
pub use error::RuntimeError;
pub use governor::{Admission, DispatchPlan, RateGovernor, Window, WindowUsage};
pub use janitor::Janitor;
pub use pool::{BudgetPolicy, JobClass, PoolError, PoolUtilization, SessionPool, SlotLease};
pub use reconcile::{Reconciler, SweepReport};
pub use resolve::{find_in_activity, ActivityQuery, Resolution, ResolveSource, Resolver};
pub use runtime::{LoopConfig, Runtime, RuntimeHandle};
pub use status::{CategoryStatus, Mode, ReceiptCounts, StatusReport, WindowCount};
