// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! courier-daemon: the long-running process hosting the publication engine
//!
//! Producers talk to it over a Unix socket with length-prefixed JSON.

pub mod lifecycle;
pub mod protocol;
pub mod server;
pub mod service;

pub use lifecycle::{startup, Config, DaemonState, LifecycleError};
pub use protocol::{DecisionSummary, ProtocolError, Query, Request, Response, PROTOCOL_VERSION};
pub use server::{handle_connection, Served, ServerError};
pub use service::{Service, ServiceError};
