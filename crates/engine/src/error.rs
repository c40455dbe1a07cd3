// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use crate::pool::PoolError;
use courier_adapters::ChannelError;
use courier_storage::{LedgerError, StoreError};
use thiserror::Error;

/// Errors that can occur in the runtime loops
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}
