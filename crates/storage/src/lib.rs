// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage: write-ahead logs and the state materialized from them
//!
//! Two logs are kept side by side. The decision log backs the
//! [`DecisionStore`] and its claim protocol; the receipt log backs the
//! [`ReceiptLedger`]. They are never written in one transaction.

mod ledger;
mod state;
mod store;
mod wal;

pub use ledger::{LedgerError, ReceiptLedger};
pub use state::MaterializedState;
pub use store::{DecisionStore, StoreError};
pub use wal::{Wal, WalError};

/// File name of the decision log inside the state directory
pub const DECISIONS_WAL: &str = "decisions.wal";

/// File name of the receipt log inside the state directory
pub const RECEIPTS_WAL: &str = "receipts.wal";
