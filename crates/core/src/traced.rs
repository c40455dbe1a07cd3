// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing infrastructure for persisted operations

/// Trait for operations that should be traced
///
/// Provides consistent naming and structured fields for logging.
pub trait TracedOperation {
    /// Operation name for log lines (e.g., "claim", "receipt_record")
    fn name(&self) -> &'static str;

    /// Key-value pairs for structured logging
    fn fields(&self) -> Vec<(&'static str, String)>;

    /// Fields rendered as `key=value` pairs separated by spaces
    fn describe(&self) -> String {
        self.fields()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
