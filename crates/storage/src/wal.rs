// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage
//!
//! One JSON object per line, `{"seq": n, "op": ...}`, fsynced on every
//! append. A crash mid-append can leave a torn final line; it is dropped
//! on open and skipped on replay. Corruption anywhere else is an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt entry at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Write-ahead log for durable operation storage
pub struct Wal<T> {
    file: File,
    sequence: u64,
    _op: PhantomData<fn() -> T>,
}

impl<T> Wal<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open or create a WAL at the given path
    pub fn open(path: &Path) -> Result<Self, WalError> {
        truncate_torn_tail(path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        // Count existing entries to set sequence number
        let reader = BufReader::new(File::open(path)?);
        let mut sequence = 0;
        for line in reader.lines() {
            if !line?.trim().is_empty() {
                sequence += 1;
            }
        }

        Ok(Self {
            file,
            sequence,
            _op: PhantomData,
        })
    }

    /// Append an operation to the log
    pub fn append(&mut self, op: &T) -> Result<u64, WalError> {
        let entry = WalEntryRef {
            seq: self.sequence + 1,
            op,
        };
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        self.sequence += 1;
        Ok(self.sequence)
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replay all operations from the log
    pub fn replay(path: &Path) -> Result<Vec<T>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines = BufReader::new(file)
            .lines()
            .collect::<Result<Vec<_>, _>>()?;
        let last = lines.len();
        let mut ops = Vec::new();

        for (index, line) in lines.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry<T>>(&line) {
                Ok(entry) => ops.push(entry.op),
                Err(e) if index + 1 == last => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping torn final WAL entry");
                }
                Err(source) => {
                    return Err(WalError::Corrupt {
                        line: index + 1,
                        source,
                    })
                }
            }
        }

        Ok(ops)
    }
}

/// Drop bytes after the last newline so the next append starts a fresh line
fn truncate_torn_tail(path: &Path) -> Result<(), WalError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(());
    }
    let keep = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |pos| pos + 1);
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = bytes.len() - keep,
        "truncating torn WAL tail"
    );
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_all()?;
    Ok(())
}

#[derive(Serialize)]
struct WalEntryRef<'a, T> {
    seq: u64,
    op: &'a T,
}

#[derive(Deserialize)]
struct WalEntry<T> {
    #[allow(dead_code)]
    seq: u64,
    op: T,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
