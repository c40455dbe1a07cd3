// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content fingerprinting
//!
//! The channel gives no transactional confirmation, so a submitted post is
//! later recognized in the account's activity record by comparing
//! fingerprints of normalized text. Normalization absorbs the rewriting the
//! channel applies on display (link shortening, whitespace, truncation).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of normalized text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalization applied before hashing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Lowercase before comparing
    pub case_fold: bool,
    /// Collapse runs of whitespace into one space and trim the ends
    pub collapse_whitespace: bool,
    /// Drop `http://` and `https://` tokens
    pub strip_urls: bool,
    /// Drop trailing `…` or `...` left by display truncation
    pub trim_ellipsis: bool,
    /// Compare only this many leading characters
    pub max_chars: Option<usize>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            case_fold: true,
            collapse_whitespace: true,
            strip_urls: true,
            trim_ellipsis: true,
            max_chars: Some(200),
        }
    }
}

impl FingerprintConfig {
    pub fn normalize(&self, text: &str) -> String {
        let mut out: String = if self.strip_urls {
            text.split_whitespace()
                .filter(|token| !is_url(token))
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            text.to_string()
        };
        if self.collapse_whitespace {
            out = out.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        if self.trim_ellipsis {
            let mut trimmed = out.trim_end();
            while let Some(rest) = trimmed
                .strip_suffix('…')
                .or_else(|| trimmed.strip_suffix("..."))
            {
                trimmed = rest.trim_end();
            }
            out = trimmed.to_string();
        }
        if self.case_fold {
            out = out.to_lowercase();
        }
        if let Some(max) = self.max_chars {
            out = out.chars().take(max).collect();
            if self.collapse_whitespace {
                out.truncate(out.trim_end().len());
            }
        }
        out
    }

    pub fn fingerprint(&self, text: &str) -> Fingerprint {
        let digest = Sha256::digest(self.normalize(text).as_bytes());
        Fingerprint(hex_encode(&digest))
    }

    /// Whether `text` as displayed by the channel matches the fingerprint
    pub fn matches(&self, fingerprint: &Fingerprint, text: &str) -> bool {
        &self.fingerprint(text) == fingerprint
    }
}

fn is_url(token: &str) -> bool {
    token.starts_with("http://") || token.starts_with("https://")
}

/// Lowercase hex of `bytes`
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
