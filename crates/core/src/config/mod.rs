// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration loaded from `courier.toml`
//!
//! Every section has defaults, so a missing file or a partial file is
//! valid. Durations use humantime syntax (`"90s"`, `"30m"`, `"2h"`).
//!
//! Two classes of problems are distinguished: [`CourierConfig::validate`]
//! rejects values that make the daemon unable to run at all, while
//! [`CourierConfig::channel_readiness`] reports channel problems that only
//! block publishing (the daemon then runs read-only).

mod notify;

pub use notify::NotifyConfig;

use crate::decision::{Category, RetryPolicy};
use crate::fingerprint::FingerprintConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file name, looked up in the project root
pub const CONFIG_FILE: &str = "courier.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("channel.driver is not configured")]
    MissingDriver,
    #[error("channel.credentials is not configured")]
    MissingCredentials,
    #[error("credentials file not found: {0}")]
    CredentialsNotFound(PathBuf),
}

impl ConfigError {
    /// The problem disables publishing but not the daemon
    pub fn blocks_publishing(&self) -> bool {
        matches!(
            self,
            ConfigError::MissingDriver
                | ConfigError::MissingCredentials
                | ConfigError::CredentialsNotFound(_)
        )
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub pool: PoolConfig,
    pub rate: RateConfig,
    pub publish: PublishConfig,
    pub resolve: ResolveConfig,
    pub reconcile: ReconcileConfig,
    pub janitor: JanitorConfig,
    pub dispatch: DispatchConfig,
    pub fingerprint: FingerprintConfig,
    pub channel: ChannelConfig,
    pub notify: NotifyConfig,
}

/// `[pool]`: automation session pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of sessions opened at startup
    pub size: usize,
    /// Wait budget for background jobs
    #[serde(with = "humantime_serde")]
    pub base_timeout: Duration,
    /// Critical jobs wait `base_timeout × critical_multiplier`...
    pub critical_multiplier: u32,
    /// ...but never less than this
    #[serde(with = "humantime_serde")]
    pub critical_floor: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 2,
            base_timeout: Duration::from_secs(30),
            critical_multiplier: 3,
            critical_floor: Duration::from_secs(60),
        }
    }
}

/// Ceilings for one category; `None` means unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub per_hour: Option<u32>,
    pub per_day: Option<u32>,
}

impl RateLimits {
    pub fn new(per_hour: Option<u32>, per_day: Option<u32>) -> Self {
        Self { per_hour, per_day }
    }
}

/// `[rate.single]`, `[rate.thread]`, `[rate.reply]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub single: RateLimits,
    pub thread: RateLimits,
    pub reply: RateLimits,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            single: RateLimits::new(Some(2), Some(24)),
            thread: RateLimits::new(Some(1), Some(6)),
            reply: RateLimits::new(Some(6), Some(60)),
        }
    }
}

impl RateConfig {
    pub fn limits(&self, category: Category) -> RateLimits {
        match category {
            Category::Single => self.single,
            Category::Thread => self.thread,
            Category::Reply => self.reply,
        }
    }
}

/// `[publish]`: submission and retry behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub max_rejections: u32,
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_backoff_max: Duration,
    /// Bound on a single submit call
    #[serde(with = "humantime_serde")]
    pub submit_timeout: Duration,
    /// Native thread composition tries before falling back to reply chaining
    pub native_thread_attempts: u32,
    /// Tries per part while reply chaining
    pub part_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub part_retry_delay: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_rejections: 3,
            retry_backoff: Duration::from_secs(60),
            retry_backoff_max: Duration::from_secs(30 * 60),
            submit_timeout: Duration::from_secs(45),
            native_thread_attempts: 2,
            part_attempts: 3,
            part_retry_delay: Duration::from_secs(2),
        }
    }
}

impl PublishConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_rejections: self.max_rejections,
            backoff: self.retry_backoff,
            backoff_max: self.retry_backoff_max,
        }
    }
}

/// `[resolve]`: identifier resolution race
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Bound on the whole race
    #[serde(with = "humantime_serde")]
    pub hard_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub navigation_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub surface_timeout: Duration,
    pub poll_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub poll_initial_delay: Duration,
    pub poll_backoff_factor: u32,
    /// Recent activity items scanned per poll
    pub activity_limit: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            hard_timeout: Duration::from_secs(60),
            navigation_timeout: Duration::from_secs(20),
            surface_timeout: Duration::from_secs(10),
            poll_attempts: 4,
            poll_initial_delay: Duration::from_secs(2),
            poll_backoff_factor: 2,
            activity_limit: 20,
        }
    }
}

/// `[reconcile]`: receipt sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Unresolved receipts older than this become orphans
    #[serde(with = "humantime_serde")]
    pub orphan_grace: Duration,
    pub activity_limit: usize,
    /// Activity posted this long before the receipt still counts as a match
    #[serde(with = "humantime_serde")]
    pub match_skew: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            orphan_grace: Duration::from_secs(2 * 60 * 60),
            activity_limit: 50,
            match_skew: Duration::from_secs(5 * 60),
        }
    }
}

/// `[janitor]`: stale claim release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub stale_after: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(15 * 60),
        }
    }
}

/// `[dispatch]`: claim tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    #[serde(with = "humantime_serde")]
    pub tick: Duration,
    /// Most decisions claimed per tick
    pub batch: usize,
    /// How long shutdown waits for in-flight attempts
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(15),
            batch: 8,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// `[channel]`: the automation driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Driver executable speaking JSON over stdin/stdout
    pub driver: Option<PathBuf>,
    /// Credentials file handed to the driver
    pub credentials: Option<PathBuf>,
    pub args: Vec<String>,
    /// Bound on one driver call
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            driver: None,
            credentials: None,
            args: Vec::new(),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// A channel section that passed readiness checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    pub driver: PathBuf,
    pub credentials: PathBuf,
    pub args: Vec<String>,
    pub call_timeout: Duration,
}

impl CourierConfig {
    /// Load from a file; a missing file yields defaults.
    ///
    /// Relative channel paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.channel.resolve_relative(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reject values the daemon cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.pool.size == 0 {
            return invalid("pool.size must be at least 1");
        }
        if self.pool.critical_multiplier == 0 {
            return invalid("pool.critical_multiplier must be at least 1");
        }
        if self.publish.part_attempts == 0 {
            return invalid("publish.part_attempts must be at least 1");
        }
        if self.resolve.poll_attempts == 0 {
            return invalid("resolve.poll_attempts must be at least 1");
        }
        if self.resolve.poll_backoff_factor == 0 {
            return invalid("resolve.poll_backoff_factor must be at least 1");
        }
        if self.dispatch.batch == 0 {
            return invalid("dispatch.batch must be at least 1");
        }
        let intervals = [
            ("dispatch.tick", self.dispatch.tick),
            ("janitor.interval", self.janitor.interval),
            ("reconcile.interval", self.reconcile.interval),
            ("resolve.hard_timeout", self.resolve.hard_timeout),
            ("publish.submit_timeout", self.publish.submit_timeout),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        if self.publish.retry_backoff > self.publish.retry_backoff_max {
            return invalid("publish.retry_backoff exceeds publish.retry_backoff_max");
        }
        Ok(())
    }

    /// Check that the channel can be driven
    pub fn channel_readiness(&self) -> Result<ChannelSettings, ConfigError> {
        let driver = self
            .channel
            .driver
            .clone()
            .ok_or(ConfigError::MissingDriver)?;
        let credentials = self
            .channel
            .credentials
            .clone()
            .ok_or(ConfigError::MissingCredentials)?;
        if !credentials.exists() {
            return Err(ConfigError::CredentialsNotFound(credentials));
        }
        Ok(ChannelSettings {
            driver,
            credentials,
            args: self.channel.args.clone(),
            call_timeout: self.channel.call_timeout,
        })
    }
}

impl ChannelConfig {
    fn resolve_relative(&mut self, base: &Path) {
        // Bare command names stay on PATH lookup
        if let Some(driver) = &self.driver {
            if driver.is_relative() && driver.components().count() > 1 {
                self.driver = Some(base.join(driver));
            }
        }
        if let Some(credentials) = &self.credentials {
            if credentials.is_relative() {
                self.credentials = Some(base.join(credentials));
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
