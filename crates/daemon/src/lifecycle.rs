// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use courier_adapters::{
    ChannelAdapter, DesktopNotifyAdapter, DriverChannelAdapter, TracedChannelAdapter,
};
use courier_core::{
    hex_encode, ChannelSettings, ConfigError, CourierConfig, SystemClock, UuidIdGen, CONFIG_FILE,
};
use courier_engine::{
    Actuator, Alerter, BudgetPolicy, Dispatcher, Janitor, LoopConfig, PoolError, RateGovernor,
    Reconciler, Resolver, Runtime, RuntimeError, RuntimeHandle, SessionPool,
};
use courier_storage::{
    DecisionStore, LedgerError, ReceiptLedger, StoreError, DECISIONS_WAL, RECEIPTS_WAL,
};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{error, info, warn};

use crate::service::Service;

/// Channel adapter the daemon drives (wrapped with tracing)
pub type DaemonChannel = TracedChannelAdapter<DriverChannelAdapter>;

/// Daemon runtime with concrete adapter types
pub type DaemonRuntime = Runtime<DaemonChannel, SystemClock, UuidIdGen, DesktopNotifyAdapter>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root directory
    pub project_root: PathBuf,
    /// Path to `courier.toml`
    pub config_path: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Directory holding the decision and receipt logs
    pub wal_dir: PathBuf,
}

impl Config {
    /// Create config for a project
    pub fn for_project(project_root: &Path) -> Result<Self, LifecycleError> {
        Self::with_dirs(project_root, &state_dir()?, &socket_dir())
    }

    /// Create config rooted at explicit state and socket directories
    pub fn with_dirs(
        project_root: &Path,
        state_root: &Path,
        socket_dir: &Path,
    ) -> Result<Self, LifecycleError> {
        let canonical = project_root
            .canonicalize()
            .map_err(|e| LifecycleError::ProjectNotFound(project_root.to_path_buf(), e))?;

        let hash = project_hash(&canonical);
        let state_dir = state_root.join("projects").join(&hash);

        Ok(Self {
            config_path: canonical.join(CONFIG_FILE),
            project_root: canonical,
            socket_path: socket_dir.join(format!("{}.sock", hash)),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            wal_dir: state_dir.join("wal"),
        })
    }
}

/// The publishing half of the daemon; absent in read-only mode
struct Publisher {
    handle: RuntimeHandle,
    pool: Arc<SessionPool>,
    channel: DaemonChannel,
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Answers socket requests
    pub service: Service,
    publisher: Option<Publisher>,
    /// Shutdown requested flag
    pub shutdown_requested: bool,
}

impl DaemonState {
    pub fn is_publishing(&self) -> bool {
        self.publisher.is_some()
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop the loops; in-flight attempts get their grace period
        if let Some(publisher) = self.publisher.take() {
            publisher.handle.shutdown().await;

            // 2. Close automation sessions
            for session in publisher.pool.close() {
                if let Err(e) = publisher.channel.close_session(&session).await {
                    warn!(session = %session, error = %e, "failed to close session");
                }
            }
        }

        // 3. Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 4. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 5. Remove version file
        if self.config.version_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.version_path) {
                warn!("Failed to remove version file: {}", e);
            }
        }

        // 6. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Project not found at {0}: {1}")]
    ProjectNotFound(PathBuf, std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Decision store error: {0}")]
    Store(#[from] StoreError),

    #[error("Receipt ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Session pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // The files belong to the instance holding the lock
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory (needed for socket, lock, etc.)
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents races
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file, replacing the previous owner's
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Create directories
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&config.wal_dir)?;

    // Write version file
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 4. Load configuration BEFORE binding socket (fail fast on invalid values)
    let settings = CourierConfig::load(&config.config_path)?;

    // 5. Replay the decision and receipt logs
    let store = DecisionStore::open(&config.wal_dir.join(DECISIONS_WAL))?;
    let ledger = ReceiptLedger::open(&config.wal_dir.join(RECEIPTS_WAL))?;
    let counts = store.count_by_status();
    info!(decisions = ?counts, receipts = ?ledger.counts(), "Loaded state");

    // 6. Remove stale socket and bind
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let service = Service::new(
        store.clone(),
        ledger.clone(),
        RateGovernor::new(settings.rate.clone()),
        SystemClock,
        UuidIdGen::default(),
    );

    // 7. Start publishing unless the channel section blocks it
    let (service, publisher) = match settings.channel_readiness() {
        Ok(channel) => match start_publishing(&settings, &channel, &store, &ledger).await {
            Ok(publisher) => (service.with_pool(Arc::clone(&publisher.pool)), Some(publisher)),
            Err(LifecycleError::Pool(e)) => {
                error!(error = %e, "could not open sessions, serving read-only");
                (service.read_only(format!("session pool: {e}")), None)
            }
            Err(e) => return Err(e),
        },
        Err(e) if e.blocks_publishing() => {
            warn!(error = %e, "publishing blocked by configuration, serving read-only");
            (service.read_only(e.to_string()), None)
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        "Daemon started for project: {}",
        config.project_root.display()
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        service,
        publisher,
        shutdown_requested: false,
    })
}

/// Open the session pool, recover claims from the previous run, start the loops
async fn start_publishing(
    settings: &CourierConfig,
    channel_settings: &ChannelSettings,
    store: &DecisionStore,
    ledger: &ReceiptLedger,
) -> Result<Publisher, LifecycleError> {
    let channel = TracedChannelAdapter::new(DriverChannelAdapter::new(channel_settings));
    let pool = SessionPool::open(
        &channel,
        settings.pool.size,
        BudgetPolicy::from(&settings.pool),
    )
    .await?;

    let janitor = Janitor::new(
        store.clone(),
        ledger.clone(),
        &settings.janitor,
        SystemClock,
    );
    // No attempt from a previous run is still alive
    let requeued = janitor.requeue_aborted()?;
    if !requeued.is_empty() {
        warn!(
            requeued = requeued.len(),
            "claims from previous run returned to queue"
        );
    }

    let alerts = Alerter::new(DesktopNotifyAdapter::default(), settings.notify.clone());
    let actuator = Actuator::new(
        channel.clone(),
        Arc::clone(&pool),
        ledger.clone(),
        Resolver::new(settings.resolve.clone(), settings.fingerprint.clone()),
        settings.publish.clone(),
        SystemClock,
        UuidIdGen::new("att"),
    );
    let dispatcher = Dispatcher::new(
        store.clone(),
        RateGovernor::new(settings.rate.clone()),
        actuator,
        alerts.clone(),
        SystemClock,
        settings.publish.retry_policy(),
        settings.dispatch.batch,
    );
    let reconciler = Reconciler::new(
        store.clone(),
        ledger.clone(),
        settings.fingerprint.clone(),
        settings.reconcile.clone(),
        alerts,
        SystemClock,
    )
    .with_channel(channel.clone(), Arc::clone(&pool));

    let runtime: DaemonRuntime =
        Runtime::new(dispatcher, reconciler, janitor, LoopConfig::from(settings));
    let handle = runtime.spawn();

    Ok(Publisher {
        handle,
        pool,
        channel,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove version file
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Get the state directory for courier
fn state_dir() -> Result<PathBuf, LifecycleError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("courier"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/courier"))
}

/// Get the socket directory for courier
///
/// Uses /tmp/courier by default to keep paths short (macOS SUN_LEN = 104).
/// Can be overridden with COURIER_SOCKET_DIR for testing.
fn socket_dir() -> PathBuf {
    match std::env::var("COURIER_SOCKET_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => PathBuf::from("/tmp/courier"),
    }
}

/// Compute project hash for unique daemon directory
pub fn project_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // Take first 16 chars of hex digest
    hex_encode(&result[..8])
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
