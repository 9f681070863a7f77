// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chatty_core::{BusConfig, ChattyConfig, ConfigError, EventBus, FilterPolicy, SystemClock};
use chatty_engine::{ChatService, ServiceDeps};
use chatty_storage::{ChatState, Wal};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::server::ServerContext;

/// Overrides the state directory
pub const STATE_DIR_ENV: &str = "CHATTY_STATE_DIR";
/// Overrides the socket path
pub const SOCKET_ENV: &str = "CHATTY_SOCKET";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all daemon files
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the WAL file
    pub wal_path: PathBuf,
    /// Per-frame read/write timeout
    pub request_timeout: Duration,
    /// Default `EnvFilter` directive
    pub log_level: String,
    pub bus: BusConfig,
    pub policy: FilterPolicy,
}

impl Config {
    /// Resolve paths from settings and the environment
    ///
    /// `CHATTY_STATE_DIR` and `CHATTY_SOCKET` win over the config file.
    pub fn load(settings: &ChattyConfig) -> Result<Self, LifecycleError> {
        let state_dir = match std::env::var_os(STATE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => match &settings.server.state_dir {
                Some(dir) => dir.clone(),
                None => default_state_dir()?,
            },
        };
        let socket_path = match std::env::var_os(SOCKET_ENV) {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => settings.server.socket_path.clone(),
        };
        Self::from_parts(settings, state_dir, socket_path)
    }

    /// Build a config rooted at `state_dir`, ignoring the environment
    pub fn from_parts(
        settings: &ChattyConfig,
        state_dir: PathBuf,
        socket_path: Option<PathBuf>,
    ) -> Result<Self, LifecycleError> {
        Ok(Self {
            socket_path: socket_path.unwrap_or_else(|| state_dir.join("chatty.sock")),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            wal_path: state_dir.join("wal").join("chatty.wal"),
            request_timeout: settings.server.request_timeout,
            log_level: settings.log.level.clone(),
            bus: settings.bus.clone(),
            policy: settings.policy.filter_policy()?,
            state_dir,
        })
    }
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
    /// Shared with every connection task
    pub ctx: Arc<ServerContext<SystemClock>>,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Tell connection tasks (including live subscriptions) to finish
        self.ctx.shutdown_tx.send_replace(true);

        // 2. Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 3. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 4. Remove version file
        if self.config.version_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.version_path) {
                warn!("Failed to remove version file: {}", e);
            }
        }

        // 5. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("WAL error: {0}")]
    Wal(#[from] chatty_storage::WalError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(LifecycleError::LockFailed(e)) => {
            // another daemon owns these files; leave them alone
            Err(LifecycleError::LockFailed(e))
        }
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
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Create directories
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = config.wal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Write version file
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 4. Load state from WAL
    let ops = Wal::replay(&config.wal_path)?;
    let state = ChatState::replay(&ops);
    let wal = Wal::open(&config.wal_path)?;

    info!(
        users = state.users.len(),
        groups = state.groups.len(),
        messages = state.messages.len(),
        wal_sequence = wal.sequence(),
        "Loaded state"
    );

    // 5. Create the bus and resolvers
    let bus = EventBus::with_config(&config.bus, config.policy.clone());
    let service = Arc::new(ChatService::new(
        ServiceDeps {
            wal: Arc::new(Mutex::new(wal)),
            state: Arc::new(Mutex::new(state)),
            bus,
        },
        SystemClock,
    ));

    // 6. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let (shutdown_tx, _) = watch::channel(false);
    let ctx = Arc::new(ServerContext {
        service,
        start_time: Instant::now(),
        request_timeout: config.request_timeout,
        shutdown_tx,
    });

    info!("Daemon started in {}", config.state_dir.display());

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        ctx,
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

/// Get the state directory for chatty
fn default_state_dir() -> Result<PathBuf, LifecycleError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("chatty"));
    }
    if let Some(dir) = dirs::state_dir() {
        return Ok(dir.join("chatty"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/chatty"))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
