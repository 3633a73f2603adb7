// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::fs::File;
use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use kl_core::{LockRegistry, TokioScheduler, UuidIdGen};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::server::Server;

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    pid_file: Option<File>,
    pub listener: TcpListener,
    pub server: Server<UuidIdGen>,
    pub start_time: Instant,
}

impl DaemonState {
    /// Address actually bound, which differs from the config for port 0
    pub fn local_addr(&self) -> Result<SocketAddr, LifecycleError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve clients until `shutdown` resolves
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        self.server.serve(&self.listener, shutdown).await;
    }

    /// Shutdown the daemon gracefully
    pub fn shutdown(&mut self) {
        info!("Shutting down daemon...");

        let active = self.server.registry().active();
        if !active.is_empty() {
            warn!("{} locks still held or awaited at shutdown", active.len());
            for (key, snapshot) in &active {
                warn!(
                    "  - {}: {} granted, {} waiting (ceiling {})",
                    key, snapshot.granted, snapshot.waiting, snapshot.ceiling
                );
            }
        }

        if let Some(path) = &self.config.pid_file {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove PID file: {}", e);
                }
            }
        }

        info!(
            "Daemon shutdown complete after {}s",
            self.start_time.elapsed().as_secs()
        );
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire {0}: daemon already running?")]
    LockFailed(PathBuf, #[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("No tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            cleanup_on_failure(config, &e);
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. PID file first, so a second daemon fails before touching the port
    let pid_file = match &config.pid_file {
        Some(path) => Some(acquire_pid_file(path)?),
        None => None,
    };

    // 2. Lock table on the runtime's timers
    let scheduler = TokioScheduler::current()?;
    let registry = Arc::new(LockRegistry::new(Arc::new(scheduler)));
    let server = Server::new(registry, UuidIdGen, config.default_expire_ms());

    // 3. Bind last
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.listen, e))?;

    info!(
        "Daemon started on {} (default expire {:?})",
        listener.local_addr()?,
        config.default_expire
    );

    Ok(DaemonState {
        config: config.clone(),
        pid_file,
        listener,
        server,
        start_time: Instant::now(),
    })
}

fn acquire_pid_file(path: &Path) -> Result<File, LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Open without truncating so a running daemon's PID survives a failed attempt
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.try_lock_exclusive()
        .map_err(|e| LifecycleError::LockFailed(path.to_path_buf(), e))?;

    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config, error: &LifecycleError) {
    // Another daemon owns the PID file
    if matches!(error, LifecycleError::LockFailed(..)) {
        return;
    }
    if let Some(path) = &config.pid_file {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
