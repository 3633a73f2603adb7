// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keylock Daemon (kld)
//!
//! Serves named locks to TCP clients until SIGTERM or SIGINT.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use kl_daemon::{lifecycle, Config, LifecycleError, Overrides};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "kld",
    version,
    about = "Keylock daemon - named locks with shared tolerance over TCP"
)]
struct Cli {
    /// TOML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on (default 127.0.0.1:7717)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Expire timeout for lock commands that omit one, 0 for never
    #[arg(long, value_name = "MS")]
    default_expire_ms: Option<u64>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Hold an exclusive lock on this PID file while running
    #[arg(long, value_name = "FILE")]
    pid_file: Option<PathBuf>,
}

impl Cli {
    fn overrides(self) -> Overrides {
        Overrides {
            config_file: self.config,
            listen: self.listen,
            default_expire_ms: self.default_expire_ms,
            log_file: self.log_file,
            pid_file: self.pid_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&Cli::parse().overrides())?;

    // Held until exit so buffered log lines are flushed
    let _log_guard = setup_logging(&config)?;

    info!("Starting kld (pid {})", std::process::id());

    let mut daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let addr = daemon.local_addr()?;
    info!("Daemon ready, listening on {}", addr);

    // Signal ready for parent process, with the bound address for port 0
    println!("READY {}", addr);

    daemon
        .run(async {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
            }
        })
        .await;
    daemon.shutdown();

    info!("Daemon stopped");
    Ok(())
}

fn setup_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(log_path) = &config.log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let file_name = log_path.file_name().ok_or_else(|| {
        LifecycleError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("log file has no name: {}", log_path.display()),
        ))
    })?;

    let file_appender = tracing_appender::rolling::never(&dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}
