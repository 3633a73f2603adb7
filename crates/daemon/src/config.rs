// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration
//!
//! Values are layered, later sources winning: built-in defaults, the TOML
//! file named by `--config`, `KEYLOCK_*` environment variables, then
//! command-line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const ENV_LISTEN: &str = "KEYLOCK_LISTEN";
pub const ENV_DEFAULT_EXPIRE_MS: &str = "KEYLOCK_DEFAULT_EXPIRE_MS";
pub const ENV_LOG_FILE: &str = "KEYLOCK_LOG_FILE";
pub const ENV_PID_FILE: &str = "KEYLOCK_PID_FILE";

/// Resolved daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TCP address to accept clients on
    pub listen: SocketAddr,
    /// Expire timeout for `lock` commands that omit one; zero never expires
    pub default_expire: Duration,
    /// Log to this file instead of stderr
    pub log_file: Option<PathBuf>,
    /// Exclusive PID file guarding against a second daemon
    pub pid_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 7717)),
            default_expire: Duration::ZERO,
            log_file: None,
            pid_file: None,
        }
    }
}

/// Settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub listen: Option<SocketAddr>,
    pub default_expire_ms: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
}

/// On-disk layout of the config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    listen: Option<SocketAddr>,
    #[serde(default, with = "humantime_serde")]
    default_expire: Option<Duration>,
    log_file: Option<PathBuf>,
    pid_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Invalid config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid {name}={value:?}: {reason}")]
    Env {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Config {
    /// Resolve configuration from the process environment and `overrides`
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |name| std::env::var(name).ok())
    }

    /// Resolve configuration with an injectable environment lookup
    pub fn resolve(
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = &overrides.config_file {
            config.apply_file(read_file(path)?);
        }

        if let Some(value) = env(ENV_LISTEN) {
            config.listen = value.parse().map_err(|e: std::net::AddrParseError| ConfigError::Env {
                name: ENV_LISTEN,
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(value) = env(ENV_DEFAULT_EXPIRE_MS) {
            let ms = value.parse::<u64>().map_err(|e| ConfigError::Env {
                name: ENV_DEFAULT_EXPIRE_MS,
                value: value.clone(),
                reason: e.to_string(),
            })?;
            config.default_expire = Duration::from_millis(ms);
        }
        if let Some(value) = env(ENV_LOG_FILE) {
            config.log_file = Some(PathBuf::from(value));
        }
        if let Some(value) = env(ENV_PID_FILE) {
            config.pid_file = Some(PathBuf::from(value));
        }

        if let Some(listen) = overrides.listen {
            config.listen = listen;
        }
        if let Some(ms) = overrides.default_expire_ms {
            config.default_expire = Duration::from_millis(ms);
        }
        if let Some(path) = &overrides.log_file {
            config.log_file = Some(path.clone());
        }
        if let Some(path) = &overrides.pid_file {
            config.pid_file = Some(path.clone());
        }

        Ok(config)
    }

    /// Default expire timeout in the protocol's millisecond unit
    pub fn default_expire_ms(&self) -> i64 {
        i64::try_from(self.default_expire.as_millis()).unwrap_or(i64::MAX)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(listen) = file.listen {
            self.listen = listen;
        }
        if let Some(expire) = file.default_expire {
            self.default_expire = expire;
        }
        if file.log_file.is_some() {
            self.log_file = file.log_file;
        }
        if file.pid_file.is_some() {
            self.pid_file = file.pid_file;
        }
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
