// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line protocol between clients and the daemon
//!
//! Each request is one line of whitespace-separated words:
//!
//! ```text
//! lock <key> [max_concurrent=1] [wait_timeout_ms=-1] [expire_timeout_ms]
//! release <key>
//! quit
//! ```
//!
//! Each reply is one line: a status word, followed by
//! `<granted> <waiting> <key>` when the reply concerns a lock.

use kl_core::LockSnapshot;
use thiserror::Error;

/// A parsed client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lock {
        key: String,
        max_concurrent: i64,
        wait_timeout_ms: i64,
        /// Falls back to the daemon's configured default when absent
        expire_timeout_ms: Option<i64>,
    },
    Release {
        key: String,
    },
    Quit,
}

/// Why a line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0} requires a lock key")]
    MissingKey(&'static str),

    #[error("{name} must be an integer, got {value:?}")]
    BadNumber { name: &'static str, value: String },
}

/// Parse one request line. Trailing extra words are ignored.
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(ProtocolError::Empty);
    };

    match verb {
        "lock" => {
            let key = words.next().ok_or(ProtocolError::MissingKey("lock"))?;
            let max_concurrent = number("max_concurrent", words.next())?.unwrap_or(1);
            let wait_timeout_ms = number("wait_timeout", words.next())?.unwrap_or(-1);
            let expire_timeout_ms = number("expire_timeout", words.next())?;
            Ok(Command::Lock {
                key: key.to_string(),
                max_concurrent,
                wait_timeout_ms,
                expire_timeout_ms,
            })
        }
        "release" => {
            let key = words.next().ok_or(ProtocolError::MissingKey("release"))?;
            Ok(Command::Release {
                key: key.to_string(),
            })
        }
        "quit" => Ok(Command::Quit),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

fn number(name: &'static str, word: Option<&str>) -> Result<Option<i64>, ProtocolError> {
    word.map(|w| {
        w.parse::<i64>().map_err(|_| ProtocolError::BadNumber {
            name,
            value: w.to_string(),
        })
    })
    .transpose()
}

/// Reply status words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Locked,
    Released,
    NotReleased,
    Expired,
    Timeout,
    InvalidArgument,
    InvalidCommand,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Locked => "LOCKED",
            Status::Released => "RELEASED",
            Status::NotReleased => "NOT_RELEASED",
            Status::Expired => "EXPIRED",
            Status::Timeout => "TIMEOUT",
            Status::InvalidArgument => "INVALID_ARGUMENT",
            Status::InvalidCommand => "INVALID_COMMAND",
        }
    }
}

/// A reply waiting to be rendered with the lock's current counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub key: Option<String>,
}

impl Reply {
    pub fn keyed(status: Status, key: impl Into<String>) -> Self {
        Self {
            status,
            key: Some(key.into()),
        }
    }

    pub fn bare(status: Status) -> Self {
        Self { status, key: None }
    }
}

/// Render a reply line, newline included.
///
/// `snapshot` is the lock's state at render time; a key that was never
/// locked renders as `0 0`.
pub fn render(reply: &Reply, snapshot: Option<LockSnapshot>) -> String {
    match &reply.key {
        Some(key) => {
            let (granted, waiting) = snapshot.map_or((0, 0), |s| (s.granted, s.waiting));
            format!("{} {} {} {}\n", reply.status.as_str(), granted, waiting, key)
        }
        None => format!("{}\n", reply.status.as_str()),
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
