// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kl-daemon: the keylock TCP front end
//!
//! Clients speak a line protocol ([`protocol`]); each connection maps its
//! commands onto [`kl_core::Lock`]s and writes back the events they raise.

pub mod config;
pub mod connection;
pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use config::{Config, ConfigError, Overrides};
pub use connection::{Connection, Flow};
pub use lifecycle::{startup, DaemonState, LifecycleError};
pub use protocol::{parse_command, Command, ProtocolError, Reply, Status};
pub use server::{Server, ServerError};
