// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! kl-core: named-lock arbitration for the keylock daemon
//!
//! This crate provides:
//! - [`Lock`], the per-key grant/release/timeout/expiry state machine
//! - [`LockRegistry`], the create-on-first-use map of locks
//! - [`TimeoutScheduler`] implementations for wait and expiry timers
//! - Request, handle and event types exchanged with requesters

pub mod error;
pub mod event;
pub mod handle;
pub mod id;
pub mod lock;
pub mod registry;
pub mod request;
pub mod timer;

pub use error::LockError;
pub use event::{EventSink, LockEvent};
pub use handle::LockHandle;
pub use id::{IdGen, RequestId, SequentialIdGen, UuidIdGen};
pub use lock::{Ceiling, Lock, LockSnapshot, RequestOutcome};
pub use registry::LockRegistry;
pub use request::{LockRequest, NEVER_EXPIRE, WAIT_FOREVER};
pub use timer::{TimeoutScheduler, TimerTask, TimerToken, TokioScheduler};

#[cfg(any(test, feature = "test-support"))]
pub use timer::ManualScheduler;
