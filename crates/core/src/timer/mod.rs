// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot timeout scheduling
//!
//! Locks use a scheduler for two independent timers:
//! - **wait timers** give up on a request that stayed queued too long
//! - **expiry timers** auto-release a grant whose holder went quiet
//!
//! A scheduler never runs a task from inside [`TimeoutScheduler::schedule`];
//! tasks run later on a worker context and must take whatever locks they
//! need themselves.

mod runtime;

#[cfg(any(test, feature = "test-support"))]
mod manual;

pub use runtime::TokioScheduler;

#[cfg(any(test, feature = "test-support"))]
pub use manual::ManualScheduler;

use std::time::{Duration, Instant};

/// Work executed when a timer fires
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Cancellation token for a scheduled task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

impl TimerToken {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Schedules one-shot tasks after a delay
pub trait TimeoutScheduler: Send + Sync {
    /// Current time as seen by this scheduler
    fn now(&self) -> Instant;

    /// Run `task` once `delay` has elapsed, unless cancelled first
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerToken;

    /// Cancel a pending task. No-op if it already fired or was cancelled.
    fn cancel(&self, token: TimerToken);
}
