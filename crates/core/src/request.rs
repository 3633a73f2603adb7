// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock requests: what a client is willing to accept for one acquisition

use crate::error::LockError;
use crate::event::{EventSink, LockEvent};
use crate::id::RequestId;
use std::time::Duration;

/// Wait timeout meaning "queue until granted or cancelled"
pub const WAIT_FOREVER: i64 = -1;

/// Expire timeout meaning "hold until released"
pub const NEVER_EXPIRE: i64 = 0;

/// One client's attempt to hold a named lock.
///
/// Numeric fields are kept as supplied so that [`Lock::request_lock`]
/// can reject out-of-range values instead of silently clamping them.
///
/// [`Lock::request_lock`]: crate::Lock::request_lock
#[derive(Clone, Debug)]
pub struct LockRequest {
    id: RequestId,
    max_concurrent: u32,
    wait_timeout_ms: i64,
    expire_timeout_ms: i64,
    sink: EventSink,
}

impl LockRequest {
    /// An exclusive request that waits forever and never expires
    pub fn new(id: RequestId, sink: EventSink) -> Self {
        Self {
            id,
            max_concurrent: 1,
            wait_timeout_ms: WAIT_FOREVER,
            expire_timeout_ms: NEVER_EXPIRE,
            sink,
        }
    }

    /// Most holders (including this one) the requester tolerates
    pub fn with_max_concurrent(mut self, max_concurrent: u32) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_wait_timeout_ms(mut self, ms: i64) -> Self {
        self.wait_timeout_ms = ms;
        self
    }

    pub fn with_expire_timeout_ms(mut self, ms: i64) -> Self {
        self.expire_timeout_ms = ms;
        self
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn max_concurrent(&self) -> u32 {
        self.max_concurrent
    }

    pub fn wait_timeout_ms(&self) -> i64 {
        self.wait_timeout_ms
    }

    pub fn expire_timeout_ms(&self) -> i64 {
        self.expire_timeout_ms
    }

    /// Check the numeric fields are in range
    pub fn validate(&self) -> Result<(), LockError> {
        if self.max_concurrent < 1 {
            return Err(LockError::invalid(
                "max_concurrent",
                "must be at least 1",
                i64::from(self.max_concurrent),
            ));
        }
        if self.wait_timeout_ms < WAIT_FOREVER {
            return Err(LockError::invalid(
                "wait_timeout",
                "must be -1 or a non-negative number of ms",
                self.wait_timeout_ms,
            ));
        }
        if self.expire_timeout_ms < NEVER_EXPIRE {
            return Err(LockError::invalid(
                "expire_timeout",
                "must be a non-negative number of ms",
                self.expire_timeout_ms,
            ));
        }
        Ok(())
    }

    /// How long to stay queued, `None` for forever
    pub fn wait_timeout(&self) -> Option<Duration> {
        u64::try_from(self.wait_timeout_ms)
            .ok()
            .map(Duration::from_millis)
    }

    /// How long a grant lasts, `None` for until released
    pub fn expire_timeout(&self) -> Option<Duration> {
        u64::try_from(self.expire_timeout_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Deliver an event to the requester. A requester that stopped
    /// listening is not an error for the lock.
    pub(crate) fn notify(&self, event: LockEvent) {
        if let Err(e) = self.sink.send(event) {
            tracing::debug!(
                request = %self.id,
                event = e.0.name(),
                "requester no longer listening"
            );
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
