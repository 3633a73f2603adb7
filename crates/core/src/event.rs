// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notifications a lock sends back to requesters

use crate::handle::LockHandle;
use crate::id::RequestId;
use std::time::Duration;
use tokio::sync::mpsc;

/// Where a request's notifications are delivered.
///
/// Sending never blocks, so locks can notify from inside their critical
/// section without re-entering it.
pub type EventSink = mpsc::UnboundedSender<LockEvent>;

/// Outcome notifications for a single request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockEvent {
    /// The request now holds the lock (also sent on every re-grant)
    Granted(LockHandle),
    /// An explicit release took the grant away
    Released { key: String, request: RequestId },
    /// The grant ran past its expire timeout
    Expired { key: String, request: RequestId },
    /// The request gave up waiting
    TimedOut {
        key: String,
        request: RequestId,
        wait_timeout: Duration,
    },
}

impl LockEvent {
    pub fn key(&self) -> &str {
        match self {
            LockEvent::Granted(handle) => handle.key(),
            LockEvent::Released { key, .. }
            | LockEvent::Expired { key, .. }
            | LockEvent::TimedOut { key, .. } => key,
        }
    }

    pub fn request(&self) -> &RequestId {
        match self {
            LockEvent::Granted(handle) => handle.request(),
            LockEvent::Released { request, .. }
            | LockEvent::Expired { request, .. }
            | LockEvent::TimedOut { request, .. } => request,
        }
    }

    /// Stable name for logging
    pub fn name(&self) -> &'static str {
        match self {
            LockEvent::Granted(_) => "lock:granted",
            LockEvent::Released { .. } => "lock:released",
            LockEvent::Expired { .. } => "lock:expired",
            LockEvent::TimedOut { .. } => "lock:timeout",
        }
    }
}
