// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock handles: the capability a requester gets back on grant

use crate::id::RequestId;
use crate::lock::LockShared;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Proof of a grant, able to release it.
///
/// The handle only weakly references its lock, so holding one never keeps
/// a lock alive. Handles compare equal when they refer to the same grant;
/// a re-grant yields an equal handle with a refreshed `expires_at`.
#[derive(Clone, Debug)]
pub struct LockHandle {
    lock: Weak<LockShared>,
    key: Arc<str>,
    request: RequestId,
    expires_at: Option<Instant>,
}

impl LockHandle {
    pub(crate) fn new(
        lock: Weak<LockShared>,
        key: Arc<str>,
        request: RequestId,
        expires_at: Option<Instant>,
    ) -> Self {
        Self {
            lock,
            key,
            request,
            expires_at,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn request(&self) -> &RequestId {
        &self.request
    }

    /// When the grant auto-releases, `None` if it never does
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Time left before auto-release as of `now`
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(now))
    }

    /// Release the grant. Returns false if it was no longer held.
    pub fn release(&self) -> bool {
        match self.lock.upgrade() {
            Some(lock) => lock.release(&self.request),
            None => false,
        }
    }
}

impl PartialEq for LockHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.request == other.request
    }
}

impl Eq for LockHandle {}
