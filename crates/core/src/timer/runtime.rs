// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler backed by tokio tasks

use super::{TimeoutScheduler, TimerTask, TimerToken};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::AbortHandle;

/// Pending timers. A slot exists from `schedule` until the timer either
/// fires or is cancelled; the abort handle is filled in once spawned.
type Pending = Arc<Mutex<HashMap<TimerToken, Option<AbortHandle>>>>;

/// Spawns one sleeping task per timer on a tokio runtime
pub struct TokioScheduler {
    runtime: Handle,
    next_token: AtomicU64,
    pending: Pending,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_token: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bind to the runtime of the calling context
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl TimeoutScheduler for TokioScheduler {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerToken {
        let token = TimerToken::new(self.next_token.fetch_add(1, Ordering::Relaxed));

        // Register before spawning so a zero delay cannot fire unarmed
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token, None);

        let pending = Arc::clone(&self.pending);
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let armed = pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&token)
                .is_some();
            if armed {
                task();
            }
        });

        if let Some(slot) = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&token)
        {
            *slot = Some(join.abort_handle());
        }

        token
    }

    fn cancel(&self, token: TimerToken) {
        let slot = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&token);
        if let Some(Some(abort)) = slot {
            abort.abort();
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
