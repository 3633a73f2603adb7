// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key lock state machine
//!
//! A lock admits up to `ceiling` concurrent holders, where the ceiling is
//! the smallest `max_concurrent` among the current holders. It only
//! tightens while holders are present and is rebuilt from the remaining
//! holders when the one that set it leaves.
//!
//! Waiters are admitted first-fit in arrival order. After every grant the
//! scan restarts from the front of the queue, so earlier requests always
//! win when several would fit. The re-scan is quadratic in queue length,
//! which is fine for the short per-key queues this serves.
//!
//! Every mutation, including timer callbacks, runs under one mutex per
//! lock. Timers are stamped with a ticket when armed and are ignored if the
//! waiter or grant they were armed for has since moved on.

use crate::error::LockError;
use crate::event::LockEvent;
use crate::handle::LockHandle;
use crate::id::RequestId;
use crate::request::LockRequest;
use crate::timer::{TimeoutScheduler, TimerToken};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Current limit on concurrent holders
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ceiling {
    /// Nobody holds the lock
    Unbounded,
    Bounded(u32),
}

impl Ceiling {
    /// Whether `holders` concurrent holders fit under this ceiling
    pub fn admits(self, holders: usize) -> bool {
        match self {
            Ceiling::Unbounded => true,
            Ceiling::Bounded(max) => holders <= max as usize,
        }
    }

    fn tighten(self, max_concurrent: u32) -> Self {
        match self {
            Ceiling::Bounded(current) if current <= max_concurrent => self,
            _ => Ceiling::Bounded(max_concurrent),
        }
    }

    fn is_set_by(self, max_concurrent: u32) -> bool {
        self == Ceiling::Bounded(max_concurrent)
    }

    fn from_holders(limits: impl Iterator<Item = u32>) -> Self {
        limits.min().map_or(Ceiling::Unbounded, Ceiling::Bounded)
    }
}

impl fmt::Display for Ceiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ceiling::Unbounded => f.write_str("unbounded"),
            Ceiling::Bounded(max) => write!(f, "{}", max),
        }
    }
}

/// Immediate result of [`Lock::request_lock`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Admitted right away
    Granted(LockHandle),
    /// Was already held; expiry refreshed
    Regranted(LockHandle),
    /// Queued (or already queued)
    Waiting,
}

/// Consistent point-in-time view of a lock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockSnapshot {
    pub granted: usize,
    pub waiting: usize,
    pub ceiling: Ceiling,
}

#[derive(Clone, Copy, Debug)]
struct Timer {
    ticket: u64,
    token: TimerToken,
}

struct Waiter {
    request: LockRequest,
    timer: Option<Timer>,
}

struct Grant {
    request: LockRequest,
    expires_at: Option<Instant>,
    timer: Option<Timer>,
}

enum Removal {
    Released,
    Expired,
}

struct LockState {
    waiting: Vec<Waiter>,
    granted: HashMap<RequestId, Grant>,
    ceiling: Ceiling,
    next_ticket: u64,
}

impl LockState {
    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn waiter_index(&self, id: &RequestId) -> Option<usize> {
        self.waiting.iter().position(|w| w.request.id() == id)
    }
}

pub(crate) struct LockShared {
    key: Arc<str>,
    scheduler: Arc<dyn TimeoutScheduler>,
    state: Mutex<LockState>,
}

/// A named lock. Cloning yields another reference to the same lock.
#[derive(Clone)]
pub struct Lock {
    shared: Arc<LockShared>,
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.key())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Lock {
    pub fn new(key: impl Into<String>, scheduler: Arc<dyn TimeoutScheduler>) -> Self {
        let key: String = key.into();
        Self {
            shared: Arc::new(LockShared {
                key: Arc::from(key),
                scheduler,
                state: Mutex::new(LockState {
                    waiting: Vec::new(),
                    granted: HashMap::new(),
                    ceiling: Ceiling::Unbounded,
                    next_ticket: 0,
                }),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// Whether both values refer to the same lock instance
    pub fn ptr_eq(&self, other: &Lock) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Queue a request, granting it immediately if it fits.
    ///
    /// A request that is already granted is re-granted: its expiry restarts
    /// from now using the resubmitted `expire_timeout`, and `Granted` is sent
    /// again. A request that is already waiting is left where it is.
    pub fn request_lock(&self, request: LockRequest) -> Result<RequestOutcome, LockError> {
        request.validate()?;
        Ok(self.shared.request_lock(request))
    }

    /// Withdraw a waiting request. Returns whether it was waiting.
    pub fn cancel_request(&self, id: &RequestId) -> bool {
        self.shared.cancel_request(id)
    }

    /// Release a granted request. Returns whether it was held.
    pub fn release(&self, id: &RequestId) -> bool {
        self.shared.release(id)
    }

    pub fn granted_count(&self) -> usize {
        self.shared.state().granted.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.shared.state().waiting.len()
    }

    pub fn ceiling(&self) -> Ceiling {
        self.shared.state().ceiling
    }

    pub fn snapshot(&self) -> LockSnapshot {
        let state = self.shared.state();
        LockSnapshot {
            granted: state.granted.len(),
            waiting: state.waiting.len(),
            ceiling: state.ceiling,
        }
    }

    /// True when nobody holds or waits for the lock
    pub fn is_idle(&self) -> bool {
        let state = self.shared.state();
        state.granted.is_empty() && state.waiting.is_empty()
    }
}

impl LockShared {
    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn request_lock(self: &Arc<Self>, request: LockRequest) -> RequestOutcome {
        let mut state = self.state();

        if let Some(handle) = self.regrant(&mut state, &request) {
            return RequestOutcome::Regranted(handle);
        }
        if state.waiter_index(request.id()).is_some() {
            return RequestOutcome::Waiting;
        }

        let id = request.id().clone();
        let wait_timeout = request.wait_timeout();
        debug!(
            key = %self.key,
            request = %id,
            max_concurrent = request.max_concurrent(),
            "queued"
        );
        state.waiting.push(Waiter {
            request,
            timer: None,
        });
        self.admit(&mut state);

        if let Some(grant) = state.granted.get(&id) {
            return RequestOutcome::Granted(self.handle(&id, grant.expires_at));
        }

        if let Some(delay) = wait_timeout {
            let ticket = state.issue_ticket();
            let timer = self.arm(&id, ticket, delay, LockShared::wait_expired);
            if let Some(index) = state.waiter_index(&id) {
                state.waiting[index].timer = Some(timer);
            }
        }
        RequestOutcome::Waiting
    }

    /// Refresh an existing grant. `None` if the request is not granted.
    fn regrant(self: &Arc<Self>, state: &mut LockState, request: &LockRequest) -> Option<LockHandle> {
        let ticket = state.issue_ticket();
        let grant = state.granted.get_mut(request.id())?;

        if let Some(old) = grant.timer.take() {
            self.scheduler.cancel(old.token);
        }
        let expire_timeout = request.expire_timeout();
        grant.expires_at = expire_timeout.map(|d| self.scheduler.now() + d);
        grant.timer =
            expire_timeout.map(|d| self.arm(request.id(), ticket, d, LockShared::grant_expired));
        grant.request = grant
            .request
            .clone()
            .with_wait_timeout_ms(request.wait_timeout_ms())
            .with_expire_timeout_ms(request.expire_timeout_ms());

        debug!(key = %self.key, request = %request.id(), "re-granted");
        let handle = self.handle(request.id(), grant.expires_at);
        grant.request.notify(LockEvent::Granted(handle.clone()));
        Some(handle)
    }

    /// Grant waiters until a full scan admits nobody
    fn admit(self: &Arc<Self>, state: &mut LockState) {
        loop {
            let holders = state.granted.len() + 1;
            if !state.ceiling.admits(holders) {
                return;
            }
            let Some(index) = state
                .waiting
                .iter()
                .position(|w| w.request.max_concurrent() as usize >= holders)
            else {
                return;
            };

            let waiter = state.waiting.remove(index);
            if let Some(timer) = waiter.timer {
                self.scheduler.cancel(timer.token);
            }
            self.grant(state, waiter.request);
        }
    }

    fn grant(self: &Arc<Self>, state: &mut LockState, request: LockRequest) {
        let id = request.id().clone();
        state.ceiling = state.ceiling.tighten(request.max_concurrent());

        let expire_timeout = request.expire_timeout();
        let expires_at = expire_timeout.map(|d| self.scheduler.now() + d);
        let timer = match expire_timeout {
            Some(delay) => {
                let ticket = state.issue_ticket();
                Some(self.arm(&id, ticket, delay, LockShared::grant_expired))
            }
            None => None,
        };

        debug!(
            key = %self.key,
            request = %id,
            holders = state.granted.len() + 1,
            ceiling = %state.ceiling,
            "granted"
        );
        request.notify(LockEvent::Granted(self.handle(&id, expires_at)));
        state.granted.insert(
            id,
            Grant {
                request,
                expires_at,
                timer,
            },
        );
    }

    fn cancel_request(&self, id: &RequestId) -> bool {
        let mut state = self.state();
        let Some(index) = state.waiter_index(id) else {
            return false;
        };
        let waiter = state.waiting.remove(index);
        if let Some(timer) = waiter.timer {
            self.scheduler.cancel(timer.token);
        }
        debug!(key = %self.key, request = %id, "cancelled");
        true
    }

    pub(crate) fn release(self: &Arc<Self>, id: &RequestId) -> bool {
        let mut state = self.state();
        self.remove_grant(&mut state, id, Removal::Released)
    }

    fn remove_grant(self: &Arc<Self>, state: &mut LockState, id: &RequestId, why: Removal) -> bool {
        let Some(grant) = state.granted.remove(id) else {
            return false;
        };
        if let Some(timer) = grant.timer {
            self.scheduler.cancel(timer.token);
        }

        let key = self.key.to_string();
        let request = id.clone();
        let event = match why {
            Removal::Released => LockEvent::Released { key, request },
            Removal::Expired => LockEvent::Expired { key, request },
        };
        debug!(key = %self.key, request = %id, event = event.name(), "grant removed");
        grant.request.notify(event);

        if state.ceiling.is_set_by(grant.request.max_concurrent()) {
            state.ceiling =
                Ceiling::from_holders(state.granted.values().map(|g| g.request.max_concurrent()));
        }
        self.admit(state);
        true
    }

    /// Expiry timer callback
    fn grant_expired(self: &Arc<Self>, id: &RequestId, ticket: u64) {
        let mut state = self.state();
        let current = state
            .granted
            .get(id)
            .and_then(|g| g.timer)
            .is_some_and(|t| t.ticket == ticket);
        if current {
            self.remove_grant(&mut state, id, Removal::Expired);
        }
    }

    /// Wait timer callback
    fn wait_expired(self: &Arc<Self>, id: &RequestId, ticket: u64) {
        let mut state = self.state();
        let index = state.waiting.iter().position(|w| {
            w.request.id() == id && w.timer.is_some_and(|t| t.ticket == ticket)
        });
        let Some(index) = index else {
            return;
        };

        let waiter = state.waiting.remove(index);
        let wait_timeout = waiter.request.wait_timeout().unwrap_or_default();
        debug!(key = %self.key, request = %id, "wait timed out");
        waiter.request.notify(LockEvent::TimedOut {
            key: self.key.to_string(),
            request: id.clone(),
            wait_timeout,
        });
    }

    /// Schedule `on_fire` for this lock. The task holds only a weak
    /// reference and does nothing if the lock is gone.
    fn arm(
        self: &Arc<Self>,
        id: &RequestId,
        ticket: u64,
        delay: Duration,
        on_fire: fn(&Arc<LockShared>, &RequestId, u64),
    ) -> Timer {
        let lock = Arc::downgrade(self);
        let id = id.clone();
        let token = self.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(lock) = lock.upgrade() {
                    on_fire(&lock, &id, ticket);
                }
            }),
        );
        Timer { ticket, token }
    }

    fn handle(self: &Arc<Self>, id: &RequestId, expires_at: Option<Instant>) -> LockHandle {
        LockHandle::new(
            Arc::downgrade(self),
            Arc::clone(&self.key),
            id.clone(),
            expires_at,
        )
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
