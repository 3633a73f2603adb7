// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic scheduler for tests
//!
//! Time only moves when [`ManualScheduler::advance`] is called. Due tasks
//! fire in deadline order (ties in scheduling order), each one outside the
//! scheduler's own mutex so tasks may schedule or cancel further timers.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{TimeoutScheduler, TimerTask, TimerToken};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    fire_at: Duration,
    token: TimerToken,
    task: TimerTask,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.token == other.token
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on (deadline, token)
        Reverse((self.fire_at, self.token)).cmp(&Reverse((other.fire_at, other.token)))
    }
}

struct State {
    elapsed: Duration,
    next_token: u64,
    queue: BinaryHeap<Entry>,
    live: HashSet<TimerToken>,
}

/// Scheduler driven by an explicit virtual clock
pub struct ManualScheduler {
    origin: Instant,
    state: Mutex<State>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(State {
                elapsed: Duration::ZERO,
                next_token: 1,
                queue: BinaryHeap::new(),
                live: HashSet::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Virtual time since construction
    pub fn elapsed(&self) -> Duration {
        self.state().elapsed
    }

    /// Number of timers still waiting to fire
    pub fn pending(&self) -> usize {
        self.state().live.len()
    }

    /// Move the clock forward, firing every task that falls due on the way
    pub fn advance(&self, by: Duration) {
        let target = self.state().elapsed + by;

        loop {
            let task = {
                let mut state = self.state();
                let due = state.queue.peek().is_some_and(|e| e.fire_at <= target);
                if !due {
                    break;
                }
                let Some(entry) = state.queue.pop() else {
                    break;
                };
                state.elapsed = state.elapsed.max(entry.fire_at);
                if !state.live.remove(&entry.token) {
                    continue;
                }
                entry.task
            };
            task();
        }

        self.state().elapsed = target;
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutScheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.origin + self.state().elapsed
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerToken {
        let mut state = self.state();
        let token = TimerToken::new(state.next_token);
        state.next_token += 1;
        let fire_at = state.elapsed + delay;
        state.live.insert(token);
        state.queue.push(Entry {
            fire_at,
            token,
            task,
        });
        token
    }

    fn cancel(&self, token: TimerToken) {
        self.state().live.remove(&token);
    }
}

#[cfg(test)]
#[path = "manual_tests.rs"]
mod tests;
