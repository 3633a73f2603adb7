// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide map from lock key to lock
//!
//! Locks are created on first lookup and kept for the life of the
//! registry, so every lookup of a key returns the same instance.

use crate::lock::{Lock, LockSnapshot};
use crate::timer::TimeoutScheduler;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Creates and owns every lock in the process
pub struct LockRegistry {
    scheduler: Arc<dyn TimeoutScheduler>,
    locks: Mutex<HashMap<String, Lock>>,
}

impl LockRegistry {
    pub fn new(scheduler: Arc<dyn TimeoutScheduler>) -> Self {
        Self {
            scheduler,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The lock for `key`, created if this is the first reference
    pub fn get(&self, key: &str) -> Lock {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(key) {
            return lock.clone();
        }
        tracing::debug!(key, "creating lock");
        let lock = Lock::new(key, Arc::clone(&self.scheduler));
        locks.insert(key.to_string(), lock.clone());
        lock
    }

    /// The lock for `key` if it has been referenced before
    pub fn find(&self, key: &str) -> Option<Lock> {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every lock that currently has holders or waiters
    pub fn active(&self) -> Vec<(String, LockSnapshot)> {
        let locks: Vec<Lock> = self
            .locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();

        // Per-lock state is read after the map mutex is released
        let mut active: Vec<_> = locks
            .into_iter()
            .filter(|lock| !lock.is_idle())
            .map(|lock| (lock.key().to_string(), lock.snapshot()))
            .collect();
        active.sort_by(|a, b| a.0.cmp(&b.0));
        active
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
