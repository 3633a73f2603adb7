// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-client session state.
//!
//! A connection owns one request id per key it has asked for. The id is
//! reused across repeated `lock` commands on that key, so a second `lock`
//! while holding is a re-grant, and dropped on a successful `release`.
//! Everything still tracked is cancelled and released when the client
//! quits or disconnects.

use std::collections::HashMap;
use std::sync::Arc;

use kl_core::{
    EventSink, IdGen, LockEvent, LockRegistry, LockRequest, RequestId, UuidIdGen,
};
use tracing::{debug, warn};

use crate::protocol::{self, Command, Reply, Status};

/// What the server loop should do after a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Write this reply and keep reading
    Reply(Reply),
    /// Nothing to write now; the answer arrives as an event
    Pending,
    /// Stop serving this client
    Close,
}

pub struct Connection<G: IdGen = UuidIdGen> {
    registry: Arc<LockRegistry>,
    ids: G,
    default_expire_ms: i64,
    sink: EventSink,
    requests: HashMap<String, RequestId>,
}

impl<G: IdGen> Connection<G> {
    pub fn new(registry: Arc<LockRegistry>, ids: G, default_expire_ms: i64, sink: EventSink) -> Self {
        Self {
            registry,
            ids,
            default_expire_ms,
            sink,
            requests: HashMap::new(),
        }
    }

    /// Keys this client currently has a request on
    pub fn tracked(&self) -> usize {
        self.requests.len()
    }

    /// Parse and execute one request line
    pub fn handle_line(&mut self, line: &str) -> Flow {
        match protocol::parse_command(line) {
            Ok(command) => self.execute(command),
            Err(e) => {
                debug!(error = %e, "rejecting line");
                Flow::Reply(Reply::bare(Status::InvalidCommand))
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Lock {
                key,
                max_concurrent,
                wait_timeout_ms,
                expire_timeout_ms,
            } => self.lock(
                key,
                max_concurrent,
                wait_timeout_ms,
                expire_timeout_ms.unwrap_or(self.default_expire_ms),
            ),
            Command::Release { key } => Flow::Reply(self.release(key)),
            Command::Quit => {
                self.release_all();
                Flow::Close
            }
        }
    }

    fn lock(
        &mut self,
        key: String,
        max_concurrent: i64,
        wait_timeout_ms: i64,
        expire_timeout_ms: i64,
    ) -> Flow {
        let fresh = !self.requests.contains_key(&key);
        let id = self
            .requests
            .entry(key.clone())
            .or_insert_with(|| self.ids.next_request())
            .clone();

        // Out-of-range values collapse to 0 so the lock rejects them
        let max_concurrent = u32::try_from(max_concurrent).unwrap_or(0);
        let request = LockRequest::new(id, self.sink.clone())
            .with_max_concurrent(max_concurrent)
            .with_wait_timeout_ms(wait_timeout_ms)
            .with_expire_timeout_ms(expire_timeout_ms);

        match self.registry.get(&key).request_lock(request) {
            Ok(outcome) => {
                debug!(key = %key, ?outcome, "lock requested");
                Flow::Pending
            }
            Err(e) => {
                warn!(key = %key, error = %e, "lock request rejected");
                if fresh {
                    self.requests.remove(&key);
                }
                Flow::Reply(Reply::keyed(Status::InvalidArgument, key))
            }
        }
    }

    fn release(&mut self, key: String) -> Reply {
        let released = self
            .requests
            .get(&key)
            .is_some_and(|id| self.registry.get(&key).release(id));

        if released {
            self.requests.remove(&key);
            Reply::keyed(Status::Released, key)
        } else {
            Reply::keyed(Status::NotReleased, key)
        }
    }

    /// Translate a lock event into the line owed to this client
    pub fn on_event(&self, event: LockEvent) -> Option<Reply> {
        match event {
            LockEvent::Granted(handle) => Some(Reply::keyed(Status::Locked, handle.key())),
            LockEvent::Expired { key, .. } => Some(Reply::keyed(Status::Expired, key)),
            LockEvent::TimedOut { key, .. } => Some(Reply::keyed(Status::Timeout, key)),
            LockEvent::Released { .. } => None,
        }
    }

    /// Render a reply with the lock's counts as they are now
    pub fn render(&self, reply: &Reply) -> String {
        let snapshot = reply
            .key
            .as_deref()
            .and_then(|key| self.registry.find(key))
            .map(|lock| lock.snapshot());
        protocol::render(reply, snapshot)
    }

    /// Withdraw every waiting request and give up every grant
    pub fn release_all(&mut self) {
        for (key, id) in self.requests.drain() {
            let lock = self.registry.get(&key);
            let cancelled = lock.cancel_request(&id);
            let released = lock.release(&id);
            debug!(key = %key, request = %id, cancelled, released, "cleaned up request");
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
