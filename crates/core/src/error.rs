// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised by the lock state machine

use thiserror::Error;

/// Errors returned synchronously by [`Lock::request_lock`](crate::Lock::request_lock).
///
/// A rejected request is neither queued nor granted; the lock is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("invalid argument: {field} {constraint} (got {value})")]
    InvalidArgument {
        field: &'static str,
        constraint: &'static str,
        value: i64,
    },
}

impl LockError {
    pub(crate) fn invalid(field: &'static str, constraint: &'static str, value: i64) -> Self {
        LockError::InvalidArgument {
            field,
            constraint,
            value,
        }
    }
}
