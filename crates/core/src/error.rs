// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single error type shared by every `sandbox-*` crate.

use std::time::Duration;

/// Result alias used throughout the `sandbox-*` crates.
pub type Result<T> = std::result::Result<T, Error>;

/// All error kinds a caller of this crate's public API can observe.
///
/// Downstream HTTP (or other transport) layers map each variant to a status
/// code; this crate never performs that mapping itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The sandbox/session/workspace does not exist, or is soft-deleted for
    /// a caller that must not observe it.
    #[error("not found: {0}")]
    NotFound(String),

    /// A request field failed validation (bad profile, bad path, bad key).
    #[error("validation error: {0}")]
    Validation(String),

    /// Optimistic-concurrency or idempotency-key conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The session is mid start-up; retry after the given hint.
    #[error("session not ready, retry after {}ms", .retry_after_ms)]
    SessionNotReady {
        sandbox_id: String,
        retry_after_ms: u64,
    },

    /// The profile's runtime does not expose the requested capability.
    #[error("capability {requested:?} not supported (available: {available:?})")]
    CapabilityNotSupported {
        requested: String,
        available: Vec<String>,
    },

    /// Non-retriable infrastructure error from the Driver.
    #[error("driver error: {0}")]
    DriverError(String),

    /// The in-container runtime responded with an error; forwarded verbatim.
    #[error("runtime error: {0}")]
    RuntimeError(String),

    /// A deadline expired waiting on the driver or runtime.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A retriable storage or transport hiccup; callers may retry once.
    #[error("transient error: {0}")]
    Transient(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn session_not_ready(sandbox_id: impl Into<String>, retry_after_ms: u64) -> Self {
        Self::SessionNotReady {
            sandbox_id: sandbox_id.into(),
            retry_after_ms,
        }
    }

    /// True for errors that a caller may retry once with a small backoff, per
    /// the error-handling policy: transient store/driver hiccups get one
    /// retry, nothing else does.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
