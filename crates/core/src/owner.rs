// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant identity. A sandbox, workspace, and idempotency key all scope to
//! an `OwnerId` — an opaque tenant identifier handed to us by the
//! (external, out of scope) authentication layer.

use std::fmt;

/// Opaque tenant identifier.
///
/// Unlike the `{prefix}{nanoid}` IDs generated by [`crate::define_id!`], an
/// `OwnerId` is supplied by the caller (a user id, API key id, or service
/// account name from the external auth layer), so it is a thin validated
/// wrapper around `String` rather than a generated [`crate::id::IdBuf`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// The special owner used for sandboxes sitting in a warm pool, not yet
    /// claimed by a tenant.
    pub const WARM_POOL: &'static str = "warm-pool";

    pub fn new(raw: impl Into<String>) -> crate::Result<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(crate::Error::validation(format!(
                "invalid owner id: {raw:?}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn warm_pool() -> Self {
        Self(Self::WARM_POOL.to_string())
    }

    pub fn is_warm_pool(&self) -> bool {
        self.0 == Self::WARM_POOL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "owner_tests.rs"]
mod tests;
