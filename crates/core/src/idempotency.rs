// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-replay-safe create via an `Idempotency-Key`.

/// A validated `Idempotency-Key` header value.
///
/// Keys must be non-empty, printable, and whitespace-free — this guarantees
/// a client never accidentally shares a key between unrelated operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(raw: impl Into<String>) -> crate::Result<Self> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_graphic() || (!c.is_whitespace() && !c.is_control()));
        if !valid {
            return Err(crate::Error::conflict(format!(
                "invalid idempotency key: {raw:?}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stored record: `(owner, key) -> (body_hash, response_body, response_status, created_at)`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IdempotencyRecord {
    pub owner: crate::OwnerId,
    pub key: IdempotencyKey,
    pub body_hash: String,
    pub response_status: u16,
    pub response_body: serde_json::Value,
    pub created_at: u64,
    /// Entry expires and may be purged at or after this wall-clock time.
    pub expires_at: u64,
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
