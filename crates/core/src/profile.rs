// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime profile: the configuration value (not a stored entity) that
//! parameterizes container image, resource caps, capabilities, and the
//! warm pool for one class of sandbox.

use std::collections::HashMap;

/// Named configuration bundle describing the containers a sandbox of this
/// profile runs. Profiles are not persisted as entities; they're loaded
/// from configuration (`sandboxd::config`) and referenced by `id`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Profile {
    pub id: String,
    pub image: String,
    pub cpus: f64,
    /// Human-readable memory cap, e.g. `"1g"`, `"512m"`. Use
    /// [`Profile::memory_bytes`] for the parsed value.
    pub memory: String,
    pub capabilities: Vec<String>,
    pub idle_timeout_secs: u64,
    pub runtime_port: u16,
    pub warm_pool_size: u32,
    pub warm_rotate_ttl_secs: u64,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Profile {
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    /// Parse `memory` (`"1g"`, `"512m"`, `"2048k"`, or a bare byte count)
    /// into a byte count.
    pub fn memory_bytes(&self) -> crate::Result<u64> {
        parse_memory(&self.memory)
    }
}

/// Parse a human memory string (`"1g"`, `"512m"`, `"2048k"`, `"1073741824"`)
/// into bytes. Case-insensitive suffix; no suffix means bytes.
pub fn parse_memory(s: &str) -> crate::Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::validation("empty memory spec"));
    }
    let (digits, mult) = match s.chars().last() {
        Some(c) if c.eq_ignore_ascii_case(&'g') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        Some(c) if c.eq_ignore_ascii_case(&'m') => (&s[..s.len() - 1], 1024 * 1024),
        Some(c) if c.eq_ignore_ascii_case(&'k') => (&s[..s.len() - 1], 1024),
        _ => (s, 1),
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| crate::Error::validation(format!("invalid memory spec: {s:?}")))?;
    value
        .checked_mul(mult)
        .ok_or_else(|| crate::Error::validation(format!("memory spec overflows: {s:?}")))
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct ProfileBuilder => Profile {
        into { id: String = "python-default" }
        into { image: String = "ship:latest" }
        set { cpus: f64 = 1.0 }
        into { memory: String = "1g" }
        set { capabilities: Vec<String> = vec!["filesystem".into(), "shell".into(), "ipython".into()] }
        set { idle_timeout_secs: u64 = 1800 }
        set { runtime_port: u16 = 8000 }
        set { warm_pool_size: u32 = 0 }
        set { warm_rotate_ttl_secs: u64 = 1800 }
        computed { env: HashMap<String, String> = HashMap::new() }
    }
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
