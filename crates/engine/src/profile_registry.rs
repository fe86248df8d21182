// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lookup of a [`Profile`] by id. `sandboxd::config` owns loading profiles
//! from TOML; the engine only needs to resolve `profile_id` strings stored
//! on `Sandbox`/`Session` rows back to their configuration.

use std::collections::HashMap;

use sandbox_core::{Error, Profile, Result};

pub trait ProfileRegistry: Send + Sync {
    fn get(&self, profile_id: &str) -> Result<Profile>;

    /// Every configured profile, for the Warm Pool Scheduler's per-cycle
    /// sweep over profiles with `warm_pool_size > 0` (spec §4.7).
    fn all(&self) -> Vec<Profile>;
}

/// A fixed, immutable set of profiles loaded once at start-up.
#[derive(Debug, Clone, Default)]
pub struct StaticProfileRegistry {
    profiles: HashMap<String, Profile>,
}

impl StaticProfileRegistry {
    pub fn new(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }
}

impl ProfileRegistry for StaticProfileRegistry {
    fn get(&self, profile_id: &str) -> Result<Profile> {
        self.profiles
            .get(profile_id)
            .cloned()
            .ok_or_else(|| Error::validation(format!("unknown profile {profile_id:?}")))
    }

    fn all(&self) -> Vec<Profile> {
        self.profiles.values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "profile_registry_tests.rs"]
mod tests;
