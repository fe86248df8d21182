// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixtures, gated the same way `sandbox-core`'s `test_support`
//! is. Every `*_tests.rs` file in this crate assembles the same handful of
//! fakes (`FakeDriver`, `FakeRuntimeClientFactory`, `MemoryStore`,
//! `FakeClock`, a single-profile registry) wired into a `SandboxManager`;
//! [`Harness`] is that assembly in one place for tests that don't need to
//! vary it, plus `proptest` strategies for the invariants in spec.md §8.

use std::sync::Arc;

use proptest::prelude::*;
use sandbox_adapters::{FakeDriver, FakeRuntimeClientFactory};
use sandbox_core::{Clock, Driver, FakeClock, OwnerId, Profile, RuntimeClientFactory, Store};
use sandbox_storage::MemoryStore;

use crate::lock::SandboxLocks;
use crate::profile_registry::StaticProfileRegistry;
use crate::sandbox_manager::SandboxManager;
use crate::session_manager::SessionManager;

/// A fully wired, in-memory `SandboxManager` plus the fakes behind it, for
/// tests that only need one profile and don't care about its exact shape.
pub struct Harness {
    pub manager: Arc<SandboxManager<FakeClock>>,
    pub driver: Arc<FakeDriver>,
    pub clients: Arc<FakeRuntimeClientFactory>,
    pub store: Arc<MemoryStore>,
    pub clock: FakeClock,
}

impl Harness {
    /// Builds a harness with a single profile named `profile_id`, an empty
    /// warm pool, and no idle timeout.
    pub fn new(profile_id: &str) -> Self {
        Self::with_profile(Profile::builder().id(profile_id).build())
    }

    pub fn with_profile(profile: Profile) -> Self {
        let driver = Arc::new(FakeDriver::new());
        let clients = Arc::new(FakeRuntimeClientFactory::new());
        let store = Arc::new(MemoryStore::new());
        let clock = FakeClock::new();
        let profiles = Arc::new(StaticProfileRegistry::new([profile]));
        let sessions = Arc::new(SessionManager::new(
            driver.clone() as Arc<dyn Driver>,
            store.clone() as Arc<dyn Store>,
            clients.clone() as Arc<dyn RuntimeClientFactory>,
            clock.clone(),
        ));
        let locks = Arc::new(SandboxLocks::new());
        let manager = Arc::new(SandboxManager::new(
            store.clone() as Arc<dyn Store>,
            driver.clone() as Arc<dyn Driver>,
            sessions,
            profiles,
            locks,
            clock.clone(),
        ));
        Self {
            manager,
            driver,
            clients,
            store,
            clock,
        }
    }
}

/// A syntactically valid owner id: `acct_` followed by 1-20 lowercase
/// alphanumerics, matching [`OwnerId::new`]'s validation.
pub fn owner_id_strategy() -> impl Strategy<Value = OwnerId> {
    "[a-z0-9]{1,20}".prop_map(|suffix| OwnerId::new(format!("acct_{suffix}")).expect("strategy produces valid owner ids"))
}

#[cfg(test)]
#[path = "test_support_tests.rs"]
mod tests;
