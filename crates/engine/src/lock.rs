// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide keyed mutex over `sandbox_id`, per spec §5: protects
//! `EnsureRunning`, `Stop`, `Delete`, `ExtendTTL` for a given sandbox, and
//! is shared by reconciler tasks so GC cannot race request handlers.
//! Entries are created on first use and purged after the final `Delete`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sandbox_core::SandboxId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct SandboxLocks {
    entries: Mutex<HashMap<SandboxId, Arc<AsyncMutex<()>>>>,
}

impl SandboxLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: SandboxId) -> Arc<AsyncMutex<()>> {
        self.entries
            .lock()
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquire the lock for `id`, creating the entry if this is the first
    /// caller to touch it.
    pub async fn lock(&self, id: SandboxId) -> OwnedMutexGuard<()> {
        self.entry(id).lock_owned().await
    }

    /// Drop the lock entry for `id`. Only safe to call once no guard for
    /// `id` is outstanding — i.e. after a successful `Delete` has released
    /// its guard.
    pub fn purge(&self, id: &SandboxId) {
        self.entries.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
