// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background GC: expired-sandbox deletion, idle-session stop, and
//! orphaned-container sweep (spec §4.10). Each task acquires the same
//! per-sandbox lock request handlers use, so GC never races a live
//! request.

use std::sync::Arc;

use sandbox_core::{Clock, Driver, Store};
use tracing::{info, warn};

use crate::sandbox_manager::SandboxManager;

/// Each task reuses [`SandboxManager::delete`]/[`SandboxManager::stop`] for
/// everything that touches a known sandbox, so the per-sandbox lock those
/// methods already take is what keeps GC from racing request handlers
/// (spec §5) — this type does not need its own lock table.
pub struct Reconciler<C: Clock> {
    sandbox_manager: Arc<SandboxManager<C>>,
    store: Arc<dyn Store>,
    driver: Arc<dyn Driver>,
    clock: C,
}

impl<C: Clock> Reconciler<C> {
    pub fn new(sandbox_manager: Arc<SandboxManager<C>>, store: Arc<dyn Store>, driver: Arc<dyn Driver>, clock: C) -> Self {
        Self {
            sandbox_manager,
            store,
            driver,
            clock,
        }
    }

    /// `expired_sandbox`: delete every non-deleted sandbox whose
    /// `expires_at <= now`.
    pub async fn run_expired_sandbox(&self) -> sandbox_core::Result<usize> {
        let now = self.clock.epoch_ms();
        let expired = self.store.list_expired_sandboxes(now).await?;
        let mut reaped = 0;
        for sandbox in expired {
            match self.sandbox_manager.delete(&sandbox.id, "reconciler.expired_sandbox", "reconciler").await {
                Ok(()) => {
                    info!(sandbox_id = %sandbox.id, "reconciler deleted expired sandbox");
                    reaped += 1;
                }
                Err(e) => {
                    warn!(sandbox_id = %sandbox.id, error = %e, "reconciler failed to delete expired sandbox");
                }
            }
        }
        Ok(reaped)
    }

    /// `idle_session`: stop every sandbox whose attached session has gone
    /// past its `idle_expires_at`.
    pub async fn run_idle_session(&self) -> sandbox_core::Result<usize> {
        let now = self.clock.epoch_ms();
        let idle = self.store.list_idle_sandboxes(now).await?;
        let mut stopped = 0;
        for sandbox in idle {
            match self.sandbox_manager.stop(&sandbox.id).await {
                Ok(_) => {
                    info!(sandbox_id = %sandbox.id, "reconciler stopped idle sandbox");
                    stopped += 1;
                }
                Err(e) => {
                    warn!(sandbox_id = %sandbox.id, error = %e, "reconciler failed to stop idle sandbox");
                }
            }
        }
        Ok(stopped)
    }

    /// `orphaned_container`: destroy every driver-managed container whose
    /// session is not referenced by any current session row.
    pub async fn run_orphaned_container(&self) -> sandbox_core::Result<usize> {
        let live = self.store.list_live_container_ids().await?;
        let managed = self.driver.list_managed().await?;
        let mut destroyed = 0;
        for container in managed {
            if live.contains(&container.container_id) {
                continue;
            }
            match self.driver.destroy(&container.container_id).await {
                Ok(()) => {
                    info!(container_id = %container.container_id, session_id = %container.session_id, "reconciler destroyed orphaned container");
                    destroyed += 1;
                }
                Err(e) => {
                    warn!(container_id = %container.container_id, error = %e, "reconciler failed to destroy orphaned container");
                }
            }
        }
        Ok(destroyed)
    }

    pub async fn run_cycle(&self) {
        if let Err(e) = self.run_expired_sandbox().await {
            warn!(error = %e, "reconciler expired_sandbox task failed");
        }
        if let Err(e) = self.run_idle_session().await {
            warn!(error = %e, "reconciler idle_session task failed");
        }
        if let Err(e) = self.run_orphaned_container().await {
            warn!(error = %e, "reconciler orphaned_container task failed");
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
