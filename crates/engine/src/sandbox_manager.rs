// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns sandbox lifecycle: orchestrates Workspace + Session, claim,
//! keepalive, stop, delete, TTL, and listing (spec §4.5).

use std::sync::Arc;

use sandbox_core::{
    Driver, Error, OwnerId, Result, Sandbox, SandboxId, SandboxPage, Session, Store, WarmState,
    Workspace, WorkspaceId, WorkspaceKind,
};
use tracing::{info, warn};

use crate::lock::SandboxLocks;
use crate::profile_registry::ProfileRegistry;
use crate::session_manager::SessionManager;
use sandbox_core::Clock;

pub struct SandboxManager<C: Clock> {
    store: Arc<dyn Store>,
    driver: Arc<dyn Driver>,
    sessions: Arc<SessionManager<C>>,
    profiles: Arc<dyn ProfileRegistry>,
    locks: Arc<SandboxLocks>,
    clock: C,
}

impl<C: Clock> SandboxManager<C> {
    pub fn new(
        store: Arc<dyn Store>,
        driver: Arc<dyn Driver>,
        sessions: Arc<SessionManager<C>>,
        profiles: Arc<dyn ProfileRegistry>,
        locks: Arc<SandboxLocks>,
        clock: C,
    ) -> Self {
        Self {
            store,
            driver,
            sessions,
            profiles,
            locks,
            clock,
        }
    }

    pub async fn create(
        &self,
        owner: OwnerId,
        profile_id: &str,
        workspace_id: Option<WorkspaceId>,
        ttl_secs: Option<u64>,
    ) -> Result<Sandbox> {
        let profile = self.profiles.get(profile_id)?;
        let now = self.clock.epoch_ms();

        let workspace_id = match workspace_id {
            Some(id) => {
                // Validate it exists; caller-supplied workspaces are external.
                self.store.get_workspace(&id).await?;
                id
            }
            None => self.create_managed_workspace(&owner).await?.id,
        };

        let expires_at = ttl_secs.filter(|&t| t > 0).map(|t| now + t * 1000);

        let sandbox = Sandbox {
            id: SandboxId::new(),
            owner,
            profile_id: profile.id.clone(),
            workspace_id,
            current_session_id: None,
            created_at: now,
            last_active_at: now,
            expires_at,
            idle_expires_at: None,
            deleted_at: None,
            is_warm_pool: false,
            warm_state: None,
            warm_ready_at: None,
            warm_rotate_at: None,
            warm_claimed_at: None,
            warm_source_profile_id: None,
        };

        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        tx.insert_sandbox(&sandbox).await?;
        tx.commit().await?;
        info!(sandbox_id = %sandbox.id, owner = %sandbox.owner, profile_id = %profile_id, "sandbox created");
        Ok(sandbox)
    }

    async fn create_managed_workspace(&self, owner: &OwnerId) -> Result<Workspace> {
        let id = WorkspaceId::new();
        let name = format!("ws-{}", id.suffix());
        self.driver.create_volume(&name, &std::collections::HashMap::new()).await?;
        let workspace = Workspace {
            id,
            owner: owner.clone(),
            driver_ref: name,
            kind: WorkspaceKind::Managed,
        };
        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        tx.insert_workspace(&workspace).await?;
        tx.commit().await?;
        Ok(workspace)
    }

    /// The request-critical idempotent path (spec §4.5).
    pub async fn ensure_running(&self, sandbox_id: &SandboxId) -> Result<Session> {
        let _guard = self.locks.lock(*sandbox_id).await;

        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        let sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
        if sandbox.deleted_at.is_some() {
            return Err(Error::not_found(format!("sandbox {sandbox_id}")));
        }
        let workspace = tx.get_workspace(&sandbox.workspace_id).await?;
        let profile = self.profiles.get(&sandbox.profile_id)?;
        let existing_session_id = sandbox.current_session_id;
        tx.commit().await?;

        let session = match existing_session_id {
            Some(session_id) => self.store.get_session(&session_id).await?,
            None => {
                let session = self.sessions.create(sandbox.id, &workspace, &profile).await?;
                let mut tx = self.store.begin().await?;
                tx.rollback().await?;
                let mut sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
                sandbox.current_session_id = Some(session.id);
                tx.update_sandbox(&sandbox).await?;
                tx.commit().await?;
                session
            }
        };

        let session = self.sessions.ensure_running(session, &workspace, &profile).await?;

        let now = self.clock.epoch_ms();
        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        let mut sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
        sandbox.idle_expires_at = Some(now + profile.idle_timeout_secs * 1000);
        sandbox.last_active_at = now;
        tx.update_sandbox(&sandbox).await?;
        tx.commit().await?;

        Ok(session)
    }

    pub async fn extend_ttl(&self, sandbox_id: &SandboxId, owner: &OwnerId, extend_by_secs: u64) -> Result<Sandbox> {
        let _guard = self.locks.lock(*sandbox_id).await;
        let now = self.clock.epoch_ms();

        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        let mut sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
        if &sandbox.owner != owner {
            return Err(Error::not_found(format!("sandbox {sandbox_id}")));
        }
        let Some(expires_at) = sandbox.expires_at else {
            return Err(Error::conflict("sandbox_ttl_infinite"));
        };
        if expires_at < now {
            return Err(Error::conflict("sandbox_expired"));
        }
        sandbox.expires_at = Some(expires_at.max(now) + extend_by_secs * 1000);
        tx.update_sandbox(&sandbox).await?;
        tx.commit().await?;
        Ok(sandbox)
    }

    pub async fn keepalive(&self, sandbox_id: &SandboxId) -> Result<Sandbox> {
        let _guard = self.locks.lock(*sandbox_id).await;
        let now = self.clock.epoch_ms();

        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        let mut sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
        let profile = self.profiles.get(&sandbox.profile_id)?;
        sandbox.idle_expires_at = Some(now + profile.idle_timeout_secs * 1000);
        sandbox.last_active_at = now;
        tx.update_sandbox(&sandbox).await?;
        tx.commit().await?;
        Ok(sandbox)
    }

    /// Idempotent: stopping an already-stopped sandbox is a no-op.
    pub async fn stop(&self, sandbox_id: &SandboxId) -> Result<Sandbox> {
        let _guard = self.locks.lock(*sandbox_id).await;

        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        let mut sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
        let current_session = match sandbox.current_session_id {
            Some(id) => Some(tx.get_session(&id).await?),
            None => None,
        };
        tx.commit().await?;

        if let Some(session) = current_session {
            self.sessions.stop(session).await?;
        }

        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
        sandbox.current_session_id = None;
        sandbox.idle_expires_at = None;
        tx.update_sandbox(&sandbox).await?;
        tx.commit().await?;
        Ok(sandbox)
    }

    /// Idempotent: deleting an already-deleted sandbox is a no-op.
    pub async fn delete(&self, sandbox_id: &SandboxId, source: &str, request_id: &str) -> Result<()> {
        let guard = self.locks.lock(*sandbox_id).await;

        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        let sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
        if sandbox.deleted_at.is_some() {
            info!(sandbox_id = %sandbox_id, source, request_id, "delete no-op: already soft-deleted");
            drop(guard);
            self.locks.purge(sandbox_id);
            return Ok(());
        }

        let current_session = match sandbox.current_session_id {
            Some(id) => Some(tx.get_session(&id).await?),
            None => None,
        };
        let workspace = tx.get_workspace(&sandbox.workspace_id).await?;
        tx.commit().await?;

        if let Some(session) = current_session {
            self.sessions.destroy(&session).await?;
        }

        let now = self.clock.epoch_ms();
        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        tx.soft_delete_sandbox(sandbox_id, now).await?;
        tx.commit().await?;

        info!(sandbox_id = %sandbox_id, source, request_id, "sandbox soft-deleted");
        drop(guard);

        if workspace.managed() {
            let _ = self.driver.delete_volume(&workspace.driver_ref).await;
            let mut tx = self.store.begin().await?;
            tx.rollback().await?;
            tx.delete_workspace(&workspace.id).await?;
            tx.commit().await?;
        }

        self.locks.purge(sandbox_id);
        Ok(())
    }

    pub async fn list(
        &self,
        owner: &OwnerId,
        status: Option<sandbox_core::SandboxStatus>,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SandboxPage> {
        let page = self.store.list_sandboxes(owner, cursor, limit).await?;
        let Some(wanted) = status else {
            return Ok(page);
        };
        let now = self.clock.epoch_ms();
        let mut items = Vec::with_capacity(page.items.len());
        for sandbox in page.items {
            let session = match sandbox.current_session_id {
                Some(id) => self.store.get_session(&id).await.ok(),
                None => None,
            };
            if sandbox.status(now, session.as_ref()) == wanted {
                items.push(sandbox);
            }
        }
        Ok(SandboxPage { items, next_cursor: page.next_cursor })
    }

    // -- Warm pool methods (spec §4.5) --------------------------------

    pub async fn claim_warm_sandbox(&self, owner: &OwnerId, profile_id: &str, ttl_secs: Option<u64>) -> Result<Option<Sandbox>> {
        let now = self.clock.epoch_ms();
        let expires_at = ttl_secs.filter(|&t| t > 0).map(|t| now + t * 1000);
        for _attempt in 0..3 {
            match self.store.try_claim_warm_sandbox(profile_id, owner, now, expires_at).await? {
                Some(sandbox) => return Ok(Some(sandbox)),
                None => continue,
            }
        }
        Ok(None)
    }

    pub async fn create_warm_sandbox(&self, profile_id: &str, warm_rotate_ttl_secs: u64) -> Result<Sandbox> {
        let profile = self.profiles.get(profile_id)?;
        let owner = OwnerId::warm_pool();
        let now = self.clock.epoch_ms();
        let workspace = self.create_managed_workspace(&owner).await?;

        let sandbox = Sandbox {
            id: SandboxId::new(),
            owner,
            profile_id: profile.id.clone(),
            workspace_id: workspace.id,
            current_session_id: None,
            created_at: now,
            last_active_at: now,
            expires_at: None,
            idle_expires_at: None,
            deleted_at: None,
            is_warm_pool: true,
            warm_state: None,
            warm_ready_at: None,
            warm_rotate_at: Some(now + warm_rotate_ttl_secs * 1000),
            warm_claimed_at: None,
            warm_source_profile_id: Some(profile.id),
        };

        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        tx.insert_sandbox(&sandbox).await?;
        tx.commit().await?;
        Ok(sandbox)
    }

    pub async fn mark_warm_available(&self, sandbox_id: &SandboxId, warm_rotate_ttl_secs: u64) -> Result<()> {
        let now = self.clock.epoch_ms();
        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        let mut sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
        sandbox.warm_state = Some(WarmState::Available);
        sandbox.warm_ready_at = Some(now);
        sandbox.warm_rotate_at = Some(now + warm_rotate_ttl_secs * 1000);
        tx.update_sandbox(&sandbox).await?;
        tx.commit().await
    }

    pub async fn mark_warm_retiring(&self, sandbox_id: &SandboxId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        let mut sandbox = tx.get_sandbox_for_update(sandbox_id).await?;
        if sandbox.warm_state == Some(WarmState::Available) {
            sandbox.warm_state = Some(WarmState::Retiring);
            tx.update_sandbox(&sandbox).await?;
            tx.commit().await?;
        } else {
            warn!(sandbox_id = %sandbox_id, "mark_warm_retiring no-op: not AVAILABLE");
        }
        Ok(())
    }

    /// Best-effort shutdown cleanup (§5): soft-delete every warm-pool
    /// sandbox for `profile_id` that hasn't been claimed yet. A claim
    /// racing this call simply flips `is_warm_pool` to `false` first, so
    /// the claimed sandbox is no longer listed and survives.
    pub async fn drain_warm_pool(&self, profile_id: &str) -> Result<usize> {
        let pool = self.store.list_warm_pool_sandboxes(profile_id).await?;
        let mut drained = 0;
        for sandbox in pool {
            match self.delete(&sandbox.id, "shutdown.drain_warm_pool", "sandboxd").await {
                Ok(()) => {
                    info!(sandbox_id = %sandbox.id, profile_id, "drained warm-pool sandbox on shutdown");
                    drained += 1;
                }
                Err(e) => {
                    warn!(sandbox_id = %sandbox.id, profile_id, error = %e, "failed to drain warm-pool sandbox on shutdown");
                }
            }
        }
        Ok(drained)
    }
}

#[cfg(test)]
#[path = "sandbox_manager_tests.rs"]
mod tests;
