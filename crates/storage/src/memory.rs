// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`Store`] implementation.
//!
//! This backend has no snapshot isolation of its own — every operation
//! takes the single global [`parking_lot::Mutex`] for the duration of the
//! call and observes the latest committed state, so the rollback-and-refetch
//! discipline required by engines with snapshot isolation (§5 of the
//! design) is trivially satisfied here: [`MemoryTx::rollback`] and
//! [`MemoryTx::commit`] are no-ops. Cross-request serialisation for a given
//! sandbox is the engine's per-sandbox keyed mutex, not this store.

use std::collections::HashMap;

use parking_lot::Mutex;
use sandbox_core::{
    Error, IdempotencyKey, IdempotencyRecord, OwnerId, Result, Sandbox, SandboxId, Session,
    SessionId, Store, WarmState, Workspace, WorkspaceId,
};
use sandbox_core::store::{SandboxPage, Tx};

#[derive(Default)]
struct Inner {
    sandboxes: HashMap<SandboxId, Sandbox>,
    /// Insertion order, stable for cursor paging (§4.5 `List`).
    sandbox_order: Vec<SandboxId>,
    sessions: HashMap<SessionId, Session>,
    workspaces: HashMap<WorkspaceId, Workspace>,
    idempotency: HashMap<(OwnerId, IdempotencyKey), IdempotencyRecord>,
}

/// The reference in-memory [`Store`]. Cheap to clone via `Arc` at the call
/// site; `sandboxd` constructs exactly one and shares it across the engine.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_sandbox_locked(inner: &mut Inner, sandbox: Sandbox) {
        if !inner.sandboxes.contains_key(&sandbox.id) {
            inner.sandbox_order.push(sandbox.id);
        }
        inner.sandboxes.insert(sandbox.id, sandbox);
    }
}

struct MemoryTx<'a> {
    store: &'a MemoryStore,
}

#[async_trait::async_trait]
impl<'a> Tx for MemoryTx<'a> {
    async fn rollback(&mut self) -> Result<()> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    async fn get_sandbox_for_update(&mut self, id: &SandboxId) -> Result<Sandbox> {
        self.store.get_sandbox(id).await
    }

    async fn get_session(&mut self, id: &SessionId) -> Result<Session> {
        self.store.get_session(id).await
    }

    async fn get_workspace(&mut self, id: &WorkspaceId) -> Result<Workspace> {
        self.store.get_workspace(id).await
    }

    async fn insert_sandbox(&mut self, sandbox: &Sandbox) -> Result<()> {
        let mut inner = self.store.inner.lock();
        MemoryStore::insert_sandbox_locked(&mut inner, sandbox.clone());
        Ok(())
    }

    async fn update_sandbox(&mut self, sandbox: &Sandbox) -> Result<()> {
        let mut inner = self.store.inner.lock();
        if !inner.sandboxes.contains_key(&sandbox.id) {
            return Err(Error::not_found(format!("sandbox {}", sandbox.id)));
        }
        inner.sandboxes.insert(sandbox.id, sandbox.clone());
        Ok(())
    }

    async fn soft_delete_sandbox(&mut self, id: &SandboxId, now: u64) -> Result<()> {
        let mut inner = self.store.inner.lock();
        let sandbox = inner
            .sandboxes
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("sandbox {id}")))?;
        if sandbox.deleted_at.is_none() {
            sandbox.deleted_at = Some(now);
            sandbox.current_session_id = None;
        }
        Ok(())
    }

    async fn insert_session(&mut self, session: &Session) -> Result<()> {
        self.store.inner.lock().sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn update_session(&mut self, session: &Session) -> Result<()> {
        let mut inner = self.store.inner.lock();
        if !inner.sessions.contains_key(&session.id) {
            return Err(Error::not_found(format!("session {}", session.id)));
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn delete_session(&mut self, id: &SessionId) -> Result<()> {
        self.store.inner.lock().sessions.remove(id);
        Ok(())
    }

    async fn insert_workspace(&mut self, workspace: &Workspace) -> Result<()> {
        self.store
            .inner
            .lock()
            .workspaces
            .insert(workspace.id, workspace.clone());
        Ok(())
    }

    async fn delete_workspace(&mut self, id: &WorkspaceId) -> Result<()> {
        self.store.inner.lock().workspaces.remove(id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Tx + '_>> {
        Ok(Box::new(MemoryTx { store: self }))
    }

    async fn get_sandbox(&self, id: &SandboxId) -> Result<Sandbox> {
        self.inner
            .lock()
            .sandboxes
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("sandbox {id}")))
    }

    async fn get_session(&self, id: &SessionId) -> Result<Session> {
        self.inner
            .lock()
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("session {id}")))
    }

    async fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace> {
        self.inner
            .lock()
            .workspaces
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("workspace {id}")))
    }

    async fn list_sandboxes(
        &self,
        owner: &OwnerId,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<SandboxPage> {
        let limit = limit.max(1) as usize;
        let batch_size = (5 * limit).clamp(50, 500);
        let scan_cap = (20 * limit).max(1000);

        let inner = self.inner.lock();
        let start = match cursor {
            Some(c) => inner
                .sandbox_order
                .iter()
                .position(|id| id.as_str() == c)
                .map(|pos| pos + 1)
                .unwrap_or(0),
            None => 0,
        };

        let mut items = Vec::with_capacity(limit.min(batch_size));
        let mut scanned = 0usize;
        let mut last_scanned: Option<SandboxId> = None;

        for id in inner.sandbox_order.iter().skip(start) {
            if scanned >= scan_cap || items.len() >= limit {
                break;
            }
            scanned += 1;
            last_scanned = Some(*id);
            let Some(sandbox) = inner.sandboxes.get(id) else {
                continue;
            };
            if sandbox.deleted_at.is_some() || sandbox.is_warm_pool {
                continue;
            }
            if &sandbox.owner != owner {
                continue;
            }
            items.push(sandbox.clone());
        }

        let next_cursor = if items.len() >= limit {
            last_scanned.map(|id| id.to_string())
        } else if scanned >= scan_cap {
            last_scanned.map(|id| id.to_string())
        } else {
            None
        };

        Ok(SandboxPage { items, next_cursor })
    }

    async fn list_expired_sandboxes(&self, now: u64) -> Result<Vec<Sandbox>> {
        let inner = self.inner.lock();
        Ok(inner
            .sandboxes
            .values()
            .filter(|s| s.deleted_at.is_none() && s.expires_at.map(|t| t <= now).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn list_idle_sandboxes(&self, now: u64) -> Result<Vec<Sandbox>> {
        let inner = self.inner.lock();
        Ok(inner
            .sandboxes
            .values()
            .filter(|s| {
                s.deleted_at.is_none()
                    && s.current_session_id.is_some()
                    && s.idle_expires_at.map(|t| t <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn list_live_container_ids(&self) -> Result<std::collections::HashSet<String>> {
        let inner = self.inner.lock();
        Ok(inner.sessions.values().filter_map(|s| s.container_id.clone()).collect())
    }

    async fn count_warm(&self, profile_id: &str, state: Option<WarmState>) -> Result<u64> {
        let inner = self.inner.lock();
        let count = inner
            .sandboxes
            .values()
            .filter(|s| {
                s.is_warm_pool
                    && s.deleted_at.is_none()
                    && s.profile_id == profile_id
                    && s.warm_state == state
            })
            .count();
        Ok(count as u64)
    }

    async fn list_warm_due_for_rotation(&self, profile_id: &str, now: u64) -> Result<Vec<Sandbox>> {
        let inner = self.inner.lock();
        Ok(inner
            .sandboxes
            .values()
            .filter(|s| {
                s.is_warm_pool
                    && s.deleted_at.is_none()
                    && s.profile_id == profile_id
                    && s.warm_state == Some(WarmState::Available)
                    && s.warm_rotate_at.map(|t| t <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn list_warm_pool_sandboxes(&self, profile_id: &str) -> Result<Vec<Sandbox>> {
        let inner = self.inner.lock();
        Ok(inner
            .sandboxes
            .values()
            .filter(|s| s.is_warm_pool && s.deleted_at.is_none() && s.profile_id == profile_id)
            .cloned()
            .collect())
    }

    async fn try_claim_warm_sandbox(
        &self,
        profile_id: &str,
        owner: &OwnerId,
        now: u64,
        expires_at: Option<u64>,
    ) -> Result<Option<Sandbox>> {
        let mut inner = self.inner.lock();
        let candidate_id = inner
            .sandboxes
            .values()
            .filter(|s| {
                s.is_warm_pool
                    && s.warm_state == Some(WarmState::Available)
                    && s.profile_id == profile_id
                    && s.deleted_at.is_none()
            })
            .min_by_key(|s| s.warm_ready_at.unwrap_or(0))
            .map(|s| s.id);

        let Some(id) = candidate_id else {
            return Ok(None);
        };

        // Re-assert every precondition, as the conditional UPDATE would.
        let Some(sandbox) = inner.sandboxes.get_mut(&id) else {
            return Ok(None);
        };
        if !sandbox.is_warm_pool
            || sandbox.warm_state != Some(WarmState::Available)
            || sandbox.profile_id != profile_id
            || sandbox.deleted_at.is_some()
        {
            return Ok(None);
        }

        sandbox.warm_state = Some(WarmState::Claimed);
        sandbox.is_warm_pool = false;
        sandbox.owner = owner.clone();
        sandbox.warm_claimed_at = Some(now);
        sandbox.last_active_at = now;
        sandbox.expires_at = expires_at;

        Ok(Some(sandbox.clone()))
    }

    async fn idempotency_get(
        &self,
        owner: &OwnerId,
        key: &IdempotencyKey,
        now: u64,
    ) -> Result<Option<IdempotencyRecord>> {
        Ok(self
            .inner
            .lock()
            .idempotency
            .get(&(owner.clone(), key.clone()))
            .filter(|record| record.expires_at > now)
            .cloned())
    }

    async fn idempotency_save(&self, record: IdempotencyRecord) -> Result<()> {
        let key = (record.owner.clone(), record.key.clone());
        self.inner.lock().idempotency.insert(key, record);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
