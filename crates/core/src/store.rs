// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional persistence contract. Concrete implementation
//! (`MemoryStore`) lives in `sandbox-storage`; the engine depends only on
//! this trait.
//!
//! `Tx` models `SelectForUpdate` + the rollback-and-refetch discipline
//! (§5): on an engine without real row locks, `rollback` is required to
//! discard any cached reads so the next `get_*_for_update` call inside the
//! same critical section observes the latest committed state.

use crate::idempotency::{IdempotencyKey, IdempotencyRecord};
use crate::owner::OwnerId;
use crate::sandbox::{Sandbox, SandboxId, WarmState};
use crate::session::{Session, SessionId};
use crate::workspace::{Workspace, WorkspaceId};

/// A page of sandboxes plus a continuation cursor.
///
/// Per §4.5 `List`: scanning is bounded at `max(20*limit, 1000)` rows; if
/// that cap is hit before the page fills, `next_cursor` is returned so the
/// caller can continue rather than conclude the listing is exhausted.
#[derive(Debug, Clone, Default)]
pub struct SandboxPage {
    pub items: Vec<Sandbox>,
    pub next_cursor: Option<String>,
}

/// One unit of work under the per-id locking discipline described in §5.
///
/// A `Tx` is obtained from [`Store::begin`], used for a single critical
/// section, and always either `commit`ed or `rollback`ack — never both.
#[async_trait::async_trait]
pub trait Tx: Send {
    /// Discard any transaction-local cached reads and start fresh. Called
    /// at the top of every locked critical section before the first
    /// `get_*_for_update`, per the rollback-and-refetch pattern.
    async fn rollback(&mut self) -> crate::Result<()>;

    async fn commit(&mut self) -> crate::Result<()>;

    /// Row-lock (or in-process-mutex-fallback) read of a sandbox.
    async fn get_sandbox_for_update(&mut self, id: &SandboxId) -> crate::Result<Sandbox>;

    async fn get_session(&mut self, id: &SessionId) -> crate::Result<Session>;

    async fn get_workspace(&mut self, id: &WorkspaceId) -> crate::Result<Workspace>;

    async fn insert_sandbox(&mut self, sandbox: &Sandbox) -> crate::Result<()>;

    async fn update_sandbox(&mut self, sandbox: &Sandbox) -> crate::Result<()>;

    /// Set `deleted_at`; does not physically remove the row.
    async fn soft_delete_sandbox(&mut self, id: &SandboxId, now: u64) -> crate::Result<()>;

    async fn insert_session(&mut self, session: &Session) -> crate::Result<()>;

    async fn update_session(&mut self, session: &Session) -> crate::Result<()>;

    /// Physically remove the session row (§3: "Destruction removes the row").
    async fn delete_session(&mut self, id: &SessionId) -> crate::Result<()>;

    async fn insert_workspace(&mut self, workspace: &Workspace) -> crate::Result<()>;

    async fn delete_workspace(&mut self, id: &WorkspaceId) -> crate::Result<()>;
}

/// Persistence contract consumed by the engine. Implementations must make
/// every method safe to call concurrently across distinct ids (§4.2-style
/// contract, applied to storage).
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Begin a unit of work; the first call inside it should be a
    /// `rollback` to establish the rollback-and-refetch discipline.
    async fn begin(&self) -> crate::Result<Box<dyn Tx + '_>>;

    async fn get_sandbox(&self, id: &SandboxId) -> crate::Result<Sandbox>;

    async fn get_session(&self, id: &SessionId) -> crate::Result<Session>;

    async fn get_workspace(&self, id: &WorkspaceId) -> crate::Result<Workspace>;

    /// List non-deleted, non-warm-pool sandboxes for `owner` in id order.
    async fn list_sandboxes(
        &self,
        owner: &OwnerId,
        cursor: Option<&str>,
        limit: u32,
    ) -> crate::Result<SandboxPage>;

    /// Count warm-pool sandboxes for `profile_id` in the given state, plus
    /// those still `warm_state IS NULL` (pending) when `state` is `None`.
    async fn count_warm(&self, profile_id: &str, state: Option<WarmState>) -> crate::Result<u64>;

    /// List warm-pool sandboxes for `profile_id` in state `AVAILABLE` whose
    /// `warm_rotate_at <= now`.
    async fn list_warm_due_for_rotation(
        &self,
        profile_id: &str,
        now: u64,
    ) -> crate::Result<Vec<Sandbox>>;

    /// Every non-deleted, not-yet-claimed warm-pool sandbox for `profile_id`,
    /// regardless of state (pending or available). Used by the shutdown
    /// drain (§5), never by request-path code.
    async fn list_warm_pool_sandboxes(&self, profile_id: &str) -> crate::Result<Vec<Sandbox>>;

    /// Non-deleted sandboxes, across every owner, with `expires_at <= now`
    /// (reconciler's `expired_sandbox` task, §4.10).
    async fn list_expired_sandboxes(&self, now: u64) -> crate::Result<Vec<Sandbox>>;

    /// Non-deleted sandboxes with a live session and `idle_expires_at <=
    /// now` (reconciler's `idle_session` task, §4.10).
    async fn list_idle_sandboxes(&self, now: u64) -> crate::Result<Vec<Sandbox>>;

    /// Every `container_id` referenced by a current session row, live or
    /// not — the reconciler's orphan sweep treats any driver-reported
    /// container outside this set as unreferenced (§4.10).
    async fn list_live_container_ids(&self) -> crate::Result<std::collections::HashSet<String>>;

    /// Atomic conditional claim (§4.5 `ClaimWarmSandbox` step 2): re-asserts
    /// every precondition in the update itself. Returns `Ok(None)` if no
    /// row matched (either nothing available, or a competing claim won).
    async fn try_claim_warm_sandbox(
        &self,
        profile_id: &str,
        owner: &OwnerId,
        now: u64,
        expires_at: Option<u64>,
    ) -> crate::Result<Option<Sandbox>>;

    /// Returns `None` for a missing record *or* one whose `expires_at <= now`
    /// — an expired key is a miss, not a hit (spec §4.9 "TTL-bounded").
    async fn idempotency_get(
        &self,
        owner: &OwnerId,
        key: &IdempotencyKey,
        now: u64,
    ) -> crate::Result<Option<IdempotencyRecord>>;

    async fn idempotency_save(&self, record: IdempotencyRecord) -> crate::Result<()>;
}
