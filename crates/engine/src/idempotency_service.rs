// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-replay-safe sandbox creation via an `Idempotency-Key` (spec
//! §4.9). `Check`/`Save` are the raw primitives; `create_sandbox` is the
//! composite contract used by the create-sandbox request path: a cache hit
//! returns the stored response with no claim and no warmup enqueued.

use std::sync::Arc;

use sandbox_core::{Clock, IdempotencyKey, IdempotencyRecord, OwnerId, Result, Sandbox, Store, WorkspaceId};
use tracing::info;

use crate::sandbox_manager::SandboxManager;
use crate::warmup_queue::WarmupQueue;

/// Outcome of [`IdempotencyService::check`].
pub enum CheckOutcome {
    /// No record for this key, or one past its `expires_at`; proceed with
    /// the operation.
    Miss,
    /// A record exists with a matching `body_hash`; return it verbatim.
    Hit(IdempotencyRecord),
}

pub struct IdempotencyService<C: Clock> {
    store: Arc<dyn Store>,
    clock: C,
}

impl<C: Clock> IdempotencyService<C> {
    pub fn new(store: Arc<dyn Store>, clock: C) -> Self {
        Self { store, clock }
    }

    /// `Check(owner, key, body_hash)` (spec §4.9): a record whose
    /// `expires_at` has passed is treated as a miss (TTL-bounded), not a
    /// hit; a live record with a differing `body_hash` is a `Conflict` —
    /// the key was reused for a different request body.
    pub async fn check(&self, owner: &OwnerId, key: &IdempotencyKey, body_hash: &str) -> Result<CheckOutcome> {
        let now = self.clock.epoch_ms();
        match self.store.idempotency_get(owner, key, now).await? {
            None => Ok(CheckOutcome::Miss),
            Some(record) if record.body_hash == body_hash => Ok(CheckOutcome::Hit(record)),
            Some(_) => Err(sandbox_core::Error::conflict(format!(
                "idempotency key {:?} reused with a different request body",
                key.as_str()
            ))),
        }
    }

    pub async fn save(&self, record: IdempotencyRecord) -> Result<()> {
        self.store.idempotency_save(record).await
    }
}

/// Result of [`create_sandbox_idempotent`]: either a freshly created
/// sandbox (caller must still save the idempotency record with the real
/// response status/body) or a cached response replayed verbatim.
pub enum CreateSandboxOutcome {
    Created(Sandbox),
    Replayed(IdempotencyRecord),
}

/// The create-sandbox contract (spec §4.9, §9): if `key` is present and
/// `Check` hits, replay the cached response — no claim, no warmup
/// enqueued. On a miss, create (or claim a warm sandbox when `profile_id`
/// has one available), and enqueue a warmup only for the non-claim path —
/// a claimed warm sandbox is already running, so no warmup is queued for
/// it either.
#[allow(clippy::too_many_arguments)]
pub async fn create_sandbox_idempotent<C: Clock>(
    idempotency: &IdempotencyService<C>,
    sandbox_manager: &SandboxManager<C>,
    warmup_queue: &WarmupQueue,
    owner: OwnerId,
    profile_id: &str,
    workspace_id: Option<WorkspaceId>,
    ttl_secs: Option<u64>,
    idempotency_key: Option<&IdempotencyKey>,
    body_hash: &str,
) -> Result<CreateSandboxOutcome> {
    if let Some(key) = idempotency_key {
        if let CheckOutcome::Hit(record) = idempotency.check(&owner, key, body_hash).await? {
            info!(owner = %owner, key = %key.as_str(), "idempotent create-sandbox replay");
            return Ok(CreateSandboxOutcome::Replayed(record));
        }
    }

    let claimed = sandbox_manager.claim_warm_sandbox(&owner, profile_id, ttl_secs).await?;
    let sandbox = match claimed {
        Some(sandbox) => sandbox,
        None => {
            let sandbox = sandbox_manager.create(owner, profile_id, workspace_id, ttl_secs).await?;
            warmup_queue.enqueue(sandbox.id, sandbox.owner.clone());
            sandbox
        }
    };

    Ok(CreateSandboxOutcome::Created(sandbox))
}

#[cfg(test)]
#[path = "idempotency_service_tests.rs"]
mod tests;
