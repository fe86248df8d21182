// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The user-visible handle to an isolated environment.

use crate::session::{Session, SessionId, SessionState};
use crate::workspace::WorkspaceId;

crate::define_id! {
    /// Identifier for a [`Sandbox`] row.
    pub struct SandboxId("sbx-");
}

/// Warm-pool participation state. Monotonic: `AVAILABLE -> CLAIMED` is
/// terminal for pool participation; `AVAILABLE -> RETIRING -> deletion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WarmState {
    Available,
    Claimed,
    Retiring,
}

crate::simple_display! {
    WarmState {
        Available => "available",
        Claimed => "claimed",
        Retiring => "retiring",
    }
}

/// Status is *computed*, never persisted, from
/// `(deleted_at, expires_at, idle_expires_at, current_session.observed_state, now)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SandboxStatus {
    Idle,
    Starting,
    Ready,
    Stopping,
    Stopped,
    Expired,
    Failed,
    Deleted,
}

crate::simple_display! {
    SandboxStatus {
        Idle => "idle",
        Starting => "starting",
        Ready => "ready",
        Stopping => "stopping",
        Stopped => "stopped",
        Expired => "expired",
        Failed => "failed",
        Deleted => "deleted",
    }
}

/// User-visible handle to an isolated environment. Owns one workspace and
/// at most one live session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Sandbox {
    pub id: SandboxId,
    pub owner: crate::OwnerId,
    pub profile_id: String,
    pub workspace_id: WorkspaceId,
    pub current_session_id: Option<SessionId>,
    pub created_at: u64,
    pub last_active_at: u64,
    pub expires_at: Option<u64>,
    pub idle_expires_at: Option<u64>,
    pub deleted_at: Option<u64>,
    pub is_warm_pool: bool,
    pub warm_state: Option<WarmState>,
    pub warm_ready_at: Option<u64>,
    pub warm_rotate_at: Option<u64>,
    pub warm_claimed_at: Option<u64>,
    pub warm_source_profile_id: Option<String>,
}

impl Sandbox {
    /// Compute the sandbox's externally-visible status. Never persisted.
    ///
    /// `session` is the sandbox's current session row, if any — callers load
    /// it via `current_session_id` before calling this.
    pub fn status(&self, now: u64, session: Option<&Session>) -> SandboxStatus {
        if self.deleted_at.is_some() {
            return SandboxStatus::Deleted;
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return SandboxStatus::Expired;
            }
        }
        match session.map(|s| s.observed_state) {
            None => SandboxStatus::Idle,
            Some(SessionState::Pending | SessionState::Starting) => SandboxStatus::Starting,
            Some(SessionState::Running) => SandboxStatus::Ready,
            Some(SessionState::Stopping) => SandboxStatus::Stopping,
            Some(SessionState::Stopped) => SandboxStatus::Stopped,
            Some(SessionState::Failed) => SandboxStatus::Failed,
        }
    }

    pub fn is_idle_expired(&self, now: u64) -> bool {
        self.idle_expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct SandboxBuilder => Sandbox {
        set { id: SandboxId = SandboxId::new() }
        set { owner: crate::OwnerId = crate::OwnerId::new("acct_test").expect("valid test owner") }
        into { profile_id: String = "python-default" }
        set { workspace_id: WorkspaceId = WorkspaceId::new() }
        option { current_session_id: SessionId = None }
        set { created_at: u64 = 0 }
        set { last_active_at: u64 = 0 }
        option { expires_at: u64 = None }
        option { idle_expires_at: u64 = None }
        option { deleted_at: u64 = None }
        set { is_warm_pool: bool = false }
        option { warm_state: WarmState = None }
        option { warm_ready_at: u64 = None }
        option { warm_rotate_at: u64 = None }
        option { warm_claimed_at: u64 = None }
        option { warm_source_profile_id: String = None }
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
