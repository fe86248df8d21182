// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One running container instance backing a [`crate::Sandbox`].

use crate::sandbox::SandboxId;

crate::define_id! {
    /// Identifier for a [`Session`] row.
    pub struct SessionId("ses-");
}

/// Desired or observed lifecycle state of a session's container.
///
/// A session is *ready* iff `observed_state == RUNNING && endpoint.is_some()`
/// (see [`Session::is_ready`]). `endpoint` must be cleared on every
/// transition away from `RUNNING` — endpoints are never revived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SessionState {
    Pending,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

crate::simple_display! {
    SessionState {
        Pending => "pending",
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
        Failed => "failed",
    }
}

/// One running (or once-running) container instance for a sandbox.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub sandbox_id: SandboxId,
    pub runtime_type: String,
    pub profile_id: String,
    pub container_id: Option<String>,
    pub endpoint: Option<String>,
    pub desired_state: SessionState,
    pub observed_state: SessionState,
    pub created_at: u64,
    pub last_active_at: u64,
    pub last_observed_at: u64,
}

impl Session {
    /// A session is ready for capability dispatch iff it has reached
    /// `RUNNING` and carries a live endpoint.
    pub fn is_ready(&self) -> bool {
        self.observed_state == SessionState::Running && self.endpoint.is_some()
    }

    /// Clear the fields that must never survive a transition away from
    /// `RUNNING`: `container_id` and `endpoint`. Caller sets the new
    /// `observed_state` separately.
    pub fn clear_container(&mut self) {
        self.container_id = None;
        self.endpoint = None;
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct SessionBuilder => Session {
        set { id: SessionId = SessionId::new() }
        set { sandbox_id: SandboxId = SandboxId::new() }
        into { runtime_type: String = "ship" }
        into { profile_id: String = "python-default" }
        option { container_id: String = None }
        option { endpoint: String = None }
        set { desired_state: SessionState = SessionState::Pending }
        set { observed_state: SessionState = SessionState::Pending }
        set { created_at: u64 = 0 }
        set { last_active_at: u64 = 0 }
        set { last_observed_at: u64 = 0 }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
