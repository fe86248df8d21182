// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abstraction over the container runtime. Concrete implementations
//! (`DockerDriver`, `K8sDriver`) live in `sandbox-adapters`; the engine
//! depends only on this trait.

use std::collections::HashMap;

use crate::profile::Profile;
use crate::sandbox::SandboxId;
use crate::session::SessionId;
use crate::workspace::WorkspaceId;

/// Observed lifecycle status of a container, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ContainerStatus {
    Created,
    Running,
    Exited,
    Removing,
    NotFound,
}

crate::simple_display! {
    ContainerStatus {
        Created => "created",
        Running => "running",
        Exited => "exited",
        Removing => "removing",
        NotFound => "not_found",
    }
}

/// Result of a [`Driver::status`] probe.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContainerInfo {
    pub status: ContainerStatus,
    pub endpoint: Option<String>,
    pub exit_code: Option<i32>,
}

impl ContainerInfo {
    pub fn not_found() -> Self {
        Self {
            status: ContainerStatus::NotFound,
            endpoint: None,
            exit_code: None,
        }
    }
}

/// Labels every container and volume must carry — the reconciler's ground
/// truth for orphan detection.
#[derive(Debug, Clone)]
pub struct ContainerLabels {
    pub owner: String,
    pub sandbox_id: SandboxId,
    pub session_id: SessionId,
    pub workspace_id: WorkspaceId,
    pub profile_id: String,
}

impl ContainerLabels {
    /// Render as the `key=value` map a driver attaches verbatim.
    pub fn as_map(&self) -> HashMap<String, String> {
        HashMap::from([
            ("owner".to_string(), self.owner.clone()),
            ("sandbox_id".to_string(), self.sandbox_id.to_string()),
            ("session_id".to_string(), self.session_id.to_string()),
            ("workspace_id".to_string(), self.workspace_id.to_string()),
            ("profile_id".to_string(), self.profile_id.clone()),
            ("managed".to_string(), "true".to_string()),
        ])
    }
}

/// A named, labelled volume to mount into a freshly created container.
#[derive(Debug, Clone)]
pub struct VolumeSpec {
    pub name: String,
    pub mount_path: String,
}

/// One managed container discovered by [`Driver::list_managed`], identified
/// by the session it backs — the reconciler's orphan sweep (spec §4.10)
/// compares this list against live session rows.
#[derive(Debug, Clone)]
pub struct ManagedContainer {
    pub container_id: String,
    pub session_id: SessionId,
}

/// Container create/start/stop/destroy + volume CRUD, consumed by the
/// Session Manager. All operations must be safe to call concurrently on
/// distinct ids; `stop`/`destroy`/`delete_volume` never error on NOT_FOUND.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Create (but do not start) a container for `session`, attaching
    /// `volume` at its fixed mount path and applying `profile`'s resource
    /// caps. Returns the driver-assigned container id.
    async fn create(
        &self,
        profile: &Profile,
        volume: &VolumeSpec,
        labels: &ContainerLabels,
    ) -> crate::Result<String>;

    /// Start a created container and return its reachable HTTP endpoint.
    async fn start(&self, container_id: &str, runtime_port: u16) -> crate::Result<String>;

    /// Stop with a bounded grace period. No-op on NOT_FOUND.
    async fn stop(&self, container_id: &str) -> crate::Result<()>;

    /// Forcibly remove. No-op on NOT_FOUND.
    async fn destroy(&self, container_id: &str) -> crate::Result<()>;

    /// Probe current status.
    async fn status(&self, container_id: &str) -> crate::Result<ContainerInfo>;

    /// Create a named volume, returning its name. No-op (return the name)
    /// if it already exists.
    async fn create_volume(&self, name: &str, labels: &HashMap<String, String>) -> crate::Result<String>;

    /// Delete a volume. No-op on missing.
    async fn delete_volume(&self, name: &str) -> crate::Result<()>;

    async fn volume_exists(&self, name: &str) -> crate::Result<bool>;

    /// List every container this driver manages (carrying the `managed`
    /// label from [`ContainerLabels`]), for the reconciler's
    /// `orphaned_container` sweep (spec §4.10). A container whose
    /// `session_id` label matches no live session row is an orphan.
    async fn list_managed(&self) -> crate::Result<Vec<ManagedContainer>>;
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
