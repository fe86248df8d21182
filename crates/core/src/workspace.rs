// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent data volume attached to a sandbox.


crate::define_id! {
    /// Identifier for a [`Workspace`] row.
    pub struct WorkspaceId("wks-");
}

/// Whether a workspace is owned by its sandbox's lifecycle or supplied by
/// the caller.
///
/// `Managed` workspaces are created by, and cascade-deleted with, their
/// sandbox. `External` workspaces are caller-supplied and are never
/// cascade-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WorkspaceKind {
    Managed,
    External,
}

crate::simple_display! {
    WorkspaceKind {
        Managed => "managed",
        External => "external",
    }
}

/// Persistent data volume. Has no lifecycle status of its own: a workspace
/// is either present or, for managed workspaces, deleted alongside its
/// owning sandbox.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub owner: crate::OwnerId,
    pub driver_ref: String,
    pub kind: WorkspaceKind,
}

impl Workspace {
    pub fn managed(&self) -> bool {
        self.kind == WorkspaceKind::Managed
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct WorkspaceBuilder => Workspace {
        set { id: WorkspaceId = WorkspaceId::new() }
        set { owner: crate::OwnerId = crate::OwnerId::new("acct_test").expect("valid test owner") }
        into { driver_ref: String = "vol-test" }
        set { kind: WorkspaceKind = WorkspaceKind::Managed }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
