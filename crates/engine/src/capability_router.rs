// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatches a capability operation for a sandbox: ensures a running
//! session, checks the runtime's advertised capabilities, fetches the
//! pooled client for its endpoint, and forwards (spec §4.8).

use std::sync::Arc;

use sandbox_core::{
    Clock, Error, ExecutionResult, FileEntry, Result, RuntimeClient, RuntimeClientFactory,
    SandboxId, Session,
};

use crate::sandbox_manager::SandboxManager;

/// Default retry hint surfaced alongside `SessionNotReady` for a readiness
/// probe that hasn't settled yet — `EnsureRunning` already raises its own
/// hint on start-up failure; this one covers the case where the session
/// exists but has no endpoint yet.
const NO_ENDPOINT_RETRY_AFTER_MS: u64 = 250;

pub struct CapabilityRouter<C: Clock> {
    sandbox_manager: Arc<SandboxManager<C>>,
    runtime_clients: Arc<dyn RuntimeClientFactory>,
}

impl<C: Clock> CapabilityRouter<C> {
    pub fn new(sandbox_manager: Arc<SandboxManager<C>>, runtime_clients: Arc<dyn RuntimeClientFactory>) -> Self {
        Self {
            sandbox_manager,
            runtime_clients,
        }
    }

    async fn ensure_session(&self, sandbox_id: &SandboxId) -> Result<Session> {
        self.sandbox_manager.ensure_running(sandbox_id).await
    }

    fn get_adapter(&self, session: &Session) -> Result<Arc<dyn RuntimeClient>> {
        let endpoint = session
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::session_not_ready(session.sandbox_id.to_string(), NO_ENDPOINT_RETRY_AFTER_MS))?;
        Ok(self.runtime_clients.get(endpoint))
    }

    async fn require_capability(&self, endpoint: &str, tag: &str) -> Result<()> {
        let meta = self.runtime_clients.get_meta(endpoint).await?;
        if !meta.has_capability(tag) {
            return Err(Error::CapabilityNotSupported {
                requested: tag.to_string(),
                available: meta.capabilities.keys().cloned().collect(),
            });
        }
        Ok(())
    }

    async fn dispatch(&self, sandbox_id: &SandboxId, tag: &str) -> Result<Arc<dyn RuntimeClient>> {
        let session = self.ensure_session(sandbox_id).await?;
        let adapter = self.get_adapter(&session)?;
        self.require_capability(adapter.endpoint(), tag).await?;
        Ok(adapter)
    }

    pub async fn exec_python(&self, sandbox_id: &SandboxId, code: &str, timeout_secs: u64) -> Result<ExecutionResult> {
        let adapter = self.dispatch(sandbox_id, "python").await?;
        adapter.exec_python(code, timeout_secs).await
    }

    pub async fn exec_shell(
        &self,
        sandbox_id: &SandboxId,
        command: &str,
        timeout_secs: u64,
        cwd: Option<&str>,
    ) -> Result<ExecutionResult> {
        let adapter = self.dispatch(sandbox_id, "shell").await?;
        adapter.exec_shell(command, timeout_secs, cwd).await
    }

    pub async fn read_file(&self, sandbox_id: &SandboxId, path: &str) -> Result<String> {
        sandbox_core::path::validate_workspace_path(path)?;
        let adapter = self.dispatch(sandbox_id, "filesystem").await?;
        adapter.read_file(path).await
    }

    pub async fn write_file(&self, sandbox_id: &SandboxId, path: &str, content: &str) -> Result<()> {
        sandbox_core::path::validate_workspace_path(path)?;
        let adapter = self.dispatch(sandbox_id, "filesystem").await?;
        adapter.write_file(path, content).await
    }

    pub async fn list(&self, sandbox_id: &SandboxId, path: &str) -> Result<Vec<FileEntry>> {
        sandbox_core::path::validate_workspace_path(path)?;
        let adapter = self.dispatch(sandbox_id, "filesystem").await?;
        adapter.list(path).await
    }

    pub async fn delete(&self, sandbox_id: &SandboxId, path: &str) -> Result<()> {
        sandbox_core::path::validate_workspace_path(path)?;
        let adapter = self.dispatch(sandbox_id, "filesystem").await?;
        adapter.delete(path).await
    }

    pub async fn upload(&self, sandbox_id: &SandboxId, path: &str, bytes: &[u8]) -> Result<()> {
        sandbox_core::path::validate_workspace_path(path)?;
        let adapter = self.dispatch(sandbox_id, "filesystem").await?;
        adapter.upload(path, bytes).await
    }

    pub async fn download(&self, sandbox_id: &SandboxId, path: &str) -> Result<Vec<u8>> {
        sandbox_core::path::validate_workspace_path(path)?;
        let adapter = self.dispatch(sandbox_id, "filesystem").await?;
        adapter.download(path).await
    }
}

#[cfg(test)]
#[path = "capability_router_tests.rs"]
mod tests;
