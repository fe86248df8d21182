// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A capability-exposing client bound to exactly one runtime endpoint.
//! Concrete implementation (`HttpRuntimeClient`) lives in
//! `sandbox-adapters`; the engine depends only on this trait.

use std::collections::HashMap;

/// `/meta` response: what a runtime endpoint identifies as and what
/// capability tags it exposes. Cached per endpoint with a TTL by the
/// RuntimeClient pool.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Meta {
    pub name: String,
    pub version: String,
    pub api_version: String,
    pub mount_path: String,
    pub capabilities: HashMap<String, CapabilityMeta>,
}

impl Meta {
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.contains_key(tag)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CapabilityMeta {
    pub operations: Vec<String>,
}

/// Result of an `ExecShell`/`ExecPython` capability call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// One entry returned by `List`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Capability operations the core dispatches through the Capability Router.
/// A `RuntimeClient` is bound to one endpoint URL; the pool in
/// `sandbox-adapters` owns construction and eviction.
#[async_trait::async_trait]
pub trait RuntimeClient: Send + Sync {
    fn endpoint(&self) -> &str;

    async fn get_meta(&self) -> crate::Result<Meta>;

    async fn health(&self) -> crate::Result<HashMap<String, serde_json::Value>>;

    async fn read_file(&self, path: &str) -> crate::Result<String>;

    async fn write_file(&self, path: &str, content: &str) -> crate::Result<()>;

    async fn list(&self, path: &str) -> crate::Result<Vec<FileEntry>>;

    async fn delete(&self, path: &str) -> crate::Result<()>;

    async fn upload(&self, path: &str, bytes: &[u8]) -> crate::Result<()>;

    async fn download(&self, path: &str) -> crate::Result<Vec<u8>>;

    async fn exec_shell(
        &self,
        command: &str,
        timeout_secs: u64,
        cwd: Option<&str>,
    ) -> crate::Result<ExecutionResult>;

    async fn exec_python(&self, code: &str, timeout_secs: u64) -> crate::Result<ExecutionResult>;
}

/// Process-wide lookup of the [`RuntimeClient`] bound to a given endpoint.
///
/// Implemented by `sandbox_adapters::RuntimeClientPool` (the LRU+TTL cache
/// described in spec §4.3). Both the Session Manager (health checks during
/// start-up) and the Capability Router (`_GetAdapter`, §4.8) depend only on
/// this trait so they share one process-wide pool without the engine crate
/// depending on a concrete transport.
#[async_trait::async_trait]
pub trait RuntimeClientFactory: Send + Sync {
    fn get(&self, endpoint: &str) -> std::sync::Arc<dyn RuntimeClient>;

    /// `GetMeta()`, TTL-cached per endpoint when backed by a real pool
    /// (spec §4.3). The default just forwards to the client uncached; a
    /// pool-backed implementation overrides it with its own cache so the
    /// Capability Router's `_RequireCapability` (§4.8) gets realistic
    /// cache hits without this crate depending on the pool's transport.
    async fn get_meta(&self, endpoint: &str) -> crate::Result<Meta> {
        self.get(endpoint).get_meta().await
    }
}

#[cfg(test)]
#[path = "runtime_client_tests.rs"]
mod tests;
