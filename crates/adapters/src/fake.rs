// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `Driver`/`RuntimeClient` fakes for `sandbox-engine`'s tests,
//! mirroring the teacher's `test-support`-feature `FakeAdapter`. These let
//! `EnsureRunning`, warm-claim races, and reconciler sweeps be exercised
//! without a real container runtime.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sandbox_core::{
    CapabilityMeta, ContainerInfo, ContainerLabels, ContainerStatus, Driver, Error,
    ExecutionResult, FileEntry, ManagedContainer, Meta, Profile, Result, RuntimeClient,
    RuntimeClientFactory, SessionId, VolumeSpec,
};

struct FakeContainer {
    status: ContainerStatus,
    endpoint: Option<String>,
    session_id: SessionId,
}

struct Inner {
    containers: HashMap<String, FakeContainer>,
    volumes: HashSet<String>,
    next_id: u64,
    fail_create: bool,
    fail_start: bool,
}

/// A `Driver` that tracks fake containers and volumes purely in memory.
#[derive(Clone)]
pub struct FakeDriver {
    inner: Arc<Mutex<Inner>>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                containers: HashMap::new(),
                volumes: HashSet::new(),
                next_id: 0,
                fail_create: false,
                fail_start: false,
            })),
        }
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.inner.lock().fail_create = fail;
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.inner.lock().fail_start = fail;
    }

    /// Simulate an external crash: the container still exists but has
    /// exited.
    pub fn kill_container(&self, container_id: &str) {
        if let Some(c) = self.inner.lock().containers.get_mut(container_id) {
            c.status = ContainerStatus::Exited;
            c.endpoint = None;
        }
    }

    /// Simulate the container having vanished entirely (e.g. reaped by the
    /// runtime out from under us).
    pub fn remove_container(&self, container_id: &str) {
        self.inner.lock().containers.remove(container_id);
    }

    pub fn container_count(&self) -> usize {
        self.inner.lock().containers.len()
    }

    pub fn volume_count(&self) -> usize {
        self.inner.lock().volumes.len()
    }

    pub fn container_exists(&self, container_id: &str) -> bool {
        self.inner.lock().containers.contains_key(container_id)
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn create(&self, _profile: &Profile, _volume: &VolumeSpec, labels: &ContainerLabels) -> Result<String> {
        let mut inner = self.inner.lock();
        if inner.fail_create {
            return Err(Error::DriverError("fake create failure".into()));
        }
        inner.next_id += 1;
        let id = format!("fake-container-{}", inner.next_id);
        inner.containers.insert(
            id.clone(),
            FakeContainer {
                status: ContainerStatus::Created,
                endpoint: None,
                session_id: labels.session_id,
            },
        );
        Ok(id)
    }

    async fn start(&self, container_id: &str, runtime_port: u16) -> Result<String> {
        let mut inner = self.inner.lock();
        if inner.fail_start {
            return Err(Error::DriverError("fake start failure".into()));
        }
        let endpoint = format!("http://fake/{container_id}:{runtime_port}");
        let container = inner
            .containers
            .get_mut(container_id)
            .ok_or_else(|| Error::DriverError(format!("no such container {container_id}")))?;
        container.status = ContainerStatus::Running;
        container.endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }

    async fn stop(&self, container_id: &str) -> Result<()> {
        if let Some(c) = self.inner.lock().containers.get_mut(container_id) {
            c.status = ContainerStatus::Exited;
            c.endpoint = None;
        }
        Ok(())
    }

    async fn destroy(&self, container_id: &str) -> Result<()> {
        self.inner.lock().containers.remove(container_id);
        Ok(())
    }

    async fn status(&self, container_id: &str) -> Result<ContainerInfo> {
        let inner = self.inner.lock();
        match inner.containers.get(container_id) {
            Some(c) => Ok(ContainerInfo {
                status: c.status,
                endpoint: c.endpoint.clone(),
                exit_code: (c.status == ContainerStatus::Exited).then_some(1),
            }),
            None => Ok(ContainerInfo::not_found()),
        }
    }

    async fn create_volume(&self, name: &str, _labels: &HashMap<String, String>) -> Result<String> {
        self.inner.lock().volumes.insert(name.to_string());
        Ok(name.to_string())
    }

    async fn delete_volume(&self, name: &str) -> Result<()> {
        self.inner.lock().volumes.remove(name);
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool> {
        Ok(self.inner.lock().volumes.contains(name))
    }

    async fn list_managed(&self) -> Result<Vec<ManagedContainer>> {
        Ok(self
            .inner
            .lock()
            .containers
            .iter()
            .map(|(container_id, c)| ManagedContainer {
                container_id: container_id.clone(),
                session_id: c.session_id,
            })
            .collect())
    }
}

/// A `RuntimeClient` that serves a canned `/meta`, always-healthy `Health`,
/// and an in-memory filesystem.
pub struct FakeRuntimeClient {
    endpoint: String,
    healthy: AtomicBool,
    fail_health: AtomicBool,
    files: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicU64,
}

impl FakeRuntimeClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            healthy: AtomicBool::new(true),
            fail_health: AtomicBool::new(false),
            files: Mutex::new(HashMap::new()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Force `Health` to return a transport error, to exercise the
    /// readiness-failure → destroy-and-FAILED path.
    pub fn set_fail_health(&self, fail: bool) {
        self.fail_health.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn default_meta() -> Meta {
        let mut capabilities = HashMap::new();
        for tag in ["python", "shell", "filesystem"] {
            capabilities.insert(
                tag.to_string(),
                CapabilityMeta {
                    operations: vec!["exec".to_string()],
                },
            );
        }
        Meta {
            name: "fake-runtime".to_string(),
            version: "0.0.0".to_string(),
            api_version: "v1".to_string(),
            mount_path: "/workspace".to_string(),
            capabilities,
        }
    }
}

#[async_trait]
impl RuntimeClient for FakeRuntimeClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_meta(&self) -> Result<Meta> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::default_meta())
    }

    async fn health(&self) -> Result<HashMap<String, serde_json::Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(Error::Transient("fake health transport failure".into()));
        }
        let mut map = HashMap::new();
        map.insert(
            "status".to_string(),
            if self.healthy.load(Ordering::SeqCst) {
                serde_json::json!("ok")
            } else {
                serde_json::json!("degraded")
            },
        );
        Ok(map)
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        self.files
            .lock()
            .get(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .ok_or_else(|| Error::not_found(format!("file {path}")))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.files.lock().insert(path.to_string(), content.as_bytes().to_vec());
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let prefix = if path.is_empty() { String::new() } else { format!("{path}/") };
        Ok(self
            .files
            .lock()
            .iter()
            .filter(|(p, _)| p.starts_with(&prefix))
            .map(|(p, b)| FileEntry {
                path: p.clone(),
                is_dir: false,
                size: b.len() as u64,
            })
            .collect())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.files.lock().remove(path);
        Ok(())
    }

    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.files.lock().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("file {path}")))
    }

    async fn exec_shell(&self, command: &str, _timeout_secs: u64, _cwd: Option<&str>) -> Result<ExecutionResult> {
        Ok(ExecutionResult {
            success: true,
            output: format!("ran: {command}"),
            error: None,
            exit_code: Some(0),
            data: None,
        })
    }

    async fn exec_python(&self, code: &str, _timeout_secs: u64) -> Result<ExecutionResult> {
        Ok(ExecutionResult {
            success: true,
            output: format!("ran: {code}"),
            error: None,
            exit_code: Some(0),
            data: None,
        })
    }
}

/// A factory that always returns the same `FakeRuntimeClient` for a given
/// endpoint, constructing one on first use. Matches the real pool's
/// endpoint-keyed caching without the LRU/TTL machinery tests don't need.
#[derive(Default)]
pub struct FakeRuntimeClientFactory {
    clients: Mutex<HashMap<String, Arc<FakeRuntimeClient>>>,
}

impl FakeRuntimeClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_for(&self, endpoint: &str) -> Arc<FakeRuntimeClient> {
        self.clients
            .lock()
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(FakeRuntimeClient::new(endpoint)))
            .clone()
    }
}

impl RuntimeClientFactory for FakeRuntimeClientFactory {
    fn get(&self, endpoint: &str) -> Arc<dyn RuntimeClient> {
        self.client_for(endpoint) as Arc<dyn RuntimeClient>
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
