// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `K8sDriver` — one Pod per session, one PersistentVolumeClaim per managed
//! workspace, via `kube`/`k8s-openapi` (already in the teacher's dependency
//! stack for its own agent-pod adapter, `k8s/{mod,pod}.rs`).
//!
//! Kubernetes has no create-without-starting primitive the way `docker
//! create` does, so `Driver::create` only builds the `Pod` manifest and
//! holds it in memory keyed by the generated pod name; `Driver::start`
//! submits it to the API server and polls for a pod IP. `stop` and
//! `destroy` both delete the pod — a grace period distinguishes them, since
//! Kubernetes pods have no "stopped but not removed" state.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec, Pod, PodSpec,
    ResourceRequirements, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use parking_lot::Mutex;
use sandbox_core::{
    ContainerInfo, ContainerLabels, ContainerStatus, Driver, Error, ManagedContainer, Profile,
    Result, SessionId, VolumeSpec,
};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(300);
const READY_POLL_ATTEMPTS: usize = 100; // 100 * 300ms = 30s

/// Driver backed by the Kubernetes API (one Pod per session).
#[derive(Clone)]
pub struct K8sDriver {
    client: Client,
    namespace: String,
    /// Pods built by `create` but not yet submitted by `start`, keyed by
    /// the pod name returned as `container_id`.
    pending: std::sync::Arc<Mutex<HashMap<String, Pod>>>,
}

impl K8sDriver {
    pub async fn new(namespace: impl Into<String>) -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::DriverError(format!("failed to create kube client: {e}")))?;
        Ok(Self {
            client,
            namespace: namespace.into(),
            pending: std::sync::Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pvcs(&self) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

/// Sanitize an id into a valid Kubernetes resource name (lowercase
/// alphanumeric and `-` only).
fn k8s_name(prefix: &str, raw: &str) -> String {
    let suffix: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{prefix}-{suffix}")
}

#[async_trait]
impl Driver for K8sDriver {
    async fn create(
        &self,
        profile: &Profile,
        volume: &VolumeSpec,
        labels: &ContainerLabels,
    ) -> Result<String> {
        let pod_name = k8s_name("sandbox", labels.session_id.as_str());
        let mut k8s_labels = BTreeMap::new();
        for (k, v) in labels.as_map() {
            k8s_labels.insert(k, v);
        }

        let env: Vec<EnvVar> = profile
            .env
            .iter()
            .map(|(k, v)| EnvVar {
                name: k.clone(),
                value: Some(v.clone()),
                ..Default::default()
            })
            .collect();

        let mut limits = BTreeMap::new();
        limits.insert("cpu".to_string(), Quantity(profile.cpus.to_string()));
        limits.insert("memory".to_string(), Quantity(profile.memory.clone()));

        let container = Container {
            name: "runtime".to_string(),
            image: Some(profile.image.clone()),
            ports: Some(vec![k8s_openapi::api::core::v1::ContainerPort {
                container_port: profile.runtime_port as i32,
                ..Default::default()
            }]),
            env: Some(env),
            resources: Some(ResourceRequirements {
                limits: Some(limits),
                ..Default::default()
            }),
            volume_mounts: Some(vec![VolumeMount {
                name: "workspace".to_string(),
                mount_path: volume.mount_path.clone(),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let pod = Pod {
            metadata: kube::api::ObjectMeta {
                name: Some(pod_name.clone()),
                labels: Some(k8s_labels),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![container],
                restart_policy: Some("Never".to_string()),
                volumes: Some(vec![Volume {
                    name: "workspace".to_string(),
                    persistent_volume_claim: Some(
                        k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource {
                            claim_name: volume.name.clone(),
                            read_only: Some(false),
                        },
                    ),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.pending.lock().insert(pod_name.clone(), pod);
        Ok(pod_name)
    }

    async fn start(&self, container_id: &str, runtime_port: u16) -> Result<String> {
        let pod = self
            .pending
            .lock()
            .remove(container_id)
            .ok_or_else(|| Error::DriverError(format!("no pending pod for {container_id}")))?;

        self.pods()
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| Error::DriverError(format!("pod create failed: {e}")))?;

        for _ in 0..READY_POLL_ATTEMPTS {
            let fetched = self
                .pods()
                .get(container_id)
                .await
                .map_err(|e| Error::DriverError(format!("pod get failed: {e}")))?;
            let running = fetched
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                == Some("Running");
            let pod_ip = fetched.status.as_ref().and_then(|s| s.pod_ip.clone());
            if running {
                if let Some(ip) = pod_ip {
                    return Ok(format!("http://{ip}:{runtime_port}"));
                }
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        Err(Error::Timeout(READY_POLL_INTERVAL * READY_POLL_ATTEMPTS as u32))
    }

    async fn stop(&self, container_id: &str) -> Result<()> {
        let params = DeleteParams {
            grace_period_seconds: Some(10),
            ..Default::default()
        };
        match self.pods().delete(container_id, &params).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(Error::DriverError(format!("pod delete failed: {e}"))),
        }
    }

    async fn destroy(&self, container_id: &str) -> Result<()> {
        self.pending.lock().remove(container_id);
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            ..Default::default()
        };
        match self.pods().delete(container_id, &params).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(Error::DriverError(format!("pod force-delete failed: {e}"))),
        }
    }

    async fn status(&self, container_id: &str) -> Result<ContainerInfo> {
        if self.pending.lock().contains_key(container_id) {
            return Ok(ContainerInfo {
                status: ContainerStatus::Created,
                endpoint: None,
                exit_code: None,
            });
        }
        match self.pods().get(container_id).await {
            Ok(pod) => Ok(parse_pod_status(&pod)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(ContainerInfo::not_found()),
            Err(e) => Err(Error::DriverError(format!("pod get failed: {e}"))),
        }
    }

    async fn create_volume(&self, name: &str, labels: &HashMap<String, String>) -> Result<String> {
        if self.volume_exists(name).await? {
            return Ok(name.to_string());
        }
        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), Quantity("5Gi".to_string()));

        let pvc = PersistentVolumeClaim {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels.clone().into_iter().collect()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.pvcs()
            .create(&PostParams::default(), &pvc)
            .await
            .map_err(|e| Error::DriverError(format!("pvc create failed: {e}")))?;
        Ok(name.to_string())
    }

    async fn delete_volume(&self, name: &str) -> Result<()> {
        match self.pvcs().delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(Error::DriverError(format!("pvc delete failed: {e}"))),
        }
    }

    async fn volume_exists(&self, name: &str) -> Result<bool> {
        match self.pvcs().get(name).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(Error::DriverError(format!("pvc get failed: {e}"))),
        }
    }

    async fn list_managed(&self) -> Result<Vec<ManagedContainer>> {
        let params = ListParams::default().labels("managed=true");
        let pods = self
            .pods()
            .list(&params)
            .await
            .map_err(|e| Error::DriverError(format!("pod list failed: {e}")))?;
        Ok(pods
            .items
            .into_iter()
            .filter_map(|pod| {
                let container_id = pod.metadata.name.clone()?;
                let session_id = pod.metadata.labels.as_ref()?.get("session_id")?.clone();
                Some(ManagedContainer {
                    container_id,
                    session_id: SessionId::from_string(session_id),
                })
            })
            .collect())
    }
}

fn parse_pod_status(pod: &Pod) -> ContainerInfo {
    let Some(status) = &pod.status else {
        return ContainerInfo {
            status: ContainerStatus::Created,
            endpoint: None,
            exit_code: None,
        };
    };
    let exit_code = status
        .container_statuses
        .as_ref()
        .and_then(|cs| cs.first())
        .and_then(|cs| cs.state.as_ref())
        .and_then(|s| s.terminated.as_ref())
        .map(|t| t.exit_code);
    let endpoint = status.pod_ip.clone();
    let mapped = match status.phase.as_deref() {
        Some("Pending") => ContainerStatus::Created,
        Some("Running") => ContainerStatus::Running,
        Some("Succeeded") | Some("Failed") => ContainerStatus::Exited,
        _ if pod.metadata.deletion_timestamp.is_some() => ContainerStatus::Removing,
        _ => ContainerStatus::NotFound,
    };
    ContainerInfo {
        status: mapped,
        endpoint,
        exit_code,
    }
}

#[cfg(test)]
#[path = "k8s_tests.rs"]
mod tests;
