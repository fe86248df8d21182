// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `DockerDriver` — shells out to the `docker` CLI against the configured
//! socket (`DOCKER_HOST`, default `unix:///var/run/docker.sock`), matching
//! the teacher's `run_docker` subprocess idiom for container lifecycle.
//!
//! `Driver::create` performs `docker create` with the port a session will
//! eventually listen on already published to an ephemeral host port — Docker
//! cannot add a publish mapping to a container after creation, so the
//! mapping is requested up front and the concrete host port is discovered
//! by `docker port` once the container is actually running, in
//! [`Driver::start`].

use std::collections::HashMap;

use async_trait::async_trait;
use sandbox_core::{
    ContainerInfo, ContainerLabels, ContainerStatus, Driver, Error, ManagedContainer, Profile,
    Result, SessionId, VolumeSpec,
};

/// Pid-limit applied to every container this driver creates. Not exposed on
/// `Profile` (spec §3 lists only `cpus`/`memory` as per-profile caps); a
/// single conservative ceiling is enough to stop a fork bomb from starving
/// the host.
const DEFAULT_PID_LIMIT: u32 = 256;

/// Driver backed by a local (or remote, via `DOCKER_HOST`) Docker daemon.
#[derive(Debug, Clone, Default)]
pub struct DockerDriver {
    /// Overrides `DOCKER_HOST` for this instance; `None` uses the
    /// environment / docker CLI default (`unix:///var/run/docker.sock`).
    docker_host: Option<String>,
}

impl DockerDriver {
    pub fn new() -> Self {
        Self {
            docker_host: std::env::var("DOCKER_HOST").ok(),
        }
    }

    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            docker_host: Some(host.into()),
        }
    }

    fn container_name(&self, labels: &ContainerLabels) -> String {
        format!("sandbox-{}", labels.session_id)
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        run_docker(self.docker_host.as_deref(), args)
            .await
            .map_err(Error::DriverError)
    }

    /// Like [`Self::run`] but treats "no such container/volume" stderr as
    /// success with empty output — the NOT_FOUND-is-not-an-error contract
    /// for `stop`/`destroy`/`delete_volume` (spec §4.2).
    async fn run_tolerating_not_found(&self, args: &[&str]) -> Result<()> {
        match self.run(args).await {
            Ok(_) => Ok(()),
            Err(Error::DriverError(msg)) if is_not_found_message(&msg) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Driver for DockerDriver {
    async fn create(
        &self,
        profile: &Profile,
        volume: &VolumeSpec,
        labels: &ContainerLabels,
    ) -> Result<String> {
        let name = self.container_name(labels);
        let memory_bytes = profile.memory_bytes()?.to_string();
        let cpus = profile.cpus.to_string();
        let pids_limit = DEFAULT_PID_LIMIT.to_string();
        let publish = format!("127.0.0.1::{}", profile.runtime_port);
        let volume_mount = format!("{}:{}", volume.name, volume.mount_path);

        let mut args = vec![
            "create".to_string(),
            "--name".to_string(),
            name,
            "-p".to_string(),
            publish,
            "--pids-limit".to_string(),
            pids_limit,
            "--cpus".to_string(),
            cpus,
            "--memory".to_string(),
            memory_bytes,
            "-v".to_string(),
            volume_mount,
        ];
        for (k, v) in labels.as_map() {
            args.push("--label".to_string());
            args.push(format!("{k}={v}"));
        }
        for (k, v) in &profile.env {
            args.push("-e".to_string());
            args.push(format!("{k}={v}"));
        }
        args.push(profile.image.clone());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let container_id = self.run(&arg_refs).await?;
        Ok(container_id.trim().to_string())
    }

    async fn start(&self, container_id: &str, runtime_port: u16) -> Result<String> {
        self.run(&["start", container_id]).await?;

        let port_spec = format!("{runtime_port}/tcp");
        let mapping = self.run(&["port", container_id, &port_spec]).await?;
        let addr = mapping
            .lines()
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                Error::DriverError(format!("container {container_id} published no port mapping"))
            })?;
        let host_port = addr.rsplit(':').next().ok_or_else(|| {
            Error::DriverError(format!("could not parse port mapping: {addr:?}"))
        })?;
        Ok(format!("http://127.0.0.1:{host_port}"))
    }

    async fn stop(&self, container_id: &str) -> Result<()> {
        self.run_tolerating_not_found(&["stop", "--time", "10", container_id]).await
    }

    async fn destroy(&self, container_id: &str) -> Result<()> {
        self.run_tolerating_not_found(&["rm", "-f", container_id]).await
    }

    async fn status(&self, container_id: &str) -> Result<ContainerInfo> {
        let format = "--format={{json .State}}";
        match self.run(&["inspect", format, container_id]).await {
            Ok(raw) => parse_state_json(&raw),
            Err(Error::DriverError(msg)) if is_not_found_message(&msg) => {
                Ok(ContainerInfo::not_found())
            }
            Err(e) => Err(e),
        }
    }

    async fn create_volume(&self, name: &str, labels: &HashMap<String, String>) -> Result<String> {
        if self.volume_exists(name).await? {
            return Ok(name.to_string());
        }
        let mut args = vec!["volume".to_string(), "create".to_string()];
        for (k, v) in labels {
            args.push("--label".to_string());
            args.push(format!("{k}={v}"));
        }
        args.push(name.to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs).await?;
        Ok(name.to_string())
    }

    async fn delete_volume(&self, name: &str) -> Result<()> {
        self.run_tolerating_not_found(&["volume", "rm", name]).await
    }

    async fn volume_exists(&self, name: &str) -> Result<bool> {
        match self.run(&["volume", "inspect", name]).await {
            Ok(_) => Ok(true),
            Err(Error::DriverError(msg)) if is_not_found_message(&msg) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_managed(&self) -> Result<Vec<ManagedContainer>> {
        let format = "--format={{.ID}}\t{{.Label \"session_id\"}}";
        let raw = self
            .run(&["ps", "-a", "--filter", "label=managed=true", format])
            .await?;
        Ok(raw
            .lines()
            .filter_map(|line| {
                let (container_id, session_id) = line.trim().split_once('\t')?;
                if container_id.is_empty() || session_id.is_empty() {
                    return None;
                }
                Some(ManagedContainer {
                    container_id: container_id.to_string(),
                    session_id: SessionId::from_string(session_id),
                })
            })
            .collect())
    }
}

fn is_not_found_message(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("no such container")
        || lower.contains("no such volume")
        || lower.contains("no such object")
}

fn parse_state_json(raw: &str) -> Result<ContainerInfo> {
    let state: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| Error::DriverError(format!("unparseable container state: {e}")))?;
    let status = match state.get("Status").and_then(|v| v.as_str()) {
        Some("running") => ContainerStatus::Running,
        Some("created") => ContainerStatus::Created,
        Some("exited") | Some("dead") => ContainerStatus::Exited,
        Some("removing") => ContainerStatus::Removing,
        _ => ContainerStatus::NotFound,
    };
    let exit_code = state.get("ExitCode").and_then(|v| v.as_i64()).map(|v| v as i32);
    Ok(ContainerInfo {
        status,
        endpoint: None,
        exit_code,
    })
}

/// Run a docker CLI command and return stdout on success, matching the
/// teacher's `run_docker` helper exactly (`docker/mod.rs`), generalized to
/// honor an overridden `DOCKER_HOST`.
async fn run_docker(docker_host: Option<&str>, args: &[&str]) -> std::result::Result<String, String> {
    let mut command = tokio::process::Command::new("docker");
    if let Some(host) = docker_host {
        command.env("DOCKER_HOST", host);
    }
    let output = command
        .args(args)
        .output()
        .await
        .map_err(|e| format!("failed to exec docker: {e}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("docker {} failed: {}", args.first().unwrap_or(&""), stderr.trim()))
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
