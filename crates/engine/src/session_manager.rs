// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns one container's lifecycle for a sandbox. `EnsureRunning` is the
//! core idempotent start-up primitive (spec §4.4): safe to call
//! concurrently on the same session, always leaves the store in a legal
//! state, and never resurrects a cleared endpoint.

use std::sync::Arc;
use std::time::Duration;

use sandbox_core::{
    Clock, ContainerLabels, ContainerStatus, Driver, Error, Profile, Result, RuntimeClientFactory,
    Session, SessionId, SessionState, Store, VolumeSpec, Workspace,
};
use tracing::{debug, info, warn};

/// Fixed mount path every Driver attaches a session's workspace volume at
/// (spec §4.2: "attaches workspace volume at a fixed mount path").
pub const WORKSPACE_MOUNT_PATH: &str = "/workspace";

const HEALTH_POLL_ATTEMPTS: u32 = 10;
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(200);
const STARTING_RETRY_AFTER_MS: u64 = 250;
const READINESS_RETRY_AFTER_MS: u64 = 500;

pub struct SessionManager<C: Clock> {
    driver: Arc<dyn Driver>,
    store: Arc<dyn Store>,
    runtime_clients: Arc<dyn RuntimeClientFactory>,
    clock: C,
}

impl<C: Clock> SessionManager<C> {
    pub fn new(
        driver: Arc<dyn Driver>,
        store: Arc<dyn Store>,
        runtime_clients: Arc<dyn RuntimeClientFactory>,
        clock: C,
    ) -> Self {
        Self {
            driver,
            store,
            runtime_clients,
            clock,
        }
    }

    /// Row-only creation; no container is created or started.
    pub async fn create(&self, sandbox_id: sandbox_core::SandboxId, workspace: &Workspace, profile: &Profile) -> Result<Session> {
        let now = self.clock.epoch_ms();
        let session = Session {
            id: SessionId::new(),
            sandbox_id,
            runtime_type: profile.id.clone(),
            profile_id: profile.id.clone(),
            container_id: None,
            endpoint: None,
            desired_state: SessionState::Pending,
            observed_state: SessionState::Pending,
            created_at: now,
            last_active_at: now,
            last_observed_at: now,
        };
        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        tx.insert_session(&session).await?;
        tx.commit().await?;
        let _ = workspace; // workspace row already exists; no-op here by design
        Ok(session)
    }

    /// The core idempotent start-up primitive (spec §4.4).
    pub async fn ensure_running(
        &self,
        mut session: Session,
        workspace: &Workspace,
        profile: &Profile,
    ) -> Result<Session> {
        if let Some(container_id) = session.container_id.clone().filter(|_| session.is_ready()) {
            match self.driver.status(&container_id).await {
                Ok(info) if info.status == ContainerStatus::Running => {
                    debug!(session_id = %session.id, "proactive probe confirms running");
                    return Ok(session);
                }
                Ok(info) => {
                    warn!(session_id = %session.id, status = %info.status, "proactive probe found non-running container, recreating");
                    session.clear_container();
                    session.observed_state = SessionState::Failed;
                    self.persist(&session).await?;
                    // fall through to recreate below
                }
                Err(e) => {
                    debug!(session_id = %session.id, error = %e, "proactive probe transport error, degrading to DB state");
                    return Ok(session);
                }
            }
        }

        if session.observed_state == SessionState::Starting {
            return Err(Error::session_not_ready(session.sandbox_id.to_string(), STARTING_RETRY_AFTER_MS));
        }

        if session.container_id.is_none() {
            session.desired_state = SessionState::Running;
            session.observed_state = SessionState::Starting;
            self.persist(&session).await?;

            let labels = ContainerLabels {
                owner: workspace.owner.to_string(),
                sandbox_id: session.sandbox_id,
                session_id: session.id,
                workspace_id: workspace.id,
                profile_id: profile.id.clone(),
            };
            let volume = VolumeSpec {
                name: workspace.driver_ref.clone(),
                mount_path: WORKSPACE_MOUNT_PATH.to_string(),
            };
            let container_id = self.driver.create(profile, &volume, &labels).await?;
            session.container_id = Some(container_id);
            self.persist(&session).await?;
            info!(session_id = %session.id, container_id = ?session.container_id, "container created");
        }

        if session.observed_state != SessionState::Running {
            let Some(container_id) = session.container_id.clone() else {
                return Err(Error::DriverError("session missing container_id after create step".to_string()));
            };
            match self.driver.start(&container_id, profile.runtime_port).await {
                Ok(endpoint) => {
                    session.endpoint = Some(endpoint);
                }
                Err(e) => {
                    let _ = self.driver.destroy(&container_id).await;
                    session.clear_container();
                    session.observed_state = SessionState::Failed;
                    self.persist(&session).await?;
                    return Err(e);
                }
            }

            if !self.wait_for_ready(session.endpoint.as_deref().unwrap_or_default()).await {
                let Some(container_id) = session.container_id.clone() else {
                    return Err(Error::DriverError("session missing container_id during readiness wait".to_string()));
                };
                let _ = self.driver.destroy(&container_id).await;
                session.clear_container();
                session.observed_state = SessionState::Failed;
                self.persist(&session).await?;
                return Err(Error::session_not_ready(session.sandbox_id.to_string(), READINESS_RETRY_AFTER_MS));
            }

            session.observed_state = SessionState::Running;
            session.last_observed_at = self.clock.epoch_ms();
            self.persist(&session).await?;
            info!(session_id = %session.id, endpoint = ?session.endpoint, "session running");
        }

        Ok(session)
    }

    async fn wait_for_ready(&self, endpoint: &str) -> bool {
        if endpoint.is_empty() {
            return false;
        }
        let client = self.runtime_clients.get(endpoint);
        for attempt in 0..HEALTH_POLL_ATTEMPTS {
            if client.health().await.is_ok() {
                return true;
            }
            if attempt + 1 < HEALTH_POLL_ATTEMPTS {
                tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
        false
    }

    pub async fn stop(&self, mut session: Session) -> Result<Session> {
        if let Some(container_id) = session.container_id.clone() {
            self.driver.stop(&container_id).await?;
        }
        session.desired_state = SessionState::Stopped;
        session.observed_state = SessionState::Stopped;
        session.clear_container();
        self.persist(&session).await?;
        Ok(session)
    }

    /// Destroy the container (if any) and remove the session row entirely
    /// (spec §3: "Destruction removes the row").
    pub async fn destroy(&self, session: &Session) -> Result<()> {
        if let Some(container_id) = &session.container_id {
            self.driver.destroy(container_id).await?;
        }
        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        tx.delete_session(&session.id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Probe-driven state reconciliation, used by the reconciler.
    pub async fn refresh_status(&self, mut session: Session) -> Result<Session> {
        let Some(container_id) = session.container_id.clone() else {
            return Ok(session);
        };
        match self.driver.status(&container_id).await {
            Ok(info) if info.status == ContainerStatus::Running => {
                session.last_observed_at = self.clock.epoch_ms();
                self.persist(&session).await?;
            }
            Ok(_) => {
                session.clear_container();
                session.observed_state = SessionState::Failed;
                self.persist(&session).await?;
            }
            Err(e) => {
                debug!(session_id = %session.id, error = %e, "refresh_status probe transport error");
            }
        }
        Ok(session)
    }

    pub async fn touch(&self, mut session: Session) -> Result<Session> {
        session.last_active_at = self.clock.epoch_ms();
        self.persist(&session).await?;
        Ok(session)
    }

    async fn persist(&self, session: &Session) -> Result<()> {
        let mut tx = self.store.begin().await?;
        tx.rollback().await?;
        tx.update_session(session).await?;
        tx.commit().await
    }
}

#[cfg(test)]
#[path = "session_manager_tests.rs"]
mod tests;
