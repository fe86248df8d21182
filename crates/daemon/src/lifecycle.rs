// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the engine's managers and background loops together from a
//! [`Config`] and runs them until a shutdown signal arrives.
//!
//! There's no Unix socket or WAL here: this crate's `Store` is in-memory
//! and there is no wire protocol in scope (spec §1), so start-up is just
//! constructing the managers and spawning their loops, and shutdown is
//! draining the warmup queue and the warm pools best-effort.

use std::sync::Arc;
use std::time::Duration;

use sandbox_adapters::{DockerDriver, K8sDriver, RuntimeClientPool};
use sandbox_core::{Driver, RuntimeClientFactory, Store, SystemClock};
use sandbox_engine::{
    CapabilityRouter, DropPolicy, IdempotencyService, ProfileRegistry, Reconciler, SandboxLocks,
    SandboxManager, SessionManager, StaticProfileRegistry, WarmPoolScheduler, WarmupQueue,
};
use sandbox_storage::MemoryStore;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, DriverConfig};

/// Fixed worker pool for the warmup queue (spec §4.6 names no specific
/// count; this is independent of CPU count since the work is I/O-bound
/// container start calls).
const WARMUP_WORKER_COUNT: usize = 4;

/// Bound on how long shutdown waits for the warmup queue to drain before
/// moving on to the warm-pool sweep (spec §5).
const WARMUP_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime client pool sizing: capacity and cache TTLs are independent of
/// profile count since clients are keyed by session endpoint, not profile.
const RUNTIME_CLIENT_POOL_CAPACITY: usize = 256;
const RUNTIME_CLIENT_TTL: Duration = Duration::from_secs(300);
const RUNTIME_CLIENT_META_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to construct k8s driver: {0}")]
    Driver(#[from] sandbox_core::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

/// Every wired-up component the daemon needs to run its background loops.
/// Request-handling (HTTP, gRPC, CLI) is out of scope here and is expected
/// to be layered on top by holding onto `sandbox_manager`/`capability_router`
/// /`idempotency` directly.
pub struct App {
    pub sandbox_manager: Arc<SandboxManager<SystemClock>>,
    pub capability_router: Arc<CapabilityRouter<SystemClock>>,
    pub idempotency: Arc<IdempotencyService<SystemClock>>,
    pub profiles: Arc<dyn ProfileRegistry>,
    store: Arc<dyn Store>,
    warmup_queue: Arc<WarmupQueue>,
    warm_pool_scheduler: Arc<WarmPoolScheduler<SystemClock>>,
    reconciler: Arc<Reconciler<SystemClock>>,
    reconciler_interval: Duration,
    reconciler_cancel: CancellationToken,
}

impl App {
    pub async fn build(config: &Config) -> Result<Self, AppError> {
        let driver: Arc<dyn Driver> = match &config.driver {
            DriverConfig::Docker { socket: Some(socket) } => Arc::new(DockerDriver::with_host(socket.clone())),
            DriverConfig::Docker { socket: None } => Arc::new(DockerDriver::new()),
            DriverConfig::K8s { namespace } => Arc::new(K8sDriver::new(namespace.clone()).await?),
        };
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let clients: Arc<dyn RuntimeClientFactory> = Arc::new(RuntimeClientPool::new(
            RUNTIME_CLIENT_POOL_CAPACITY,
            RUNTIME_CLIENT_TTL,
            RUNTIME_CLIENT_META_TTL,
        ));
        let clock = SystemClock::default();
        let profiles: Arc<dyn ProfileRegistry> = Arc::new(StaticProfileRegistry::new(config.profiles.clone()));

        let sessions = Arc::new(SessionManager::new(driver.clone(), store.clone(), clients.clone(), clock.clone()));
        let locks = Arc::new(SandboxLocks::new());
        let sandbox_manager = Arc::new(SandboxManager::new(
            store.clone(),
            driver.clone(),
            sessions,
            profiles.clone(),
            locks,
            clock.clone(),
        ));

        let capability_router = Arc::new(CapabilityRouter::new(sandbox_manager.clone(), clients));
        let idempotency = Arc::new(IdempotencyService::new(store.clone(), clock.clone()));

        let warmup_queue = Arc::new(WarmupQueue::new(1024, DropPolicy::DropOldest));
        let warm_pool_scheduler = Arc::new(WarmPoolScheduler::new(
            sandbox_manager.clone(),
            profiles.clone(),
            store.clone(),
            warmup_queue.clone(),
            clock.clone(),
            Duration::from_secs(config.warm_pool.interval_secs),
            config.warm_pool.run_on_startup,
        ));
        let reconciler = Arc::new(Reconciler::new(sandbox_manager.clone(), store.clone(), driver, clock));

        Ok(Self {
            sandbox_manager,
            capability_router,
            idempotency,
            profiles,
            store,
            warmup_queue,
            warm_pool_scheduler,
            reconciler,
            reconciler_interval: Duration::from_secs(config.reconciler.interval_secs),
            reconciler_cancel: CancellationToken::new(),
        })
    }

    /// Spawn every background loop and block until SIGTERM/SIGINT, then
    /// run the shutdown drain (spec §5).
    pub async fn run(self: Arc<Self>) -> Result<(), AppError> {
        self.warmup_queue.start(
            WARMUP_WORKER_COUNT,
            self.sandbox_manager.clone(),
            self.profiles.clone(),
            self.store.clone(),
        );
        self.warm_pool_scheduler.start();
        let reconciler_handle = self.spawn_reconciler_loop();

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }

        self.reconciler_cancel.cancel();
        let _ = reconciler_handle.await;
        self.shutdown().await;
        Ok(())
    }

    fn spawn_reconciler_loop(&self) -> tokio::task::JoinHandle<()> {
        let reconciler = self.reconciler.clone();
        let period = self.reconciler_interval;
        let cancel = self.reconciler_cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => reconciler.run_cycle().await,
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }

    /// Warmup queue drains for a bounded period, then every profile's
    /// remaining warm-pool sandboxes are soft-deleted best-effort (spec
    /// §5). Failures are logged, never propagated — shutdown always runs
    /// to completion.
    async fn shutdown(&self) {
        self.warm_pool_scheduler.shutdown().await;
        self.warmup_queue.shutdown(WARMUP_DRAIN_TIMEOUT).await;

        for profile in self.profiles.all() {
            match self.sandbox_manager.drain_warm_pool(&profile.id).await {
                Ok(count) => {
                    if count > 0 {
                        info!(profile_id = %profile.id, count, "drained warm pool on shutdown");
                    }
                }
                Err(e) => warn!(profile_id = %profile.id, error = %e, "failed to drain warm pool on shutdown"),
            }
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
