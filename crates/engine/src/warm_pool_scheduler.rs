// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic top-up/rotation loop that keeps every profile's warm pool at
//! `warm_pool_size` (spec §4.7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sandbox_core::{Clock, Profile, Store, WarmState};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::profile_registry::ProfileRegistry;
use crate::sandbox_manager::SandboxManager;
use crate::warmup_queue::WarmupQueue;

pub struct WarmPoolScheduler<C: Clock> {
    sandbox_manager: Arc<SandboxManager<C>>,
    profiles: Arc<dyn ProfileRegistry>,
    store: Arc<dyn Store>,
    warmup_queue: Arc<WarmupQueue>,
    clock: C,
    period: Duration,
    run_on_startup: bool,
    running: Arc<AtomicBool>,
    run_once: AsyncMutex<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Clock + 'static> WarmPoolScheduler<C> {
    pub fn new(
        sandbox_manager: Arc<SandboxManager<C>>,
        profiles: Arc<dyn ProfileRegistry>,
        store: Arc<dyn Store>,
        warmup_queue: Arc<WarmupQueue>,
        clock: C,
        period: Duration,
        run_on_startup: bool,
    ) -> Self {
        Self {
            sandbox_manager,
            profiles,
            store,
            warmup_queue,
            clock,
            period,
            run_on_startup,
            running: Arc::new(AtomicBool::new(true)),
            run_once: AsyncMutex::new(()),
            handle: Mutex::new(None),
        }
    }

    /// Run exactly one sweep over every `warm_pool_size > 0` profile.
    /// Never overlaps a concurrently running cycle (`run_once`).
    pub async fn run_cycle(&self) {
        let _guard = self.run_once.lock().await;
        for profile in self.profiles.all() {
            if profile.warm_pool_size == 0 {
                continue;
            }
            if let Err(e) = self.run_profile_cycle(&profile).await {
                warn!(profile_id = %profile.id, error = %e, "warm pool cycle failed for profile");
            }
        }
    }

    async fn run_profile_cycle(&self, profile: &Profile) -> sandbox_core::Result<()> {
        let now = self.clock.epoch_ms();

        let mut available = self.store.count_warm(&profile.id, Some(WarmState::Available)).await?;
        let pending = self.store.count_warm(&profile.id, None).await?;

        let due = self.store.list_warm_due_for_rotation(&profile.id, now).await?;
        for sandbox in &due {
            if let Err(e) = self.sandbox_manager.mark_warm_retiring(&sandbox.id).await {
                warn!(sandbox_id = %sandbox.id, error = %e, "failed to mark warm sandbox retiring");
                continue;
            }
            available = available.saturating_sub(1);
        }

        let target = i64::from(profile.warm_pool_size);
        let deficit = target - (available as i64 + pending as i64);
        if deficit > 0 {
            info!(profile_id = %profile.id, deficit, "warm pool deficit detected");
            for _ in 0..deficit {
                match self
                    .sandbox_manager
                    .create_warm_sandbox(&profile.id, profile.warm_rotate_ttl_secs)
                    .await
                {
                    Ok(sandbox) => {
                        self.warmup_queue.enqueue(sandbox.id, sandbox.owner.clone());
                    }
                    Err(e) => {
                        warn!(profile_id = %profile.id, error = %e, "failed to create warm sandbox");
                    }
                }
            }
        }

        for sandbox in due {
            if let Err(e) = self.sandbox_manager.delete(&sandbox.id, "warm_pool.rotate", "warm-pool-scheduler").await {
                warn!(sandbox_id = %sandbox.id, error = %e, "failed to delete retiring warm sandbox");
            }
        }

        Ok(())
    }

    /// Spawn the periodic loop. `run_on_startup` runs one cycle before the
    /// first sleep; the loop always sleeps before every subsequent cycle so
    /// a startup cycle is never immediately followed by a second one.
    pub fn start(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if scheduler.run_on_startup {
                scheduler.run_cycle().await;
            }
            loop {
                tokio::time::sleep(scheduler.period).await;
                if !scheduler.running.load(Ordering::SeqCst) {
                    break;
                }
                scheduler.run_cycle().await;
            }
            debug!("warm pool scheduler stopped");
        });
        *self.handle.lock() = Some(handle);
    }

    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "warm pool scheduler task panicked");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "warm_pool_scheduler_tests.rs"]
mod tests;
