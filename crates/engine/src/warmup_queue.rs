// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, deduped, fixed-worker throttling layer between requests/pool
//! and the heavy `EnsureRunning` start-up path (spec §4.6).
//!
//! Both request-path warmups (a client created a cold sandbox) and
//! pool-replenishment warmups (the Warm Pool Scheduler topped up a
//! profile's reservoir) enqueue here — this is the single throttle point
//! that keeps burst start-up pressure bounded regardless of source (§9
//! "Shared warmup queue").

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sandbox_core::{Clock, OwnerId, SandboxId, SessionState, Store};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::profile_registry::ProfileRegistry;
use crate::sandbox_manager::SandboxManager;

/// Eviction policy applied when [`WarmupQueue::enqueue`] is called against
/// a full queue (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    /// Reject the incoming task, leaving the queue unchanged (the default).
    DropNewest,
    /// Evict the head of the queue to make room for the incoming task.
    DropOldest,
}

/// One pending warm-up: the sandbox to bring up, and the owner that
/// requested it (request-path callers pass the caller's owner; the
/// scheduler passes [`OwnerId::warm_pool`]).
#[derive(Debug, Clone)]
pub struct Task {
    pub sandbox_id: SandboxId,
    pub owner: OwnerId,
}

/// Emit one warning event every this many drops, rather than one per drop.
const DROP_WARN_EVERY: u64 = 10;

/// How long a worker waits for a notification before re-checking the
/// shutdown flag — the "small poll timeout" of spec §4.6.
const WORKER_POLL_TIMEOUT: Duration = Duration::from_millis(200);

struct Inner {
    queue: VecDeque<Task>,
    dedup: HashSet<SandboxId>,
}

/// Bounded FIFO `Queue<Task>` with a fixed worker pool (spec §4.6).
///
/// Built on a `Mutex<VecDeque<_>>` + `Notify` rather than `tokio::sync::mpsc`
/// so `drop_oldest` can evict the queue's head — an operation an mpsc
/// channel has no way to express. `enqueue` is synchronous and non-blocking,
/// matching the spec's admission contract exactly.
pub struct WarmupQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
    policy: DropPolicy,
    running: Arc<AtomicBool>,
    drop_total: AtomicU64,
    dedup_total: AtomicU64,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WarmupQueue {
    pub fn new(capacity: usize, policy: DropPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity.min(1024)),
                dedup: HashSet::new(),
            }),
            notify: Notify::new(),
            capacity,
            policy,
            running: Arc::new(AtomicBool::new(true)),
            drop_total: AtomicU64::new(0),
            dedup_total: AtomicU64::new(0),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Non-blocking, synchronous admission (spec §4.6).
    ///
    /// Returns `false` if `sandbox_id` was already present (a dedup hit) or
    /// was rejected by the drop policy on a full queue.
    pub fn enqueue(&self, sandbox_id: SandboxId, owner: OwnerId) -> bool {
        let mut inner = self.inner.lock();
        if inner.dedup.contains(&sandbox_id) {
            self.dedup_total.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if inner.queue.len() >= self.capacity {
            match self.policy {
                DropPolicy::DropNewest => {
                    self.note_drop(sandbox_id);
                    return false;
                }
                DropPolicy::DropOldest => {
                    if let Some(evicted) = inner.queue.pop_front() {
                        inner.dedup.remove(&evicted.sandbox_id);
                    }
                    self.note_drop(sandbox_id);
                }
            }
        }
        inner.queue.push_back(Task { sandbox_id, owner });
        inner.dedup.insert(sandbox_id);
        drop(inner);
        self.notify.notify_one();
        true
    }

    fn note_drop(&self, sandbox_id: SandboxId) {
        let total = self.drop_total.fetch_add(1, Ordering::Relaxed) + 1;
        if total % DROP_WARN_EVERY == 0 {
            warn!(sandbox_id = %sandbox_id, policy = ?self.policy, drop_total = total, "warmup queue dropping tasks");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `sandbox_id` currently has a task queued or in flight — the
    /// invariant spec §5 requires: "a sandbox is in the dedup set iff at
    /// least one of its tasks is queued or being processed".
    pub fn is_pending(&self, sandbox_id: &SandboxId) -> bool {
        self.inner.lock().dedup.contains(sandbox_id)
    }

    pub fn dedup_total(&self) -> u64 {
        self.dedup_total.load(Ordering::Relaxed)
    }

    pub fn drop_total(&self) -> u64 {
        self.drop_total.load(Ordering::Relaxed)
    }

    fn take(&self) -> Option<Task> {
        self.inner.lock().queue.pop_front()
    }

    fn complete(&self, sandbox_id: &SandboxId) {
        self.inner.lock().dedup.remove(sandbox_id);
    }

    /// Spawn `worker_count` fixed workers draining the queue. Returns a
    /// handle whose [`Self::shutdown`] stops them.
    pub fn start<C: Clock + 'static>(
        self: &Arc<Self>,
        worker_count: usize,
        sandbox_manager: Arc<SandboxManager<C>>,
        profiles: Arc<dyn ProfileRegistry>,
        store: Arc<dyn Store>,
    ) {
        let mut workers = self.workers.lock();
        for worker_id in 0..worker_count {
            let queue = Arc::clone(self);
            let sandbox_manager = Arc::clone(&sandbox_manager);
            let profiles = Arc::clone(&profiles);
            let store = Arc::clone(&store);
            workers.push(tokio::spawn(async move {
                queue.worker_loop(worker_id, sandbox_manager, profiles, store).await;
            }));
        }
    }

    async fn worker_loop<C: Clock>(
        &self,
        worker_id: usize,
        sandbox_manager: Arc<SandboxManager<C>>,
        profiles: Arc<dyn ProfileRegistry>,
        store: Arc<dyn Store>,
    ) {
        debug!(worker_id, "warmup queue worker started");
        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            match self.take() {
                Some(task) => {
                    self.process(&task, &sandbox_manager, &profiles, &store).await;
                    self.complete(&task.sandbox_id);
                }
                None => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep(WORKER_POLL_TIMEOUT) => {}
                    }
                }
            }
        }
        debug!(worker_id, "warmup queue worker stopped");
    }

    async fn process<C: Clock>(
        &self,
        task: &Task,
        sandbox_manager: &SandboxManager<C>,
        profiles: &Arc<dyn ProfileRegistry>,
        store: &Arc<dyn Store>,
    ) {
        let sandbox = match store.get_sandbox(&task.sandbox_id).await {
            Ok(s) => s,
            Err(e) => {
                debug!(sandbox_id = %task.sandbox_id, error = %e, "warmup task skipped: sandbox not found");
                return;
            }
        };
        if sandbox.deleted_at.is_some() {
            return;
        }
        if let Some(session_id) = sandbox.current_session_id {
            if let Ok(session) = store.get_session(&session_id).await {
                if session.observed_state == SessionState::Running {
                    return;
                }
            }
        }

        match sandbox_manager.ensure_running(&task.sandbox_id).await {
            Ok(_) => {
                info!(sandbox_id = %task.sandbox_id, "warmup task completed");
                if sandbox.is_warm_pool && sandbox.warm_state.is_none() {
                    if let Ok(profile) = profiles.get(&sandbox.profile_id) {
                        if let Err(e) = sandbox_manager
                            .mark_warm_available(&task.sandbox_id, profile.warm_rotate_ttl_secs)
                            .await
                        {
                            warn!(sandbox_id = %task.sandbox_id, error = %e, "failed to mark warm sandbox available");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(sandbox_id = %task.sandbox_id, error = %e, "warmup task failed");
            }
        }
    }

    /// Stop accepting further processing and wait up to `timeout` for
    /// in-flight workers to drain; stragglers are aborted.
    pub async fn shutdown(&self, timeout: Duration) {
        self.running.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        if tokio::time::timeout(timeout, join_all(handles)).await.is_err() {
            warn!("warmup queue shutdown timed out; aborting stragglers");
            for handle in abort_handles {
                handle.abort();
            }
        }
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            if e.is_panic() {
                warn!("warmup queue worker panicked");
            }
        }
    }
}

#[cfg(test)]
#[path = "warmup_queue_tests.rs"]
mod tests;
