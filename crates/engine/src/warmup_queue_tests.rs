// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use sandbox_adapters::{FakeDriver, FakeRuntimeClientFactory};
use sandbox_core::{Driver, FakeClock, Profile, Store};
use sandbox_storage::MemoryStore;

use crate::lock::SandboxLocks;
use crate::profile_registry::StaticProfileRegistry;
use crate::session_manager::SessionManager;

fn owner() -> OwnerId {
    OwnerId::new("acct_test").unwrap()
}

fn harness() -> (Arc<SandboxManager<FakeClock>>, Arc<FakeDriver>, Arc<MemoryStore>) {
    let driver = Arc::new(FakeDriver::new());
    let clients = Arc::new(FakeRuntimeClientFactory::new());
    let store = Arc::new(MemoryStore::new());
    let clock = FakeClock::new();
    let profiles = Arc::new(StaticProfileRegistry::new([
        Profile::builder().id("python-default").runtime_port(8000).build(),
    ]));
    let sessions = Arc::new(SessionManager::new(
        driver.clone() as Arc<dyn Driver>,
        store.clone() as Arc<dyn Store>,
        clients.clone() as Arc<dyn sandbox_core::RuntimeClientFactory>,
        clock.clone(),
    ));
    let locks = Arc::new(SandboxLocks::new());
    let manager = Arc::new(SandboxManager::new(
        store.clone() as Arc<dyn Store>,
        driver.clone() as Arc<dyn Driver>,
        sessions,
        profiles,
        locks,
        clock,
    ));
    (manager, driver, store)
}

#[test]
fn enqueue_dedups_same_sandbox() {
    let queue = WarmupQueue::new(4, DropPolicy::DropNewest);
    let id = SandboxId::new();
    assert!(queue.enqueue(id, owner()));
    assert!(!queue.enqueue(id, owner()));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.dedup_total(), 1);
}

#[test]
fn drop_newest_rejects_when_full() {
    let queue = WarmupQueue::new(2, DropPolicy::DropNewest);
    assert!(queue.enqueue(SandboxId::new(), owner()));
    assert!(queue.enqueue(SandboxId::new(), owner()));
    assert!(!queue.enqueue(SandboxId::new(), owner()));
    assert_eq!(queue.len(), 2);
}

#[test]
fn drop_oldest_evicts_head_when_full() {
    let queue = WarmupQueue::new(2, DropPolicy::DropOldest);
    let first = SandboxId::new();
    let second = SandboxId::new();
    let third = SandboxId::new();
    assert!(queue.enqueue(first, owner()));
    assert!(queue.enqueue(second, owner()));
    assert!(queue.enqueue(third, owner()));
    assert_eq!(queue.len(), 2);
    assert!(!queue.is_pending(&first));
    assert!(queue.is_pending(&second));
    assert!(queue.is_pending(&third));
}

#[tokio::test]
async fn worker_brings_up_enqueued_sandbox() {
    let (manager, driver, store) = harness();
    let sandbox = manager.create(owner(), "python-default", None, None).await.unwrap();

    let queue = Arc::new(WarmupQueue::new(8, DropPolicy::DropNewest));
    let profiles: Arc<dyn ProfileRegistry> = Arc::new(StaticProfileRegistry::new([
        Profile::builder().id("python-default").runtime_port(8000).build(),
    ]));
    queue.start(1, manager.clone(), profiles, store.clone() as Arc<dyn Store>);

    assert!(queue.enqueue(sandbox.id, owner()));

    let mut waited = Duration::ZERO;
    while queue.is_pending(&sandbox.id) && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    assert!(!queue.is_pending(&sandbox.id));
    assert_eq!(driver.container_count(), 1);

    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn worker_skips_already_deleted_sandbox() {
    let (manager, driver, store) = harness();
    let sandbox = manager.create(owner(), "python-default", None, None).await.unwrap();
    manager.delete(&sandbox.id, "test", "req-1").await.unwrap();

    let queue = Arc::new(WarmupQueue::new(8, DropPolicy::DropNewest));
    let profiles: Arc<dyn ProfileRegistry> = Arc::new(StaticProfileRegistry::new([
        Profile::builder().id("python-default").runtime_port(8000).build(),
    ]));
    queue.start(1, manager.clone(), profiles, store.clone() as Arc<dyn Store>);

    assert!(queue.enqueue(sandbox.id, owner()));

    let mut waited = Duration::ZERO;
    while queue.is_pending(&sandbox.id) && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    assert_eq!(driver.container_count(), 0);
    queue.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn shutdown_stops_workers_from_picking_up_new_work() {
    let (manager, _driver, store) = harness();
    let queue = Arc::new(WarmupQueue::new(8, DropPolicy::DropNewest));
    let profiles: Arc<dyn ProfileRegistry> = Arc::new(StaticProfileRegistry::new([
        Profile::builder().id("python-default").runtime_port(8000).build(),
    ]));
    queue.start(2, manager.clone(), profiles, store.clone() as Arc<dyn Store>);
    queue.shutdown(Duration::from_secs(1)).await;
    assert!(queue.workers.lock().is_empty());
}
