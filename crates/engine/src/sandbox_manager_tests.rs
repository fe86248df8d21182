// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sandbox_adapters::{FakeDriver, FakeRuntimeClientFactory};
use sandbox_core::{FakeClock, Profile};
use sandbox_storage::MemoryStore;

fn harness() -> (
    SandboxManager<FakeClock>,
    Arc<FakeDriver>,
    Arc<MemoryStore>,
    FakeClock,
) {
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
    let manager = SandboxManager::new(
        store.clone() as Arc<dyn Store>,
        driver.clone() as Arc<dyn Driver>,
        sessions,
        profiles,
        locks,
        clock.clone(),
    );
    (manager, driver, store, clock)
}

fn owner() -> OwnerId {
    OwnerId::new("acct_test").unwrap()
}

#[tokio::test]
async fn create_with_unknown_profile_is_rejected() {
    let (manager, ..) = harness();
    let err = manager.create(owner(), "nope", None, None).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn create_without_workspace_provisions_a_managed_one() {
    let (manager, driver, store, _clock) = harness();
    let sandbox = manager.create(owner(), "python-default", None, Some(3600)).await.unwrap();

    let workspace = store.get_workspace(&sandbox.workspace_id).await.unwrap();
    assert!(workspace.managed());
    assert_eq!(driver.volume_count(), 1);
    assert!(sandbox.expires_at.is_some());
}

#[tokio::test]
async fn ensure_running_twice_is_idempotent() {
    let (manager, driver, _store, _clock) = harness();
    let sandbox = manager.create(owner(), "python-default", None, None).await.unwrap();

    let first = manager.ensure_running(&sandbox.id).await.unwrap();
    let second = manager.ensure_running(&sandbox.id).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(driver.container_count(), 1);
}

#[tokio::test]
async fn ensure_running_on_deleted_sandbox_is_not_found() {
    let (manager, ..) = harness();
    let sandbox = manager.create(owner(), "python-default", None, None).await.unwrap();
    manager.delete(&sandbox.id, "test", "req-1").await.unwrap();

    let err = manager.ensure_running(&sandbox.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn extend_ttl_rejects_infinite_sandbox() {
    let (manager, ..) = harness();
    let sandbox = manager.create(owner(), "python-default", None, None).await.unwrap();

    let err = manager.extend_ttl(&sandbox.id, &owner(), 60).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn extend_ttl_rejects_expired_sandbox() {
    let (manager, _driver, _store, clock) = harness();
    let sandbox = manager.create(owner(), "python-default", None, Some(10)).await.unwrap();
    clock.advance(std::time::Duration::from_secs(11));

    let err = manager.extend_ttl(&sandbox.id, &owner(), 60).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn extend_ttl_pushes_expiry_forward() {
    let (manager, ..) = harness();
    let sandbox = manager.create(owner(), "python-default", None, Some(10)).await.unwrap();

    let extended = manager.extend_ttl(&sandbox.id, &owner(), 60).await.unwrap();
    assert!(extended.expires_at.unwrap() > sandbox.expires_at.unwrap());
}

#[tokio::test]
async fn keepalive_bumps_idle_expiry() {
    let (manager, ..) = harness();
    let sandbox = manager.create(owner(), "python-default", None, None).await.unwrap();
    manager.ensure_running(&sandbox.id).await.unwrap();

    let touched = manager.keepalive(&sandbox.id).await.unwrap();
    assert!(touched.idle_expires_at.is_some());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (manager, driver, _store, _clock) = harness();
    let sandbox = manager.create(owner(), "python-default", None, None).await.unwrap();
    manager.ensure_running(&sandbox.id).await.unwrap();

    let first = manager.stop(&sandbox.id).await.unwrap();
    let second = manager.stop(&sandbox.id).await.unwrap();

    assert!(first.current_session_id.is_none());
    assert!(second.current_session_id.is_none());
    assert_eq!(driver.container_count(), 1, "stop does not destroy the container");
}

#[tokio::test]
async fn delete_is_idempotent_and_removes_managed_workspace() {
    let (manager, driver, store, _clock) = harness();
    let sandbox = manager.create(owner(), "python-default", None, None).await.unwrap();
    manager.ensure_running(&sandbox.id).await.unwrap();

    manager.delete(&sandbox.id, "test", "req-1").await.unwrap();
    manager.delete(&sandbox.id, "test", "req-1").await.unwrap();

    assert_eq!(driver.container_count(), 0);
    assert_eq!(driver.volume_count(), 0);
    assert!(store.get_workspace(&sandbox.workspace_id).await.is_err());
}

#[tokio::test]
async fn list_filters_by_status() {
    let (manager, _driver, _store, _clock) = harness();
    let owner = owner();
    let running = manager.create(owner.clone(), "python-default", None, None).await.unwrap();
    manager.ensure_running(&running.id).await.unwrap();
    let _idle = manager.create(owner.clone(), "python-default", None, None).await.unwrap();

    let page = manager
        .list(&owner, Some(sandbox_core::SandboxStatus::Ready), 10, None)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, running.id);
}

#[tokio::test]
async fn warm_pool_create_mark_available_then_claim() {
    let (manager, ..) = harness();
    let warm = manager.create_warm_sandbox("python-default", 3600).await.unwrap();
    assert!(warm.is_warm_pool);
    assert!(warm.warm_state.is_none());

    manager.mark_warm_available(&warm.id, 3600).await.unwrap();

    let claimed = manager
        .claim_warm_sandbox(&owner(), "python-default", Some(3600))
        .await
        .unwrap()
        .expect("a warm sandbox should be available to claim");
    assert_eq!(claimed.id, warm.id);
    assert_eq!(claimed.owner, owner());
}

#[tokio::test]
async fn claim_warm_sandbox_returns_none_when_pool_is_empty() {
    let (manager, ..) = harness();
    let claimed = manager
        .claim_warm_sandbox(&owner(), "python-default", None)
        .await
        .unwrap();
    assert!(claimed.is_none());
}

#[tokio::test]
async fn mark_warm_retiring_is_a_no_op_unless_available() {
    let (manager, ..) = harness();
    let warm = manager.create_warm_sandbox("python-default", 3600).await.unwrap();

    // Not yet AVAILABLE; should warn and no-op rather than error.
    manager.mark_warm_retiring(&warm.id).await.unwrap();

    manager.mark_warm_available(&warm.id, 3600).await.unwrap();
    manager.mark_warm_retiring(&warm.id).await.unwrap();
}

#[tokio::test]
async fn drain_warm_pool_deletes_unclaimed_but_spares_claimed() {
    let (manager, _driver, store, _clock) = harness();
    let pending = manager.create_warm_sandbox("python-default", 3600).await.unwrap();
    let available = manager.create_warm_sandbox("python-default", 3600).await.unwrap();
    manager.mark_warm_available(&available.id, 3600).await.unwrap();

    let claimed = manager
        .claim_warm_sandbox(&owner(), "python-default", Some(3600))
        .await
        .unwrap()
        .expect("claim should win");
    assert_eq!(claimed.id, available.id);

    let drained = manager.drain_warm_pool("python-default").await.unwrap();
    assert_eq!(drained, 1);

    assert!(store.get_sandbox(&pending.id).await.unwrap().deleted_at.is_some());
    assert!(store.get_sandbox(&claimed.id).await.unwrap().deleted_at.is_none());
}
