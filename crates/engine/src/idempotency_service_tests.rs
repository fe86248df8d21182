// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sandbox_adapters::{FakeDriver, FakeRuntimeClientFactory};
use sandbox_core::{Driver, FakeClock, Profile, Store};
use sandbox_storage::MemoryStore;

use crate::lock::SandboxLocks;
use crate::profile_registry::StaticProfileRegistry;
use crate::session_manager::SessionManager;
use crate::warmup_queue::DropPolicy;

fn harness() -> (IdempotencyService<FakeClock>, Arc<SandboxManager<FakeClock>>, WarmupQueue, Arc<MemoryStore>) {
    let driver = Arc::new(FakeDriver::new());
    let clients = Arc::new(FakeRuntimeClientFactory::new());
    let store = Arc::new(MemoryStore::new());
    let clock = FakeClock::new();
    let profiles = Arc::new(StaticProfileRegistry::new([Profile::builder().id("python-default").build()]));
    let sessions = Arc::new(SessionManager::new(
        driver.clone() as Arc<dyn Driver>,
        store.clone() as Arc<dyn Store>,
        clients as Arc<dyn sandbox_core::RuntimeClientFactory>,
        clock.clone(),
    ));
    let locks = Arc::new(SandboxLocks::new());
    let manager = Arc::new(SandboxManager::new(
        store.clone() as Arc<dyn Store>,
        driver as Arc<dyn Driver>,
        sessions,
        profiles,
        locks,
        clock.clone(),
    ));
    let idempotency = IdempotencyService::new(store.clone() as Arc<dyn Store>, clock);
    let queue = WarmupQueue::new(16, DropPolicy::DropNewest);
    (idempotency, manager, queue, store)
}

fn owner() -> OwnerId {
    OwnerId::new("acct_idem").unwrap()
}

#[tokio::test]
async fn miss_then_hit_returns_cached_response() {
    let (idempotency, _manager, _queue, _store) = harness();
    let key = IdempotencyKey::new("req-1").unwrap();

    assert!(matches!(idempotency.check(&owner(), &key, "hash-a").await.unwrap(), CheckOutcome::Miss));

    idempotency
        .save(IdempotencyRecord {
            owner: owner(),
            key: key.clone(),
            body_hash: "hash-a".to_string(),
            response_status: 201,
            response_body: serde_json::json!({"id": "sbx-123"}),
            created_at: 0,
            expires_at: u64::MAX,
        })
        .await
        .unwrap();

    match idempotency.check(&owner(), &key, "hash-a").await.unwrap() {
        CheckOutcome::Hit(record) => assert_eq!(record.response_status, 201),
        CheckOutcome::Miss => panic!("expected hit"),
    }
}

#[tokio::test]
async fn differing_body_hash_is_conflict() {
    let (idempotency, _manager, _queue, _store) = harness();
    let key = IdempotencyKey::new("req-2").unwrap();

    idempotency
        .save(IdempotencyRecord {
            owner: owner(),
            key: key.clone(),
            body_hash: "hash-a".to_string(),
            response_status: 201,
            response_body: serde_json::json!({}),
            created_at: 0,
            expires_at: u64::MAX,
        })
        .await
        .unwrap();

    let err = idempotency.check(&owner(), &key, "hash-b").await.unwrap_err();
    assert!(matches!(err, sandbox_core::Error::Conflict(_)));
}

#[tokio::test]
async fn expired_record_is_a_miss_not_a_hit() {
    let store = Arc::new(MemoryStore::new());
    let clock = FakeClock::new();
    let idempotency = IdempotencyService::new(store.clone() as Arc<dyn Store>, clock.clone());
    let key = IdempotencyKey::new("req-ttl").unwrap();
    let now = clock.epoch_ms();

    idempotency
        .save(IdempotencyRecord {
            owner: owner(),
            key: key.clone(),
            body_hash: "hash-a".to_string(),
            response_status: 201,
            response_body: serde_json::json!({"id": "sbx-ttl"}),
            created_at: now,
            expires_at: now + 60_000,
        })
        .await
        .unwrap();

    assert!(matches!(idempotency.check(&owner(), &key, "hash-a").await.unwrap(), CheckOutcome::Hit(_)));

    clock.advance(std::time::Duration::from_millis(60_001));

    // Past the TTL, the record is a miss — even for the same body hash, and
    // a differing one no longer reports a spurious `Conflict`.
    assert!(matches!(idempotency.check(&owner(), &key, "hash-a").await.unwrap(), CheckOutcome::Miss));
    assert!(matches!(idempotency.check(&owner(), &key, "hash-b").await.unwrap(), CheckOutcome::Miss));
}

#[tokio::test]
async fn create_sandbox_enqueues_warmup_on_miss() {
    let (idempotency, manager, queue, _store) = harness();
    let key = IdempotencyKey::new("req-3").unwrap();

    let outcome = create_sandbox_idempotent(
        &idempotency,
        &manager,
        &queue,
        owner(),
        "python-default",
        None,
        None,
        Some(&key),
        "hash-a",
    )
    .await
    .unwrap();

    let sandbox = match outcome {
        CreateSandboxOutcome::Created(s) => s,
        CreateSandboxOutcome::Replayed(_) => panic!("expected a fresh create on first call"),
    };
    assert!(queue.is_pending(&sandbox.id));
}

#[tokio::test]
async fn create_sandbox_replays_without_enqueueing_again() {
    let (idempotency, manager, queue, _store) = harness();
    let key = IdempotencyKey::new("req-4").unwrap();

    let first = create_sandbox_idempotent(
        &idempotency,
        &manager,
        &queue,
        owner(),
        "python-default",
        None,
        None,
        Some(&key),
        "hash-a",
    )
    .await
    .unwrap();
    let sandbox = match first {
        CreateSandboxOutcome::Created(s) => s,
        CreateSandboxOutcome::Replayed(_) => panic!("expected fresh create"),
    };

    idempotency
        .save(IdempotencyRecord {
            owner: owner(),
            key: key.clone(),
            body_hash: "hash-a".to_string(),
            response_status: 201,
            response_body: serde_json::json!({"id": sandbox.id.to_string()}),
            created_at: 0,
            expires_at: u64::MAX,
        })
        .await
        .unwrap();

    let queue_len_before = queue.len();

    let second = create_sandbox_idempotent(
        &idempotency,
        &manager,
        &queue,
        owner(),
        "python-default",
        None,
        None,
        Some(&key),
        "hash-a",
    )
    .await
    .unwrap();

    assert!(matches!(second, CreateSandboxOutcome::Replayed(_)));
    assert_eq!(queue.len(), queue_len_before);
}
