// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use sandbox_core::test_support::test_owner;
use sandbox_core::{Sandbox, WarmState};

use super::*;

#[tokio::test]
async fn insert_then_get_round_trips() {
    let store = MemoryStore::new();
    let sandbox = Sandbox::builder().build();
    let mut tx = store.begin().await.unwrap();
    tx.insert_sandbox(&sandbox).await.unwrap();
    tx.commit().await.unwrap();

    let fetched = store.get_sandbox(&sandbox.id).await.unwrap();
    assert_eq!(fetched.id, sandbox.id);
}

#[tokio::test]
async fn get_missing_sandbox_is_not_found() {
    let store = MemoryStore::new();
    let err = store.get_sandbox(&sandbox_core::SandboxId::new()).await;
    assert!(matches!(err, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn soft_delete_clears_current_session_and_hides_from_list() {
    let store = MemoryStore::new();
    let owner = test_owner();
    let sandbox = Sandbox::builder()
        .owner(owner.clone())
        .current_session_id(sandbox_core::SessionId::new())
        .build();
    let id = sandbox.id;
    let mut tx = store.begin().await.unwrap();
    tx.insert_sandbox(&sandbox).await.unwrap();
    tx.soft_delete_sandbox(&id, 100).await.unwrap();
    tx.commit().await.unwrap();

    let fetched = store.get_sandbox(&id).await.unwrap();
    assert!(fetched.deleted_at.is_some());
    assert!(fetched.current_session_id.is_none());

    let page = store.list_sandboxes(&owner, None, 10).await.unwrap();
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn soft_delete_is_idempotent_on_timestamp() {
    let store = MemoryStore::new();
    let sandbox = Sandbox::builder().build();
    let id = sandbox.id;
    let mut tx = store.begin().await.unwrap();
    tx.insert_sandbox(&sandbox).await.unwrap();
    tx.soft_delete_sandbox(&id, 100).await.unwrap();
    tx.soft_delete_sandbox(&id, 200).await.unwrap();
    tx.commit().await.unwrap();

    let fetched = store.get_sandbox(&id).await.unwrap();
    assert_eq!(fetched.deleted_at, Some(100));
}

#[tokio::test]
async fn list_sandboxes_filters_by_owner_and_paginates() {
    let store = MemoryStore::new();
    let owner = test_owner();
    let other = sandbox_core::OwnerId::new("acct_other").unwrap();

    for _ in 0..5 {
        let sandbox = Sandbox::builder().owner(owner.clone()).build();
        store.begin().await.unwrap().insert_sandbox(&sandbox).await.unwrap();
    }
    let foreign = Sandbox::builder().owner(other.clone()).build();
    store.begin().await.unwrap().insert_sandbox(&foreign).await.unwrap();

    let page = store.list_sandboxes(&owner, None, 2).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.next_cursor.is_some());

    let page2 = store
        .list_sandboxes(&owner, page.next_cursor.as_deref(), 2)
        .await
        .unwrap();
    assert_eq!(page2.items.len(), 2);
    assert_ne!(page.items[0].id, page2.items[0].id);
}

#[tokio::test]
async fn list_sandboxes_excludes_warm_pool_rows() {
    let store = MemoryStore::new();
    let owner = test_owner();
    let warm = Sandbox::builder()
        .owner(sandbox_core::OwnerId::warm_pool())
        .is_warm_pool(true)
        .build();
    store.begin().await.unwrap().insert_sandbox(&warm).await.unwrap();

    let page = store.list_sandboxes(&owner, None, 10).await.unwrap();
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn claim_warm_sandbox_picks_earliest_ready() {
    let store = MemoryStore::new();
    let older = Sandbox::builder()
        .owner(sandbox_core::OwnerId::warm_pool())
        .is_warm_pool(true)
        .warm_state(WarmState::Available)
        .warm_ready_at(10)
        .profile_id("python-default")
        .build();
    let newer = Sandbox::builder()
        .owner(sandbox_core::OwnerId::warm_pool())
        .is_warm_pool(true)
        .warm_state(WarmState::Available)
        .warm_ready_at(20)
        .profile_id("python-default")
        .build();
    store.begin().await.unwrap().insert_sandbox(&older).await.unwrap();
    store.begin().await.unwrap().insert_sandbox(&newer).await.unwrap();

    let claimant = test_owner();
    let claimed = store
        .try_claim_warm_sandbox("python-default", &claimant, 1000, Some(2000))
        .await
        .unwrap()
        .expect("a warm sandbox should be claimed");

    assert_eq!(claimed.id, older.id);
    assert_eq!(claimed.warm_state, Some(WarmState::Claimed));
    assert!(!claimed.is_warm_pool);
    assert_eq!(claimed.owner, claimant);
}

#[tokio::test]
async fn claim_warm_sandbox_returns_none_when_nothing_available() {
    let store = MemoryStore::new();
    let claimant = test_owner();
    let claimed = store
        .try_claim_warm_sandbox("python-default", &claimant, 1000, None)
        .await
        .unwrap();
    assert!(claimed.is_none());
}

#[tokio::test]
async fn list_warm_pool_sandboxes_excludes_claimed_and_other_profiles() {
    let store = MemoryStore::new();
    let pending = Sandbox::builder()
        .owner(sandbox_core::OwnerId::warm_pool())
        .is_warm_pool(true)
        .profile_id("python-default")
        .build();
    let claimed = Sandbox::builder()
        .owner(test_owner())
        .is_warm_pool(false)
        .profile_id("python-default")
        .build();
    let other_profile = Sandbox::builder()
        .owner(sandbox_core::OwnerId::warm_pool())
        .is_warm_pool(true)
        .profile_id("python-data")
        .build();
    for sandbox in [&pending, &claimed, &other_profile] {
        store.begin().await.unwrap().insert_sandbox(sandbox).await.unwrap();
    }

    let pool = store.list_warm_pool_sandboxes("python-default").await.unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].id, pending.id);
}

#[tokio::test]
async fn idempotency_round_trips_and_is_scoped_by_owner() {
    let store = MemoryStore::new();
    let owner = test_owner();
    let key = sandbox_core::IdempotencyKey::new("req-1").unwrap();
    let record = sandbox_core::IdempotencyRecord {
        owner: owner.clone(),
        key: key.clone(),
        body_hash: "abc".into(),
        response_status: 201,
        response_body: serde_json::json!({"id": "sbx-x"}),
        created_at: 0,
        expires_at: 3600,
    };
    store.idempotency_save(record.clone()).await.unwrap();

    let fetched = store.idempotency_get(&owner, &key, 0).await.unwrap();
    assert_eq!(fetched.unwrap().body_hash, "abc");

    let other = sandbox_core::OwnerId::new("acct_other").unwrap();
    assert!(store.idempotency_get(&other, &key, 0).await.unwrap().is_none());
}

#[tokio::test]
async fn idempotency_get_treats_expired_record_as_a_miss() {
    let store = MemoryStore::new();
    let owner = test_owner();
    let key = sandbox_core::IdempotencyKey::new("req-1").unwrap();
    let record = sandbox_core::IdempotencyRecord {
        owner: owner.clone(),
        key: key.clone(),
        body_hash: "abc".into(),
        response_status: 201,
        response_body: serde_json::json!({"id": "sbx-x"}),
        created_at: 0,
        expires_at: 3600,
    };
    store.idempotency_save(record).await.unwrap();

    assert!(store.idempotency_get(&owner, &key, 3600).await.unwrap().is_none());
    assert!(store.idempotency_get(&owner, &key, 9999).await.unwrap().is_none());
    assert!(store.idempotency_get(&owner, &key, 3599).await.unwrap().is_some());
}
