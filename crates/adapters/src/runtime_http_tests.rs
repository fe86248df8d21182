// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn get_reuses_the_same_client_for_the_same_endpoint() {
    let pool = RuntimeClientPool::new(4, Duration::from_secs(60), Duration::from_secs(5));
    let a = pool.get("http://127.0.0.1:9000");
    let b = pool.get("http://127.0.0.1:9000");
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(pool.len(), 1);
}

#[test]
fn get_evicts_least_recently_used_on_overflow() {
    let pool = RuntimeClientPool::new(2, Duration::from_secs(60), Duration::from_secs(5));
    let a = pool.get("http://127.0.0.1:9001");
    std::thread::sleep(Duration::from_millis(5));
    let _b = pool.get("http://127.0.0.1:9002");
    std::thread::sleep(Duration::from_millis(5));
    // touch `a` so `b` becomes the LRU entry
    let _ = pool.get("http://127.0.0.1:9001");
    std::thread::sleep(Duration::from_millis(5));
    let _c = pool.get("http://127.0.0.1:9003");

    assert_eq!(pool.len(), 2);
    let a_again = pool.get("http://127.0.0.1:9001");
    assert!(Arc::ptr_eq(&a, &a_again), "endpoint 9001 should have survived eviction");
}

#[test]
fn get_reconstructs_client_after_ttl_expiry() {
    let pool = RuntimeClientPool::new(4, Duration::from_millis(1), Duration::from_secs(5));
    let a = pool.get("http://127.0.0.1:9010");
    std::thread::sleep(Duration::from_millis(5));
    let b = pool.get("http://127.0.0.1:9010");
    assert!(!Arc::ptr_eq(&a, &b), "expired client should be reconstructed, not reused");
}

#[test]
fn urlencode_escapes_query_delimiters() {
    assert_eq!(urlencode("a b"), "a%20b");
    assert_eq!(urlencode("100%"), "100%25");
    assert_eq!(urlencode("a&b"), "a%26b");
    assert_eq!(urlencode("plain/path.txt"), "plain/path.txt");
}
