// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

define_id! {
    pub struct TestId("tst-");
}

#[test]
fn new_generates_prefixed_id() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn new_generates_unique_ids() {
    let a = TestId::new();
    let b = TestId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_roundtrips() {
    let id = TestId::from_string("tst-0000000000000000001");
    assert_eq!(id.as_str(), "tst-0000000000000000001");
}

#[test]
fn suffix_strips_prefix() {
    let id = TestId::from_string("tst-abc");
    assert_eq!(id.suffix(), "abc");
}

#[test]
fn short_truncates() {
    let id = TestId::from_string("tst-abcdefgh");
    assert_eq!(id.short(3), "abc");
}

#[test]
fn short_returns_full_when_shorter() {
    let id = TestId::from_string("tst-ab");
    assert_eq!(id.short(10), "ab");
}

#[test]
fn short_returns_full_when_exact() {
    let id = TestId::from_string("tst-abc");
    assert_eq!(id.short(3), "abc");
}

#[test]
fn is_empty_reports_empty_ids() {
    let id = TestId(IdBuf::empty());
    assert!(id.is_empty());
    assert!(!TestId::new().is_empty());
}

#[test]
fn default_generates_random_id() {
    let a = TestId::default();
    let b = TestId::default();
    assert_ne!(a, b);
}

#[test]
fn display_matches_as_str() {
    let id = TestId::from_string("tst-xyz");
    assert_eq!(format!("{id}"), "tst-xyz");
}

#[test]
fn can_be_used_as_hash_map_key_and_looked_up_by_str() {
    let id = TestId::new();
    let mut map: HashMap<TestId, u32> = HashMap::new();
    map.insert(id, 7);
    assert_eq!(map.get(id.as_str()), Some(&7));
}

#[test]
fn short_fn_on_str_truncates() {
    assert_eq!(short("hello", 3), "hel");
    assert_eq!(short("hi", 10), "hi");
}

#[test]
fn eq_str_and_ref_str() {
    let id = TestId::from_string("tst-abc");
    assert_eq!(id, "tst-abc");
    assert_eq!(id, *&"tst-abc");
}
