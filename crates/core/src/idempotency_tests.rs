// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn rejects_empty_key() {
    assert!(IdempotencyKey::new("").is_err());
}

#[test]
fn rejects_whitespace_in_key() {
    assert!(IdempotencyKey::new("abc def").is_err());
    assert!(IdempotencyKey::new("abc\tdef").is_err());
    assert!(IdempotencyKey::new("abc\ndef").is_err());
}

#[test]
fn accepts_printable_key() {
    let key = IdempotencyKey::new("req-2026-07-29-abcdef").unwrap();
    assert_eq!(key.as_str(), "req-2026-07-29-abcdef");
}
