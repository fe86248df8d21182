// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn session_not_ready_carries_retry_hint() {
    let err = Error::session_not_ready("sbx-abc", 250);
    match err {
        Error::SessionNotReady {
            sandbox_id,
            retry_after_ms,
        } => {
            assert_eq!(sandbox_id, "sbx-abc");
            assert_eq!(retry_after_ms, 250);
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn only_transient_is_retriable() {
    assert!(Error::Transient("store hiccup".into()).is_retriable());
    assert!(!Error::not_found("sbx-abc").is_retriable());
    assert!(!Error::DriverError("boom".into()).is_retriable());
    assert!(!Error::Timeout(Duration::from_secs(1)).is_retriable());
}

#[test]
fn capability_not_supported_display_includes_both_sides() {
    let err = Error::CapabilityNotSupported {
        requested: "browser".into(),
        available: vec!["python".into(), "shell".into()],
    };
    let msg = err.to_string();
    assert!(msg.contains("browser"));
    assert!(msg.contains("python"));
}
