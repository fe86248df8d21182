// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn container_info_not_found_has_no_endpoint_or_exit_code() {
    let info = ContainerInfo::not_found();
    assert_eq!(info.status, ContainerStatus::NotFound);
    assert!(info.endpoint.is_none());
    assert!(info.exit_code.is_none());
}

#[test]
fn labels_render_all_required_keys() {
    let labels = ContainerLabels {
        owner: "acct_123".into(),
        sandbox_id: SandboxId::new(),
        session_id: SessionId::new(),
        workspace_id: WorkspaceId::new(),
        profile_id: "python-default".into(),
    };
    let map = labels.as_map();
    for key in ["owner", "sandbox_id", "session_id", "workspace_id", "profile_id", "managed"] {
        assert!(map.contains_key(key), "missing label {key}");
    }
    assert_eq!(map["managed"], "true");
    assert_eq!(map["owner"], "acct_123");
}
