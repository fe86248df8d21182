// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn profile(id: &str) -> Profile {
    Profile::builder().id(id).build()
}

#[test]
fn resolves_known_profile_by_id() {
    let registry = StaticProfileRegistry::new([profile("python-default"), profile("python-data")]);
    assert_eq!(registry.get("python-default").unwrap().id, "python-default");
    assert_eq!(registry.len(), 2);
}

#[test]
fn unknown_profile_is_a_validation_error() {
    let registry = StaticProfileRegistry::new([profile("python-default")]);
    assert!(matches!(registry.get("nope"), Err(Error::Validation(_))));
}
