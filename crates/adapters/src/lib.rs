// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sandbox-adapters: concrete [`sandbox_core::Driver`] and
//! [`sandbox_core::RuntimeClient`] implementations. `sandbox-engine` depends
//! only on the `sandbox-core` traits; this crate is where a binary (or a
//! test) picks a concrete container runtime and capability transport.

pub mod docker;
pub mod k8s;
pub mod runtime_http;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use docker::DockerDriver;
pub use k8s::K8sDriver;
pub use runtime_http::{HttpRuntimeClient, RuntimeClientPool};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeDriver, FakeRuntimeClient, FakeRuntimeClientFactory};
