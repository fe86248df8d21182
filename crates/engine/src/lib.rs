// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sandbox-engine: the stateful managers that turn `sandbox-core` traits
//! into a running orchestrator — Session Manager, Sandbox Manager, Warmup
//! Queue, Warm Pool Scheduler, Capability Router, Idempotency Service, and
//! the Reconciler/GC. Depends only on `sandbox-core` trait objects; a
//! binary crate (`sandboxd`) wires in concrete `sandbox-adapters` and
//! `sandbox-storage` implementations.

pub mod capability_router;
pub mod idempotency_service;
pub mod lock;
pub mod profile_registry;
pub mod reconciler;
pub mod sandbox_manager;
pub mod session_manager;
pub mod warm_pool_scheduler;
pub mod warmup_queue;

pub use capability_router::CapabilityRouter;
pub use idempotency_service::IdempotencyService;
pub use lock::SandboxLocks;
pub use profile_registry::{ProfileRegistry, StaticProfileRegistry};
pub use reconciler::Reconciler;
pub use sandbox_manager::SandboxManager;
pub use session_manager::SessionManager;
pub use warm_pool_scheduler::WarmPoolScheduler;
pub use warmup_queue::{DropPolicy, WarmupQueue};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
