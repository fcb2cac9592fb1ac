// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Container host adapter: the seam between the engine and the
//! virtualization host. The engine owns jobs and records; everything that
//! touches an actual container goes through [`ContainerManager`].

mod manager;

pub use manager::{
    ContainerError, ContainerManager, ContainerStatus, CreateOpts, ExecOutput, MountOpt,
    StorageInfo, UpdateParams,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeContainer, FakeContainerManager, ManagerCall};
