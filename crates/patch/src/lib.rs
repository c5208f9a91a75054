// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dbx-patch: transactional writer for the declarative host configuration.
//!
//! A patch queues named operations against the nix directory, snapshots the
//! directory, applies the operations in order, invokes the external rebuild
//! driver, and rolls the whole directory back on any failure.

mod ops;
mod patch;
mod rebuild;
mod snapshot;
mod template;

pub use ops::{FirewallRule, NetworkConfig, SystemContainerConfig, SystemSettings};
pub use patch::{Patch, PatchError, PatchReport, PatchState};
pub use rebuild::{CommandRebuildDriver, RebuildDriver, RebuildError, RebuildMode, RebuildOutput};

#[cfg(any(test, feature = "test-support"))]
pub use rebuild::FakeRebuildDriver;
