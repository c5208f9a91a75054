// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dbx-manager: the authoritative in-memory model of every pup.
//!
//! Holds durable per-pup state and live statistics, serializes all mutation
//! under one lock, persists records to disk, allocates pup IPs, keeps
//! single-slot upgrade snapshots, and fans change events out to subscribers.

mod error;
mod fsutil;
mod ip;
mod manager;
mod records;
mod snapshots;
mod updates;

pub use error::PupManagerError;
pub use ip::IpAllocator;
pub use manager::{
    set_broken, set_config, set_dev_mode, set_enabled, set_hooks, set_installation,
    set_providers, set_version_and_manifest, AdoptOptions, ManagerPaths, PupManager, PupUpdate,
};
pub use snapshots::SnapshotManager;
pub use updates::checker::{InterfaceChange, UpdateChecker, VersionDelta};
pub use updates::github::{GithubReleaseClient, ReleaseError, ReleaseInfo, ReleaseLookup};
pub use updates::skipped::SkippedUpdates;

#[cfg(any(test, feature = "test-support"))]
pub use updates::github::FakeReleaseLookup;
