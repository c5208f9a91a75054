// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dbx-core: domain types and collaborator interfaces for dogeboxd

pub mod macros;

pub mod action;
pub mod clock;
pub mod configenv;
pub mod dkm;
pub mod driver;
pub mod event;
pub mod id;
pub mod job;
pub mod manifest;
pub mod monitor;
pub mod pup;
pub mod source;
pub mod stats;
pub mod store;
pub mod updates;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use action::{Action, InstallPupSpec};
pub use clock::{Clock, FakeClock, SystemClock};
pub use configenv::render_config_env;
pub use dkm::{DelegateKeys, DelegatedKeyManager, DkmError};
pub use driver::{DriverError, HostDriver, CONTAINER_GID, CONTAINER_UID};
pub use event::{ChangeEvent, JobLogEntry, JobLogKind, Pupdate, PupdateKind};
pub use id::IdBuf;
pub use job::{Job, JobId, JobStatus};
pub use manifest::{
    ManifestConfigField, ManifestDependency, ManifestExpose, ManifestInterface, ManifestMeta,
    ManifestService, PupManifest,
};
pub use monitor::{pup_id_from_service, pup_service_name, ProcStatus, ProcessMonitor, ServiceSample};
pub use pup::{
    BrokenReason, InstallationState, PupHook, PupId, PupSource, PupState, PupVersionSnapshot,
    PupWebUi, SourceType,
};
pub use source::{SourceError, SourceListing, SourceManager};
pub use stats::{derive_status, PupIssues, PupStats, PupStatus, StatBuffer};
pub use store::{BinaryCache, DogeboxConfig, StateStore, StoreError};
pub use updates::{
    AvailableVersion, PupUpdateInfo, PupUpdatesCheckedEvent, SkippedPupUpdate,
};
pub use version::{compare_lenient, parse_lenient};

#[cfg(any(test, feature = "test-support"))]
pub use pup::PupStateBuilder;
