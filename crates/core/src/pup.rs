// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-pup state and its lifecycle vocabulary.

use crate::manifest::PupManifest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

crate::define_id! {
    /// Opaque stable identifier for an installed pup.
    ///
    /// Unique process-wide; also appears in record file names and in the
    /// container service name (`container@pup-<id>.service`).
    pub struct PupId("");
}

/// Upstream repository type a pup was installed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Git,
    Disk,
}

crate::simple_display! {
    SourceType {
        Git => "git",
        Disk => "disk",
    }
}

/// Identity of the source a pup came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PupSource {
    pub id: String,
    pub location: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
}

/// Installation lifecycle state.
///
/// `Unready` is defined for forward compatibility; no handler currently
/// assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationState {
    Installing,
    Ready,
    Unready,
    Upgrading,
    Uninstalling,
    Uninstalled,
    Purging,
    Broken,
}

crate::simple_display! {
    InstallationState {
        Installing => "installing",
        Ready => "ready",
        Unready => "unready",
        Upgrading => "upgrading",
        Uninstalling => "uninstalling",
        Uninstalled => "uninstalled",
        Purging => "purging",
        Broken => "broken",
    }
}

impl InstallationState {
    /// States that must not survive a daemon restart. A record loaded in one
    /// of these was interrupted mid-transition and is rewritten to broken.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InstallationState::Installing
                | InstallationState::Upgrading
                | InstallationState::Uninstalling
                | InstallationState::Purging
        )
    }
}

/// Machine-readable reason a pup is broken.
///
/// Meaningful iff `installation = broken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokenReason {
    StateUpdateFailed,
    DownloadFailed,
    NixFileMissing,
    NixHashMismatch,
    StorageCreationFailed,
    DelegateKeyCreationFailed,
    DelegateKeyWriteFailed,
    EnableFailed,
    NixApplyFailed,
    ManifestFetchFailed,
}

crate::simple_display! {
    BrokenReason {
        StateUpdateFailed => "state_update_failed",
        DownloadFailed => "download_failed",
        NixFileMissing => "nix_file_missing",
        NixHashMismatch => "nix_hash_mismatch",
        StorageCreationFailed => "storage_creation_failed",
        DelegateKeyCreationFailed => "delegate_key_creation_failed",
        DelegateKeyWriteFailed => "delegate_key_write_failed",
        EnableFailed => "enable_failed",
        NixApplyFailed => "nix_apply_failed",
        ManifestFetchFailed => "manifest_fetch_failed",
    }
}

/// A registered webhook for a pup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PupHook {
    pub port: u16,
    pub path: String,
    pub id: String,
}

/// A web interface exposed by a pup, derived from the manifest's exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PupWebUi {
    pub name: String,
    pub port: u16,
    pub internal_port: u16,
}

/// Durable state of one pup. One JSON record per pup on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PupState {
    pub id: PupId,
    pub source: PupSource,
    pub manifest: PupManifest,
    /// User values for manifest-declared config keys.
    pub config: BTreeMap<String, String>,
    /// Becomes true on the first successful config save.
    #[serde(default)]
    pub config_saved: bool,
    /// interface name → providing pup.
    #[serde(default)]
    pub providers: BTreeMap<String, PupId>,
    #[serde(default)]
    pub hooks: Vec<PupHook>,
    pub installation: InstallationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken_reason: Option<BrokenReason>,
    /// Desired running bit.
    pub enabled: bool,
    /// Derived: required config keys are missing.
    #[serde(default)]
    pub needs_conf: bool,
    /// Derived: non-optional dependencies lack a provider.
    #[serde(default)]
    pub needs_deps: bool,
    /// Unique across all pups; allocated inside 10.69.0.0/8.
    pub ip: Ipv4Addr,
    pub version: String,
    #[serde(default)]
    pub web_uis: Vec<PupWebUi>,
    #[serde(default)]
    pub is_dev_mode_enabled: bool,
    /// Subset of manifest service names run in dev mode.
    #[serde(default)]
    pub dev_mode_services: Vec<String>,
}

impl PupState {
    /// Re-derive `needs_conf` and `needs_deps` from the manifest, config,
    /// and provider mappings. Called after every mutation.
    pub fn recompute_flags(&mut self) {
        self.needs_conf = !self.manifest.missing_required_config(&self.config).is_empty();
        self.needs_deps = self
            .manifest
            .dependencies
            .iter()
            .any(|d| !d.optional && !self.providers.contains_key(&d.interface_name));
    }

    /// Web UIs implied by the manifest's exposes.
    pub fn web_uis_from_manifest(manifest: &PupManifest) -> Vec<PupWebUi> {
        manifest
            .container
            .exposes
            .iter()
            .filter(|e| e.web_ui)
            .map(|e| PupWebUi {
                name: e.name.clone(),
                port: e.listen_port.unwrap_or(e.port),
                internal_port: e.port,
            })
            .collect()
    }

    /// True when the pup may be reported to the process monitor.
    pub fn is_monitorable(&self) -> bool {
        self.installation == InstallationState::Ready
    }
}

/// Single-slot pre-upgrade snapshot retained to enable exactly one rollback.
///
/// Does not include user data in the pup's storage directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PupVersionSnapshot {
    pub version: String,
    pub manifest: PupManifest,
    pub config: BTreeMap<String, String>,
    pub providers: BTreeMap<String, PupId>,
    pub enabled: bool,
    pub snapshot_date: DateTime<Utc>,
    pub source_id: String,
    pub source_location: String,
}

impl PupVersionSnapshot {
    /// Capture the rollback-relevant fields of `state`.
    pub fn capture(state: &PupState, when: DateTime<Utc>) -> Self {
        Self {
            version: state.version.clone(),
            manifest: state.manifest.clone(),
            config: state.config.clone(),
            providers: state.providers.clone(),
            enabled: state.enabled,
            snapshot_date: when,
            source_id: state.source.id.clone(),
            source_location: state.source.location.clone(),
        }
    }
}

crate::builder! {
    pub struct PupStateBuilder => PupState {
        into {
            version: String = "1.0.0",
        }
        set {
            id: PupId = PupId::new(),
            manifest: PupManifest = crate::test_support::manifest_fixture("testpup", "1.0.0"),
            config: BTreeMap<String, String> = BTreeMap::new(),
            config_saved: bool = false,
            providers: BTreeMap<String, PupId> = BTreeMap::new(),
            hooks: Vec<PupHook> = Vec::new(),
            installation: InstallationState = InstallationState::Ready,
            enabled: bool = false,
            needs_conf: bool = false,
            needs_deps: bool = false,
            ip: Ipv4Addr = Ipv4Addr::new(10, 69, 0, 2),
            web_uis: Vec<PupWebUi> = Vec::new(),
            is_dev_mode_enabled: bool = false,
            dev_mode_services: Vec<String> = Vec::new(),
            source: PupSource = crate::test_support::source_fixture("source-a"),
        }
        option {
            broken_reason: BrokenReason = None,
        }
    }
}

#[cfg(test)]
#[path = "pup_tests.rs"]
mod tests;
