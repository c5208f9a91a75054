// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actions produced by the front-ends and consumed by the system updater.

use crate::pup::{PupHook, PupId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One pup to install as part of a bulk install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPupSpec {
    pub pup_name: String,
    pub pup_version: String,
    pub source_id: String,
}

/// Long-running operation requested by a front-end.
///
/// Serializes with `{"action": "install_pup", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    InstallPup {
        pup_name: String,
        pup_version: String,
        source_id: String,
        session_token: String,
    },

    InstallPups {
        specs: Vec<InstallPupSpec>,
        session_token: String,
    },

    UninstallPup {
        pup_id: PupId,
    },

    PurgePup {
        pup_id: PupId,
    },

    EnablePup {
        pup_id: PupId,
    },

    DisablePup {
        pup_id: PupId,
    },

    UpgradePup {
        pup_id: PupId,
        target_version: String,
        source_id: String,
    },

    RollbackPupUpgrade {
        pup_id: PupId,
    },

    UpdatePupConfig {
        pup_id: PupId,
        payload: BTreeMap<String, String>,
    },

    UpdatePupProviders {
        pup_id: PupId,
        providers: BTreeMap<String, PupId>,
    },

    UpdatePupHooks {
        pup_id: PupId,
        hooks: Vec<PupHook>,
    },

    /// Check one pup, or all when `pup_id` is absent.
    CheckPupUpdates {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pup_id: Option<PupId>,
    },

    /// Bulk-copy a prepared chain data set into a pup's storage directory.
    ImportBlockchainData {
        pup_id: PupId,
        source_path: PathBuf,
    },

    BackupConfig {
        /// Caller-supplied destination on a validated removable mount;
        /// staged under the tmp dir when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<PathBuf>,
    },

    RestoreConfig {
        archive_path: PathBuf,
    },

    /// Rebuild the host against its current declarative configuration.
    SystemUpdate {},

    EnableSsh {
        enabled: bool,
    },

    AddBinaryCache {
        url: String,
        key: String,
    },

    /// Store the Tailscale auth key and rebuild; an empty key disables.
    EnableTailscale {
        auth_key: String,
    },

    /// Reconfigure the uplink interface and the pup NAT egress.
    UpdateNetwork {
        interface: String,
        dhcp: bool,
    },
}

impl Action {
    /// The pup this action targets, when it targets exactly one.
    pub fn pup_id(&self) -> Option<&PupId> {
        match self {
            Action::UninstallPup { pup_id }
            | Action::PurgePup { pup_id }
            | Action::EnablePup { pup_id }
            | Action::DisablePup { pup_id }
            | Action::UpgradePup { pup_id, .. }
            | Action::RollbackPupUpgrade { pup_id }
            | Action::UpdatePupConfig { pup_id, .. }
            | Action::UpdatePupProviders { pup_id, .. }
            | Action::UpdatePupHooks { pup_id, .. }
            | Action::ImportBlockchainData { pup_id, .. } => Some(pup_id),
            Action::CheckPupUpdates { pup_id } => pup_id.as_ref(),
            _ => None,
        }
    }

    /// Short name used in job logs and records.
    pub fn name(&self) -> &'static str {
        match self {
            Action::InstallPup { .. } => "install_pup",
            Action::InstallPups { .. } => "install_pups",
            Action::UninstallPup { .. } => "uninstall_pup",
            Action::PurgePup { .. } => "purge_pup",
            Action::EnablePup { .. } => "enable_pup",
            Action::DisablePup { .. } => "disable_pup",
            Action::UpgradePup { .. } => "upgrade_pup",
            Action::RollbackPupUpgrade { .. } => "rollback_pup_upgrade",
            Action::UpdatePupConfig { .. } => "update_pup_config",
            Action::UpdatePupProviders { .. } => "update_pup_providers",
            Action::UpdatePupHooks { .. } => "update_pup_hooks",
            Action::CheckPupUpdates { .. } => "check_pup_updates",
            Action::ImportBlockchainData { .. } => "import_blockchain_data",
            Action::BackupConfig { .. } => "backup_config",
            Action::RestoreConfig { .. } => "restore_config",
            Action::SystemUpdate {} => "system_update",
            Action::EnableSsh { .. } => "enable_ssh",
            Action::AddBinaryCache { .. } => "add_binary_cache",
            Action::EnableTailscale { .. } => "enable_tailscale",
            Action::UpdateNetwork { .. } => "update_network",
        }
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
