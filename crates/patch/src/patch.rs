// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The patch transaction: queue, snapshot, apply, rebuild, roll back.

use crate::ops::{self, FileOp, FirewallRule, NetworkConfig, PatchOp, SystemContainerConfig,
    SystemSettings};
use crate::rebuild::{RebuildDriver, RebuildError, RebuildMode, RebuildOutput};
use crate::snapshot::{clear_dir, copy_dir};
use dbx_core::{PupId, PupState};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Observable lifecycle of a patch, reported alongside results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    Pending,
    Applying,
    Applied,
    RollingBack,
    Errored,
    Cancelled,
}

dbx_core::simple_display! {
    PatchState {
        Pending => "pending",
        Applying => "applying",
        Applied => "applied",
        RollingBack => "rolling_back",
        Errored => "errored",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("snapshot of {dir} failed: {source}")]
    Snapshot { dir: PathBuf, source: std::io::Error },
    #[error("operation '{name}' failed: {source}")]
    Op { name: String, source: std::io::Error },
    #[error(transparent)]
    Rebuild(#[from] RebuildError),
    #[error("rollback failed after [{original}]: {source}")]
    RollbackFailed { original: Box<PatchError>, source: std::io::Error },
    #[error("unresolved template placeholder {0}")]
    Template(String),
}

/// Outcome of a completed (or cancelled) patch.
#[derive(Debug)]
pub struct PatchReport {
    pub id: String,
    pub state: PatchState,
    /// Names of the ops that were queued, in order.
    pub ops: Vec<String>,
    pub rebuild: Option<RebuildOutput>,
}

/// A batched, snapshottable, rebuild-coupled transaction against the
/// declarative host config directory.
///
/// Operations are queued, not executed, until [`Patch::apply`] consumes the
/// patch. A single patch is not safe for concurrent use, and patches must
/// not overlap in `apply` because the target directory is shared; the
/// system updater creates one patch per handler invocation.
pub struct Patch {
    id: String,
    nix_dir: PathBuf,
    tmp_dir: PathBuf,
    data_dir: PathBuf,
    ops: Vec<PatchOp>,
    mode: RebuildMode,
    no_rebuild: bool,
}

impl Patch {
    pub fn new(nix_dir: PathBuf, tmp_dir: PathBuf, data_dir: PathBuf) -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            id: format!("nix-patch-{}.{:09}", now.as_secs(), now.subsec_nanos()),
            nix_dir,
            tmp_dir,
            data_dir,
            ops: Vec::new(),
            mode: RebuildMode::Switch,
            no_rebuild: false,
        }
    }

    /// Activate on next boot instead of immediately.
    pub fn rebuild_on_boot(&mut self) {
        self.mode = RebuildMode::Boot;
    }

    /// Skip the rebuild entirely. The written configuration will only take
    /// effect on the next rebuild from elsewhere.
    pub fn dangerous_no_rebuild(&mut self) {
        self.no_rebuild = true;
    }

    fn queue_write(&mut self, name: String, rel_path: &str, rendered: Result<String, String>)
        -> Result<(), PatchError>
    {
        let contents = rendered.map_err(PatchError::Template)?;
        self.ops.push(PatchOp {
            name,
            file: FileOp::Write { rel_path: PathBuf::from(rel_path), contents },
        });
        Ok(())
    }

    pub fn update_system(&mut self, settings: &SystemSettings) -> Result<(), PatchError> {
        self.queue_write("update_system".to_string(), "system.nix", ops::render_system(settings))
    }

    pub fn update_firewall(&mut self, rules: &[FirewallRule]) -> Result<(), PatchError> {
        self.queue_write(
            "update_firewall".to_string(),
            "firewall.nix",
            ops::render_firewall(rules),
        )
    }

    pub fn update_network(&mut self, config: &NetworkConfig) -> Result<(), PatchError> {
        self.queue_write(
            "update_network".to_string(),
            "network.nix",
            ops::render_network(config),
        )
    }

    /// Refresh the top-level includes file to import exactly `pup_ids`.
    pub fn update_includes_file(&mut self, pup_ids: &[PupId]) -> Result<(), PatchError> {
        self.queue_write(
            "update_includes_file".to_string(),
            "pups.nix",
            ops::render_includes(pup_ids),
        )
    }

    /// Write one pup's declarative container fragment.
    pub fn write_pup_file(&mut self, state: &PupState) -> Result<(), PatchError> {
        let rel = ops::pup_file_name(&state.id);
        self.queue_write(
            format!("write_pup_file {}", state.id),
            &rel,
            ops::render_pup(state, &self.data_dir),
        )
    }

    /// Remove one pup's declarative container fragment.
    pub fn remove_pup_file(&mut self, id: &PupId) {
        self.ops.push(PatchOp {
            name: format!("remove_pup_file {id}"),
            file: FileOp::Remove { rel_path: PathBuf::from(ops::pup_file_name(id)) },
        });
    }

    pub fn update_storage_overlay(&mut self, device: &str) -> Result<(), PatchError> {
        self.queue_write(
            "update_storage_overlay".to_string(),
            "storage-overlay.nix",
            ops::render_storage_overlay(device),
        )
    }

    pub fn update_system_container_config(
        &mut self,
        config: &SystemContainerConfig,
    ) -> Result<(), PatchError> {
        self.queue_write(
            "update_system_container_config".to_string(),
            "system-container-config.nix",
            ops::render_system_container(config),
        )
    }

    pub fn op_names(&self) -> Vec<String> {
        self.ops.iter().map(|op| op.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Abandon the patch before apply. Nothing has touched the disk.
    pub fn cancel(self) -> PatchReport {
        PatchReport {
            id: self.id,
            state: PatchState::Cancelled,
            ops: self.ops.into_iter().map(|op| op.name).collect(),
            rebuild: None,
        }
    }

    /// Apply the queued operations transactionally.
    ///
    /// Snapshots the target directory, executes ops in insertion order, and
    /// invokes the rebuild driver. Any failure rolls the directory back to
    /// the snapshot and returns the triggering error; on success the
    /// snapshot is deleted.
    pub async fn apply(self, driver: &dyn RebuildDriver) -> Result<PatchReport, PatchError> {
        let op_names: Vec<String> = self.ops.iter().map(|op| op.name.clone()).collect();
        tracing::info!(patch = %self.id, ops = op_names.len(), "applying nix patch");

        fs::create_dir_all(&self.nix_dir)
            .map_err(|source| PatchError::Snapshot { dir: self.nix_dir.clone(), source })?;
        let snapshot_dir = self.tmp_dir.join(&self.id);
        copy_dir(&self.nix_dir, &snapshot_dir)
            .map_err(|source| PatchError::Snapshot { dir: snapshot_dir.clone(), source })?;

        for op in &self.ops {
            tracing::debug!(patch = %self.id, op = %op.name, "executing");
            if let Err(source) = self.execute(&op.file) {
                let err = PatchError::Op { name: op.name.clone(), source };
                return Err(self.roll_back(&snapshot_dir, err));
            }
        }

        let rebuild = if self.no_rebuild {
            None
        } else {
            match driver.rebuild(self.mode, &self.nix_dir).await {
                Ok(output) => Some(output),
                Err(e) => {
                    return Err(self.roll_back(&snapshot_dir, PatchError::Rebuild(e)));
                }
            }
        };

        if let Err(e) = fs::remove_dir_all(&snapshot_dir) {
            tracing::warn!(patch = %self.id, error = %e, "failed to remove patch snapshot");
        }
        tracing::info!(patch = %self.id, "nix patch applied");
        Ok(PatchReport { id: self.id, state: PatchState::Applied, ops: op_names, rebuild })
    }

    fn execute(&self, file: &FileOp) -> std::io::Result<()> {
        match file {
            FileOp::Write { rel_path, contents } => {
                let path = self.nix_dir.join(rel_path);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                    fs::set_permissions(parent, fs::Permissions::from_mode(0o755))?;
                }
                fs::write(&path, contents)?;
                fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
                Ok(())
            }
            FileOp::Remove { rel_path } => {
                let path = self.nix_dir.join(rel_path);
                match fs::remove_file(&path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Restore the target directory from the snapshot and surface the
    /// original error. The snapshot directory is left in place under tmp.
    fn roll_back(&self, snapshot_dir: &Path, original: PatchError) -> PatchError {
        tracing::warn!(patch = %self.id, error = %original, "rolling back nix patch");
        let restore = clear_dir(&self.nix_dir).and_then(|()| copy_dir(snapshot_dir, &self.nix_dir));
        match restore {
            Ok(()) => original,
            Err(source) => {
                PatchError::RollbackFailed { original: Box::new(original), source }
            }
        }
    }
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
