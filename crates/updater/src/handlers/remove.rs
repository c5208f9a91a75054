// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uninstall and purge.

use crate::error::UpdaterError;
use crate::joblog::JobLogger;
use crate::updater::SystemUpdater;
use dbx_core::{BrokenReason, Clock, InstallationState, PupId};
use dbx_manager::{set_enabled, set_installation};

impl<C: Clock + 'static> SystemUpdater<C> {
    /// Remove the pup's declarative fragment; the record and storage stay
    /// so a purge (or reinstall) remains possible.
    pub(crate) async fn handle_uninstall(
        &self,
        id: &PupId,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        manager.update_pup(
            id,
            vec![set_installation(InstallationState::Uninstalling), set_enabled(false)],
        )?;

        log.step("apply");
        let mut patch = manager.new_patch();
        patch.remove_pup_file(id);
        patch.update_includes_file(&self.include_ids(None, Some(*id)))?;
        if let Err(e) = patch.apply(self.deps.rebuild.as_ref()).await {
            return Err(self.mark_broken(id, BrokenReason::NixApplyFailed, e.into()));
        }

        manager.update_pup(id, vec![set_installation(InstallationState::Uninstalled)])?;
        log.log("uninstall complete");
        Ok(())
    }

    /// Delete everything the pup owns. Only valid from `uninstalled`.
    ///
    /// Deletion failures are logged but do not abort: the in-memory purge
    /// must still happen so the operator can reinstall.
    pub(crate) async fn handle_purge(
        &self,
        id: &PupId,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        let state = manager.get_pup(id)?;
        if state.installation != InstallationState::Uninstalled {
            return Err(UpdaterError::WrongState {
                actual: state.installation,
                expected: InstallationState::Uninstalled,
            });
        }

        manager.update_pup(
            id,
            vec![set_installation(InstallationState::Purging), set_enabled(false)],
        )?;

        log.step("delete");
        for dir in [manager.source_dir(id), manager.storage_dir(id)] {
            if let Err(e) = self.deps.driver.remove_tree(&dir).await {
                log.err(&format!("failed to delete {}: {e}", dir.display()));
                tracing::warn!(pup = %id, dir = %dir.display(), error = %e, "purge deletion failed");
            }
        }

        manager.purge_pup(id)?;
        log.log("purge complete");
        Ok(())
    }
}
