// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pup upgrade.
//!
//! The snapshot is created before any destructive step so a rollback is
//! possible at every later failure. A crash leaves the pup either at the
//! old version with old files and no visible change, or broken with a
//! snapshot available for rollback.

use crate::error::UpdaterError;
use crate::hash::verify_nix_file_hash;
use crate::joblog::JobLogger;
use crate::updater::SystemUpdater;
use dbx_core::{BrokenReason, Clock, InstallationState, PupId};
use dbx_manager::{set_config, set_enabled, set_installation, set_version_and_manifest};

impl<C: Clock + 'static> SystemUpdater<C> {
    pub(crate) async fn handle_upgrade(
        &self,
        id: &PupId,
        target_version: &str,
        source_id: &str,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        let state = manager.get_pup(id)?;
        let name = state.manifest.meta.name.clone();
        log.log(&format!("upgrading {name} {} -> {target_version}", state.version));

        // A. Stop the pup if it is running. Tolerated failure: it may not be.
        let was_enabled = state.enabled;
        if was_enabled {
            log.step("stop");
            self.stop_pup_best_effort(id, log).await;
        }

        // B. Snapshot before anything destructive. Failure aborts with no
        // visible state change.
        log.step("snapshot");
        manager.create_snapshot(&state)?;

        // C. Fetch the target manifest.
        log.step("manifest");
        let new_manifest = match self
            .deps
            .source
            .manifest(source_id, &name, target_version)
            .await
        {
            Ok(manifest) => manifest,
            Err(e) => {
                return Err(self.mark_broken(id, BrokenReason::ManifestFetchFailed, e.into()));
            }
        };

        // D. Version and manifest move together; from here a crash needs
        // the snapshot to recover.
        let updated = manager.update_pup(
            id,
            vec![
                set_installation(InstallationState::Upgrading),
                set_version_and_manifest(target_version.to_string(), new_manifest.clone()),
            ],
        )?;

        // E. Invalidate the update cache so UIs stop offering this upgrade.
        if let Err(e) = manager.clear_cache_entry(id) {
            tracing::debug!(pup = %id, error = %e, "update cache not cleared");
        }

        // F. Download the target sources and re-verify.
        log.step("download");
        let pup_dir = manager.source_dir(id);
        if let Err(e) = self
            .deps
            .source
            .download_pup(&pup_dir, source_id, &name, target_version)
            .await
        {
            return Err(self.mark_broken(id, BrokenReason::DownloadFailed, e.into()));
        }
        if let Err(e) = verify_nix_file_hash(&pup_dir, &new_manifest, self.deps.dev_mode) {
            let reason = match &e {
                UpdaterError::NixFileMissing(_) => BrokenReason::NixFileMissing,
                _ => BrokenReason::NixHashMismatch,
            };
            return Err(self.mark_broken(id, reason, e));
        }

        // New manifest versions may declare config keys the old one didn't;
        // fill in their defaults without touching user values.
        let mut config = updated.config.clone();
        let mut added = false;
        for (key, value) in new_manifest.default_config() {
            if !config.contains_key(&key) {
                config.insert(key, value);
                added = true;
            }
        }
        let state = if added {
            let state = manager.update_pup(id, vec![set_config(config)])?;
            if let Err(e) = self.write_config_env(&state).await {
                return Err(self.mark_broken(id, BrokenReason::StateUpdateFailed, e));
            }
            state
        } else {
            updated
        };

        // G. Rewrite the declarative fragment against the updated state.
        log.step("apply");
        let mut patch = manager.new_patch();
        patch.write_pup_file(&state)?;
        patch.update_includes_file(&self.include_ids(Some(*id), None))?;
        if let Err(e) = patch.apply(self.deps.rebuild.as_ref()).await {
            return Err(self.mark_broken(id, BrokenReason::NixApplyFailed, e.into()));
        }

        if !was_enabled {
            manager.update_pup(id, vec![set_installation(InstallationState::Ready)])?;
            log.log("upgrade complete (pup left stopped)");
            return Ok(());
        }

        // H. Force the runtime to treat the container as newly created:
        // drop the fragment, clear cached container state, re-add the
        // fragment with the new state.
        log.step("restart");
        let mut drop_patch = manager.new_patch();
        drop_patch.remove_pup_file(id);
        drop_patch.update_includes_file(&self.include_ids(None, Some(*id)))?;
        if let Err(e) = drop_patch.apply(self.deps.rebuild.as_ref()).await {
            return Err(self.mark_broken(id, BrokenReason::NixApplyFailed, e.into()));
        }

        if let Err(e) = self.deps.driver.remove_container_state(id).await {
            return Err(self.mark_broken(id, BrokenReason::NixApplyFailed, e.into()));
        }

        let state = manager.update_pup(id, vec![set_enabled(true)])?;
        let mut readd_patch = manager.new_patch();
        readd_patch.write_pup_file(&state)?;
        readd_patch.update_includes_file(&self.include_ids(Some(*id), None))?;
        if let Err(e) = readd_patch.apply(self.deps.rebuild.as_ref()).await {
            return Err(self.mark_broken(id, BrokenReason::NixApplyFailed, e.into()));
        }

        manager.update_pup(id, vec![set_installation(InstallationState::Ready)])?;

        // Non-fatal readiness wait; the runtime converges asynchronously.
        self.wait_for_running(id, log).await;
        log.log("upgrade complete");
        Ok(())
    }
}
