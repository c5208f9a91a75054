// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rollback to the pre-upgrade snapshot.

use crate::error::UpdaterError;
use crate::joblog::JobLogger;
use crate::updater::SystemUpdater;
use dbx_core::{pup_service_name, BrokenReason, Clock, InstallationState, PupId};
use dbx_manager::{
    set_config, set_enabled, set_installation, set_providers, set_version_and_manifest,
};

impl<C: Clock + 'static> SystemUpdater<C> {
    pub(crate) async fn handle_rollback(
        &self,
        id: &PupId,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        let snapshot = manager.get_snapshot(id)?.ok_or(UpdaterError::NoSnapshot(*id))?;
        let name = snapshot.manifest.meta.name.clone();
        log.log(&format!("rolling back {name} to {}", snapshot.version));

        log.step("stop");
        self.stop_pup_best_effort(id, log).await;

        // Transient state; rollback reuses the upgrade vocabulary.
        manager.update_pup(id, vec![set_installation(InstallationState::Upgrading)])?;

        log.step("download");
        let pup_dir = manager.source_dir(id);
        if let Err(e) = self
            .deps
            .source
            .download_pup(&pup_dir, &snapshot.source_id, &name, &snapshot.version)
            .await
        {
            return Err(self.mark_broken(id, BrokenReason::DownloadFailed, e.into()));
        }

        // Restore from the snapshot's own manifest, not the re-downloaded
        // one, to preserve bit-identity with the pre-upgrade state.
        log.step("restore");
        let state = manager.update_pup(
            id,
            vec![
                set_version_and_manifest(snapshot.version.clone(), snapshot.manifest.clone()),
                set_config(snapshot.config.clone()),
                set_providers(snapshot.providers.clone()),
            ],
        )?;
        if let Err(e) = self.write_config_env(&state).await {
            return Err(self.mark_broken(id, BrokenReason::StateUpdateFailed, e));
        }

        let mut updates = vec![set_installation(InstallationState::Ready)];
        if snapshot.enabled {
            updates.push(set_enabled(true));
        }
        let state = manager.update_pup(id, updates)?;

        log.step("apply");
        let mut patch = manager.new_patch();
        patch.write_pup_file(&state)?;
        patch.update_includes_file(&self.include_ids(Some(*id), None))?;
        if let Err(e) = patch.apply(self.deps.rebuild.as_ref()).await {
            return Err(self.mark_broken(id, BrokenReason::NixApplyFailed, e.into()));
        }

        // The runtime only auto-starts containers it considers new; one it
        // previously stopped needs an explicit start.
        if snapshot.enabled {
            log.step("start");
            let service = pup_service_name(id);
            log.cmd(&format!("start {service}"));
            if let Err(e) = self.deps.driver.start_service(&service).await {
                return Err(self.mark_broken(id, BrokenReason::EnableFailed, e.into()));
            }
        }

        manager.delete_snapshot(id)?;
        log.log("rollback complete");
        Ok(())
    }
}
