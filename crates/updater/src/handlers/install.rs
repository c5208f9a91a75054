// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pup installation.

use crate::error::UpdaterError;
use crate::hash::verify_nix_file_hash;
use crate::joblog::JobLogger;
use crate::updater::SystemUpdater;
use dbx_core::{BrokenReason, Clock, InstallPupSpec, InstallationState, PupId};
use dbx_manager::{set_enabled, set_installation, set_version_and_manifest, AdoptOptions};

impl<C: Clock + 'static> SystemUpdater<C> {
    /// Install an already-adopted pup.
    ///
    /// Every failure after adoption leaves the pup broken with a typed
    /// reason; the record stays so the operator can purge or retry.
    pub(crate) async fn install_steps(
        &self,
        id: &PupId,
        source_id: &str,
        name: &str,
        version: &str,
        session_token: &str,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        manager.update_pup(id, vec![set_installation(InstallationState::Installing)])?;

        log.step("download");
        let pup_dir = manager.source_dir(id);
        let manifest = match self
            .deps
            .source
            .download_pup(&pup_dir, source_id, name, version)
            .await
        {
            Ok(manifest) => manifest,
            Err(e) => {
                return Err(self.mark_broken(id, BrokenReason::DownloadFailed, e.into()));
            }
        };
        log.log(&format!("downloaded {name} {version} from {source_id}"));

        log.step("verify");
        if let Err(e) = verify_nix_file_hash(&pup_dir, &manifest, self.deps.dev_mode) {
            let reason = match &e {
                UpdaterError::NixFileMissing(_) => BrokenReason::NixFileMissing,
                _ => BrokenReason::NixHashMismatch,
            };
            return Err(self.mark_broken(id, reason, e));
        }

        log.step("storage");
        let storage = manager.storage_dir(id);
        if let Err(e) = self.deps.driver.create_storage_dir(&storage).await {
            return Err(self.mark_broken(id, BrokenReason::StorageCreationFailed, e.into()));
        }

        log.step("keys");
        let keys = match self.deps.dkm.make_delegate(id, session_token).await {
            Ok(keys) => keys,
            Err(e) => {
                return Err(self.mark_broken(id, BrokenReason::DelegateKeyCreationFailed, e.into()));
            }
        };
        let key_writes = [
            (storage.join("delegated.key"), &keys.wif),
            (storage.join("delegated.extended.key"), &keys.extended_priv),
        ];
        for (path, contents) in key_writes {
            if let Err(e) = self.deps.driver.write_key_file(&path, contents).await {
                return Err(self.mark_broken(id, BrokenReason::DelegateKeyWriteFailed, e.into()));
            }
        }

        log.step("configure");
        let state = manager.update_pup(
            id,
            vec![
                set_version_and_manifest(version.to_string(), manifest),
                set_enabled(true),
            ],
        )?;
        if let Err(e) = self.write_config_env(&state).await {
            return Err(self.mark_broken(id, BrokenReason::StateUpdateFailed, e));
        }

        log.step("apply");
        let mut patch = manager.new_patch();
        patch.write_pup_file(&state)?;
        patch.update_includes_file(&self.include_ids(Some(*id), None))?;
        log.cmd(&format!("nix rebuild ({})", patch.op_names().join(", ")));
        if let Err(e) = patch.apply(self.deps.rebuild.as_ref()).await {
            return Err(self.mark_broken(id, BrokenReason::NixApplyFailed, e.into()));
        }

        manager.update_pup(id, vec![set_installation(InstallationState::Ready)])?;
        log.log("install complete");
        Ok(())
    }

    /// Bulk install: adopt and install each entry in turn. The first
    /// failure stops the batch; earlier pups stay installed.
    pub(crate) async fn handle_install_many(
        &self,
        specs: &[InstallPupSpec],
        session_token: &str,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        for spec in specs {
            log.log(&format!("installing {} {}", spec.pup_name, spec.pup_version));
            let manifest = self
                .deps
                .source
                .manifest(&spec.source_id, &spec.pup_name, &spec.pup_version)
                .await?;
            let source = self
                .deps
                .source
                .sources()
                .into_iter()
                .find(|s| s.id == spec.source_id)
                .ok_or_else(|| {
                    UpdaterError::UpdateVersionUnavailable(format!(
                        "unknown source {}",
                        spec.source_id
                    ))
                })?;
            let id = self.manager().adopt_pup(manifest, source, AdoptOptions::default())?;
            self.install_steps(
                &id,
                &spec.source_id,
                &spec.pup_name,
                &spec.pup_version,
                session_token,
                log,
            )
            .await?;
        }
        Ok(())
    }
}
