// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-restore pup rehydration.
//!
//! Restored state references sources, keys, and config files that no
//! longer exist on this host. Rehydration re-downloads each pup, re-issues
//! its delegated keys, rewrites its config, and re-applies its declarative
//! fragment, so restored records map back to a live system.

use crate::error::UpdaterError;
use crate::hash::verify_nix_file_hash;
use crate::joblog::JobLogger;
use crate::updater::SystemUpdater;
use dbx_core::{Clock, InstallationState, PupState, SourceType};
use dbx_manager::set_installation;

impl<C: Clock + 'static> SystemUpdater<C> {
    /// Rehydrate every pup that is neither uninstalled nor in dev mode.
    ///
    /// Individual failures are collected and logged; the overall restore
    /// fails only when no pup rehydrated successfully.
    pub(crate) async fn rehydrate_pups(&self, log: &JobLogger) -> Result<(), UpdaterError> {
        let manager = self.manager();
        let candidates: Vec<PupState> = manager
            .get_state_map()
            .into_values()
            .filter(|s| s.installation != InstallationState::Uninstalled)
            .filter(|s| !s.is_dev_mode_enabled)
            .collect();

        if candidates.is_empty() {
            log.log("no pups to rehydrate");
            return Ok(());
        }

        let mut patch = manager.new_patch();
        let mut rehydrated = Vec::new();
        let mut failed = Vec::new();
        for state in candidates {
            log.step(&format!("rehydrate {}", state.manifest.meta.name));
            match self.rehydrate_one(&state, log).await {
                Ok(fresh) => {
                    patch.write_pup_file(&fresh)?;
                    rehydrated.push(fresh.id);
                }
                Err(e) => {
                    log.err(&format!("{} failed: {e}", state.manifest.meta.name));
                    tracing::warn!(pup = %state.id, error = %e, "rehydration failed");
                    failed.push(state.id);
                }
            }
        }

        if rehydrated.is_empty() {
            return Err(UpdaterError::RehydrateFailed);
        }

        log.step("apply");
        patch.update_includes_file(&self.include_ids(None, None))?;
        patch.apply(self.deps.rebuild.as_ref()).await?;
        log.log(&format!(
            "rehydrated {} pups ({} failed)",
            rehydrated.len(),
            failed.len()
        ));
        Ok(())
    }

    async fn rehydrate_one(
        &self,
        state: &PupState,
        log: &JobLogger,
    ) -> Result<PupState, UpdaterError> {
        let manager = self.manager();
        let id = state.id;
        let name = &state.manifest.meta.name;

        // The source may be missing or moved on this host; re-register it
        // from the stored location.
        self.deps.source.ensure_source(&state.source).await?;

        let pup_dir = manager.source_dir(&id);
        let downloaded = self
            .deps
            .source
            .download_pup(&pup_dir, &state.source.id, name, &state.version)
            .await;
        if let Err(e) = downloaded {
            // Git sources get a second chance via a bare tag download.
            if state.source.source_type == SourceType::Git {
                log.log(&format!("manifest-driven download failed ({e}); trying tag"));
                self.deps
                    .source
                    .download_tag(&pup_dir, &state.source.id, &state.version, ".")
                    .await?;
            } else {
                return Err(e.into());
            }
        }

        // A corrupted mirror shows up here; one redownload gets a clean copy.
        if verify_nix_file_hash(&pup_dir, &state.manifest, false).is_err() {
            log.log("nix hash mismatch after download; redownloading once");
            self.deps
                .source
                .download_pup(&pup_dir, &state.source.id, name, &state.version)
                .await?;
            verify_nix_file_hash(&pup_dir, &state.manifest, false)?;
        }

        let storage = manager.storage_dir(&id);
        if !storage.is_dir() {
            self.deps.driver.create_storage_dir(&storage).await?;
        }

        let keys = self.deps.dkm.make_delegate(&id, "").await?;
        self.deps.driver.write_key_file(&storage.join("delegated.key"), &keys.wif).await?;
        self.deps
            .driver
            .write_key_file(&storage.join("delegated.extended.key"), &keys.extended_priv)
            .await?;

        self.write_config_env(state).await?;

        Ok(manager.update_pup(&id, vec![set_installation(InstallationState::Ready)])?)
    }
}
