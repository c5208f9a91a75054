// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config, provider, hook, and update-check handlers.

use crate::error::UpdaterError;
use crate::joblog::JobLogger;
use crate::updater::SystemUpdater;
use dbx_core::{Clock, PupHook, PupId};
use dbx_manager::{set_config, set_hooks, set_providers};
use std::collections::BTreeMap;

impl<C: Clock + 'static> SystemUpdater<C> {
    /// Merge user values for manifest-declared keys and rewrite the pup's
    /// config.env. Keys the manifest doesn't declare are dropped with a
    /// warning.
    pub(crate) async fn handle_update_config(
        &self,
        id: &PupId,
        payload: BTreeMap<String, String>,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        let state = manager.get_pup(id)?;

        let declared: Vec<&str> =
            state.manifest.config.fields.iter().map(|f| f.name.as_str()).collect();
        let mut config = state.config.clone();
        for (key, value) in payload {
            if declared.contains(&key.as_str()) {
                config.insert(key, value);
            } else {
                tracing::warn!(pup = %id, key = %key, "ignoring undeclared config key");
            }
        }

        let state = manager.update_pup(id, vec![set_config(config)])?;
        self.write_config_env(&state).await?;

        // A running pup picks the new values up through a rebuild.
        if state.enabled {
            log.step("apply");
            let mut patch = manager.new_patch();
            patch.write_pup_file(&state)?;
            patch.apply(self.deps.rebuild.as_ref()).await?;
        }
        log.log("config saved");
        Ok(())
    }

    /// Point interface dependencies at providing pups.
    pub(crate) async fn handle_update_providers(
        &self,
        id: &PupId,
        providers: BTreeMap<String, PupId>,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        let state = manager.get_pup(id)?;

        for (interface, provider_id) in &providers {
            if !state.manifest.dependencies.iter().any(|d| &d.interface_name == interface) {
                return Err(UpdaterError::InvalidUpdatePackage(format!(
                    "pup does not depend on interface '{interface}'"
                )));
            }
            let provider = manager.get_pup(provider_id)?;
            if !provider.manifest.interfaces.iter().any(|i| &i.name == interface) {
                return Err(UpdaterError::InvalidUpdatePackage(format!(
                    "pup {provider_id} does not provide interface '{interface}'"
                )));
            }
        }

        manager.update_pup(id, vec![set_providers(providers)])?;
        log.log("providers updated");
        Ok(())
    }

    pub(crate) async fn handle_update_hooks(
        &self,
        id: &PupId,
        hooks: Vec<PupHook>,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        self.manager().update_pup(id, vec![set_hooks(hooks)])?;
        log.log("hooks updated");
        Ok(())
    }

    pub(crate) async fn handle_check_updates(
        &self,
        pup_id: Option<PupId>,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        match pup_id {
            Some(id) => {
                let info = self.manager().check_for_updates(&id).await?;
                match info {
                    Some(info) if info.update_available => log.log(&format!(
                        "update available: {}",
                        info.latest_version.as_deref().unwrap_or("?")
                    )),
                    _ => log.log("no update available"),
                }
            }
            None => {
                let event = self.manager().check_all_pup_updates(false).await?;
                log.log(&format!(
                    "checked {} pups, {} updates available",
                    event.pups_checked, event.updates_available
                ));
            }
        }
        Ok(())
    }
}
