// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Enable and disable. Both are idempotent: re-asserting the current state
//! succeeds.

use crate::error::UpdaterError;
use crate::joblog::JobLogger;
use crate::updater::SystemUpdater;
use dbx_core::{pup_service_name, Clock, PupId};
use dbx_manager::set_enabled;

impl<C: Clock + 'static> SystemUpdater<C> {
    pub(crate) async fn handle_enable(
        &self,
        id: &PupId,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        let state = manager.update_pup(id, vec![set_enabled(true)])?;

        log.step("apply");
        let mut patch = manager.new_patch();
        patch.write_pup_file(&state)?;
        patch.apply(self.deps.rebuild.as_ref()).await?;
        log.log("enabled");
        Ok(())
    }

    pub(crate) async fn handle_disable(
        &self,
        id: &PupId,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        let state = manager.update_pup(id, vec![set_enabled(false)])?;

        let service = pup_service_name(id);
        log.cmd(&format!("stop {service}"));
        self.deps.driver.stop_service(&service).await?;

        log.step("apply");
        let mut patch = manager.new_patch();
        patch.write_pup_file(&state)?;
        patch.apply(self.deps.rebuild.as_ref()).await?;
        log.log("disabled");
        Ok(())
    }
}
