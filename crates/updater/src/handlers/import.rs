// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blockchain data import: bulk-copy a prepared data set into a pup's
//! storage directory through the host driver's owner-fixing copy.

use crate::error::UpdaterError;
use crate::joblog::JobLogger;
use crate::updater::SystemUpdater;
use dbx_core::{Clock, PupId};
use std::path::Path;

impl<C: Clock + 'static> SystemUpdater<C> {
    pub(crate) async fn handle_import_blockchain(
        &self,
        id: &PupId,
        source_path: &Path,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        if !source_path.is_dir() {
            return Err(UpdaterError::InvalidUpdatePackage(format!(
                "import source {} is not a directory",
                source_path.display()
            )));
        }

        let manager = self.manager();
        let state = manager.get_pup(id)?;
        let was_enabled = state.enabled;
        if was_enabled {
            log.step("stop");
            self.stop_pup_best_effort(id, log).await;
        }

        log.step("copy");
        let storage = manager.storage_dir(id);
        self.deps.driver.create_storage_dir(&storage).await?;
        log.progress(&format!(
            "copying {} into {}",
            source_path.display(),
            storage.display()
        ));
        self.deps.driver.copy_tree(source_path, &storage).await?;
        log.log("import copied");

        if was_enabled {
            log.step("start");
            manager.start_pup(id, self.deps.rebuild.as_ref()).await?;
        }
        Ok(())
    }
}
