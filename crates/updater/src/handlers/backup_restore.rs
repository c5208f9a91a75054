// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup and restore handlers.

use crate::backup::{collect_backup_files, write_backup_archive};
use crate::error::UpdaterError;
use crate::joblog::JobLogger;
use crate::restore::restore_backup_archive;
use crate::updater::SystemUpdater;
use dbx_core::{Clock, Job};
use std::path::Path;

impl<C: Clock + 'static> SystemUpdater<C> {
    /// Archive the persistence footprint to the caller's destination or a
    /// staged path under the tmp dir.
    pub(crate) async fn handle_backup(
        &self,
        job: &Job,
        destination: Option<&Path>,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();
        let data_dir = manager.data_dir();
        let nix_dir = manager.nix_dir();

        let dest = match destination {
            Some(dest) => {
                if !dest.parent().is_some_and(|p| p.is_dir()) {
                    return Err(UpdaterError::InvalidUpdatePackage(format!(
                        "backup destination {} is not on a mounted directory",
                        dest.display()
                    )));
                }
                dest.to_path_buf()
            }
            None => manager
                .tmp_dir()
                .join("backups")
                .join(format!("dogebox-backup-{}.tar.gz", job.id)),
        };

        log.step("collect");
        let files = collect_backup_files(data_dir, nix_dir)?;
        log.log(&format!("{} files in backup set", files.len()));

        log.step("archive");
        let manifest = write_backup_archive(
            &files,
            data_dir,
            nix_dir,
            &dest,
            self.deps.clock.now_utc(),
        )?;
        log.log(&format!(
            "wrote {} ({} files)",
            dest.display(),
            manifest.files.len()
        ));
        Ok(())
    }

    /// Re-materialise the persistence footprint from an archive, then
    /// reload and rehydrate.
    pub(crate) async fn handle_restore(
        &self,
        archive_path: &Path,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let manager = self.manager();

        log.step("extract");
        let report = restore_backup_archive(
            archive_path,
            manager.data_dir(),
            manager.nix_dir(),
            self.deps.store.as_ref(),
        )?;
        log.log(&format!("restored {} files", report.files_restored));
        if report.db_hash_mismatch {
            log.log("state store hash drifted during backup; restored anyway");
        }

        // The restored box must re-run key generation on next setup.
        let mut config = self.deps.store.get()?;
        config.has_generated_key = false;
        self.deps.store.set_dogebox(&config)?;

        log.step("reload");
        let count = manager.reload_from_disk()?;
        log.log(&format!("reloaded {count} pup records"));

        self.rehydrate_pups(log).await
    }
}
