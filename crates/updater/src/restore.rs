// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive-validated restore of the persistence footprint.
//!
//! The state store is closed around the extraction and reopened on every
//! exit path. Each entry is extracted to a sibling temp file with a
//! streaming SHA-256, fsynced, and renamed into place, so a failed restore
//! never leaves half-written files at their final paths.

use crate::backup::{BackupFile, BackupManifest, BACKUP_MANIFEST_VERSION};
use crate::error::UpdaterError;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use dbx_core::StateStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub files_restored: usize,
    /// The state store file may legitimately change during archive
    /// creation; a hash mismatch there is tolerated with a warning.
    pub db_hash_mismatch: bool,
}

fn open_archive(path: &Path) -> std::io::Result<tar::Archive<GzDecoder<File>>> {
    Ok(tar::Archive::new(GzDecoder::new(File::open(path)?)))
}

fn read_manifest(archive_path: &Path) -> Result<BackupManifest, UpdaterError> {
    let mut archive = open_archive(archive_path)?;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.as_ref() == Path::new("manifest.json") {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
    }
    Err(UpdaterError::RestoreRejected("archive has no manifest.json".to_string()))
}

/// Validate and extract a backup archive over `data_dir` and `nix_dir`.
pub fn restore_backup_archive(
    archive_path: &Path,
    data_dir: &Path,
    nix_dir: &Path,
    store: &dyn StateStore,
) -> Result<RestoreReport, UpdaterError> {
    let manifest = read_manifest(archive_path)?;
    if manifest.version != BACKUP_MANIFEST_VERSION {
        return Err(UpdaterError::RestoreRejected(format!(
            "unsupported manifest version {}",
            manifest.version
        )));
    }

    let mut expected: HashMap<PathBuf, &BackupFile> = HashMap::new();
    for file in &manifest.files {
        if !file.path.starts_with(data_dir) && !file.path.starts_with(nix_dir) {
            return Err(UpdaterError::RestoreRejected(format!(
                "file {} escapes the data and nix directories",
                file.path.display()
            )));
        }
        expected.insert(file.path.clone(), file);
    }

    store.close_db()?;
    let result = extract(archive_path, data_dir, &expected);
    // Reopened on all exit paths.
    if let Err(e) = store.open_db() {
        tracing::warn!(error = %e, "failed to reopen state store after restore");
    }
    result
}

fn extract(
    archive_path: &Path,
    data_dir: &Path,
    expected: &HashMap<PathBuf, &BackupFile>,
) -> Result<RestoreReport, UpdaterError> {
    let db_path = data_dir.join("dogebox.db");
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut db_hash_mismatch = false;

    let mut archive = open_archive(archive_path)?;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.into_owned();
        if name == Path::new("manifest.json") {
            continue;
        }

        let target = Path::new("/").join(&name);
        let Some(file) = expected.get(&target) else {
            return Err(UpdaterError::RestoreRejected(format!(
                "archive entry {} is not in the manifest",
                target.display()
            )));
        };

        let mode = entry.header().mode().unwrap_or(0o644);
        let actual = extract_entry(&mut entry, &target, mode)?;
        if actual != file.sha256 {
            if target == db_path {
                tracing::warn!(
                    file = %target.display(),
                    "state store hash drifted during backup; restoring anyway"
                );
                db_hash_mismatch = true;
            } else {
                return Err(UpdaterError::RestoreRejected(format!(
                    "hash mismatch for {}: expected {}, got {actual}",
                    target.display(),
                    file.sha256
                )));
            }
        }
        seen.insert(target);
    }

    for path in expected.keys() {
        if !seen.contains(path) {
            return Err(UpdaterError::RestoreRejected(format!(
                "manifest names {} but the archive does not contain it",
                path.display()
            )));
        }
    }

    Ok(RestoreReport { files_restored: seen.len(), db_hash_mismatch })
}

/// Stream one entry to a sibling temp file, hash it, fsync, rename into
/// place, and apply the archived mode. Returns the hex digest.
fn extract_entry<R: Read>(
    entry: &mut R,
    target: &Path,
    mode: u32,
) -> Result<String, UpdaterError> {
    let parent = target
        .parent()
        .ok_or_else(|| UpdaterError::RestoreRejected(format!("bad path {}", target.display())))?;
    fs::create_dir_all(parent)?;

    let tmp = sibling_temp_path(target);
    let mut hasher = Sha256::new();
    {
        let mut out = File::create(&tmp)?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = entry.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n])?;
        }
        out.sync_all()?;
    }
    fs::rename(&tmp, target)?;
    fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o777))?;
    Ok(hex::encode(hasher.finalize()))
}

fn sibling_temp_path(target: &Path) -> PathBuf {
    let name = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    target.with_file_name(format!(".{name}.restore"))
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
