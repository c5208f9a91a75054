// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk per-pup records: `<data_dir>/pups/pup_<id>.json` plus sidecar
//! directories for sources and storage.

use crate::fsutil::atomic_write_json;
use dbx_core::{PupId, PupState};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn pups_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("pups")
}

pub(crate) fn record_path(data_dir: &Path, id: &PupId) -> PathBuf {
    pups_dir(data_dir).join(format!("pup_{id}.json"))
}

/// Source checkout directory for a pup.
pub(crate) fn source_dir(data_dir: &Path, id: &PupId) -> PathBuf {
    pups_dir(data_dir).join(id.as_str())
}

/// Private storage directory for a pup, owned by the container user.
pub(crate) fn storage_dir(data_dir: &Path, id: &PupId) -> PathBuf {
    pups_dir(data_dir).join("storage").join(id.as_str())
}

/// Persist one record atomically.
pub(crate) fn save_record(data_dir: &Path, state: &PupState) -> std::io::Result<()> {
    atomic_write_json(&record_path(data_dir, &state.id), state)
}

/// Delete one record; missing files are fine.
pub(crate) fn delete_record(data_dir: &Path, id: &PupId) -> std::io::Result<()> {
    match fs::remove_file(record_path(data_dir, id)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Load every record under the pups directory.
///
/// Unparsable records are skipped with a warning rather than aborting the
/// whole load; the operator can still purge them.
pub(crate) fn load_records(data_dir: &Path) -> std::io::Result<Vec<PupState>> {
    let dir = pups_dir(data_dir);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut records = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with("pup_") || !name.ends_with(".json") {
            continue;
        }
        match fs::read(entry.path()) {
            Ok(bytes) => match serde_json::from_slice::<PupState>(&bytes) {
                Ok(state) => records.push(state),
                Err(e) => {
                    tracing::warn!(record = %name, error = %e, "skipping unparsable pup record");
                }
            },
            Err(e) => {
                tracing::warn!(record = %name, error = %e, "skipping unreadable pup record");
            }
        }
    }
    records.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    Ok(records)
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
