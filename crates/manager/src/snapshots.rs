// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-slot per-pup upgrade snapshots under `<data_dir>/pup-snapshots/`.
//!
//! One snapshot per pup, atomically replaced on each upgrade attempt.
//! Multi-version history is deliberately out of scope.

use crate::fsutil::{atomic_write_json, read_json_opt};
use dbx_core::{Clock, PupId, PupState, PupVersionSnapshot};
use std::fs;
use std::path::PathBuf;

pub struct SnapshotManager<C: Clock> {
    dir: PathBuf,
    clock: C,
}

impl<C: Clock> SnapshotManager<C> {
    pub fn new(data_dir: &std::path::Path, clock: C) -> Self {
        Self { dir: data_dir.join("pup-snapshots"), clock }
    }

    fn path(&self, id: &PupId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Capture and persist a snapshot of `state`, replacing any previous one.
    pub fn create_snapshot(&self, state: &PupState) -> std::io::Result<PupVersionSnapshot> {
        let snapshot = PupVersionSnapshot::capture(state, self.clock.now_utc());
        atomic_write_json(&self.path(&state.id), &snapshot)?;
        tracing::info!(pup = %state.id, version = %snapshot.version, "created upgrade snapshot");
        Ok(snapshot)
    }

    pub fn get_snapshot(&self, id: &PupId) -> std::io::Result<Option<PupVersionSnapshot>> {
        read_json_opt(&self.path(id))
    }

    pub fn has_snapshot(&self, id: &PupId) -> bool {
        self.path(id).is_file()
    }

    pub fn delete_snapshot(&self, id: &PupId) -> std::io::Result<()> {
        match fs::remove_file(self.path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn list_snapshots(&self) -> std::io::Result<Vec<(PupId, PupVersionSnapshot)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(id) = name.strip_suffix(".json") else { continue };
            if let Some(snapshot) = read_json_opt(&entry.path())? {
                out.push((PupId::from_string(id), snapshot));
            }
        }
        out.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        Ok(out)
    }

    /// Delete snapshots older than `max_age`. Returns how many were removed.
    pub fn clean_old_snapshots(&self, max_age: chrono::Duration) -> std::io::Result<usize> {
        let cutoff = self.clock.now_utc() - max_age;
        let mut removed = 0;
        for (id, snapshot) in self.list_snapshots()? {
            if snapshot.snapshot_date < cutoff {
                self.delete_snapshot(&id)?;
                removed += 1;
                tracing::info!(pup = %id, "removed stale upgrade snapshot");
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "snapshots_tests.rs"]
mod tests;
