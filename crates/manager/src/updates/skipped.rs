// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Skipped-updates manager.
//!
//! A skip suppresses "update available" until a version strictly newer
//! than the one skipped at appears.

use crate::fsutil::{atomic_write_json, read_json_opt};
use chrono::{DateTime, Utc};
use dbx_core::version::compare_lenient;
use dbx_core::{Clock, PupId, SkippedPupUpdate};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkippedFile {
    version: u32,
    updated_at: DateTime<Utc>,
    skipped_updates: HashMap<PupId, SkippedPupUpdate>,
}

pub struct SkippedUpdates<C: Clock> {
    path: PathBuf,
    clock: C,
    entries: Mutex<HashMap<PupId, SkippedPupUpdate>>,
}

impl<C: Clock> SkippedUpdates<C> {
    /// Load `<data_dir>/skipped-updates.json`, tolerating a missing file.
    pub fn load(data_dir: &Path, clock: C) -> std::io::Result<Self> {
        let path = data_dir.join("skipped-updates.json");
        let entries = read_json_opt::<SkippedFile>(&path)?
            .map(|f| f.skipped_updates)
            .unwrap_or_default();
        Ok(Self { path, clock, entries: Mutex::new(entries) })
    }

    pub fn skip_update(
        &self,
        pup_id: PupId,
        current: &str,
        latest: &str,
    ) -> std::io::Result<()> {
        let entry = SkippedPupUpdate {
            pup_id,
            skipped_at_version: current.to_string(),
            latest_version_at_skip: latest.to_string(),
            skipped_at: self.clock.now_utc(),
        };
        let snapshot = {
            let mut entries = self.entries.lock();
            entries.insert(pup_id, entry);
            entries.clone()
        };
        self.persist(snapshot)
    }

    /// True iff a stored entry exists and `latest` is not newer than the
    /// version recorded at skip time.
    pub fn is_skipped(&self, pup_id: &PupId, latest: &str) -> bool {
        let entries = self.entries.lock();
        match entries.get(pup_id) {
            Some(entry) => {
                compare_lenient(latest, &entry.latest_version_at_skip) != Ordering::Greater
            }
            None => false,
        }
    }

    pub fn get(&self, pup_id: &PupId) -> Option<SkippedPupUpdate> {
        self.entries.lock().get(pup_id).cloned()
    }

    pub fn clear_skipped(&self, pup_id: &PupId) -> std::io::Result<()> {
        let snapshot = {
            let mut entries = self.entries.lock();
            if entries.remove(pup_id).is_none() {
                return Ok(());
            }
            entries.clone()
        };
        self.persist(snapshot)
    }

    fn persist(&self, entries: HashMap<PupId, SkippedPupUpdate>) -> std::io::Result<()> {
        atomic_write_json(
            &self.path,
            &SkippedFile { version: 1, updated_at: self.clock.now_utc(), skipped_updates: entries },
        )
    }
}

#[cfg(test)]
#[path = "skipped_tests.rs"]
mod tests;
