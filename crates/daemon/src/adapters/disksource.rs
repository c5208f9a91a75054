// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disk-backed source registry.
//!
//! A disk source is a directory of `<name>/<version>/` checkouts, each
//! carrying a `manifest.json` plus the pup's build files. The full git
//! registry lives out of tree; this adapter covers local development
//! sources and restores of disk-typed pups.

use async_trait::async_trait;
use dbx_core::{PupManifest, PupSource, SourceError, SourceListing, SourceManager, SourceType};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Default)]
pub struct DiskSourceManager {
    /// source id → root directory.
    sources: Mutex<BTreeMap<String, PathBuf>>,
}

impl DiskSourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&self, id: &str, location: PathBuf) {
        self.sources.lock().insert(id.to_string(), location);
    }

    fn root(&self, source_id: &str) -> Result<PathBuf, SourceError> {
        self.sources
            .lock()
            .get(source_id)
            .cloned()
            .ok_or_else(|| SourceError::SourceNotFound(source_id.to_string()))
    }

    fn pup_dir(&self, source_id: &str, name: &str, version: &str) -> Result<PathBuf, SourceError> {
        let dir = self.root(source_id)?.join(name).join(version);
        if !dir.is_dir() {
            return Err(SourceError::PupNotFound {
                source_id: source_id.to_string(),
                name: name.to_string(),
                version: version.to_string(),
            });
        }
        Ok(dir)
    }
}

fn read_manifest(dir: &Path) -> Result<PupManifest, SourceError> {
    let bytes = fs::read(dir.join("manifest.json"))?;
    serde_json::from_slice(&bytes).map_err(|e| SourceError::Manifest(e.to_string()))
}

fn copy_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[async_trait]
impl SourceManager for DiskSourceManager {
    async fn manifest(
        &self,
        source_id: &str,
        name: &str,
        version: &str,
    ) -> Result<PupManifest, SourceError> {
        read_manifest(&self.pup_dir(source_id, name, version)?)
    }

    async fn download_pup(
        &self,
        dest: &Path,
        source_id: &str,
        name: &str,
        version: &str,
    ) -> Result<PupManifest, SourceError> {
        let dir = self.pup_dir(source_id, name, version)?;
        copy_dir(&dir, dest).map_err(|e| SourceError::DownloadFailed(e.to_string()))?;
        read_manifest(dest)
    }

    async fn download_tag(
        &self,
        _dest: &Path,
        source_id: &str,
        tag: &str,
        _sub_path: &str,
    ) -> Result<(), SourceError> {
        // Disk sources have no tags to fall back to.
        Err(SourceError::DownloadFailed(format!(
            "disk source {source_id} has no tag {tag}"
        )))
    }

    async fn list(
        &self,
        source_id: &str,
        _force_refresh: bool,
    ) -> Result<Vec<SourceListing>, SourceError> {
        let root = self.root(source_id)?;
        let mut listings = Vec::new();
        for name_entry in fs::read_dir(&root)? {
            let name_entry = name_entry?;
            if !name_entry.file_type()?.is_dir() {
                continue;
            }
            let name = name_entry.file_name().to_string_lossy().into_owned();
            for version_entry in fs::read_dir(name_entry.path())? {
                let version_entry = version_entry?;
                if !version_entry.file_type()?.is_dir() {
                    continue;
                }
                listings.push(SourceListing {
                    name: name.clone(),
                    version: version_entry.file_name().to_string_lossy().into_owned(),
                });
            }
        }
        listings.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        Ok(listings)
    }

    fn sources(&self) -> Vec<PupSource> {
        self.sources
            .lock()
            .iter()
            .map(|(id, location)| PupSource {
                id: id.clone(),
                location: location.display().to_string(),
                source_type: SourceType::Disk,
            })
            .collect()
    }

    async fn ensure_source(&self, source: &PupSource) -> Result<(), SourceError> {
        if source.source_type != SourceType::Disk {
            return Err(SourceError::SourceNotFound(format!(
                "cannot re-register non-disk source {}",
                source.id
            )));
        }
        let mut sources = self.sources.lock();
        sources
            .entry(source.id.clone())
            .or_insert_with(|| PathBuf::from(&source.location));
        Ok(())
    }
}

#[cfg(test)]
#[path = "disksource_tests.rs"]
mod tests;
