// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures and fakes for tests across the workspace.

use crate::dkm::{DelegateKeys, DelegatedKeyManager, DkmError};
use crate::driver::{DriverError, HostDriver};
use crate::manifest::{
    ManifestBuild, ManifestConfig, ManifestContainer, ManifestMeta, ManifestService, PupManifest,
};
use crate::monitor::{ProcStatus, ProcessMonitor};
use crate::pup::{PupId, PupSource, SourceType};
use crate::source::{SourceError, SourceListing, SourceManager};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

/// SHA-256 of the empty string; fixtures ship an empty nix file by default
/// so the hash check passes without computing digests in test setup.
pub const EMPTY_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// A minimal valid manifest for `name` at `version`.
pub fn manifest_fixture(name: &str, version: &str) -> PupManifest {
    PupManifest {
        manifest_version: 1,
        meta: ManifestMeta {
            name: name.to_string(),
            version: version.to_string(),
            logo_path: String::new(),
        },
        container: ManifestContainer {
            build: ManifestBuild {
                nix_file: "pup.nix".to_string(),
                nix_file_sha256: EMPTY_SHA256.to_string(),
            },
            services: vec![ManifestService { name: name.to_string(), command: String::new() }],
            exposes: Vec::new(),
            requires_internet: false,
        },
        dependencies: Vec::new(),
        interfaces: Vec::new(),
        config: ManifestConfig::default(),
    }
}

pub fn source_fixture(id: &str) -> PupSource {
    PupSource {
        id: id.to_string(),
        location: format!("https://example.org/{id}.git"),
        source_type: SourceType::Git,
    }
}

/// One pup a [`FakeSourceManager`] can serve.
#[derive(Debug, Clone)]
pub struct FakePup {
    pub manifest: PupManifest,
    pub nix_content: String,
}

impl FakePup {
    pub fn new(manifest: PupManifest) -> Self {
        Self { manifest, nix_content: String::new() }
    }
}

/// In-memory source registry for tests.
#[derive(Default)]
pub struct FakeSourceManager {
    pups: Mutex<HashMap<(String, String, String), FakePup>>,
    listings: Mutex<HashMap<String, Vec<SourceListing>>>,
    sources: Mutex<Vec<PupSource>>,
    pub fail_downloads: Mutex<bool>,
    pub downloads: Mutex<Vec<(String, String, String)>>,
}

impl FakeSourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pup(&self, source_id: &str, pup: FakePup) {
        let name = pup.manifest.meta.name.clone();
        let version = pup.manifest.meta.version.clone();
        self.listings
            .lock()
            .entry(source_id.to_string())
            .or_default()
            .push(SourceListing { name: name.clone(), version: version.clone() });
        self.pups.lock().insert((source_id.to_string(), name, version), pup);
        let mut sources = self.sources.lock();
        if !sources.iter().any(|s| s.id == source_id) {
            sources.push(source_fixture(source_id));
        }
    }

    /// Replace a source's listing outright (for checker tests where the
    /// listed versions have no backing manifest).
    pub fn set_listing(&self, source_id: &str, entries: Vec<(&str, &str)>) {
        self.listings.lock().insert(
            source_id.to_string(),
            entries
                .into_iter()
                .map(|(name, version)| SourceListing {
                    name: name.to_string(),
                    version: version.to_string(),
                })
                .collect(),
        );
        let mut sources = self.sources.lock();
        if !sources.iter().any(|s| s.id == source_id) {
            sources.push(source_fixture(source_id));
        }
    }

    pub fn set_fail_downloads(&self, fail: bool) {
        *self.fail_downloads.lock() = fail;
    }

    fn lookup(&self, source_id: &str, name: &str, version: &str) -> Result<FakePup, SourceError> {
        self.pups
            .lock()
            .get(&(source_id.to_string(), name.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| SourceError::PupNotFound {
                source_id: source_id.to_string(),
                name: name.to_string(),
                version: version.to_string(),
            })
    }
}

#[async_trait]
impl SourceManager for FakeSourceManager {
    async fn manifest(
        &self,
        source_id: &str,
        name: &str,
        version: &str,
    ) -> Result<PupManifest, SourceError> {
        Ok(self.lookup(source_id, name, version)?.manifest)
    }

    async fn download_pup(
        &self,
        dest: &Path,
        source_id: &str,
        name: &str,
        version: &str,
    ) -> Result<PupManifest, SourceError> {
        if *self.fail_downloads.lock() {
            return Err(SourceError::DownloadFailed("simulated failure".to_string()));
        }
        let pup = self.lookup(source_id, name, version)?;
        self.downloads.lock().push((
            source_id.to_string(),
            name.to_string(),
            version.to_string(),
        ));
        std::fs::create_dir_all(dest)?;
        let manifest_json = serde_json::to_vec_pretty(&pup.manifest)
            .map_err(|e| SourceError::Manifest(e.to_string()))?;
        std::fs::write(dest.join("manifest.json"), manifest_json)?;
        std::fs::write(dest.join(&pup.manifest.container.build.nix_file), &pup.nix_content)?;
        Ok(pup.manifest)
    }

    async fn download_tag(
        &self,
        dest: &Path,
        _source_id: &str,
        _tag: &str,
        _sub_path: &str,
    ) -> Result<(), SourceError> {
        if *self.fail_downloads.lock() {
            return Err(SourceError::DownloadFailed("simulated failure".to_string()));
        }
        std::fs::create_dir_all(dest)?;
        Ok(())
    }

    async fn list(
        &self,
        source_id: &str,
        _force_refresh: bool,
    ) -> Result<Vec<SourceListing>, SourceError> {
        self.listings
            .lock()
            .get(source_id)
            .cloned()
            .ok_or_else(|| SourceError::SourceNotFound(source_id.to_string()))
    }

    fn sources(&self) -> Vec<PupSource> {
        self.sources.lock().clone()
    }

    async fn ensure_source(&self, source: &PupSource) -> Result<(), SourceError> {
        let mut sources = self.sources.lock();
        if !sources.iter().any(|s| s.id == source.id) {
            sources.push(source.clone());
        }
        Ok(())
    }
}

/// Host driver that performs plain filesystem operations (no ownership
/// changes) and records every service-control call.
#[derive(Default)]
pub struct FakeHostDriver {
    pub started: Mutex<Vec<String>>,
    pub stopped: Mutex<Vec<String>>,
    pub removed_container_state: Mutex<Vec<PupId>>,
    statuses: Mutex<HashMap<String, ProcStatus>>,
}

impl FakeHostDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, service: &str, running: bool, active_state: &str) {
        self.statuses.lock().insert(
            service.to_string(),
            ProcStatus { running, active_state: active_state.to_string() },
        );
    }

    pub fn start_count(&self, service: &str) -> usize {
        self.started.lock().iter().filter(|s| s.as_str() == service).count()
    }
}

#[async_trait]
impl HostDriver for FakeHostDriver {
    async fn start_service(&self, service: &str) -> Result<(), DriverError> {
        self.started.lock().push(service.to_string());
        self.statuses.lock().insert(
            service.to_string(),
            ProcStatus { running: true, active_state: "active".to_string() },
        );
        Ok(())
    }

    async fn stop_service(&self, service: &str) -> Result<(), DriverError> {
        self.stopped.lock().push(service.to_string());
        self.statuses.lock().insert(
            service.to_string(),
            ProcStatus { running: false, active_state: "inactive".to_string() },
        );
        Ok(())
    }

    async fn service_status(&self, service: &str) -> Result<ProcStatus, DriverError> {
        Ok(self.statuses.lock().get(service).cloned().unwrap_or_default())
    }

    async fn service_status_text(&self, service: &str) -> Result<String, DriverError> {
        Ok(format!("{service}: fake status"))
    }

    async fn create_storage_dir(&self, path: &Path) -> Result<(), DriverError> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    async fn remove_tree(&self, path: &Path) -> Result<(), DriverError> {
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    async fn write_key_file(&self, path: &Path, contents: &str) -> Result<(), DriverError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    async fn write_config_env(&self, path: &Path, contents: &str) -> Result<(), DriverError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    async fn remove_container_state(&self, pup_id: &PupId) -> Result<(), DriverError> {
        self.removed_container_state.lock().push(*pup_id);
        Ok(())
    }

    async fn copy_tree(&self, src: &Path, dest: &Path) -> Result<(), DriverError> {
        copy_dir(src, dest)?;
        Ok(())
    }
}

fn copy_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Key manager returning deterministic key material.
#[derive(Default)]
pub struct FakeKeyManager {
    pub fail: Mutex<bool>,
    pub issued: Mutex<Vec<PupId>>,
}

impl FakeKeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl DelegatedKeyManager for FakeKeyManager {
    async fn make_delegate(
        &self,
        pup_id: &PupId,
        _session_token: &str,
    ) -> Result<DelegateKeys, DkmError> {
        if *self.fail.lock() {
            return Err(DkmError::Rejected("simulated failure".to_string()));
        }
        self.issued.lock().push(*pup_id);
        Ok(DelegateKeys {
            extended_priv: format!("xprv-{pup_id}"),
            wif: format!("wif-{pup_id}"),
        })
    }
}

/// In-memory state store with a real open/closed bit.
pub struct FakeStateStore {
    config: Mutex<crate::store::DogeboxConfig>,
    open: Mutex<bool>,
    pub close_count: Mutex<usize>,
    pub open_count: Mutex<usize>,
}

impl FakeStateStore {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(crate::store::DogeboxConfig::default()),
            open: Mutex::new(true),
            close_count: Mutex::new(0),
            open_count: Mutex::new(0),
        }
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }
}

impl Default for FakeStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::store::StateStore for FakeStateStore {
    fn get(&self) -> Result<crate::store::DogeboxConfig, crate::store::StoreError> {
        if !*self.open.lock() {
            return Err(crate::store::StoreError::Closed);
        }
        Ok(self.config.lock().clone())
    }

    fn set_dogebox(
        &self,
        config: &crate::store::DogeboxConfig,
    ) -> Result<(), crate::store::StoreError> {
        if !*self.open.lock() {
            return Err(crate::store::StoreError::Closed);
        }
        *self.config.lock() = config.clone();
        Ok(())
    }

    fn close_db(&self) -> Result<(), crate::store::StoreError> {
        *self.open.lock() = false;
        *self.close_count.lock() += 1;
        Ok(())
    }

    fn open_db(&self) -> Result<(), crate::store::StoreError> {
        *self.open.lock() = true;
        *self.open_count.lock() += 1;
        Ok(())
    }
}

/// Monitor recording which services it was told to watch.
#[derive(Default)]
pub struct FakeMonitor {
    pub monitored: Mutex<Vec<Vec<String>>>,
}

impl FakeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_monitored(&self) -> Vec<String> {
        self.monitored.lock().last().cloned().unwrap_or_default()
    }
}

impl ProcessMonitor for FakeMonitor {
    fn set_monitored(&self, services: Vec<String>) {
        self.monitored.lock().push(services);
    }
}
