// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Source manager interface: resolves names and versions to manifests and
//! downloads pup sources. Implemented by the git/disk-backed registry.

use crate::manifest::PupManifest;
use crate::pup::PupSource;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source not found: {0}")]
    SourceNotFound(String),
    #[error("pup not found in source {source_id}: {name} {version}")]
    PupNotFound { source_id: String, name: String, version: String },
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest error: {0}")]
    Manifest(String),
}

/// One entry in a source's pup listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceListing {
    pub name: String,
    pub version: String,
}

/// Upstream registry of pups.
#[async_trait]
pub trait SourceManager: Send + Sync {
    /// Resolve a `(source, name, version)` triple to its manifest.
    async fn manifest(
        &self,
        source_id: &str,
        name: &str,
        version: &str,
    ) -> Result<PupManifest, SourceError>;

    /// Download a pup's sources into `dest`, returning the manifest that
    /// shipped with the download.
    async fn download_pup(
        &self,
        dest: &Path,
        source_id: &str,
        name: &str,
        version: &str,
    ) -> Result<PupManifest, SourceError>;

    /// Fallback download of a bare git tag, used by rehydration when the
    /// manifest-driven download fails.
    async fn download_tag(
        &self,
        dest: &Path,
        source_id: &str,
        tag: &str,
        sub_path: &str,
    ) -> Result<(), SourceError>;

    /// List a source's pups. `force_refresh` bypasses any listing cache;
    /// the refreshed listing is the authoritative version index.
    async fn list(
        &self,
        source_id: &str,
        force_refresh: bool,
    ) -> Result<Vec<SourceListing>, SourceError>;

    /// All registered sources.
    fn sources(&self) -> Vec<PupSource>;

    /// Register `source` if its id is unknown or its location moved.
    async fn ensure_source(&self, source: &PupSource) -> Result<(), SourceError>;
}
