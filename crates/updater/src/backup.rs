// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup archive creation.
//!
//! A backup is a gzip'd tar of the exact persistence footprint. Entry names
//! are absolute paths with the leading `/` stripped; `manifest.json` at the
//! archive root lists every file with its size and SHA-256.

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const BACKUP_MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFile {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub data_dir: PathBuf,
    pub nix_dir: PathBuf,
    pub files: Vec<BackupFile>,
}

/// The persistence footprint: the state store file, every pup record, each
/// pup checkout's raw manifest, and the whole declarative config tree.
/// Deduplicated and sorted lexicographically.
pub fn collect_backup_files(data_dir: &Path, nix_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();

    let db = data_dir.join("dogebox.db");
    if db.is_file() {
        files.insert(db);
    }

    let pups_dir = data_dir.join("pups");
    match fs::read_dir(&pups_dir) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                let file_type = entry.file_type()?;
                if file_type.is_file()
                    && name.starts_with("pup_")
                    && name.ends_with(".json")
                {
                    files.insert(entry.path());
                } else if file_type.is_dir() && name != "storage" {
                    let manifest = entry.path().join("manifest.json");
                    if manifest.is_file() {
                        files.insert(manifest);
                    }
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    if nix_dir.is_dir() {
        for entry in WalkDir::new(nix_dir) {
            let entry = entry.map_err(std::io::Error::other)?;
            if entry.file_type().is_file() {
                files.insert(entry.path().to_path_buf());
            }
        }
    }

    Ok(files.into_iter().collect())
}

/// `Read` adapter that hashes everything passing through it.
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Stream `files` into a gzip'd tar at `dest`, hashing each file on the
/// way, and embed the manifest last.
pub fn write_backup_archive(
    files: &[PathBuf],
    data_dir: &Path,
    nix_dir: &Path,
    dest: &Path,
    created_at: DateTime<Utc>,
) -> std::io::Result<BackupManifest> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let out = File::create(dest)?;
    let encoder = GzEncoder::new(out, Compression::default());
    let mut archive = tar::Builder::new(encoder);

    let mut manifest = BackupManifest {
        version: BACKUP_MANIFEST_VERSION,
        created_at,
        data_dir: data_dir.to_path_buf(),
        nix_dir: nix_dir.to_path_buf(),
        files: Vec::with_capacity(files.len()),
    };

    for path in files {
        let meta = fs::metadata(path)?;
        let entry_name = archive_entry_name(path);

        let mut header = tar::Header::new_gnu();
        header.set_metadata(&meta);
        header.set_cksum();

        let mut reader = HashingReader { inner: File::open(path)?, hasher: Sha256::new() };
        archive.append_data(&mut header, &entry_name, &mut reader)?;

        manifest.files.push(BackupFile {
            path: path.clone(),
            size: meta.len(),
            sha256: hex::encode(reader.hasher.finalize()),
        });
    }

    let manifest_json = serde_json::to_vec_pretty(&manifest).map_err(std::io::Error::other)?;
    let mut header = tar::Header::new_gnu();
    header.set_size(manifest_json.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    archive.append_data(&mut header, "manifest.json", manifest_json.as_slice())?;

    archive.into_inner()?.finish()?.sync_all()?;
    Ok(manifest)
}

/// Absolute path with the leading `/` stripped, as stored in the tar.
pub(crate) fn archive_entry_name(path: &Path) -> String {
    let s = path.to_string_lossy();
    s.strip_prefix('/').unwrap_or(&s).to_string()
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
