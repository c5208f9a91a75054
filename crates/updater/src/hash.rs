// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Nix-file integrity checking.

use crate::error::UpdaterError;
use dbx_core::PupManifest;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Streaming SHA-256 of a file, hex encoded.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Verify the downloaded nix file against the manifest's expected digest.
///
/// A mismatch is fatal unless `dev_mode`, in which case it is logged and
/// ignored so iterating on a local pup doesn't require re-hashing.
pub fn verify_nix_file_hash(
    pup_dir: &Path,
    manifest: &PupManifest,
    dev_mode: bool,
) -> Result<(), UpdaterError> {
    let path = pup_dir.join(&manifest.container.build.nix_file);
    if !path.is_file() {
        return Err(UpdaterError::NixFileMissing(path));
    }

    let actual = sha256_file(&path)?;
    let expected = manifest.container.build.nix_file_sha256.to_lowercase();
    if actual != expected {
        if dev_mode {
            tracing::warn!(
                file = %path.display(),
                expected = %expected,
                actual = %actual,
                "nix file hash mismatch ignored in dev mode"
            );
            return Ok(());
        }
        return Err(UpdaterError::NixHashMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
