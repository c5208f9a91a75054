// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dbx_core::test_support::{manifest_fixture, EMPTY_SHA256};
use std::fs;

#[test]
fn sha256_of_empty_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("empty");
    fs::write(&path, "").unwrap();
    assert_eq!(sha256_file(&path).unwrap(), EMPTY_SHA256);
}

#[test]
fn sha256_of_known_content() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("abc");
    fs::write(&path, "abc").unwrap();
    assert_eq!(
        sha256_file(&path).unwrap(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn verify_accepts_matching_hash() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("pup.nix"), "").unwrap();
    let manifest = manifest_fixture("alpha", "1.0.0");
    verify_nix_file_hash(tmp.path(), &manifest, false).unwrap();
}

#[test]
fn verify_accepts_uppercase_expected_hash() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("pup.nix"), "").unwrap();
    let mut manifest = manifest_fixture("alpha", "1.0.0");
    manifest.container.build.nix_file_sha256 = EMPTY_SHA256.to_uppercase();
    verify_nix_file_hash(tmp.path(), &manifest, false).unwrap();
}

#[test]
fn verify_rejects_mismatch() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("pup.nix"), "tampered").unwrap();
    let manifest = manifest_fixture("alpha", "1.0.0");
    let err = verify_nix_file_hash(tmp.path(), &manifest, false).unwrap_err();
    assert!(matches!(err, UpdaterError::NixHashMismatch { .. }));
}

#[test]
fn verify_mismatch_tolerated_in_dev_mode() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("pup.nix"), "tampered").unwrap();
    let manifest = manifest_fixture("alpha", "1.0.0");
    verify_nix_file_hash(tmp.path(), &manifest, true).unwrap();
}

#[test]
fn verify_missing_file_is_fatal_even_in_dev_mode() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = manifest_fixture("alpha", "1.0.0");
    let err = verify_nix_file_hash(tmp.path(), &manifest, true).unwrap_err();
    assert!(matches!(err, UpdaterError::NixFileMissing(_)));
}
