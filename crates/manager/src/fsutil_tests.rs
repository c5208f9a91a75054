// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt as _;

#[test]
fn atomic_write_json_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested/dir/value.json");
    atomic_write_json(&path, &vec![1u32, 2, 3]).unwrap();

    let parsed: Vec<u32> = read_json_opt(&path).unwrap().unwrap();
    assert_eq!(parsed, vec![1, 2, 3]);
}

#[test]
fn atomic_write_sets_mode_0644() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("value.json");
    atomic_write_json(&path, &1u32).unwrap();
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
}

#[test]
fn atomic_write_leaves_no_temp_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("value.json");
    atomic_write_json(&path, &1u32).unwrap();
    let names: Vec<String> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["value.json".to_string()]);
}

#[test]
fn read_json_opt_missing_is_none() {
    let tmp = tempfile::tempdir().unwrap();
    let parsed: Option<u32> = read_json_opt(&tmp.path().join("absent.json")).unwrap();
    assert!(parsed.is_none());
}

#[test]
fn read_json_opt_corrupt_is_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bad.json");
    fs::write(&path, "{not json").unwrap();
    assert!(read_json_opt::<u32>(&path).is_err());
}
