// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System updater errors

use dbx_core::{DkmError, DriverError, InstallationState, PupId, SourceError, StoreError};
use dbx_manager::PupManagerError;
use dbx_patch::PatchError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error(transparent)]
    Manager(#[from] PupManagerError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("key manager error: {0}")]
    Dkm(#[from] DkmError),

    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("nix file missing: {0}")]
    NixFileMissing(PathBuf),

    #[error("nix file hash mismatch: expected {expected}, got {actual}")]
    NixHashMismatch { expected: String, actual: String },

    #[error("job has no pup state bound")]
    MissingPupState,

    #[error("pup is {actual}, expected {expected}")]
    WrongState { actual: InstallationState, expected: InstallationState },

    #[error("no upgrade snapshot for {0}")]
    NoSnapshot(PupId),

    #[error("invalid update package: {0}")]
    InvalidUpdatePackage(String),

    #[error("update version unavailable: {0}")]
    UpdateVersionUnavailable(String),

    #[error("restore rejected: {0}")]
    RestoreRejected(String),

    #[error("no pups rehydrated successfully")]
    RehydrateFailed,
}
