// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pup manager errors

use dbx_core::{InstallationState, PupId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PupManagerError {
    #[error("pup not found: {0}")]
    PupNotFound(PupId),

    #[error("pup already exists: {name} {version} from {source_id}")]
    PupAlreadyExists { source_id: String, name: String, version: String },

    #[error("no free addresses left in the pup subnet")]
    SubnetExhausted,

    #[error("purge requires an uninstalled pup, found {0}")]
    NotUninstalled(InstallationState),

    #[error("update checker not attached")]
    CheckerNotAttached,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("patch error: {0}")]
    Patch(#[from] dbx_patch::PatchError),
}
