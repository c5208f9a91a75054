// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Update-check data shapes: cached per-pup version info and skip records.

use crate::pup::PupId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upstream version newer than the installed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_url: Option<String>,
}

/// Cached result of an update check for one pup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PupUpdateInfo {
    pub pup_id: PupId,
    pub current_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    /// Newer versions in source-listing order.
    #[serde(default)]
    pub available_versions: Vec<AvailableVersion>,
    pub update_available: bool,
    pub last_checked: DateTime<Utc>,
}

/// A user's decision to ignore an available update.
///
/// Suppresses "update available" until a version strictly newer than
/// `latest_version_at_skip` appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPupUpdate {
    pub pup_id: PupId,
    pub skipped_at_version: String,
    pub latest_version_at_skip: String,
    pub skipped_at: DateTime<Utc>,
}

/// Aggregate event emitted when an update check completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PupUpdatesCheckedEvent {
    pub pups_checked: usize,
    pub updates_available: usize,
    pub is_periodic_check: bool,
}
