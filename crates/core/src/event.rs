// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change-bus event shapes published to subscribers.

use crate::job::Job;
use crate::pup::{PupId, PupState};
use crate::stats::PupStats;
use crate::updates::PupUpdatesCheckedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What changed about a pup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PupdateKind {
    ChangedInstallation,
    Adopted,
    Purged,
}

crate::simple_display! {
    PupdateKind {
        ChangedInstallation => "changed_installation",
        Adopted => "adopted",
        Purged => "purged",
    }
}

/// An event describing a change to a pup's in-memory state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pupdate {
    pub id: PupId,
    pub event: PupdateKind,
    pub state: PupState,
}

/// Kind of a job log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobLogKind {
    Log,
    Err,
    Cmd,
    Progress,
}

crate::simple_display! {
    JobLogKind {
        Log => "log",
        Err => "err",
        Cmd => "cmd",
        Progress => "progress",
    }
}

/// One line of a job's hierarchical log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub kind: JobLogKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub at: DateTime<Utc>,
}

/// Coarse-grained events published on the change bus.
///
/// Serializes with `{"type": "pup", ...}` format for the WS relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A pup's durable state changed.
    Pup(Pupdate),
    /// Full stats table snapshot on every stats tick.
    Stats(Vec<PupStats>),
    /// An update check finished.
    UpdatesChecked(PupUpdatesCheckedEvent),
    /// A job was queued or completed.
    Job(Job),
    /// A live job log line.
    JobLog { job_id: crate::job::JobId, entry: JobLogEntry },
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
