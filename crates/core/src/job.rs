// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier and record.

use crate::action::Action;
use crate::pup::PupId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a dispatched job.
    ///
    /// Assigned by the dispatcher when an action is accepted; also names
    /// the job's archived log file.
    pub struct JobId("job-");
}

/// Status of a job in the updater's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    JobStatus {
        Queued => "queued",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// A queued or completed long-running operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub action: Action,
    /// The pup the action targets, resolved at dispatch time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pup_id: Option<PupId>,
    pub status: JobStatus,
    /// UI read marker.
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a queued job for `action`.
    pub fn new(action: Action, created_at: DateTime<Utc>) -> Self {
        let pup_id = action.pup_id().copied();
        Self {
            id: JobId::new(),
            action,
            pup_id,
            status: JobStatus::Queued,
            read: false,
            created_at,
            completed_at: None,
            error: None,
        }
    }

    /// Mark the job finished. A `None` error means success.
    pub fn complete(&mut self, error: Option<String>, completed_at: DateTime<Utc>) {
        self.status = if error.is_some() { JobStatus::Failed } else { JobStatus::Completed };
        self.error = error;
        self.completed_at = Some(completed_at);
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
