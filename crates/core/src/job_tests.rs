// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;

fn enable_action() -> Action {
    Action::EnablePup { pup_id: PupId::from_string("p1") }
}

#[test]
fn new_job_is_queued_with_resolved_pup() {
    let job = Job::new(enable_action(), Utc::now());
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.pup_id, Some(PupId::from_string("p1")));
    assert!(job.completed_at.is_none());
    assert!(job.error.is_none());
    assert!(!job.read);
}

#[test]
fn complete_without_error_succeeds() {
    let mut job = Job::new(enable_action(), Utc::now());
    let done = Utc::now();
    job.complete(None, done);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_at, Some(done));
}

#[test]
fn complete_with_error_fails() {
    let mut job = Job::new(enable_action(), Utc::now());
    job.complete(Some("download failed".to_string()), Utc::now());
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("download failed"));
}

#[test]
fn terminal_statuses() {
    assert!(JobStatus::Completed.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
    assert!(JobStatus::Cancelled.is_terminal());
    assert!(!JobStatus::Queued.is_terminal());
    assert!(!JobStatus::InProgress.is_terminal());
}
