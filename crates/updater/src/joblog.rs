// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical per-job logger.
//!
//! Each long-running job owns one of these. Output is appended to an
//! archived log file named after the job and streamed to live subscribers
//! through the change bus. Logging never fails the job.

use chrono::Utc;
use dbx_core::{ChangeEvent, JobId, JobLogEntry, JobLogKind};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub struct JobLogger {
    job_id: JobId,
    path: PathBuf,
    step: Mutex<Option<String>>,
    events: mpsc::Sender<ChangeEvent>,
}

impl JobLogger {
    /// Logger writing to `<log_dir>/<job_id>.log`.
    pub fn new(log_dir: &Path, job_id: JobId, events: mpsc::Sender<ChangeEvent>) -> Self {
        Self {
            job_id,
            path: log_dir.join(format!("{job_id}.log")),
            step: Mutex::new(None),
            events,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.path
    }

    /// Enter a named step; subsequent lines carry it.
    pub fn step(&self, name: &str) {
        *self.step.lock() = Some(name.to_string());
        self.emit(JobLogKind::Log, &format!("=== {name}"));
    }

    pub fn log(&self, text: &str) {
        self.emit(JobLogKind::Log, text);
    }

    pub fn err(&self, text: &str) {
        self.emit(JobLogKind::Err, text);
    }

    /// Echo a command the job is about to run.
    pub fn cmd(&self, text: &str) {
        self.emit(JobLogKind::Cmd, text);
    }

    pub fn progress(&self, text: &str) {
        self.emit(JobLogKind::Progress, text);
    }

    fn emit(&self, kind: JobLogKind, text: &str) {
        let entry = JobLogEntry {
            kind,
            text: text.to_string(),
            step: self.step.lock().clone(),
            at: Utc::now(),
        };

        if let Err(e) = self.append(&entry) {
            tracing::warn!(job = %self.job_id, error = %e, "failed to write job log");
        }

        // Live stream is best-effort; a full or closed bus drops the line.
        let _ = self
            .events
            .try_send(ChangeEvent::JobLog { job_id: self.job_id, entry });
    }

    fn append(&self, entry: &JobLogEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let ts = entry.at.format("%Y-%m-%dT%H:%M:%SZ");
        match &entry.step {
            Some(step) => writeln!(file, "{} [{}] {}: {}", ts, step, entry.kind, entry.text),
            None => writeln!(file, "{} {}: {}", ts, entry.kind, entry.text),
        }
    }
}

#[cfg(test)]
#[path = "joblog_tests.rs"]
mod tests;
