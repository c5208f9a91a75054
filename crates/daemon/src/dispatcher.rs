// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The action dispatcher.
//!
//! Front-ends produce actions; the dispatcher assigns each an ID by
//! materializing a [`Job`], adopts the pup for fresh installs, publishes
//! the queued record, and forwards the job to the system updater. Job
//! completions flow back through the done channel and update the record
//! table.

use crate::bus::ChangeBus;
use dbx_core::{Action, ChangeEvent, Clock, Job, JobId, SourceManager};
use dbx_manager::{AdoptOptions, PupManager, PupManagerError};
use dbx_core::SourceError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("job queue is full")]
    QueueFull,

    #[error("job queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Manager(#[from] PupManagerError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("unknown source: {0}")]
    UnknownSource(String),
}

pub struct Dispatcher<C: Clock> {
    manager: Arc<PupManager<C>>,
    source: Arc<dyn SourceManager>,
    clock: C,
    dev_mode: bool,
    jobs: mpsc::Sender<Job>,
    records: Mutex<HashMap<JobId, Job>>,
    bus: Arc<ChangeBus>,
}

impl<C: Clock + 'static> Dispatcher<C> {
    pub fn new(
        manager: Arc<PupManager<C>>,
        source: Arc<dyn SourceManager>,
        clock: C,
        dev_mode: bool,
        jobs: mpsc::Sender<Job>,
        bus: Arc<ChangeBus>,
    ) -> Self {
        Self {
            manager,
            source,
            clock,
            dev_mode,
            jobs,
            records: Mutex::new(HashMap::new()),
            bus,
        }
    }

    /// Accept an action: adopt for installs, materialize the job, record
    /// it, and queue it for the worker.
    pub async fn dispatch(&self, action: Action) -> Result<Job, DispatchError> {
        let mut job = Job::new(action, self.clock.now_utc());

        if let Action::InstallPup { pup_name, pup_version, source_id, .. } = &job.action {
            let manifest =
                self.source.manifest(source_id, pup_name, pup_version).await?;
            let source = self
                .source
                .sources()
                .into_iter()
                .find(|s| &s.id == source_id)
                .ok_or_else(|| DispatchError::UnknownSource(source_id.clone()))?;
            let options = AdoptOptions { dev_mode: self.dev_mode, ..Default::default() };
            let pup_id = self.manager.adopt_pup(manifest, source, options)?;
            job.pup_id = Some(pup_id);
        }

        self.records.lock().insert(job.id, job.clone());
        self.bus.publish(ChangeEvent::Job(job.clone()));

        self.jobs.try_send(job.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DispatchError::QueueClosed,
        })?;
        tracing::info!(job = %job.id, action = job.action.name(), "job queued");
        Ok(job)
    }

    pub fn job(&self, id: &JobId) -> Option<Job> {
        self.records.lock().get(id).cloned()
    }

    /// All known job records, newest first.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.records.lock().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// UI read marker.
    pub fn mark_read(&self, id: &JobId) -> bool {
        match self.records.lock().get_mut(id) {
            Some(job) => {
                job.read = true;
                true
            }
            None => false,
        }
    }

    /// Track completions coming back from the worker.
    pub async fn run_done(
        self: Arc<Self>,
        mut done: mpsc::Receiver<Job>,
        stop: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                job = done.recv() => match job {
                    Some(job) => {
                        tracing::info!(job = %job.id, status = %job.status, "job finished");
                        self.records.lock().insert(job.id, job);
                    }
                    None => break,
                },
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
