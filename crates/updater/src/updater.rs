// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job worker: one consumer of the job queue, dispatching actions to
//! their handlers and publishing completions.

use crate::error::UpdaterError;
use crate::joblog::JobLogger;
use dbx_core::{
    Action, BrokenReason, ChangeEvent, Clock, DelegatedKeyManager, HostDriver, InstallationState,
    Job, JobStatus, PupId, PupState, SourceManager, StateStore, SystemClock,
};
use dbx_manager::PupManager;
use dbx_patch::RebuildDriver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bound on queued-but-unstarted jobs.
pub const JOB_QUEUE_CAPACITY: usize = 32;

/// External collaborators and tunables the updater works against.
pub struct UpdaterDeps<C: Clock = SystemClock> {
    pub manager: Arc<PupManager<C>>,
    pub source: Arc<dyn SourceManager>,
    pub driver: Arc<dyn HostDriver>,
    pub dkm: Arc<dyn DelegatedKeyManager>,
    pub rebuild: Arc<dyn RebuildDriver>,
    pub store: Arc<dyn StateStore>,
    pub clock: C,
    /// Suppresses hash-mismatch fatality.
    pub dev_mode: bool,
    /// Total time to wait for a freshly upgraded container to come up.
    pub readiness_timeout: Duration,
    pub readiness_interval: Duration,
}

pub struct SystemUpdater<C: Clock = SystemClock> {
    pub(crate) deps: UpdaterDeps<C>,
    pub(crate) job_log_dir: PathBuf,
    pub(crate) events: mpsc::Sender<ChangeEvent>,
}

impl<C: Clock + 'static> SystemUpdater<C> {
    pub fn new(deps: UpdaterDeps<C>, events: mpsc::Sender<ChangeEvent>) -> Arc<Self> {
        let job_log_dir = deps.manager.data_dir().join("job-logs");
        Arc::new(Self { deps, job_log_dir, events })
    }

    /// Drain `jobs` until cancelled or the queue closes. Handlers run to
    /// completion before the next job is selected; completions go to
    /// `done`.
    pub async fn run(
        self: Arc<Self>,
        mut jobs: mpsc::Receiver<Job>,
        done: mpsc::Sender<Job>,
        stop: CancellationToken,
    ) {
        loop {
            let job = tokio::select! {
                _ = stop.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            let finished = self.run_job(job).await;
            if done.send(finished).await.is_err() {
                break;
            }
        }
        tracing::info!("job worker stopped");
    }

    /// Execute one job start to finish, binding a logger and publishing
    /// the in-progress and completed records.
    pub async fn run_job(&self, mut job: Job) -> Job {
        tracing::info!(job = %job.id, action = job.action.name(), "job started");
        job.status = JobStatus::InProgress;
        self.publish(ChangeEvent::Job(job.clone()));

        let logger = JobLogger::new(&self.job_log_dir, job.id, self.events.clone());
        logger.log(&format!("{} started", job.action.name()));

        let error = match self.dispatch(&job, &logger).await {
            Ok(()) => {
                logger.log(&format!("{} finished", job.action.name()));
                None
            }
            Err(e) => {
                logger.err(&e.to_string());
                tracing::warn!(job = %job.id, error = %e, "job failed");
                Some(e.to_string())
            }
        };

        job.complete(error, self.deps.clock.now_utc());
        self.publish(ChangeEvent::Job(job.clone()));
        job
    }

    async fn dispatch(&self, job: &Job, log: &JobLogger) -> Result<(), UpdaterError> {
        match job.action.clone() {
            Action::InstallPup { pup_name, pup_version, source_id, session_token } => {
                let id = job.pup_id.ok_or(UpdaterError::MissingPupState)?;
                self.install_steps(&id, &source_id, &pup_name, &pup_version, &session_token, log)
                    .await
            }
            Action::InstallPups { specs, session_token } => {
                self.handle_install_many(&specs, &session_token, log).await
            }
            Action::UninstallPup { pup_id } => self.handle_uninstall(&pup_id, log).await,
            Action::PurgePup { pup_id } => self.handle_purge(&pup_id, log).await,
            Action::EnablePup { pup_id } => self.handle_enable(&pup_id, log).await,
            Action::DisablePup { pup_id } => self.handle_disable(&pup_id, log).await,
            Action::UpgradePup { pup_id, target_version, source_id } => {
                self.handle_upgrade(&pup_id, &target_version, &source_id, log).await
            }
            Action::RollbackPupUpgrade { pup_id } => self.handle_rollback(&pup_id, log).await,
            Action::UpdatePupConfig { pup_id, payload } => {
                self.handle_update_config(&pup_id, payload, log).await
            }
            Action::UpdatePupProviders { pup_id, providers } => {
                self.handle_update_providers(&pup_id, providers, log).await
            }
            Action::UpdatePupHooks { pup_id, hooks } => {
                self.handle_update_hooks(&pup_id, hooks, log).await
            }
            Action::CheckPupUpdates { pup_id } => self.handle_check_updates(pup_id, log).await,
            Action::ImportBlockchainData { pup_id, source_path } => {
                self.handle_import_blockchain(&pup_id, &source_path, log).await
            }
            Action::BackupConfig { destination } => {
                self.handle_backup(job, destination.as_deref(), log).await
            }
            Action::RestoreConfig { archive_path } => {
                self.handle_restore(&archive_path, log).await
            }
            Action::SystemUpdate {} => self.handle_system_update(log).await,
            Action::EnableSsh { enabled } => self.handle_enable_ssh(enabled, log).await,
            Action::AddBinaryCache { url, key } => {
                self.handle_add_binary_cache(&url, &key, log).await
            }
            Action::EnableTailscale { auth_key } => {
                self.handle_enable_tailscale(&auth_key, log).await
            }
            Action::UpdateNetwork { interface, dhcp } => {
                self.handle_update_network(&interface, dhcp, log).await
            }
        }
    }

    // === shared helpers ===

    pub(crate) fn manager(&self) -> &Arc<PupManager<C>> {
        &self.deps.manager
    }

    /// Mark the pup broken with `reason` and pass the original error
    /// through. Used by every handler that cannot recover locally.
    pub(crate) fn mark_broken(
        &self,
        id: &PupId,
        reason: BrokenReason,
        err: UpdaterError,
    ) -> UpdaterError {
        tracing::warn!(pup = %id, reason = %reason, error = %err, "marking pup broken");
        if let Err(e) = self.deps.manager.update_pup(id, vec![dbx_manager::set_broken(reason)]) {
            tracing::warn!(pup = %id, error = %e, "failed to persist broken state");
        }
        err
    }

    /// Pup IDs whose declarative fragments belong in the includes file:
    /// everything with a live fragment, plus `extra`, minus `exclude`.
    pub(crate) fn include_ids(
        &self,
        extra: Option<PupId>,
        exclude: Option<PupId>,
    ) -> Vec<PupId> {
        let mut ids: Vec<PupId> = self
            .deps
            .manager
            .get_state_map()
            .into_values()
            .filter(|s| {
                matches!(
                    s.installation,
                    InstallationState::Ready
                        | InstallationState::Unready
                        | InstallationState::Upgrading
                )
            })
            .map(|s| s.id)
            .collect();
        if let Some(extra) = extra {
            if !ids.contains(&extra) {
                ids.push(extra);
            }
        }
        if let Some(exclude) = exclude {
            ids.retain(|id| *id != exclude);
        }
        ids
    }

    /// Render and write `.dbx/config.env` into the pup's storage directory
    /// through the host driver (the file is owned by the container user).
    pub(crate) async fn write_config_env(&self, state: &PupState) -> Result<(), UpdaterError> {
        let path = self.deps.manager.storage_dir(&state.id).join(".dbx").join("config.env");
        let rendered = dbx_core::render_config_env(&state.config);
        self.deps.driver.write_config_env(&path, &rendered).await?;
        Ok(())
    }

    /// Best-effort stop: disable + rebuild; the pup may not be running.
    pub(crate) async fn stop_pup_best_effort(&self, id: &PupId, log: &JobLogger) {
        if let Err(e) = self.deps.manager.stop_pup(id, self.deps.rebuild.as_ref()).await {
            log.log(&format!("stop tolerated failure: {e}"));
            tracing::warn!(pup = %id, error = %e, "tolerated stop failure");
        }
    }

    /// Poll the container service until it reports active and running, for
    /// up to the configured timeout. A timeout is logged with captured
    /// status output but is not fatal; the runtime converges asynchronously.
    pub(crate) async fn wait_for_running(&self, id: &PupId, log: &JobLogger) {
        let service = dbx_core::pup_service_name(id);
        let deadline = tokio::time::Instant::now() + self.deps.readiness_timeout;
        loop {
            match self.deps.driver.service_status(&service).await {
                Ok(status) if status.running && status.active_state == "active" => {
                    log.log(&format!("{service} is running"));
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(service = %service, error = %e, "status poll failed");
                }
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.deps.readiness_interval).await;
        }

        log.err(&format!(
            "{service} did not report running within {:?}; continuing",
            self.deps.readiness_timeout
        ));
        if let Ok(text) = self.deps.driver.service_status_text(&service).await {
            log.log(&text);
        }
        tracing::warn!(service = %service, "container did not come up in time");
    }

    pub(crate) fn publish(&self, event: ChangeEvent) {
        if self.events.try_send(event).is_err() {
            tracing::debug!("change bus full or closed; event dropped");
        }
    }
}

#[cfg(test)]
#[path = "updater_tests.rs"]
mod tests;
