// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup wiring and shutdown.

use crate::adapters::{DkmClient, SystemdDriver};
use crate::bus::ChangeBus;
use crate::dispatcher::Dispatcher;
use crate::env::ServerConfig;
use crate::statestore::JsonStateStore;
use crate::tailer::LogTailer;
use dbx_core::{ChangeEvent, ProcessMonitor, ServiceSample, SourceManager, SystemClock};
use dbx_manager::{GithubReleaseClient, ManagerPaths, PupManager, PupManagerError};
use dbx_patch::CommandRebuildDriver;
use dbx_updater::{SystemUpdater, UpdaterDeps, JOB_QUEUE_CAPACITY};
use fs2::FileExt;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const MONITOR_CHANNEL_CAPACITY: usize = 16;
const BUS_INLET_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire {0}: daemon already running?")]
    LockFailed(PathBuf),

    #[error("state store error: {0}")]
    Store(#[from] dbx_core::StoreError),

    #[error(transparent)]
    Manager(#[from] PupManagerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Collaborators implemented out of tree.
pub struct ExternalDeps {
    /// The pup source registry (git/disk backed).
    pub source: Arc<dyn SourceManager>,
    /// The process monitor, when one is attached.
    pub monitor: Option<Arc<dyn ProcessMonitor>>,
}

/// A running daemon and everything it owns.
pub struct Daemon {
    pub config: ServerConfig,
    pub manager: Arc<PupManager<SystemClock>>,
    pub dispatcher: Arc<Dispatcher<SystemClock>>,
    pub bus: Arc<ChangeBus>,
    pub tailer: LogTailer,
    pub store: Arc<JsonStateStore>,
    stop: CancellationToken,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Feed for the external process monitor's steady stream.
    pub steady_tx: mpsc::Sender<Vec<ServiceSample>>,
    /// Feed for the external process monitor's fast-poll stream.
    pub fast_tx: mpsc::Sender<Vec<ServiceSample>>,
    handles: Vec<JoinHandle<()>>,
}

impl Daemon {
    pub async fn start(
        config: ServerConfig,
        external: ExternalDeps,
    ) -> Result<Self, LifecycleError> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.tmp_dir)?;
        std::fs::create_dir_all(&config.nix_dir)?;

        let lock_path = config.lock_path();
        let lock_file = File::create(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| LifecycleError::LockFailed(lock_path))?;

        let store = Arc::new(JsonStateStore::open(&config.data_dir)?);

        let clock = SystemClock;
        let manager = PupManager::load(
            ManagerPaths {
                data_dir: config.data_dir.clone(),
                nix_dir: config.nix_dir.clone(),
                tmp_dir: config.tmp_dir.clone(),
            },
            clock.clone(),
        )?;
        let checker = manager.attach_update_checker(
            Arc::clone(&external.source),
            Arc::new(GithubReleaseClient::new()),
        )?;

        let stop = CancellationToken::new();
        let mut handles = Vec::new();

        // Monitor streams feed the manager's ingestion loop.
        let (steady_tx, steady_rx) = mpsc::channel(MONITOR_CHANNEL_CAPACITY);
        let (fast_tx, fast_rx) = mpsc::channel(MONITOR_CHANNEL_CAPACITY);
        handles.push(tokio::spawn(Arc::clone(&manager).run_monitor_loop(
            steady_rx,
            fast_rx,
            stop.child_token(),
        )));
        if let Some(monitor) = external.monitor {
            manager.set_monitor(monitor);
        }

        // Change bus and its inlet.
        let bus = Arc::new(ChangeBus::new());
        let (events_tx, events_rx) = mpsc::channel(BUS_INLET_CAPACITY);
        handles.push(tokio::spawn(Arc::clone(&bus).run(events_rx, stop.child_token())));

        // Manager and checker events flow onto the bus.
        handles.push(spawn_forwarder(
            manager.get_update_channel(),
            Arc::clone(&bus),
            stop.child_token(),
            ChangeEvent::Pup,
        ));
        handles.push(spawn_forwarder(
            manager.get_stats_channel(),
            Arc::clone(&bus),
            stop.child_token(),
            ChangeEvent::Stats,
        ));
        handles.push(spawn_forwarder(
            checker.get_event_channel(),
            Arc::clone(&bus),
            stop.child_token(),
            ChangeEvent::UpdatesChecked,
        ));

        // The job engine.
        let rebuild =
            Arc::new(CommandRebuildDriver::new(config.rebuild_command.clone())
                .with_target_override(config.nix_dir.clone()));
        let store_dyn: Arc<dyn dbx_core::StateStore> = store.clone();
        let updater = SystemUpdater::new(
            UpdaterDeps {
                manager: Arc::clone(&manager),
                source: Arc::clone(&external.source),
                driver: Arc::new(SystemdDriver::new()),
                dkm: Arc::new(DkmClient::new(config.dkm_url.clone())),
                rebuild,
                store: store_dyn,
                clock: clock.clone(),
                dev_mode: config.dev_mode,
                readiness_timeout: Duration::from_secs(60),
                readiness_interval: Duration::from_secs(2),
            },
            events_tx.clone(),
        );
        let (jobs_tx, jobs_rx) = mpsc::channel(JOB_QUEUE_CAPACITY);
        let (done_tx, done_rx) = mpsc::channel(JOB_QUEUE_CAPACITY);
        handles.push(tokio::spawn(updater.run(jobs_rx, done_tx, stop.child_token())));

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&manager),
            Arc::clone(&external.source),
            clock,
            config.dev_mode,
            jobs_tx,
            Arc::clone(&bus),
        ));
        handles.push(tokio::spawn(
            Arc::clone(&dispatcher).run_done(done_rx, stop.child_token()),
        ));

        // Hourly update checks after a warm-up.
        handles.push(manager.start_periodic_check(stop.child_token())?);

        let tailer = LogTailer::new(config.container_log_dir.clone());
        tracing::info!(
            data_dir = %config.data_dir.display(),
            nix_dir = %config.nix_dir.display(),
            dev_mode = config.dev_mode,
            recovery = config.recovery,
            "dogeboxd started"
        );

        Ok(Self {
            config,
            manager,
            dispatcher,
            bus,
            tailer,
            store,
            stop,
            lock_file,
            steady_tx,
            fast_tx,
            handles,
        })
    }

    /// Cooperatively stop every managed task, then clean up the pid file.
    pub async fn shutdown(self) {
        tracing::info!("shutting down");
        self.stop.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "task ended abnormally");
            }
        }
        let lock_path = self.config.lock_path();
        if lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&lock_path) {
                tracing::warn!(error = %e, "failed to remove pid file");
            }
        }
        tracing::info!("shutdown complete");
    }
}

/// Forward one typed channel onto the bus until cancelled.
fn spawn_forwarder<T: Send + 'static>(
    mut rx: mpsc::Receiver<T>,
    bus: Arc<ChangeBus>,
    stop: CancellationToken,
    wrap: fn(T) -> ChangeEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => bus.publish(wrap(item)),
                    None => break,
                },
            }
        }
    })
}
