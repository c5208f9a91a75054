// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pup manager: single source of truth for the set of pups.
//!
//! All mutation happens through [`PupManager::update_pup`], which applies an
//! ordered sequence of update functions atomically under one lock,
//! re-derives the `needs_conf`/`needs_deps` flags, persists the record, and
//! fans a [`Pupdate`] out to subscribers.

use crate::error::PupManagerError;
use crate::ip::IpAllocator;
use crate::records;
use crate::snapshots::SnapshotManager;
use crate::updates::checker::{InterfaceChange, UpdateChecker};
use crate::updates::github::ReleaseLookup;
use crate::updates::skipped::SkippedUpdates;
use chrono::Duration as ChronoDuration;
use dbx_core::{
    derive_status, pup_id_from_service, pup_service_name, BrokenReason, Clock, InstallationState,
    ProcessMonitor, PupHook, PupId, PupManifest, PupSource, PupState, PupStats, PupUpdateInfo,
    PupUpdatesCheckedEvent, PupVersionSnapshot, Pupdate, PupdateKind, ServiceSample,
    SourceManager, SystemClock,
};
use dbx_patch::{Patch, RebuildDriver};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of each subscriber channel.
const SUBSCRIBER_CAPACITY: usize = 50;

/// Directory roots the manager works against.
#[derive(Debug, Clone)]
pub struct ManagerPaths {
    pub data_dir: PathBuf,
    pub nix_dir: PathBuf,
    pub tmp_dir: PathBuf,
}

/// One step of an atomic state mutation.
pub type PupUpdate = Box<dyn FnOnce(&mut PupState) + Send>;

/// Set the installation state, clearing any stale broken reason.
pub fn set_installation(installation: InstallationState) -> PupUpdate {
    Box::new(move |state| {
        state.installation = installation;
        if installation != InstallationState::Broken {
            state.broken_reason = None;
        }
    })
}

/// Mark the pup broken with a typed reason.
pub fn set_broken(reason: BrokenReason) -> PupUpdate {
    Box::new(move |state| {
        state.installation = InstallationState::Broken;
        state.broken_reason = Some(reason);
    })
}

pub fn set_enabled(enabled: bool) -> PupUpdate {
    Box::new(move |state| state.enabled = enabled)
}

/// Replace the user config and mark it saved.
pub fn set_config(config: BTreeMap<String, String>) -> PupUpdate {
    Box::new(move |state| {
        state.config = config;
        state.config_saved = true;
    })
}

/// Version and manifest move together through the upgrade flow.
pub fn set_version_and_manifest(version: String, manifest: PupManifest) -> PupUpdate {
    Box::new(move |state| {
        state.web_uis = PupState::web_uis_from_manifest(&manifest);
        state.version = version;
        state.manifest = manifest;
    })
}

pub fn set_providers(providers: BTreeMap<String, PupId>) -> PupUpdate {
    Box::new(move |state| state.providers = providers)
}

pub fn set_hooks(hooks: Vec<PupHook>) -> PupUpdate {
    Box::new(move |state| state.hooks = hooks)
}

pub fn set_dev_mode(enabled: bool, services: Vec<String>) -> PupUpdate {
    Box::new(move |state| {
        state.is_dev_mode_enabled = enabled;
        state.dev_mode_services = services;
    })
}

/// Options for adopting a new pup.
#[derive(Debug, Clone, Default)]
pub struct AdoptOptions {
    /// User-supplied config values merged over manifest defaults.
    pub config: BTreeMap<String, String>,
    pub dev_mode: bool,
    pub dev_mode_services: Vec<String>,
}

struct Inner {
    states: BTreeMap<PupId, PupState>,
    stats: BTreeMap<PupId, PupStats>,
    allocator: IpAllocator,
}

pub struct PupManager<C: Clock = SystemClock> {
    paths: ManagerPaths,
    clock: C,
    inner: Mutex<Inner>,
    pupdate_subs: Mutex<Vec<mpsc::Sender<Pupdate>>>,
    stats_subs: Mutex<Vec<mpsc::Sender<Vec<PupStats>>>>,
    snapshots: SnapshotManager<C>,
    skipped: SkippedUpdates<C>,
    monitor: Mutex<Option<Arc<dyn ProcessMonitor>>>,
    checker: OnceLock<Arc<UpdateChecker<C>>>,
}

impl<C: Clock + 'static> PupManager<C> {
    /// Load all pup records from disk.
    ///
    /// Records stuck in a transient installation state were interrupted
    /// mid-transition by a crash; they are rewritten to broken with
    /// `download_failed` (the most common cause) before anything else sees
    /// them. The IP allocator resumes from the highest assigned address.
    pub fn load(paths: ManagerPaths, clock: C) -> Result<Arc<Self>, PupManagerError> {
        let mut records = records::load_records(&paths.data_dir)?;

        for state in &mut records {
            if state.installation.is_transient() {
                tracing::warn!(
                    pup = %state.id,
                    was = %state.installation,
                    "pup was mid-transition at shutdown; marking broken"
                );
                state.installation = InstallationState::Broken;
                state.broken_reason = Some(BrokenReason::DownloadFailed);
                records::save_record(&paths.data_dir, state)?;
            }
        }

        let allocator = IpAllocator::from_assigned(records.iter().map(|s| s.ip));
        let stats = records.iter().map(|s| (s.id, PupStats::new(s.id))).collect();
        let states: BTreeMap<PupId, PupState> =
            records.into_iter().map(|s| (s.id, s)).collect();
        tracing::info!(pups = states.len(), last_ip = %allocator.last(), "loaded pup registry");

        let snapshots = SnapshotManager::new(&paths.data_dir, clock.clone());
        let skipped = SkippedUpdates::load(&paths.data_dir, clock.clone())?;
        Ok(Arc::new(Self {
            paths,
            clock,
            inner: Mutex::new(Inner { states, stats, allocator }),
            pupdate_subs: Mutex::new(Vec::new()),
            stats_subs: Mutex::new(Vec::new()),
            snapshots,
            skipped,
            monitor: Mutex::new(None),
            checker: OnceLock::new(),
        }))
    }

    /// Re-read every record from disk, replacing the in-memory registry.
    ///
    /// Used after a restore re-materialises the persistence footprint. The
    /// same transient-state recovery as [`PupManager::load`] applies, and
    /// the IP allocator is reconstructed from the loaded assignments.
    pub fn reload_from_disk(&self) -> Result<usize, PupManagerError> {
        let mut records = records::load_records(&self.paths.data_dir)?;
        for state in &mut records {
            if state.installation.is_transient() {
                state.installation = InstallationState::Broken;
                state.broken_reason = Some(BrokenReason::DownloadFailed);
                records::save_record(&self.paths.data_dir, state)?;
            }
        }

        let count = records.len();
        {
            let mut inner = self.inner.lock();
            inner.allocator = IpAllocator::from_assigned(records.iter().map(|s| s.ip));
            inner.stats = records.iter().map(|s| (s.id, PupStats::new(s.id))).collect();
            inner.states = records.into_iter().map(|s| (s.id, s)).collect();
        }
        tracing::info!(pups = count, "reloaded pup registry from disk");
        self.update_monitored_pups();
        Ok(count)
    }

    /// Wire the embedded update checker. Call once at startup.
    pub fn attach_update_checker(
        self: &Arc<Self>,
        source: Arc<dyn SourceManager>,
        releases: Arc<dyn ReleaseLookup>,
    ) -> Result<Arc<UpdateChecker<C>>, PupManagerError> {
        let checker = UpdateChecker::load(
            &self.paths.data_dir,
            Arc::downgrade(self),
            source,
            releases,
            self.clock.clone(),
        )?;
        let _ = self.checker.set(Arc::clone(&checker));
        Ok(checker)
    }

    /// Wire the process monitor and report the current monitored set.
    pub fn set_monitor(&self, monitor: Arc<dyn ProcessMonitor>) {
        *self.monitor.lock() = Some(monitor);
        self.update_monitored_pups();
    }

    // === paths ===

    pub fn data_dir(&self) -> &Path {
        &self.paths.data_dir
    }

    pub fn nix_dir(&self) -> &Path {
        &self.paths.nix_dir
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.paths.tmp_dir
    }

    /// Source checkout directory for a pup.
    pub fn source_dir(&self, id: &PupId) -> PathBuf {
        records::source_dir(&self.paths.data_dir, id)
    }

    /// Private storage directory for a pup.
    pub fn storage_dir(&self, id: &PupId) -> PathBuf {
        records::storage_dir(&self.paths.data_dir, id)
    }

    /// A fresh patch against the configured nix directory.
    pub fn new_patch(&self) -> Patch {
        Patch::new(
            self.paths.nix_dir.clone(),
            self.paths.tmp_dir.clone(),
            self.paths.data_dir.clone(),
        )
    }

    // === mutation ===

    /// Adopt a new pup: allocate an ID and IP, seed config from manifest
    /// defaults, persist, and announce. Fails when an identical
    /// `(source, name, version)` tuple is already present.
    pub fn adopt_pup(
        &self,
        manifest: PupManifest,
        source: PupSource,
        options: AdoptOptions,
    ) -> Result<PupId, PupManagerError> {
        let pupdate = {
            let mut inner = self.inner.lock();

            let name = &manifest.meta.name;
            let version = &manifest.meta.version;
            if inner.states.values().any(|s| {
                s.source.id == source.id
                    && s.manifest.meta.name == *name
                    && s.version == *version
            }) {
                return Err(PupManagerError::PupAlreadyExists {
                    source_id: source.id,
                    name: name.clone(),
                    version: version.clone(),
                });
            }

            let used: HashSet<Ipv4Addr> = inner.states.values().map(|s| s.ip).collect();
            let ip = inner.allocator.next(&used).ok_or(PupManagerError::SubnetExhausted)?;

            let mut config = manifest.default_config();
            config.extend(options.config);

            let id = PupId::new();
            let mut state = PupState {
                id,
                version: manifest.meta.version.clone(),
                web_uis: PupState::web_uis_from_manifest(&manifest),
                source,
                manifest,
                config,
                config_saved: false,
                providers: BTreeMap::new(),
                hooks: Vec::new(),
                installation: InstallationState::Installing,
                broken_reason: None,
                enabled: false,
                needs_conf: false,
                needs_deps: false,
                ip,
                is_dev_mode_enabled: options.dev_mode,
                dev_mode_services: options.dev_mode_services,
            };
            state.recompute_flags();

            records::save_record(&self.paths.data_dir, &state)?;
            inner.stats.insert(id, PupStats::new(id));
            inner.states.insert(id, state.clone());
            tracing::info!(pup = %id, name = %state.manifest.meta.name, ip = %ip, "adopted pup");
            Pupdate { id, event: PupdateKind::Adopted, state }
        };

        let id = pupdate.id;
        self.publish_pupdate(pupdate);
        Ok(id)
    }

    /// Apply `updates` in order under the state lock, re-derive flags,
    /// persist, and announce the change.
    pub fn update_pup(
        &self,
        id: &PupId,
        updates: Vec<PupUpdate>,
    ) -> Result<PupState, PupManagerError> {
        let state = {
            let mut inner = self.inner.lock();
            let state =
                inner.states.get_mut(id).ok_or(PupManagerError::PupNotFound(*id))?;
            for update in updates {
                update(state);
            }
            state.recompute_flags();
            records::save_record(&self.paths.data_dir, state)?;
            state.clone()
        };

        self.publish_pupdate(Pupdate {
            id: *id,
            event: PupdateKind::ChangedInstallation,
            state: state.clone(),
        });
        self.update_monitored_pups();
        Ok(state)
    }

    /// Remove a pup's record and in-memory entry. Only permitted once the
    /// pup is uninstalled (or already mid-purge).
    pub fn purge_pup(&self, id: &PupId) -> Result<PupState, PupManagerError> {
        let state = {
            let mut inner = self.inner.lock();
            let state = inner.states.get(id).ok_or(PupManagerError::PupNotFound(*id))?;
            if !matches!(
                state.installation,
                InstallationState::Uninstalled | InstallationState::Purging
            ) {
                return Err(PupManagerError::NotUninstalled(state.installation));
            }
            records::delete_record(&self.paths.data_dir, id)?;
            inner.stats.remove(id);
            let state = inner.states.remove(id).ok_or(PupManagerError::PupNotFound(*id))?;
            tracing::info!(pup = %id, "purged pup");
            state
        };

        self.publish_pupdate(Pupdate { id: *id, event: PupdateKind::Purged, state: state.clone() });
        self.update_monitored_pups();
        Ok(state)
    }

    // === reads (values, never shared pointers) ===

    pub fn get_pup(&self, id: &PupId) -> Result<PupState, PupManagerError> {
        self.inner
            .lock()
            .states
            .get(id)
            .cloned()
            .ok_or(PupManagerError::PupNotFound(*id))
    }

    pub fn find_pup_by_ip(&self, ip: Ipv4Addr) -> Option<PupState> {
        self.inner.lock().states.values().find(|s| s.ip == ip).cloned()
    }

    pub fn get_state_map(&self) -> BTreeMap<PupId, PupState> {
        self.inner.lock().states.clone()
    }

    pub fn get_stats_map(&self) -> BTreeMap<PupId, PupStats> {
        self.inner.lock().stats.clone()
    }

    pub fn get_all_from_source(&self, source_id: &str) -> Vec<PupState> {
        self.inner
            .lock()
            .states
            .values()
            .filter(|s| s.source.id == source_id)
            .cloned()
            .collect()
    }

    pub fn get_pup_from_source(&self, name: &str, source_id: &str) -> Option<PupState> {
        self.inner
            .lock()
            .states
            .values()
            .find(|s| s.source.id == source_id && s.manifest.meta.name == name)
            .cloned()
    }

    /// The highest assigned address, for diagnostics.
    pub fn last_ip(&self) -> Ipv4Addr {
        self.inner.lock().allocator.last()
    }

    // === snapshots ===

    pub fn create_snapshot(&self, state: &PupState) -> std::io::Result<PupVersionSnapshot> {
        self.snapshots.create_snapshot(state)
    }

    pub fn get_snapshot(&self, id: &PupId) -> std::io::Result<Option<PupVersionSnapshot>> {
        self.snapshots.get_snapshot(id)
    }

    pub fn has_snapshot(&self, id: &PupId) -> bool {
        self.snapshots.has_snapshot(id)
    }

    pub fn delete_snapshot(&self, id: &PupId) -> std::io::Result<()> {
        self.snapshots.delete_snapshot(id)
    }

    pub fn list_snapshots(&self) -> std::io::Result<Vec<(PupId, PupVersionSnapshot)>> {
        self.snapshots.list_snapshots()
    }

    pub fn clean_old_snapshots(&self, max_age: ChronoDuration) -> std::io::Result<usize> {
        self.snapshots.clean_old_snapshots(max_age)
    }

    // === skipped updates ===

    pub fn skip_update(&self, id: PupId, current: &str, latest: &str) -> std::io::Result<()> {
        self.skipped.skip_update(id, current, latest)
    }

    pub fn is_update_skipped(&self, id: &PupId, latest: &str) -> bool {
        self.skipped.is_skipped(id, latest)
    }

    pub fn clear_skipped_update(&self, id: &PupId) -> std::io::Result<()> {
        self.skipped.clear_skipped(id)
    }

    // === update-check delegation ===

    fn checker(&self) -> Result<&Arc<UpdateChecker<C>>, PupManagerError> {
        self.checker.get().ok_or(PupManagerError::CheckerNotAttached)
    }

    pub async fn check_for_updates(
        &self,
        id: &PupId,
    ) -> Result<Option<PupUpdateInfo>, PupManagerError> {
        Ok(self.checker()?.check_for_updates(id).await?)
    }

    pub async fn check_all_pup_updates(
        &self,
        is_periodic: bool,
    ) -> Result<PupUpdatesCheckedEvent, PupManagerError> {
        Ok(self.checker()?.check_all_pup_updates(is_periodic).await?)
    }

    pub fn get_cached_update_info(&self, id: &PupId) -> Option<PupUpdateInfo> {
        self.checker.get().and_then(|c| c.get_cached_update_info(id))
    }

    pub fn get_all_cached_updates(&self) -> HashMap<PupId, PupUpdateInfo> {
        self.checker.get().map(|c| c.get_all_cached_updates()).unwrap_or_default()
    }

    pub fn clear_cache_entry(&self, id: &PupId) -> Result<(), PupManagerError> {
        Ok(self.checker()?.clear_cache_entry(id)?)
    }

    pub fn start_periodic_check(
        &self,
        stop: CancellationToken,
    ) -> Result<tokio::task::JoinHandle<()>, PupManagerError> {
        Ok(self.checker()?.start_periodic_check(stop))
    }

    pub fn get_update_event_channel(
        &self,
    ) -> Result<mpsc::Receiver<PupUpdatesCheckedEvent>, PupManagerError> {
        Ok(self.checker()?.get_event_channel())
    }

    pub fn detect_interface_changes(
        &self,
        old: &PupManifest,
        new: &PupManifest,
    ) -> Result<Vec<InterfaceChange>, PupManagerError> {
        Ok(self.checker()?.detect_interface_changes(old, new))
    }

    // === container control helpers ===

    /// Flip the desired-running bit on and rebuild the pup's fragment.
    pub async fn start_pup(
        &self,
        id: &PupId,
        rebuild: &dyn RebuildDriver,
    ) -> Result<(), PupManagerError> {
        let state = self.update_pup(id, vec![set_enabled(true)])?;
        let mut patch = self.new_patch();
        patch.write_pup_file(&state)?;
        patch.apply(rebuild).await?;
        Ok(())
    }

    /// Flip the desired-running bit off and rebuild the pup's fragment.
    pub async fn stop_pup(
        &self,
        id: &PupId,
        rebuild: &dyn RebuildDriver,
    ) -> Result<(), PupManagerError> {
        let state = self.update_pup(id, vec![set_enabled(false)])?;
        let mut patch = self.new_patch();
        patch.write_pup_file(&state)?;
        patch.apply(rebuild).await?;
        Ok(())
    }

    // === subscriptions ===

    /// Buffered channel of per-pup change events.
    pub fn get_update_channel(&self) -> mpsc::Receiver<Pupdate> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.pupdate_subs.lock().push(tx);
        rx
    }

    /// Buffered channel of full stats snapshots.
    pub fn get_stats_channel(&self) -> mpsc::Receiver<Vec<PupStats>> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.stats_subs.lock().push(tx);
        rx
    }

    fn publish_pupdate(&self, pupdate: Pupdate) {
        let mut subscribers = self.pupdate_subs.lock();
        subscribers.retain(|tx| match tx.try_send(pupdate.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(pup = %pupdate.id, "pupdate subscriber full; dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn publish_stats(&self, stats: Vec<PupStats>) {
        let mut subscribers = self.stats_subs.lock();
        subscribers.retain(|tx| match tx.try_send(stats.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    // === monitoring ===

    /// Report to the monitor only pups that are ready.
    pub fn update_monitored_pups(&self) {
        let monitor = self.monitor.lock().clone();
        let Some(monitor) = monitor else { return };
        let services: Vec<String> = {
            let inner = self.inner.lock();
            inner
                .states
                .values()
                .filter(|s| s.is_monitorable())
                .map(|s| pup_service_name(&s.id))
                .collect()
        };
        monitor.set_monitored(services);
    }

    /// Consume the monitor's steady and fast stat streams until cancelled.
    ///
    /// Steady samples update the rolling metric buffers and the derived
    /// status; fast (burst) samples update only the status. Every batch is
    /// followed by a full stats snapshot to subscribers.
    pub async fn run_monitor_loop(
        self: Arc<Self>,
        mut steady: mpsc::Receiver<Vec<ServiceSample>>,
        mut fast: mpsc::Receiver<Vec<ServiceSample>>,
        stop: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                batch = steady.recv() => match batch {
                    Some(batch) => self.ingest_samples(batch, true),
                    None => break,
                },
                batch = fast.recv() => match batch {
                    Some(batch) => self.ingest_samples(batch, false),
                    None => break,
                },
            }
        }
        tracing::debug!("monitor ingestion loop stopped");
    }

    fn ingest_samples(&self, batch: Vec<ServiceSample>, update_buffers: bool) {
        // Cached update info is read before taking the state lock; the
        // checker takes its own locks and may read manager state.
        let cached = self.get_all_cached_updates();

        let snapshot = {
            let mut inner = self.inner.lock();
            for sample in batch {
                let Some(id) = pup_id_from_service(&sample.service) else { continue };
                let Some(enabled) = inner.states.get(&id).map(|s| s.enabled) else { continue };
                let Some(stats) = inner.stats.get_mut(&id) else { continue };

                stats.status = derive_status(&sample.status, enabled);
                if update_buffers {
                    stats.cpu_percent.push(sample.cpu_percent);
                    stats.mem_mb.push(sample.mem_mb);
                    stats.mem_percent.push(sample.mem_percent);
                    stats.disk_mb.push(sample.disk_mb);
                }
            }

            self.recompute_issues(&mut inner, &cached);
            inner.stats.values().cloned().collect::<Vec<_>>()
        };

        self.publish_stats(snapshot);
    }

    /// Derive per-pup issues from provider run state and the update cache.
    fn recompute_issues(&self, inner: &mut Inner, cached: &HashMap<PupId, PupUpdateInfo>) {
        let running: HashSet<PupId> = inner
            .stats
            .iter()
            .filter(|(_, s)| s.status == dbx_core::PupStatus::Running)
            .map(|(id, _)| *id)
            .collect();

        let mut issues: BTreeMap<PupId, dbx_core::PupIssues> = BTreeMap::new();
        for state in inner.states.values() {
            let mut deps_not_running = Vec::new();
            for dep in &state.manifest.dependencies {
                if dep.optional {
                    continue;
                }
                match state.providers.get(&dep.interface_name) {
                    Some(provider) if running.contains(provider) => {}
                    _ => deps_not_running.push(dep.interface_name.clone()),
                }
            }

            let upgrade_available = cached.get(&state.id).is_some_and(|info| {
                info.update_available
                    && info
                        .latest_version
                        .as_deref()
                        .is_some_and(|latest| !self.skipped.is_skipped(&state.id, latest))
            });

            issues.insert(
                state.id,
                dbx_core::PupIssues {
                    deps_not_running,
                    health_warnings: Vec::new(),
                    upgrade_available,
                },
            );
        }

        for (id, new_issues) in issues {
            if let Some(stats) = inner.stats.get_mut(&id) {
                stats.issues = new_issues;
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
