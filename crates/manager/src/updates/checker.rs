// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic update checker.
//!
//! Computes available newer versions per pup from the source listing
//! (refreshed listings are the authoritative version index), enriches them
//! with upstream release metadata when the source is a GitHub repo, and
//! keeps a persisted cache. Check failures are silent: the cached result is
//! retained and the next cycle retries.

use crate::fsutil::{atomic_write_json, read_json_opt};
use crate::manager::PupManager;
use crate::updates::github::{parse_github_repo, ReleaseError, ReleaseLookup};
use chrono::{DateTime, Utc};
use dbx_core::version::{is_newer, parse_lenient};
use dbx_core::{
    AvailableVersion, Clock, PupId, PupManifest, PupState, PupUpdateInfo,
    PupUpdatesCheckedEvent, SourceManager, SourceType,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 10;
const WARMUP: Duration = Duration::from_secs(30);
const CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    version: u32,
    updated_at: DateTime<Utc>,
    cache: HashMap<PupId, PupUpdateInfo>,
}

/// Severity of an interface version change between two manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionDelta {
    Major,
    Minor,
    Patch,
}

dbx_core::simple_display! {
    VersionDelta {
        Major => "major",
        Minor => "minor",
        Patch => "patch",
    }
}

/// One interface whose version changed across an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceChange {
    pub interface: String,
    pub old_version: String,
    pub new_version: String,
    pub delta: VersionDelta,
    /// Installed pups that declared a dependency on this interface.
    pub dependent_pups: Vec<PupId>,
}

/// Per-run lookup memoization, shared across all pups of one check run to
/// minimize API usage.
#[derive(Default)]
struct RunMemo {
    not_found: HashSet<String>,
    rate_limited: bool,
}

pub struct UpdateChecker<C: Clock> {
    manager: Weak<PupManager<C>>,
    source: Arc<dyn SourceManager>,
    releases: Arc<dyn ReleaseLookup>,
    clock: C,
    cache: Mutex<HashMap<PupId, PupUpdateInfo>>,
    cache_path: PathBuf,
    events: Mutex<Vec<mpsc::Sender<PupUpdatesCheckedEvent>>>,
}

impl<C: Clock + 'static> UpdateChecker<C> {
    /// Load the persisted cache from `<data_dir>/pup-update-cache.json`.
    pub fn load(
        data_dir: &Path,
        manager: Weak<PupManager<C>>,
        source: Arc<dyn SourceManager>,
        releases: Arc<dyn ReleaseLookup>,
        clock: C,
    ) -> std::io::Result<Arc<Self>> {
        let cache_path = data_dir.join("pup-update-cache.json");
        let cache = read_json_opt::<CacheFile>(&cache_path)?.map(|f| f.cache).unwrap_or_default();
        Ok(Arc::new(Self {
            manager,
            source,
            releases,
            clock,
            cache: Mutex::new(cache),
            cache_path,
            events: Mutex::new(Vec::new()),
        }))
    }

    pub fn get_cached_update_info(&self, id: &PupId) -> Option<PupUpdateInfo> {
        self.cache.lock().get(id).cloned()
    }

    pub fn get_all_cached_updates(&self) -> HashMap<PupId, PupUpdateInfo> {
        self.cache.lock().clone()
    }

    /// Invalidate one pup's cached info, e.g. after a successful upgrade,
    /// so UIs stop showing a spurious "update available".
    pub fn clear_cache_entry(&self, id: &PupId) -> std::io::Result<()> {
        let snapshot = {
            let mut cache = self.cache.lock();
            if cache.remove(id).is_none() {
                return Ok(());
            }
            cache.clone()
        };
        self.persist(snapshot)
    }

    /// Subscribe to check-completion events. Sends are non-blocking; a full
    /// channel drops the event with a warning.
    pub fn get_event_channel(&self) -> mpsc::Receiver<PupUpdatesCheckedEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.events.lock().push(tx);
        rx
    }

    /// Check a single pup and update the cache.
    pub async fn check_for_updates(
        &self,
        id: &PupId,
    ) -> std::io::Result<Option<PupUpdateInfo>> {
        let Some(manager) = self.manager.upgrade() else { return Ok(None) };
        let Ok(state) = manager.get_pup(id) else { return Ok(None) };

        let mut memo = RunMemo::default();
        let Some(info) = self.check_pup(&state, &mut memo).await else { return Ok(None) };

        let update_available = info.update_available;
        let snapshot = {
            let mut cache = self.cache.lock();
            cache.insert(*id, info.clone());
            cache.clone()
        };
        self.persist(snapshot)?;
        self.emit(PupUpdatesCheckedEvent {
            pups_checked: 1,
            updates_available: usize::from(update_available),
            is_periodic_check: false,
        });
        Ok(Some(info))
    }

    /// Check every known pup, persist the cache once, and emit a single
    /// aggregate event.
    pub async fn check_all_pup_updates(
        &self,
        is_periodic: bool,
    ) -> std::io::Result<PupUpdatesCheckedEvent> {
        let Some(manager) = self.manager.upgrade() else {
            return Ok(PupUpdatesCheckedEvent {
                pups_checked: 0,
                updates_available: 0,
                is_periodic_check: is_periodic,
            });
        };

        let mut memo = RunMemo::default();
        let mut checked = 0;
        let mut available = 0;
        for state in manager.get_state_map().into_values() {
            let Some(info) = self.check_pup(&state, &mut memo).await else { continue };
            checked += 1;
            if info.update_available {
                available += 1;
            }
            self.cache.lock().insert(state.id, info);
        }

        let snapshot = self.cache.lock().clone();
        self.persist(snapshot)?;
        let event = PupUpdatesCheckedEvent {
            pups_checked: checked,
            updates_available: available,
            is_periodic_check: is_periodic,
        };
        self.emit(event);
        Ok(event)
    }

    /// After a 30-second warm-up, check all pups, then hourly until `stop`.
    pub fn start_periodic_check(
        self: &Arc<Self>,
        stop: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let checker = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = stop.cancelled() => return,
                _ = tokio::time::sleep(WARMUP) => {}
            }
            loop {
                match checker.check_all_pup_updates(true).await {
                    Ok(event) => tracing::info!(
                        checked = event.pups_checked,
                        available = event.updates_available,
                        "periodic update check finished"
                    ),
                    Err(e) => tracing::warn!(error = %e, "periodic update check failed"),
                }
                tokio::select! {
                    _ = stop.cancelled() => return,
                    _ = tokio::time::sleep(CHECK_INTERVAL) => {}
                }
            }
        })
    }

    /// Classify version deltas for interfaces present in both manifests and
    /// record which installed pups depend on them.
    pub fn detect_interface_changes(
        &self,
        old: &PupManifest,
        new: &PupManifest,
    ) -> Vec<InterfaceChange> {
        let dependents: HashMap<String, Vec<PupId>> = match self.manager.upgrade() {
            Some(manager) => {
                let mut map: HashMap<String, Vec<PupId>> = HashMap::new();
                for state in manager.get_state_map().into_values() {
                    for dep in &state.manifest.dependencies {
                        map.entry(dep.interface_name.clone()).or_default().push(state.id);
                    }
                }
                map
            }
            None => HashMap::new(),
        };

        let mut changes = Vec::new();
        for old_iface in &old.interfaces {
            let Some(new_iface) = new.interfaces.iter().find(|i| i.name == old_iface.name)
            else {
                continue;
            };
            let (Some(ov), Some(nv)) =
                (parse_lenient(&old_iface.version), parse_lenient(&new_iface.version))
            else {
                continue;
            };
            if ov == nv {
                continue;
            }
            let delta = if ov.major != nv.major {
                VersionDelta::Major
            } else if ov.minor != nv.minor {
                VersionDelta::Minor
            } else {
                VersionDelta::Patch
            };
            changes.push(InterfaceChange {
                interface: old_iface.name.clone(),
                old_version: old_iface.version.clone(),
                new_version: new_iface.version.clone(),
                delta,
                dependent_pups: dependents.get(&old_iface.name).cloned().unwrap_or_default(),
            });
        }
        changes
    }

    /// Compute fresh update info for one pup. Returns `None` for non-git
    /// sources and on listing failure (the cached result is retained).
    async fn check_pup(&self, state: &PupState, memo: &mut RunMemo) -> Option<PupUpdateInfo> {
        if state.source.source_type != SourceType::Git {
            return None;
        }

        let listing = match self.source.list(&state.source.id, true).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(pup = %state.id, source = %state.source.id, error = %e,
                    "source listing failed; keeping cached update info");
                return None;
            }
        };

        let name = &state.manifest.meta.name;
        let current = &state.version;
        let mut available: Vec<AvailableVersion> = listing
            .iter()
            .filter(|entry| &entry.name == name)
            .filter(|entry| parse_lenient(&entry.version).is_some())
            .filter(|entry| is_newer(&entry.version, current))
            .map(|entry| AvailableVersion {
                version: entry.version.clone(),
                release_notes: None,
                release_date: None,
                release_url: None,
            })
            .collect();

        // Carry previously-fetched release metadata forward so an
        // unchanged version never triggers a re-fetch.
        if let Some(cached) = self.cache.lock().get(&state.id) {
            for version in &mut available {
                if let Some(prior) =
                    cached.available_versions.iter().find(|v| v.version == version.version)
                {
                    version.release_notes = prior.release_notes.clone();
                    version.release_date = prior.release_date;
                    version.release_url = prior.release_url.clone();
                }
            }
        }

        if let Some((owner, repo)) = parse_github_repo(&state.source.location) {
            self.enrich(&owner, &repo, &mut available, memo).await;
        }

        let latest_version = available
            .iter()
            .map(|v| v.version.clone())
            .max_by(|a, b| dbx_core::version::compare_lenient(a, b));

        Some(PupUpdateInfo {
            pup_id: state.id,
            current_version: current.clone(),
            latest_version,
            update_available: !available.is_empty(),
            available_versions: available,
            last_checked: self.clock.now_utc(),
        })
    }

    /// Fill in missing release metadata. 404s are memoized per run; a rate
    /// limit stops further lookups for the rest of the run.
    async fn enrich(
        &self,
        owner: &str,
        repo: &str,
        available: &mut [AvailableVersion],
        memo: &mut RunMemo,
    ) {
        for version in available.iter_mut() {
            if memo.rate_limited {
                return;
            }
            if version.release_notes.is_some()
                || version.release_url.is_some()
                || version.release_date.is_some()
            {
                continue;
            }

            let mut candidates = vec![version.version.clone()];
            if !version.version.starts_with('v') {
                candidates.push(format!("v{}", version.version));
            }

            for tag in candidates {
                let key = format!("{owner}/{repo}@{tag}");
                if memo.not_found.contains(&key) {
                    continue;
                }
                match self.releases.release(owner, repo, &tag).await {
                    Ok(Some(info)) => {
                        version.release_notes = info.notes;
                        version.release_date = info.date;
                        version.release_url = info.url;
                        break;
                    }
                    Ok(None) => {
                        memo.not_found.insert(key);
                    }
                    Err(ReleaseError::RateLimited) => {
                        tracing::warn!(owner, repo, "release lookup rate limited; backing off for this run");
                        memo.rate_limited = true;
                        return;
                    }
                    Err(ReleaseError::Other(e)) => {
                        tracing::debug!(owner, repo, tag = %tag, error = %e, "release lookup failed");
                    }
                }
            }
        }
    }

    fn persist(&self, cache: HashMap<PupId, PupUpdateInfo>) -> std::io::Result<()> {
        atomic_write_json(
            &self.cache_path,
            &CacheFile { version: 1, updated_at: self.clock.now_utc(), cache },
        )
    }

    fn emit(&self, event: PupUpdatesCheckedEvent) {
        let mut subscribers = self.events.lock();
        subscribers.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("update event channel full; dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
#[path = "checker_tests.rs"]
mod tests;
