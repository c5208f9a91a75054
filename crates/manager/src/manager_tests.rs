// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dbx_core::test_support::{manifest_fixture, source_fixture, FakeMonitor};
use dbx_core::{FakeClock, ProcStatus, PupStatus};
use dbx_patch::FakeRebuildDriver;
use std::fs;

struct Fixture {
    _tmp: tempfile::TempDir,
    manager: Arc<PupManager<FakeClock>>,
    paths: ManagerPaths,
    clock: FakeClock,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let paths = ManagerPaths {
        data_dir: tmp.path().join("data"),
        nix_dir: tmp.path().join("nix"),
        tmp_dir: tmp.path().join("tmp"),
    };
    let clock = FakeClock::new();
    let manager = PupManager::load(paths.clone(), clock.clone()).unwrap();
    Fixture { _tmp: tmp, manager, paths, clock }
}

fn adopt(f: &Fixture, name: &str, version: &str) -> PupId {
    f.manager
        .adopt_pup(manifest_fixture(name, version), source_fixture("source-a"), AdoptOptions::default())
        .unwrap()
}

#[test]
fn adopt_assigns_sequential_ips_from_dot_two() {
    let f = fixture();
    let a = adopt(&f, "alpha", "1.0.0");
    let b = adopt(&f, "beta", "1.0.0");

    let sa = f.manager.get_pup(&a).unwrap();
    let sb = f.manager.get_pup(&b).unwrap();
    assert_eq!(sa.ip, Ipv4Addr::new(10, 69, 0, 2));
    assert_eq!(sb.ip, Ipv4Addr::new(10, 69, 0, 3));
    assert_eq!(sa.installation, InstallationState::Installing);
    assert!(!sa.enabled);
}

#[test]
fn adopt_rejects_duplicate_tuple() {
    let f = fixture();
    adopt(&f, "alpha", "1.0.0");
    let err = f
        .manager
        .adopt_pup(
            manifest_fixture("alpha", "1.0.0"),
            source_fixture("source-a"),
            AdoptOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, PupManagerError::PupAlreadyExists { .. }));

    // A different version of the same pup is fine.
    adopt(&f, "alpha", "1.1.0");
}

#[test]
fn adopt_seeds_config_from_defaults_and_options() {
    let f = fixture();
    let mut manifest = manifest_fixture("alpha", "1.0.0");
    manifest.config.fields.push(dbx_core::ManifestConfigField {
        name: "PORT".to_string(),
        label: String::new(),
        required: false,
        default: Some("8080".to_string()),
    });
    manifest.config.fields.push(dbx_core::ManifestConfigField {
        name: "PASS".to_string(),
        label: String::new(),
        required: true,
        default: None,
    });

    let mut options = AdoptOptions::default();
    options.config.insert("PORT".to_string(), "9090".to_string());

    let id = f.manager.adopt_pup(manifest, source_fixture("source-a"), options).unwrap();
    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.config.get("PORT").map(String::as_str), Some("9090"));
    assert!(state.needs_conf);
}

#[test]
fn update_pup_applies_in_order_and_persists() {
    let f = fixture();
    let id = adopt(&f, "alpha", "1.0.0");

    let state = f
        .manager
        .update_pup(
            &id,
            vec![
                set_installation(InstallationState::Ready),
                set_enabled(true),
                set_enabled(false),
            ],
        )
        .unwrap();
    assert_eq!(state.installation, InstallationState::Ready);
    assert!(!state.enabled);

    // Persisted: a reload sees the same state.
    let reloaded = PupManager::load(f.paths.clone(), f.clock.clone()).unwrap();
    let state = reloaded.get_pup(&id).unwrap();
    assert_eq!(state.installation, InstallationState::Ready);
}

#[test]
fn update_pup_unknown_is_not_found() {
    let f = fixture();
    let err = f
        .manager
        .update_pup(&PupId::from_string("ghost"), vec![set_enabled(true)])
        .unwrap_err();
    assert!(matches!(err, PupManagerError::PupNotFound(_)));
}

#[test]
fn set_broken_and_clear_on_recovery_transition() {
    let f = fixture();
    let id = adopt(&f, "alpha", "1.0.0");
    let state = f
        .manager
        .update_pup(&id, vec![set_broken(BrokenReason::NixHashMismatch)])
        .unwrap();
    assert_eq!(state.installation, InstallationState::Broken);
    assert_eq!(state.broken_reason, Some(BrokenReason::NixHashMismatch));

    let state = f
        .manager
        .update_pup(&id, vec![set_installation(InstallationState::Ready)])
        .unwrap();
    assert!(state.broken_reason.is_none());
}

#[test]
fn pupdate_events_are_fifo_and_typed() {
    let f = fixture();
    let mut updates = f.manager.get_update_channel();

    let id = adopt(&f, "alpha", "1.0.0");
    f.manager.update_pup(&id, vec![set_installation(InstallationState::Ready)]).unwrap();
    f.manager
        .update_pup(&id, vec![set_installation(InstallationState::Uninstalled)])
        .unwrap();
    f.manager.purge_pup(&id).unwrap();

    let first = updates.try_recv().unwrap();
    assert_eq!(first.event, PupdateKind::Adopted);
    assert_eq!(first.state.installation, InstallationState::Installing);

    let second = updates.try_recv().unwrap();
    assert_eq!(second.event, PupdateKind::ChangedInstallation);
    assert_eq!(second.state.installation, InstallationState::Ready);

    let third = updates.try_recv().unwrap();
    assert_eq!(third.state.installation, InstallationState::Uninstalled);

    let fourth = updates.try_recv().unwrap();
    assert_eq!(fourth.event, PupdateKind::Purged);
    assert!(updates.try_recv().is_err());
}

#[test]
fn closed_subscribers_are_dropped_silently() {
    let f = fixture();
    let updates = f.manager.get_update_channel();
    drop(updates);
    // Publishing after the subscriber went away must not fail.
    adopt(&f, "alpha", "1.0.0");
}

#[test]
fn purge_requires_uninstalled() {
    let f = fixture();
    let id = adopt(&f, "alpha", "1.0.0");
    let err = f.manager.purge_pup(&id).unwrap_err();
    assert!(matches!(err, PupManagerError::NotUninstalled(InstallationState::Installing)));

    f.manager
        .update_pup(&id, vec![set_installation(InstallationState::Uninstalled)])
        .unwrap();
    f.manager.purge_pup(&id).unwrap();
    assert!(f.manager.get_pup(&id).is_err());
    assert!(f.manager.get_stats_map().get(&id).is_none());

    // Record file is gone too.
    let reloaded = PupManager::load(f.paths.clone(), f.clock.clone()).unwrap();
    assert!(reloaded.get_pup(&id).is_err());
}

#[test]
fn reload_marks_transient_states_broken() {
    let f = fixture();
    let installing = adopt(&f, "alpha", "1.0.0");
    let ready = adopt(&f, "beta", "1.0.0");
    f.manager
        .update_pup(&ready, vec![set_installation(InstallationState::Ready)])
        .unwrap();

    let reloaded = PupManager::load(f.paths.clone(), f.clock.clone()).unwrap();
    let broken = reloaded.get_pup(&installing).unwrap();
    assert_eq!(broken.installation, InstallationState::Broken);
    assert_eq!(broken.broken_reason, Some(BrokenReason::DownloadFailed));

    let untouched = reloaded.get_pup(&ready).unwrap();
    assert_eq!(untouched.installation, InstallationState::Ready);
}

#[test]
fn reload_resumes_ip_allocation_monotonically() {
    let f = fixture();
    adopt(&f, "alpha", "1.0.0");
    let b = adopt(&f, "beta", "1.0.0");
    let high = f.manager.get_pup(&b).unwrap().ip;

    let reloaded = PupManager::load(f.paths.clone(), f.clock.clone()).unwrap();
    let c = reloaded
        .adopt_pup(
            manifest_fixture("gamma", "1.0.0"),
            source_fixture("source-a"),
            AdoptOptions::default(),
        )
        .unwrap();
    let ip = reloaded.get_pup(&c).unwrap().ip;
    assert!(u32::from(ip) > u32::from(high));
}

#[test]
fn source_queries() {
    let f = fixture();
    let a = adopt(&f, "alpha", "1.0.0");
    f.manager
        .adopt_pup(
            manifest_fixture("gamma", "1.0.0"),
            source_fixture("source-b"),
            AdoptOptions::default(),
        )
        .unwrap();

    let from_a = f.manager.get_all_from_source("source-a");
    assert_eq!(from_a.len(), 1);
    assert_eq!(from_a[0].id, a);

    assert!(f.manager.get_pup_from_source("alpha", "source-a").is_some());
    assert!(f.manager.get_pup_from_source("alpha", "source-b").is_none());

    let ip = f.manager.get_pup(&a).unwrap().ip;
    assert_eq!(f.manager.find_pup_by_ip(ip).unwrap().id, a);
    assert!(f.manager.find_pup_by_ip(Ipv4Addr::new(10, 69, 99, 99)).is_none());
}

#[test]
fn monitored_set_tracks_ready_pups() {
    let f = fixture();
    let monitor = Arc::new(FakeMonitor::new());
    f.manager.set_monitor(monitor.clone());
    assert!(monitor.last_monitored().is_empty());

    let id = adopt(&f, "alpha", "1.0.0");
    f.manager.update_pup(&id, vec![set_installation(InstallationState::Ready)]).unwrap();
    assert_eq!(monitor.last_monitored(), vec![pup_service_name(&id)]);

    f.manager
        .update_pup(&id, vec![set_installation(InstallationState::Uninstalling)])
        .unwrap();
    assert!(monitor.last_monitored().is_empty());
}

#[test]
fn steady_samples_update_buffers_and_status() {
    let f = fixture();
    let id = adopt(&f, "alpha", "1.0.0");
    f.manager
        .update_pup(&id, vec![set_installation(InstallationState::Ready), set_enabled(true)])
        .unwrap();

    let sample = ServiceSample {
        service: pup_service_name(&id),
        status: ProcStatus { running: true, active_state: "active".to_string() },
        cpu_percent: 12.5,
        mem_mb: 256.0,
        mem_percent: 25.0,
        disk_mb: 1024.0,
    };
    f.manager.ingest_samples(vec![sample], true);

    let stats = f.manager.get_stats_map().remove(&id).unwrap();
    assert_eq!(stats.status, PupStatus::Running);
    assert_eq!(stats.cpu_percent.latest(), Some(12.5));
    assert_eq!(stats.mem_mb.latest(), Some(256.0));
}

#[test]
fn fast_samples_update_status_only() {
    let f = fixture();
    let id = adopt(&f, "alpha", "1.0.0");
    f.manager
        .update_pup(&id, vec![set_installation(InstallationState::Ready), set_enabled(true)])
        .unwrap();

    let sample = ServiceSample {
        service: pup_service_name(&id),
        status: ProcStatus { running: false, active_state: "activating".to_string() },
        cpu_percent: 50.0,
        mem_mb: 10.0,
        mem_percent: 1.0,
        disk_mb: 0.0,
    };
    f.manager.ingest_samples(vec![sample], false);

    let stats = f.manager.get_stats_map().remove(&id).unwrap();
    assert_eq!(stats.status, PupStatus::Starting);
    assert!(stats.cpu_percent.is_empty());
}

#[test]
fn ingest_publishes_full_snapshot() {
    let f = fixture();
    let id = adopt(&f, "alpha", "1.0.0");
    adopt(&f, "beta", "1.0.0");
    let mut stats_rx = f.manager.get_stats_channel();

    f.manager.ingest_samples(
        vec![ServiceSample {
            service: pup_service_name(&id),
            status: ProcStatus { running: false, active_state: "inactive".to_string() },
            cpu_percent: 0.0,
            mem_mb: 0.0,
            mem_percent: 0.0,
            disk_mb: 0.0,
        }],
        true,
    );

    let snapshot = stats_rx.try_recv().unwrap();
    assert_eq!(snapshot.len(), 2);
}

#[test]
fn samples_for_unknown_services_are_ignored() {
    let f = fixture();
    adopt(&f, "alpha", "1.0.0");
    f.manager.ingest_samples(
        vec![ServiceSample {
            service: "sshd.service".to_string(),
            status: ProcStatus::default(),
            cpu_percent: 0.0,
            mem_mb: 0.0,
            mem_percent: 0.0,
            disk_mb: 0.0,
        }],
        true,
    );
}

#[test]
fn deps_not_running_issue_derivation() {
    let f = fixture();
    let provider = adopt(&f, "core", "1.0.0");
    let consumer = adopt(&f, "alpha", "1.0.0");
    f.manager
        .update_pup(
            &consumer,
            vec![
                set_installation(InstallationState::Ready),
                Box::new(|s| {
                    s.manifest.dependencies.push(dbx_core::ManifestDependency {
                        interface_name: "core-rpc".to_string(),
                        version: String::new(),
                        optional: false,
                    })
                }),
            ],
        )
        .unwrap();
    let mut providers = BTreeMap::new();
    providers.insert("core-rpc".to_string(), provider);
    f.manager.update_pup(&consumer, vec![set_providers(providers)]).unwrap();

    // Provider not running yet.
    f.manager.ingest_samples(vec![], true);
    let stats = f.manager.get_stats_map().remove(&consumer).unwrap();
    assert_eq!(stats.issues.deps_not_running, vec!["core-rpc".to_string()]);

    // Provider comes up.
    f.manager
        .update_pup(&provider, vec![set_installation(InstallationState::Ready), set_enabled(true)])
        .unwrap();
    f.manager.ingest_samples(
        vec![ServiceSample {
            service: pup_service_name(&provider),
            status: ProcStatus { running: true, active_state: "active".to_string() },
            cpu_percent: 0.0,
            mem_mb: 0.0,
            mem_percent: 0.0,
            disk_mb: 0.0,
        }],
        true,
    );
    let stats = f.manager.get_stats_map().remove(&consumer).unwrap();
    assert!(stats.issues.deps_not_running.is_empty());
}

#[tokio::test]
async fn start_and_stop_pup_flip_enabled_and_rebuild() {
    let f = fixture();
    let id = adopt(&f, "alpha", "1.0.0");
    f.manager.update_pup(&id, vec![set_installation(InstallationState::Ready)]).unwrap();
    let rebuild = FakeRebuildDriver::new();

    f.manager.start_pup(&id, &rebuild).await.unwrap();
    assert!(f.manager.get_pup(&id).unwrap().enabled);
    assert_eq!(rebuild.rebuild_count(), 1);
    let fragment = f.paths.nix_dir.join(format!("pup_{id}.nix"));
    assert!(fs::read_to_string(&fragment).unwrap().contains("autoStart = true;"));

    f.manager.stop_pup(&id, &rebuild).await.unwrap();
    assert!(!f.manager.get_pup(&id).unwrap().enabled);
    assert_eq!(rebuild.rebuild_count(), 2);
    assert!(fs::read_to_string(&fragment).unwrap().contains("autoStart = false;"));
}

#[test]
fn checker_delegation_requires_attachment() {
    let f = fixture();
    assert!(matches!(
        f.manager.clear_cache_entry(&PupId::from_string("p")),
        Err(PupManagerError::CheckerNotAttached)
    ));
    assert!(f.manager.get_cached_update_info(&PupId::from_string("p")).is_none());
}
