// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dbx_core::test_support::{
    manifest_fixture, source_fixture, FakeHostDriver, FakeKeyManager, FakePup,
    FakeSourceManager, FakeStateStore,
};
use dbx_core::{pup_service_name, BrokenReason, FakeClock, InstallationState, JobStatus};
use dbx_manager::{set_enabled, set_installation, AdoptOptions, ManagerPaths};
use dbx_patch::FakeRebuildDriver;
use std::fs;

struct Fixture {
    _tmp: tempfile::TempDir,
    manager: Arc<PupManager<FakeClock>>,
    source: Arc<FakeSourceManager>,
    driver: Arc<FakeHostDriver>,
    dkm: Arc<FakeKeyManager>,
    rebuild: Arc<FakeRebuildDriver>,
    store: Arc<FakeStateStore>,
    updater: Arc<SystemUpdater<FakeClock>>,
    nix_dir: PathBuf,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let paths = ManagerPaths {
        data_dir: tmp.path().join("data"),
        nix_dir: tmp.path().join("nix"),
        tmp_dir: tmp.path().join("tmp"),
    };
    let nix_dir = paths.nix_dir.clone();
    let clock = FakeClock::new();
    let manager = PupManager::load(paths, clock.clone()).unwrap();
    let source = Arc::new(FakeSourceManager::new());
    let driver = Arc::new(FakeHostDriver::new());
    let dkm = Arc::new(FakeKeyManager::new());
    let rebuild = Arc::new(FakeRebuildDriver::new());
    let store = Arc::new(FakeStateStore::new());

    let (events, mut events_rx) = tokio::sync::mpsc::channel(1024);
    // Keep the bus drained so nothing ever blocks on it.
    tokio::spawn(async move { while events_rx.recv().await.is_some() {} });

    let updater = SystemUpdater::new(
        UpdaterDeps {
            manager: Arc::clone(&manager),
            source: source.clone(),
            driver: driver.clone(),
            dkm: dkm.clone(),
            rebuild: rebuild.clone(),
            store: store.clone(),
            clock,
            dev_mode: false,
            readiness_timeout: std::time::Duration::from_millis(40),
            readiness_interval: std::time::Duration::from_millis(10),
        },
        events,
    );

    Fixture { _tmp: tmp, manager, source, driver, dkm, rebuild, store, updater, nix_dir }
}

fn serve(f: &Fixture, name: &str, version: &str) {
    f.source.add_pup("source-a", FakePup::new(manifest_fixture(name, version)));
}

fn adopt(f: &Fixture, name: &str, version: &str) -> dbx_core::PupId {
    f.manager
        .adopt_pup(manifest_fixture(name, version), source_fixture("source-a"), AdoptOptions::default())
        .unwrap()
}

fn install_job(f: &Fixture, id: dbx_core::PupId, name: &str, version: &str) -> Job {
    let mut job = Job::new(
        Action::InstallPup {
            pup_name: name.to_string(),
            pup_version: version.to_string(),
            source_id: "source-a".to_string(),
            session_token: "token".to_string(),
        },
        chrono::Utc::now(),
    );
    job.pup_id = Some(id);
    job
}

async fn install(f: &Fixture, name: &str, version: &str) -> dbx_core::PupId {
    serve(f, name, version);
    let id = adopt(f, name, version);
    let done = f.updater.run_job(install_job(f, id, name, version)).await;
    assert_eq!(done.status, JobStatus::Completed, "install failed: {:?}", done.error);
    id
}

#[tokio::test]
async fn install_happy_path() {
    let f = fixture();
    let id = install(&f, "alpha", "1.0.0").await;

    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.installation, InstallationState::Ready);
    assert!(state.enabled);

    // Declarative fragment and includes were written, one rebuild ran.
    assert!(f.nix_dir.join(format!("pup_{id}.nix")).is_file());
    let includes = fs::read_to_string(f.nix_dir.join("pups.nix")).unwrap();
    assert!(includes.contains(&format!("pup_{id}.nix")));
    assert_eq!(f.rebuild.rebuild_count(), 1);

    // Keys and config landed in storage.
    let storage = f.manager.storage_dir(&id);
    assert!(storage.join("delegated.key").is_file());
    assert!(storage.join("delegated.extended.key").is_file());
    assert!(storage.join(".dbx/config.env").is_file());
    assert_eq!(f.dkm.issued.lock().as_slice(), &[id]);
}

#[tokio::test]
async fn install_hash_mismatch_marks_broken_without_patch() {
    let f = fixture();
    let mut pup = FakePup::new(manifest_fixture("alpha", "1.0.0"));
    pup.nix_content = "tampered".to_string();
    f.source.add_pup("source-a", pup);
    let id = adopt(&f, "alpha", "1.0.0");

    let done = f.updater.run_job(install_job(&f, id, "alpha", "1.0.0")).await;
    assert_eq!(done.status, JobStatus::Failed);

    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.installation, InstallationState::Broken);
    assert_eq!(state.broken_reason, Some(BrokenReason::NixHashMismatch));
    assert_eq!(f.rebuild.rebuild_count(), 0);
    assert!(!f.nix_dir.join(format!("pup_{id}.nix")).exists());
}

#[tokio::test]
async fn install_download_failure_marks_broken() {
    let f = fixture();
    serve(&f, "alpha", "1.0.0");
    let id = adopt(&f, "alpha", "1.0.0");
    f.source.set_fail_downloads(true);

    let done = f.updater.run_job(install_job(&f, id, "alpha", "1.0.0")).await;
    assert_eq!(done.status, JobStatus::Failed);
    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.broken_reason, Some(BrokenReason::DownloadFailed));
}

#[tokio::test]
async fn install_key_failure_marks_broken() {
    let f = fixture();
    serve(&f, "alpha", "1.0.0");
    let id = adopt(&f, "alpha", "1.0.0");
    f.dkm.set_fail(true);

    let done = f.updater.run_job(install_job(&f, id, "alpha", "1.0.0")).await;
    assert_eq!(done.status, JobStatus::Failed);
    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.broken_reason, Some(BrokenReason::DelegateKeyCreationFailed));
}

#[tokio::test]
async fn install_rebuild_failure_marks_nix_apply_failed() {
    let f = fixture();
    serve(&f, "alpha", "1.0.0");
    let id = adopt(&f, "alpha", "1.0.0");
    f.rebuild.fail_next(1);

    let done = f.updater.run_job(install_job(&f, id, "alpha", "1.0.0")).await;
    assert_eq!(done.status, JobStatus::Failed);
    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.broken_reason, Some(BrokenReason::NixApplyFailed));
    // Patch rolled the nix dir back; no fragment left behind.
    assert!(!f.nix_dir.join(format!("pup_{id}.nix")).exists());
}

#[tokio::test]
async fn upgrade_happy_path_keeps_snapshot() {
    let f = fixture();
    let id = install(&f, "alpha", "1.0.0").await;
    serve(&f, "alpha", "1.1.0");
    f.driver.set_status(&pup_service_name(&id), true, "active");

    let done = f
        .updater
        .run_job(Job::new(
            Action::UpgradePup {
                pup_id: id,
                target_version: "1.1.0".to_string(),
                source_id: "source-a".to_string(),
            },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed, "upgrade failed: {:?}", done.error);

    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.installation, InstallationState::Ready);
    assert_eq!(state.version, "1.1.0");
    assert_eq!(state.manifest.meta.version, "1.1.0");
    assert!(state.enabled);
    assert!(f.manager.has_snapshot(&id));
    assert_eq!(f.driver.removed_container_state.lock().as_slice(), &[id]);
}

#[tokio::test]
async fn upgrade_of_stopped_pup_skips_container_reset() {
    let f = fixture();
    let id = install(&f, "alpha", "1.0.0").await;
    f.manager.update_pup(&id, vec![set_enabled(false)]).unwrap();
    serve(&f, "alpha", "1.1.0");
    let rebuilds_before = f.rebuild.rebuild_count();

    let done = f
        .updater
        .run_job(Job::new(
            Action::UpgradePup {
                pup_id: id,
                target_version: "1.1.0".to_string(),
                source_id: "source-a".to_string(),
            },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed);

    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.version, "1.1.0");
    assert!(!state.enabled);
    assert!(f.driver.removed_container_state.lock().is_empty());
    // Only the single fragment-rewrite rebuild.
    assert_eq!(f.rebuild.rebuild_count(), rebuilds_before + 1);
}

#[tokio::test]
async fn failed_upgrade_then_rollback_restores_previous_version() {
    let f = fixture();
    let id = install(&f, "alpha", "1.0.0").await;
    serve(&f, "alpha", "1.1.0");

    // Rebuilds so far: 1 (install). Upgrade of an enabled pup runs:
    // stop (2), fragment rewrite (3), fragment removal (4). Fail the
    // post-stop fragment removal.
    f.rebuild.fail_on(4);

    let done = f
        .updater
        .run_job(Job::new(
            Action::UpgradePup {
                pup_id: id,
                target_version: "1.1.0".to_string(),
                source_id: "source-a".to_string(),
            },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Failed);

    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.installation, InstallationState::Broken);
    assert_eq!(state.broken_reason, Some(BrokenReason::NixApplyFailed));
    assert!(f.manager.has_snapshot(&id));

    let done = f
        .updater
        .run_job(Job::new(Action::RollbackPupUpgrade { pup_id: id }, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed, "rollback failed: {:?}", done.error);

    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.version, "1.0.0");
    assert_eq!(state.installation, InstallationState::Ready);
    assert!(state.enabled);
    assert!(!f.manager.has_snapshot(&id));
    assert_eq!(f.driver.start_count(&pup_service_name(&id)), 1);
}

#[tokio::test]
async fn rollback_without_snapshot_fails_cleanly() {
    let f = fixture();
    let id = install(&f, "alpha", "1.0.0").await;

    let done = f
        .updater
        .run_job(Job::new(Action::RollbackPupUpgrade { pup_id: id }, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Failed);
    // The pup is untouched.
    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.installation, InstallationState::Ready);
}

#[tokio::test]
async fn uninstall_then_purge_removes_everything() {
    let f = fixture();
    let id = install(&f, "alpha", "1.0.0").await;

    let done = f
        .updater
        .run_job(Job::new(Action::UninstallPup { pup_id: id }, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.installation, InstallationState::Uninstalled);
    assert!(!state.enabled);
    assert!(!f.nix_dir.join(format!("pup_{id}.nix")).exists());

    let done = f
        .updater
        .run_job(Job::new(Action::PurgePup { pup_id: id }, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(f.manager.get_pup(&id).is_err());
    assert!(!f.manager.source_dir(&id).exists());
    assert!(!f.manager.storage_dir(&id).exists());
}

#[tokio::test]
async fn purge_rejects_installed_pup() {
    let f = fixture();
    let id = install(&f, "alpha", "1.0.0").await;
    let done = f
        .updater
        .run_job(Job::new(Action::PurgePup { pup_id: id }, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(f.manager.get_pup(&id).is_ok());
}

#[tokio::test]
async fn enable_disable_are_idempotent() {
    let f = fixture();
    let id = install(&f, "alpha", "1.0.0").await;
    let service = pup_service_name(&id);

    // Already enabled; enabling again succeeds.
    let done = f
        .updater
        .run_job(Job::new(Action::EnablePup { pup_id: id }, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(f.manager.get_pup(&id).unwrap().enabled);

    let done = f
        .updater
        .run_job(Job::new(Action::DisablePup { pup_id: id }, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(!f.manager.get_pup(&id).unwrap().enabled);
    assert_eq!(f.driver.stopped.lock().iter().filter(|s| *s == &service).count(), 1);

    // Disabling a stopped pup still succeeds.
    let done = f
        .updater
        .run_job(Job::new(Action::DisablePup { pup_id: id }, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
}

#[tokio::test]
async fn update_config_rewrites_env_and_drops_undeclared_keys() {
    let f = fixture();
    serve(&f, "alpha", "1.0.0");
    let mut manifest = manifest_fixture("alpha", "1.0.0");
    manifest.config.fields.push(dbx_core::ManifestConfigField {
        name: "RPC_USER".to_string(),
        label: String::new(),
        required: true,
        default: None,
    });
    let id = f
        .manager
        .adopt_pup(manifest, source_fixture("source-a"), AdoptOptions::default())
        .unwrap();
    f.manager.update_pup(&id, vec![set_installation(InstallationState::Ready)]).unwrap();

    let mut payload = std::collections::BTreeMap::new();
    payload.insert("RPC_USER".to_string(), "doge".to_string());
    payload.insert("NOT_DECLARED".to_string(), "x".to_string());

    let done = f
        .updater
        .run_job(Job::new(
            Action::UpdatePupConfig { pup_id: id, payload },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed);

    let state = f.manager.get_pup(&id).unwrap();
    assert_eq!(state.config.get("RPC_USER").map(String::as_str), Some("doge"));
    assert!(!state.config.contains_key("NOT_DECLARED"));
    assert!(state.config_saved);
    assert!(!state.needs_conf);

    let env = fs::read_to_string(
        f.manager.storage_dir(&id).join(".dbx/config.env"),
    )
    .unwrap();
    assert_eq!(env, "RPC_USER=doge\n");
}

#[tokio::test]
async fn update_providers_validates_interfaces() {
    let f = fixture();
    let provider = install(&f, "core", "1.0.0").await;
    f.manager
        .update_pup(
            &provider,
            vec![Box::new(|s: &mut dbx_core::PupState| {
                s.manifest.interfaces.push(dbx_core::ManifestInterface {
                    name: "core-rpc".to_string(),
                    version: "1.0.0".to_string(),
                })
            })],
        )
        .unwrap();

    let consumer = install(&f, "alpha", "1.0.0").await;
    f.manager
        .update_pup(
            &consumer,
            vec![Box::new(|s: &mut dbx_core::PupState| {
                s.manifest.dependencies.push(dbx_core::ManifestDependency {
                    interface_name: "core-rpc".to_string(),
                    version: String::new(),
                    optional: false,
                })
            })],
        )
        .unwrap();

    let mut providers = std::collections::BTreeMap::new();
    providers.insert("core-rpc".to_string(), provider);
    let done = f
        .updater
        .run_job(Job::new(
            Action::UpdatePupProviders { pup_id: consumer, providers: providers.clone() },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
    let state = f.manager.get_pup(&consumer).unwrap();
    assert_eq!(state.providers.get("core-rpc"), Some(&provider));
    assert!(!state.needs_deps);

    // An interface the pup doesn't depend on is rejected.
    let mut bogus = std::collections::BTreeMap::new();
    bogus.insert("nonexistent".to_string(), provider);
    let done = f
        .updater
        .run_job(Job::new(
            Action::UpdatePupProviders { pup_id: consumer, providers: bogus },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Failed);
}

#[tokio::test]
async fn import_blockchain_copies_into_storage() {
    let f = fixture();
    let id = install(&f, "alpha", "1.0.0").await;

    let import_src = f._tmp.path().join("chainstate");
    fs::create_dir_all(import_src.join("blocks")).unwrap();
    fs::write(import_src.join("blocks/blk00000.dat"), "blockdata").unwrap();

    let done = f
        .updater
        .run_job(Job::new(
            Action::ImportBlockchainData { pup_id: id, source_path: import_src },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed, "import failed: {:?}", done.error);
    let copied = f.manager.storage_dir(&id).join("blocks/blk00000.dat");
    assert_eq!(fs::read_to_string(copied).unwrap(), "blockdata");
    // The pup was running, so it was stopped and started again.
    assert!(f.manager.get_pup(&id).unwrap().enabled);
}

#[tokio::test]
async fn host_actions_update_store_and_rebuild() {
    let f = fixture();
    let done = f
        .updater
        .run_job(Job::new(Action::EnableSsh { enabled: true }, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(f.store.get().unwrap().ssh_enabled);
    assert!(fs::read_to_string(f.nix_dir.join("system.nix"))
        .unwrap()
        .contains("services.openssh.enable = true;"));

    let done = f
        .updater
        .run_job(Job::new(
            Action::AddBinaryCache {
                url: "https://cache.example.org".to_string(),
                key: "cache-key".to_string(),
            },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(f.store.get().unwrap().binary_caches.len(), 1);

    let done = f
        .updater
        .run_job(Job::new(Action::SystemUpdate {}, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
}

#[tokio::test]
async fn enable_tailscale_stores_key_and_renders_enable_bit() {
    let f = fixture();
    let done = f
        .updater
        .run_job(Job::new(
            Action::EnableTailscale { auth_key: "tskey-auth-abc".to_string() },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed, "{:?}", done.error);
    assert_eq!(f.store.get().unwrap().tailscale_auth, "tskey-auth-abc");
    let system = fs::read_to_string(f.nix_dir.join("system.nix")).unwrap();
    assert!(system.contains("services.tailscale.enable = true;"));
    // The key stays in the state store, never in the rendered config.
    assert!(!system.contains("tskey-auth-abc"));

    // An empty key disables again.
    let done = f
        .updater
        .run_job(Job::new(
            Action::EnableTailscale { auth_key: String::new() },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(f.store.get().unwrap().tailscale_auth.is_empty());
    let system = fs::read_to_string(f.nix_dir.join("system.nix")).unwrap();
    assert!(system.contains("services.tailscale.enable = false;"));
}

#[tokio::test]
async fn update_network_rewrites_uplink_and_nat_egress() {
    let f = fixture();
    let done = f
        .updater
        .run_job(Job::new(
            Action::UpdateNetwork { interface: "enp3s0".to_string(), dhcp: true },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed, "{:?}", done.error);

    let network = fs::read_to_string(f.nix_dir.join("network.nix")).unwrap();
    assert!(network.contains("networking.interfaces.enp3s0.useDHCP = true;"));
    let nat = fs::read_to_string(f.nix_dir.join("system-container-config.nix")).unwrap();
    assert!(nat.contains("networking.nat.externalInterface = \"enp3s0\";"));
    assert_eq!(f.rebuild.rebuild_count(), 1);
}

#[tokio::test]
async fn system_update_renders_storage_overlay_when_device_set() {
    let f = fixture();
    let mut config = f.store.get().unwrap();
    config.storage_device = "/dev/disk/by-label/dogebox".to_string();
    f.store.set_dogebox(&config).unwrap();

    let done = f
        .updater
        .run_job(Job::new(Action::SystemUpdate {}, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed, "{:?}", done.error);

    let overlay = fs::read_to_string(f.nix_dir.join("storage-overlay.nix")).unwrap();
    assert!(overlay.contains("\"/dev/disk/by-label/dogebox\""));

    // Without a device, the overlay is not part of a system update.
    let f = fixture();
    let done = f
        .updater
        .run_job(Job::new(Action::SystemUpdate {}, chrono::Utc::now()))
        .await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(!f.nix_dir.join("storage-overlay.nix").exists());
}

#[tokio::test]
async fn backup_and_restore_round_trip_with_rehydration() {
    let f = fixture();
    let alpha = install(&f, "alpha", "1.0.0").await;
    let beta = install(&f, "beta", "0.3.2").await;
    fs::write(f.manager.data_dir().join("dogebox.db"), "store-blob").unwrap();

    let alpha_record_hash =
        crate::hash::sha256_file(&f.manager.data_dir().join(format!("pups/pup_{alpha}.json")))
            .unwrap();

    let backup_job = Job::new(Action::BackupConfig { destination: None }, chrono::Utc::now());
    let backup_id = backup_job.id;
    let done = f.updater.run_job(backup_job).await;
    assert_eq!(done.status, JobStatus::Completed, "backup failed: {:?}", done.error);
    let archive = f
        .manager
        .tmp_dir()
        .join("backups")
        .join(format!("dogebox-backup-{backup_id}.tar.gz"));
    assert!(archive.is_file());

    // Wipe both managed directories.
    fs::remove_dir_all(f.manager.data_dir()).unwrap();
    fs::remove_dir_all(&f.nix_dir).unwrap();

    let done = f
        .updater
        .run_job(Job::new(
            Action::RestoreConfig { archive_path: archive },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Completed, "restore failed: {:?}", done.error);

    // State is back, byte-identical records included.
    let states = f.manager.get_state_map();
    assert!(states.contains_key(&alpha));
    assert!(states.contains_key(&beta));
    assert_eq!(
        crate::hash::sha256_file(&f.manager.data_dir().join(format!("pups/pup_{alpha}.json")))
            .unwrap(),
        alpha_record_hash
    );

    // Rehydration re-issued keys, rewrote config, and left pups ready.
    let state = f.manager.get_pup(&alpha).unwrap();
    assert_eq!(state.installation, InstallationState::Ready);
    assert!(f.manager.storage_dir(&alpha).join("delegated.key").is_file());
    assert!(f.manager.storage_dir(&alpha).join(".dbx/config.env").is_file());
    assert!(f.store.is_open());
}

#[tokio::test]
async fn worker_drains_queue_in_order_until_cancelled() {
    let f = fixture();
    serve(&f, "alpha", "1.0.0");
    let id = adopt(&f, "alpha", "1.0.0");

    let (jobs_tx, jobs_rx) = tokio::sync::mpsc::channel(JOB_QUEUE_CAPACITY);
    let (done_tx, mut done_rx) = tokio::sync::mpsc::channel(JOB_QUEUE_CAPACITY);
    let stop = tokio_util::sync::CancellationToken::new();
    let worker = tokio::spawn(Arc::clone(&f.updater).run(jobs_rx, done_tx, stop.clone()));

    jobs_tx.send(install_job(&f, id, "alpha", "1.0.0")).await.unwrap();
    jobs_tx
        .send(Job::new(Action::DisablePup { pup_id: id }, chrono::Utc::now()))
        .await
        .unwrap();

    let first = done_rx.recv().await.unwrap();
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first.action.name(), "install_pup");
    let second = done_rx.recv().await.unwrap();
    assert_eq!(second.action.name(), "disable_pup");
    assert!(!f.manager.get_pup(&id).unwrap().enabled);

    stop.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn job_records_report_failure_reason() {
    let f = fixture();
    let done = f
        .updater
        .run_job(Job::new(
            Action::UninstallPup { pup_id: dbx_core::PupId::from_string("ghost") },
            chrono::Utc::now(),
        ))
        .await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.as_deref().unwrap_or_default().contains("not found"));
    assert!(done.completed_at.is_some());
}
