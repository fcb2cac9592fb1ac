// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{harness, nginx_manifest, wait_terminal};
use crate::{Engine, HostConfig, InstallRequest, UninstallRequest};
use appdock_catalog::MemoryCatalog;
use appdock_container::{ContainerManager as _, CreateOpts, FakeContainerManager};
use appdock_core::{FakeClock, JobType, NewJob};
use appdock_store::Store;

#[tokio::test(start_paused = true)]
async fn destroy_retry_exhaustion_fails_uninstall() {
    let h = harness();
    let job_id = h
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    wait_terminal(&h.engine, job_id.as_str()).await;
    let install = h.engine.install_for_app("nginx").unwrap().unwrap();

    // Every destroy attempt fails; the retry budget is five.
    h.manager.fail_times("destroy", "volume is locked", 5);

    let job_id = h
        .engine
        .uninstall(&install.id, UninstallRequest { keep_volumes: false })
        .await
        .unwrap();
    let job = wait_terminal(&h.engine, job_id.as_str()).await;

    assert_eq!(job.state, JobState::Failed);
    assert!(job.error.contains("failed to destroy container"));
    assert!(job.error.contains("volume is locked"));
    // The install row survives a failed uninstall.
    assert!(h.engine.install_record(&install.id).is_ok());

    let (logs, _) = h.engine.logs_since(job_id.as_str(), 0).unwrap();
    let warns = logs
        .iter()
        .filter(|l| l.level == LogLevel::Warn && l.message.contains("Destroy attempt"))
        .count();
    assert_eq!(warns, 5);
}

#[tokio::test(start_paused = true)]
async fn destroy_retry_recovers_after_transient_failures() {
    let h = harness();
    let job_id = h
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    let installed = wait_terminal(&h.engine, job_id.as_str()).await;
    let install = h.engine.install_for_app("nginx").unwrap().unwrap();

    h.manager.fail_times("destroy", "volume is locked", 4);
    let job_id = h
        .engine
        .uninstall(&install.id, UninstallRequest { keep_volumes: false })
        .await
        .unwrap();
    let job = wait_terminal(&h.engine, job_id.as_str()).await;
    assert_eq!(job.state, JobState::Completed);
    assert!(!h.manager.exists(installed.ctid));
}

fn recovery_fixture() -> (tempfile::TempDir, HostConfig, FakeContainerManager, FakeClock) {
    let dir = tempfile::tempdir().unwrap();
    let config = HostConfig {
        data_dir: dir.path().join("data"),
        config_dir: dir.path().join("config"),
        sdk_dir: dir.path().join("sdk"),
        host_root: dir.path().join("hostroot"),
        ..HostConfig::default()
    };
    std::fs::create_dir_all(&config.data_dir).unwrap();
    (dir, config, FakeContainerManager::new(), FakeClock::new())
}

#[tokio::test(start_paused = true)]
async fn startup_recovery_fails_orphans_and_destroys_their_containers() {
    let (_dir, config, manager, clock) = recovery_fixture();
    let cancel = tokio_util::sync::CancellationToken::new();

    // A previous process left a mid-provision job and its container.
    manager
        .create(
            &CreateOpts {
                ctid: 137,
                storage: "local-lvm".to_string(),
                bridge: "vmbr0".to_string(),
                ip: "dhcp".to_string(),
                ..CreateOpts::default()
            },
            &cancel,
        )
        .await
        .unwrap();
    {
        let (store, _) = Store::open(&config.db_path(), &clock).unwrap();
        let mut job = Job::new(
            NewJob {
                id: "deadbeefdeadbeef".to_string(),
                app_id: "nginx".to_string(),
                ..NewJob::default()
            },
            &clock,
        );
        job.advance(JobState::Provision, &clock);
        job.set_ctid(137, &clock);
        store.put_job(&job).unwrap();
    }

    let (engine, recovered) = Engine::open(
        manager.clone(),
        MemoryCatalog::new([nginx_manifest()]),
        config.clone(),
        clock.clone(),
    )
    .await
    .unwrap();

    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].as_str(), "deadbeefdeadbeef");
    let job = engine.job("deadbeefdeadbeef").unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error, "interrupted by service restart");
    assert!(job.completed_at_ms.is_some());
    assert!(!manager.exists(137));

    let (logs, _) = engine.logs_since("deadbeefdeadbeef", 0).unwrap();
    assert!(logs
        .iter()
        .any(|l| l.level == LogLevel::Warn && l.message.contains("interrupted")));
}

#[tokio::test(start_paused = true)]
async fn startup_recovery_is_idempotent() {
    let (_dir, config, manager, clock) = recovery_fixture();
    {
        let (store, _) = Store::open(&config.db_path(), &clock).unwrap();
        let mut job = Job::new(
            NewJob {
                id: "feedfacefeedface".to_string(),
                app_id: "nginx".to_string(),
                ..NewJob::default()
            },
            &clock,
        );
        job.advance(JobState::CreateContainer, &clock);
        store.put_job(&job).unwrap();
    }

    let (engine, recovered) = Engine::open(
        manager.clone(),
        MemoryCatalog::new([nginx_manifest()]),
        config.clone(),
        clock.clone(),
    )
    .await
    .unwrap();
    assert_eq!(recovered.len(), 1);
    let (logs_first, _) = engine.logs_since("feedfacefeedface", 0).unwrap();
    drop(engine);

    let (engine, recovered) = Engine::open(
        manager,
        MemoryCatalog::new([nginx_manifest()]),
        config,
        clock,
    )
    .await
    .unwrap();
    assert!(recovered.is_empty());
    let (logs_second, _) = engine.logs_since("feedfacefeedface", 0).unwrap();
    assert_eq!(logs_first.len(), logs_second.len());
}

#[tokio::test(start_paused = true)]
async fn uninstall_job_presets_ctid() {
    let h = harness();
    let job_id = h
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    let installed = wait_terminal(&h.engine, job_id.as_str()).await;
    let install = h.engine.install_for_app("nginx").unwrap().unwrap();

    let job_id = h
        .engine
        .uninstall(&install.id, UninstallRequest { keep_volumes: false })
        .await
        .unwrap();
    let job = h.engine.job(job_id.as_str()).unwrap();
    assert_eq!(job.job_type, JobType::Uninstall);
    assert_eq!(job.ctid, installed.ctid);
    wait_terminal(&h.engine, job_id.as_str()).await;
}
