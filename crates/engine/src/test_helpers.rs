// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::{Engine, HostConfig};
use appdock_catalog::{AppManifest, MemoryCatalog};
use appdock_container::FakeContainerManager;
use appdock_core::{FakeClock, Job};
use appdock_store::Store;
use std::time::Duration;

pub(crate) type TestEngine = Engine<FakeContainerManager, MemoryCatalog, FakeClock>;

pub(crate) fn nginx_manifest() -> AppManifest {
    toml::from_str(
        r#"
        id = "nginx"
        name = "Nginx"
        version = "1.2.0"
        os_template = "debian-12-standard_12.2-1_amd64.tar.zst"

        [resources]
        cores = 2
        memory_mb = 1024
        disk_gb = 8

        [[volumes]]
        name = "data"
        path = "/var/www"
        size_gb = 4

        [[inputs]]
        key = "port"
        type = "number"
        default = "8080"
        min = 1
        max = 65535

        [outputs]
        url = "http://{{ip}}:{{port}}"

        [provision]
        script = "install.py"
        "#,
    )
    .unwrap_or_else(|e| panic!("bad fixture manifest: {e}"))
}

pub(crate) fn redis_manifest() -> AppManifest {
    toml::from_str(
        r#"
        id = "redis"
        name = "Redis"
        version = "7.2.0"
        os_template = "debian-12-standard_12.2-1_amd64.tar.zst"

        [resources]
        cores = 1
        memory_mb = 512
        disk_gb = 4
        "#,
    )
    .unwrap_or_else(|e| panic!("bad fixture manifest: {e}"))
}

pub(crate) struct Harness {
    pub(crate) engine: TestEngine,
    pub(crate) manager: FakeContainerManager,
    pub(crate) clock: FakeClock,
    #[allow(dead_code)]
    pub(crate) dir: tempfile::TempDir,
}

pub(crate) fn harness_with(manifests: Vec<AppManifest>) -> Harness {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let config = HostConfig {
        data_dir: dir.path().join("data"),
        config_dir: dir.path().join("config"),
        sdk_dir: dir.path().join("sdk"),
        host_root: dir.path().join("hostroot"),
        ..HostConfig::default()
    };
    let store = Store::open_in_memory().unwrap_or_else(|e| panic!("store: {e}"));
    let manager = FakeContainerManager::new();
    let clock = FakeClock::new();
    let engine = Engine::new(
        store,
        manager.clone(),
        MemoryCatalog::new(manifests),
        config,
        clock.clone(),
    );
    Harness {
        engine,
        manager,
        clock,
        dir,
    }
}

pub(crate) fn harness() -> Harness {
    harness_with(vec![nginx_manifest(), redis_manifest()])
}

/// Poll the store until the job reaches a terminal state. Meant for
/// `start_paused` tests where the sleeps cost nothing.
pub(crate) async fn wait_terminal(engine: &TestEngine, job_id: &str) -> Job {
    for _ in 0..5_000 {
        let job = engine
            .job(job_id)
            .unwrap_or_else(|e| panic!("job lookup: {e}"));
        if job.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

/// Poll until the job is observed in the given state.
pub(crate) async fn wait_state(engine: &TestEngine, job_id: &str, state: appdock_core::JobState) {
    for _ in 0..5_000 {
        let job = engine
            .job(job_id)
            .unwrap_or_else(|e| panic!("job lookup: {e}"));
        if job.state == state {
            return;
        }
        if job.is_terminal() {
            panic!("job {job_id} finished as {} before reaching {state}", job.state);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached {state}");
}
