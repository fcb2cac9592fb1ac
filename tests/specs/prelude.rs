//! Shared fixtures for the engine specs.

use appdock_catalog::{AppManifest, MemoryCatalog};
use appdock_container::FakeContainerManager;
use appdock_core::{FakeClock, Job};
use appdock_engine::{Engine, HostConfig};
use appdock_store::Store;
use std::time::Duration;

pub type SpecEngine = Engine<FakeContainerManager, MemoryCatalog, FakeClock>;

pub struct Spec {
    pub engine: SpecEngine,
    pub manager: FakeContainerManager,
    #[allow(dead_code)]
    pub clock: FakeClock,
    #[allow(dead_code)]
    pub dir: tempfile::TempDir,
}

pub fn nginx_manifest() -> AppManifest {
    toml_manifest(
        r#"
        id = "nginx"
        name = "Nginx"
        version = "1.0.0"
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

        [outputs]
        url = "http://{{ip}}:{{port}}"
        "#,
    )
}

pub fn toml_manifest(raw: &str) -> AppManifest {
    toml::from_str(raw).unwrap()
}

pub fn spec_config(dir: &tempfile::TempDir) -> HostConfig {
    HostConfig {
        data_dir: dir.path().join("data"),
        config_dir: dir.path().join("config"),
        sdk_dir: dir.path().join("sdk"),
        host_root: dir.path().join("hostroot"),
        ..HostConfig::default()
    }
}

pub fn spec(manifests: Vec<AppManifest>) -> Spec {
    let dir = tempfile::tempdir().unwrap();
    let config = spec_config(&dir);
    let store = Store::open_in_memory().unwrap();
    let manager = FakeContainerManager::new();
    let clock = FakeClock::new();
    let engine = Engine::new(
        store,
        manager.clone(),
        MemoryCatalog::new(manifests),
        config,
        clock.clone(),
    );
    Spec {
        engine,
        manager,
        clock,
        dir,
    }
}

pub async fn wait_terminal(engine: &SpecEngine, job_id: &str) -> Job {
    for _ in 0..5_000 {
        let job = engine.job(job_id).unwrap();
        if job.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

pub async fn wait_state(engine: &SpecEngine, job_id: &str, state: appdock_core::JobState) {
    for _ in 0..5_000 {
        let job = engine.job(job_id).unwrap();
        if job.state == state {
            return;
        }
        if job.is_terminal() {
            panic!("job {job_id} finished as {} before {state}", job.state);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached {state}");
}
