//! Scenario: orphan recovery across a process restart.

use crate::prelude::*;
use appdock_catalog::MemoryCatalog;
use appdock_container::FakeContainerManager;
use appdock_core::{FakeClock, Job, JobState, LogLevel, NewJob};
use appdock_engine::Engine;
use appdock_store::Store;

#[tokio::test(start_paused = true)]
async fn restart_fails_in_flight_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let config = spec_config(&dir);
    std::fs::create_dir_all(&config.data_dir).unwrap();
    let clock = FakeClock::new();
    let manager = FakeContainerManager::new();

    // First process: a job dies mid-provision.
    {
        let (store, recovered) = Store::open(&config.db_path(), &clock).unwrap();
        assert!(recovered.is_empty());
        let mut job = Job::new(
            NewJob {
                id: "0123456789abcdef".to_string(),
                app_id: "nginx".to_string(),
                ..NewJob::default()
            },
            &clock,
        );
        job.advance(JobState::Provision, &clock);
        store.put_job(&job).unwrap();
    }

    // Second process: the engine opens the same database.
    let (engine, recovered) = Engine::open(
        manager.clone(),
        MemoryCatalog::new([nginx_manifest()]),
        config.clone(),
        clock.clone(),
    )
    .await
    .unwrap();

    assert_eq!(recovered.len(), 1);
    let job = engine.job("0123456789abcdef").unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error, "interrupted by service restart");
    assert!(job.completed_at_ms.is_some());

    let (logs, _) = engine.logs_since("0123456789abcdef", 0).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Warn);

    // Recovery is idempotent: a third open changes nothing.
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
    let (logs, _) = engine.logs_since("0123456789abcdef", 0).unwrap();
    assert_eq!(logs.len(), 1);
}
