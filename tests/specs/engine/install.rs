//! Scenario: happy-path install and the duplicate guard.

use crate::prelude::*;
use appdock_engine::{EngineError, InstallRequest};
use appdock_core::{InstallStatus, JobState};

fn req(app_id: &str) -> InstallRequest {
    InstallRequest {
        app_id: app_id.to_string(),
        cores: Some(2),
        memory_mb: Some(1024),
        disk_gb: Some(8),
        ..InstallRequest::default()
    }
}

#[tokio::test(start_paused = true)]
async fn happy_path_install() {
    let s = spec(vec![nginx_manifest()]);

    let job_id = s.engine.install(req("nginx")).await.unwrap();
    let job = wait_terminal(&s.engine, job_id.as_str()).await;

    assert_eq!(job.state, JobState::Completed);
    assert!(job.error.is_empty());
    assert!(job.completed_at_ms.is_some());

    let install = s.engine.install_for_app("nginx").unwrap().unwrap();
    assert_eq!(install.app_version, "1.0.0");
    assert_eq!(install.status, InstallStatus::Running);
    assert_eq!(install.ctid, job.ctid);
    assert!(s.engine.has_active_install_for_app("nginx").unwrap());

    // The job walked the full pipeline, in order.
    let (logs, _) = s.engine.logs_since(job_id.as_str(), 0).unwrap();
    let states: Vec<_> = logs
        .iter()
        .filter_map(|l| l.message.strip_prefix("Entering "))
        .collect();
    assert_eq!(states.first().copied(), Some("validate_request"));
    assert_eq!(states.last().copied(), Some("collect_outputs"));
    assert!(states.contains(&"allocate_ctid"));
    assert!(states.contains(&"provision"));
}

#[tokio::test(start_paused = true)]
async fn duplicate_guard_blocks_second_install() {
    let s = spec(vec![nginx_manifest()]);
    let job_id = s.engine.install(req("nginx")).await.unwrap();
    wait_terminal(&s.engine, job_id.as_str()).await;
    let install = s.engine.install_for_app("nginx").unwrap().unwrap();

    let err = s.engine.install(req("nginx")).await.unwrap_err();
    match err {
        EngineError::DuplicateInstall { install_id, .. } => {
            assert_eq!(install_id, install.id);
        }
        other => panic!("expected DuplicateInstall, got {other:?}"),
    }
    // No job row was created for the rejected request.
    assert_eq!(s.engine.jobs().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_installs_get_distinct_ctids() {
    let s = spec(vec![
        nginx_manifest(),
        toml_manifest(
            r#"
            id = "redis"
            name = "Redis"
            version = "7.2.0"
            os_template = "debian-12-standard_12.2-1_amd64.tar.zst"
            "#,
        ),
    ]);

    let a = s.engine.install(req("nginx")).await.unwrap();
    let b = s.engine.install(req("redis")).await.unwrap();

    let job_a = wait_terminal(&s.engine, a.as_str()).await;
    let job_b = wait_terminal(&s.engine, b.as_str()).await;
    assert_eq!(job_a.state, JobState::Completed);
    assert_eq!(job_b.state, JobState::Completed);
    // The CTID mutex spans allocate + create: no collision even though
    // the host's "next free id" endpoint is non-reserving.
    assert_ne!(job_a.ctid, job_b.ctid);
}

#[tokio::test(start_paused = true)]
async fn log_polling_cursor_only_returns_new_rows() {
    let s = spec(vec![nginx_manifest()]);
    let job_id = s.engine.install(req("nginx")).await.unwrap();
    wait_terminal(&s.engine, job_id.as_str()).await;

    let (first_page, cursor) = s.engine.logs_since(job_id.as_str(), 0).unwrap();
    assert!(!first_page.is_empty());
    assert!(cursor > 0);

    let (second_page, cursor2) = s.engine.logs_since(job_id.as_str(), cursor).unwrap();
    assert!(second_page.is_empty());
    assert_eq!(cursor2, cursor);

    // Ids are strictly increasing within the page.
    let mut previous = 0;
    for entry in &first_page {
        assert!(entry.id > previous);
        previous = entry.id;
    }
}
