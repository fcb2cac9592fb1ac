//! Scenario: cancellation mid-provision.

use crate::prelude::*;
use appdock_engine::InstallRequest;
use appdock_core::JobState;

#[tokio::test(start_paused = true)]
async fn cancel_mid_provision_cleans_up() {
    let s = spec(vec![nginx_manifest()]);
    // Provisioning blocks until the container is force-stopped, like a
    // long apt install.
    s.manager.set_block_exec(true);

    let job_id = s
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    wait_state(&s.engine, job_id.as_str(), JobState::Provision).await;

    s.engine.cancel_job(job_id.as_str()).await.unwrap();
    let job = wait_terminal(&s.engine, job_id.as_str()).await;

    assert_eq!(job.state, JobState::Cancelled);
    assert_eq!(job.error, "cancelled by user");
    assert!(job.completed_at_ms.is_some());
    // Container stopped and destroyed, no install row written.
    assert!(!s.manager.exists(job.ctid));
    assert!(s.engine.install_for_app("nginx").unwrap().is_none());

    let (logs, _) = s.engine.logs_since(job_id.as_str(), 0).unwrap();
    assert!(logs.iter().any(|l| l.message == "Job cancelled by user"));
}

#[tokio::test(start_paused = true)]
async fn cancel_before_allocation_skips_container_cleanup() {
    let s = spec(vec![nginx_manifest()]);
    s.manager.fail_once("next_ctid", "transient");

    // Cancel immediately; depending on scheduling the job dies in an
    // early validate state or on the failed allocation, but never leaves
    // a container behind.
    let job_id = s
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    let _ = s.engine.cancel_job(job_id.as_str()).await;

    let job = wait_terminal(&s.engine, job_id.as_str()).await;
    assert!(job.is_terminal());
    assert_eq!(job.ctid, 0);
}
