//! Universal invariants over terminal jobs and install records.

use crate::prelude::*;
use appdock_engine::{InstallRequest, UninstallRequest};
use appdock_core::{InstallStatus, JobState, MountKind};

#[tokio::test(start_paused = true)]
async fn terminal_jobs_always_carry_completed_at() {
    let s = spec(vec![nginx_manifest()]);

    // One success, one failure.
    let ok = s
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    wait_terminal(&s.engine, ok.as_str()).await;

    let install = s.engine.install_for_app("nginx").unwrap().unwrap();
    let rm = s
        .engine
        .uninstall(&install.id, UninstallRequest { keep_volumes: false })
        .await
        .unwrap();
    wait_terminal(&s.engine, rm.as_str()).await;

    s.manager.fail_once("create", "boom");
    let bad = s
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    wait_terminal(&s.engine, bad.as_str()).await;

    for job in s.engine.jobs().unwrap() {
        assert!(job.is_terminal());
        assert!(job.completed_at_ms.is_some(), "job {} lacks completed_at", job.id);
        match job.state {
            JobState::Failed => assert!(!job.error.is_empty()),
            JobState::Completed => assert!(job.error.is_empty()),
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn at_most_one_active_install_per_app() {
    let s = spec(vec![nginx_manifest()]);
    let a = s
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    wait_terminal(&s.engine, a.as_str()).await;
    assert!(s.engine.install(InstallRequest {
        app_id: "nginx".to_string(),
        ..InstallRequest::default()
    })
    .await
    .is_err());

    let active: Vec<_> = s
        .engine
        .installs()
        .unwrap()
        .into_iter()
        .filter(|i| i.app_id == "nginx" && i.status != InstallStatus::Uninstalled)
        .collect();
    assert_eq!(active.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn uninstalled_records_have_zero_ctid_and_a_volume() {
    let s = spec(vec![nginx_manifest()]);
    let a = s
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    wait_terminal(&s.engine, a.as_str()).await;
    let install = s.engine.install_for_app("nginx").unwrap().unwrap();

    let rm = s
        .engine
        .uninstall(&install.id, UninstallRequest { keep_volumes: true })
        .await
        .unwrap();
    wait_terminal(&s.engine, rm.as_str()).await;

    for record in s.engine.installs().unwrap() {
        if record.status == InstallStatus::Uninstalled {
            assert_eq!(record.ctid, 0);
            assert!(record
                .mounts
                .iter()
                .any(|m| m.kind == MountKind::Volume && !m.volume_id.is_empty()));
        }
    }
}
