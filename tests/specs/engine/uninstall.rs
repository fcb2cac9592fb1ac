//! Scenario: uninstall with volume preservation, and reinstall.

use crate::prelude::*;
use appdock_container::ManagerCall;
use appdock_engine::{InstallRequest, UninstallRequest};
use appdock_core::{InstallStatus, JobState};

async fn installed(s: &Spec) -> (appdock_core::Job, appdock_core::Install) {
    let job_id = s
        .engine
        .install(InstallRequest {
            app_id: "nginx".to_string(),
            ..InstallRequest::default()
        })
        .await
        .unwrap();
    let job = wait_terminal(&s.engine, job_id.as_str()).await;
    assert_eq!(job.state, JobState::Completed);
    let install = s.engine.install_for_app("nginx").unwrap().unwrap();
    (job, install)
}

#[tokio::test(start_paused = true)]
async fn uninstall_with_keep_volumes_retains_the_record() {
    let s = spec(vec![nginx_manifest()]);
    let (job, install) = installed(&s).await;

    // One transient destroy failure: the retry policy must absorb it.
    s.manager.fail_once("destroy", "storage busy");

    let job_id = s
        .engine
        .uninstall(&install.id, UninstallRequest { keep_volumes: true })
        .await
        .unwrap();
    let uninstall_job = wait_terminal(&s.engine, job_id.as_str()).await;
    assert_eq!(uninstall_job.state, JobState::Completed);

    // The managed volume was detached by index before the destroy.
    let calls = s.manager.calls();
    let detach_at = calls
        .iter()
        .position(|c| matches!(c, ManagerCall::DetachMountPoints { indexes, .. } if indexes == &vec![0]))
        .expect("detach call");
    let destroy_at = calls
        .iter()
        .position(|c| matches!(c, ManagerCall::Destroy { ctid, .. } if *ctid == job.ctid))
        .expect("destroy call");
    assert!(detach_at < destroy_at);

    let retained = s.engine.install_record(&install.id).unwrap();
    assert_eq!(retained.status, InstallStatus::Uninstalled);
    assert_eq!(retained.ctid, 0);
    assert!(retained.mounts[0]
        .volume_id
        .starts_with(&format!("local-lvm:vm-{}-disk", job.ctid)));
    assert!(!s.engine.has_active_install_for_app("nginx").unwrap());
}

#[tokio::test(start_paused = true)]
async fn uninstall_without_keep_volumes_deletes_the_record() {
    let s = spec(vec![nginx_manifest()]);
    let (_, install) = installed(&s).await;

    let job_id = s
        .engine
        .uninstall(&install.id, UninstallRequest { keep_volumes: false })
        .await
        .unwrap();
    wait_terminal(&s.engine, job_id.as_str()).await;

    assert!(s.engine.install_record(&install.id).is_err());
}

#[tokio::test(start_paused = true)]
async fn reinstall_from_preserved_volumes() {
    let s = spec(vec![nginx_manifest()]);
    let (first_job, install) = installed(&s).await;

    let job_id = s
        .engine
        .uninstall(&install.id, UninstallRequest { keep_volumes: true })
        .await
        .unwrap();
    wait_terminal(&s.engine, job_id.as_str()).await;
    let volume_id = s.engine.install_record(&install.id).unwrap().mounts[0]
        .volume_id
        .clone();

    let job_id = s.engine.reinstall(&install.id).await.unwrap();
    let job = wait_terminal(&s.engine, job_id.as_str()).await;
    assert_eq!(job.state, JobState::Completed);
    assert_ne!(job.ctid, first_job.ctid);

    // The new container reattached the preserved volume.
    let config = s.manager.container(job.ctid).unwrap().config;
    assert!(config.get("mp0").unwrap().starts_with(&volume_id));

    let restored = s.engine.install_record(&install.id).unwrap();
    assert_eq!(restored.status, InstallStatus::Running);
    assert_eq!(restored.ctid, job.ctid);
}
