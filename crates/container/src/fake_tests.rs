// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::manager::MountOpt;

fn opts(ctid: u32) -> CreateOpts {
    CreateOpts {
        ctid,
        os_template: "local:vztmpl/debian-12.tar.zst".to_string(),
        storage: "local-lvm".to_string(),
        rootfs_gb: 8,
        cores: 2,
        memory_mb: 1024,
        bridge: "vmbr0".to_string(),
        ip: "dhcp".to_string(),
        unprivileged: true,
        ..CreateOpts::default()
    }
}

#[tokio::test]
async fn next_ctid_is_non_reserving() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();

    let a = manager.next_ctid(&cancel).await.unwrap();
    let b = manager.next_ctid(&cancel).await.unwrap();
    assert_eq!(a, b);

    manager.create(&opts(a), &cancel).await.unwrap();
    let c = manager.next_ctid(&cancel).await.unwrap();
    assert_eq!(c, a + 1);
}

#[tokio::test]
async fn create_builds_config_map() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    let mut create = opts(105);
    create.mounts.push(MountOpt {
        index: 0,
        kind: MountKind::Volume,
        storage: String::new(),
        size_gb: 4,
        volume_id: String::new(),
        path: "/data".to_string(),
        host_path: String::new(),
        read_only: false,
    });

    manager.create(&create, &cancel).await.unwrap();
    let config = manager.config(105).await.unwrap();
    assert_eq!(
        config.get("mp0").map(String::as_str),
        Some("local-lvm:vm-105-disk-1,mp=/data,size=4G")
    );
    assert!(config.get("net0").is_some_and(|v| v.contains("hwaddr=")));
}

#[tokio::test]
async fn create_reattaches_existing_volume() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    let mut create = opts(106);
    create.mounts.push(MountOpt {
        index: 0,
        kind: MountKind::Volume,
        storage: String::new(),
        size_gb: 4,
        volume_id: "local-lvm:vm-99-disk-1".to_string(),
        path: "/data".to_string(),
        host_path: String::new(),
        read_only: false,
    });

    manager.create(&create, &cancel).await.unwrap();
    let config = manager.config(106).await.unwrap();
    assert!(config
        .get("mp0")
        .is_some_and(|v| v.starts_with("local-lvm:vm-99-disk-1,")));
}

#[tokio::test]
async fn duplicate_create_errors() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    manager.create(&opts(105), &cancel).await.unwrap();
    assert!(manager.create(&opts(105), &cancel).await.is_err());
}

#[tokio::test]
async fn ops_on_missing_container_are_gone_errors() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    let err = manager.stop(999, &cancel).await.unwrap_err();
    assert!(err.is_gone());
    let err = manager.destroy(999, false, &cancel).await.unwrap_err();
    assert!(err.is_gone());
}

#[tokio::test]
async fn start_assigns_ip() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    manager.create(&opts(105), &cancel).await.unwrap();
    assert_eq!(manager.ip(105).await.unwrap(), None);

    manager.start(105, &cancel).await.unwrap();
    assert!(manager.ip(105).await.unwrap().is_some());
    assert_eq!(
        manager.status(105).await.unwrap(),
        ContainerStatus::Running
    );
}

#[tokio::test]
async fn no_ip_mode_suppresses_address() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    manager.set_no_ip(true);
    manager.create(&opts(105), &cancel).await.unwrap();
    manager.start(105, &cancel).await.unwrap();
    assert_eq!(manager.ip(105).await.unwrap(), None);
}

#[tokio::test]
async fn scripted_failures_pop_in_order() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    manager.create(&opts(105), &cancel).await.unwrap();
    manager.fail_times("destroy", "storage busy", 2);

    assert!(manager.destroy(105, false, &cancel).await.is_err());
    assert!(manager.destroy(105, false, &cancel).await.is_err());
    manager.destroy(105, false, &cancel).await.unwrap();
    assert!(!manager.exists(105));
}

#[tokio::test]
async fn cancelled_token_short_circuits() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(matches!(
        manager.next_ctid(&cancel).await,
        Err(ContainerError::Cancelled)
    ));
}

#[tokio::test]
async fn exec_stream_plays_script() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    manager.create(&opts(105), &cancel).await.unwrap();
    manager.script_exec(&["hello", "world"], 3);

    let mut lines = Vec::new();
    let exit = manager
        .exec_stream(105, &["sh".to_string()], &mut |line| {
            lines.push(line.to_string())
        })
        .await
        .unwrap();
    assert_eq!(lines, vec!["hello", "world"]);
    assert_eq!(exit, 3);
}

#[tokio::test]
async fn blocked_exec_returns_when_stopped() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    manager.create(&opts(105), &cancel).await.unwrap();
    manager.start(105, &cancel).await.unwrap();
    manager.set_block_exec(true);

    let stopper = manager.clone();
    let stop_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        stopper.stop(105, &stop_cancel).await.unwrap();
    });

    let exit = manager
        .exec_stream(105, &["sleep".to_string()], &mut |_| {})
        .await
        .unwrap();
    assert_eq!(exit, 137);
    handle.await.unwrap();
}

#[tokio::test]
async fn detach_removes_mount_entries() {
    let manager = FakeContainerManager::new();
    let cancel = CancellationToken::new();
    let mut create = opts(105);
    create.mounts.push(MountOpt {
        index: 0,
        kind: MountKind::Volume,
        storage: String::new(),
        size_gb: 4,
        volume_id: String::new(),
        path: "/data".to_string(),
        host_path: String::new(),
        read_only: false,
    });
    manager.create(&create, &cancel).await.unwrap();

    manager.detach_mount_points(105, &[0]).await.unwrap();
    let config = manager.config(105).await.unwrap();
    assert!(!config.contains_key("mp0"));
}

#[tokio::test]
async fn resolve_template_expands_shorthand() {
    let manager = FakeContainerManager::new();
    assert_eq!(
        manager
            .resolve_template("debian-12.tar.zst", "local")
            .await
            .unwrap(),
        "local:vztmpl/debian-12.tar.zst"
    );
    assert_eq!(
        manager
            .resolve_template("other:vztmpl/x.tar.zst", "local")
            .await
            .unwrap(),
        "other:vztmpl/x.tar.zst"
    );
}
