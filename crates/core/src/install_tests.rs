// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::mount::MountKind;

fn sample_install() -> Install {
    Install {
        id: "i1".to_string(),
        app_id: "nginx".to_string(),
        app_name: "Nginx".to_string(),
        app_version: "1.0.0".to_string(),
        status: InstallStatus::Running,
        ctid: 105,
        node: "host1".to_string(),
        pool: String::new(),
        storage: "local-lvm".to_string(),
        bridge: "vmbr0".to_string(),
        os_template: "local:vztmpl/debian-12.tar.zst".to_string(),
        cores: 2,
        memory_mb: 1024,
        disk_gb: 8,
        hostname: String::new(),
        ip: "dhcp".to_string(),
        onboot: true,
        unprivileged: true,
        inputs: HashMap::new(),
        outputs: HashMap::new(),
        mounts: vec![
            MountPoint {
                index: 0,
                name: "data".to_string(),
                kind: MountKind::Volume,
                path: "/data".to_string(),
                size_gb: 4,
                ..MountPoint::default()
            },
            MountPoint {
                index: 1,
                name: "media".to_string(),
                kind: MountKind::Bind,
                path: "/media".to_string(),
                host_path: "/srv/media".to_string(),
                ..MountPoint::default()
            },
        ],
        devices: vec![],
        env: HashMap::new(),
        tags: String::new(),
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

#[test]
fn active_unless_uninstalled() {
    let mut install = sample_install();
    assert!(install.is_active());
    install.status = InstallStatus::Stopped;
    assert!(install.is_active());
    install.status = InstallStatus::Uninstalled;
    assert!(!install.is_active());
}

#[test]
fn managed_mounts_skip_binds() {
    let install = sample_install();
    let managed: Vec<_> = install.managed_mounts().collect();
    assert_eq!(managed.len(), 1);
    assert_eq!(managed[0].name, "data");
}

#[test]
fn status_round_trips() {
    for s in [
        InstallStatus::Running,
        InstallStatus::Stopped,
        InstallStatus::Uninstalled,
    ] {
        assert_eq!(InstallStatus::parse(s.as_str()), Some(s));
    }
    assert_eq!(InstallStatus::parse("gone"), None);
}
