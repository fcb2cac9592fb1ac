// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn volume_mount_serde() {
    let mp = MountPoint {
        index: 0,
        name: "data".to_string(),
        kind: MountKind::Volume,
        path: "/var/lib/data".to_string(),
        size_gb: 4,
        ..MountPoint::default()
    };
    let json = serde_json::to_string(&mp).unwrap();
    let parsed: MountPoint = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, mp);
    assert!(parsed.is_managed_volume());
}

#[test]
fn bind_mount_is_not_managed() {
    let mp = MountPoint {
        index: 1,
        name: "media".to_string(),
        kind: MountKind::Bind,
        path: "/media".to_string(),
        host_path: "/srv/media".to_string(),
        read_only: true,
        ..MountPoint::default()
    };
    assert!(!mp.is_managed_volume());
}

#[test]
fn device_optional_fields_omitted() {
    let dev = DevicePassthrough {
        path: "/dev/net/tun".to_string(),
        gid: None,
        mode: None,
    };
    let json = serde_json::to_string(&dev).unwrap();
    assert_eq!(json, r#"{"path":"/dev/net/tun"}"#);
}
