// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample_stack() -> Stack {
    Stack {
        id: "s1".to_string(),
        name: "media".to_string(),
        ctid: 110,
        node: "host1".to_string(),
        pool: String::new(),
        storage: "local-lvm".to_string(),
        bridge: "vmbr0".to_string(),
        os_template: "local:vztmpl/debian-12.tar.zst".to_string(),
        cores: 4,
        memory_mb: 4096,
        disk_gb: 24,
        hostname: String::new(),
        ip: "dhcp".to_string(),
        onboot: false,
        unprivileged: true,
        apps: vec![
            StackApp {
                app_id: "sonarr".to_string(),
                app_name: "Sonarr".to_string(),
                app_version: "4.0.0".to_string(),
                order: 0,
                inputs: HashMap::new(),
                outputs: HashMap::new(),
                status: StackAppStatus::Completed,
                error: String::new(),
            },
            StackApp {
                app_id: "radarr".to_string(),
                app_name: "Radarr".to_string(),
                app_version: "5.0.0".to_string(),
                order: 1,
                inputs: HashMap::new(),
                outputs: HashMap::new(),
                status: StackAppStatus::Failed,
                error: "provision exited with status 2".to_string(),
            },
        ],
        mounts: vec![],
        devices: vec![],
        env: HashMap::new(),
        tags: String::new(),
        status: InstallStatus::Running,
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

#[test]
fn app_lookup_by_id() {
    let stack = sample_stack();
    assert_eq!(stack.app("radarr").map(|a| a.order), Some(1));
    assert!(stack.app("missing").is_none());
}

#[test]
fn failed_app_does_not_change_stack_status() {
    let stack = sample_stack();
    assert!(stack.is_active());
    assert_eq!(stack.apps[1].status, StackAppStatus::Failed);
}

#[test]
fn stack_serde_round_trip() {
    let stack = sample_stack();
    let json = serde_json::to_string(&stack).unwrap();
    let parsed: Stack = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.apps.len(), 2);
    assert_eq!(parsed.apps[0].status, StackAppStatus::Completed);
}
