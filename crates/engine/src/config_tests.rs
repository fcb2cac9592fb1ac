// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_are_sane() {
    let config = HostConfig::default();
    assert_eq!(config.bridge, "vmbr0");
    assert_eq!(config.shutdown_timeout_secs, 30);
    assert!(config.default_unprivileged);
    assert_eq!(config.db_path(), PathBuf::from("/var/lib/appdock/appdock.db"));
}

#[test]
fn load_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appdock.toml");
    std::fs::write(
        &path,
        r#"
        storage = "tank"
        bridge = "vmbr1"
        "#,
    )
    .unwrap();

    let config = HostConfig::load(&path).unwrap();
    assert_eq!(config.storage, "tank");
    assert_eq!(config.bridge, "vmbr1");
    // Unset fields keep their defaults.
    assert_eq!(config.node, "pve");
}

#[test]
fn load_rejects_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appdock.toml");
    std::fs::write(&path, "storge = \"typo\"").unwrap();
    assert!(matches!(
        HostConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn denied_dirs_cover_engine_state() {
    let config = HostConfig::default();
    let denied = config.denied_bind_dirs();
    assert!(denied.contains(&"/var/lib/appdock".to_string()));
    assert!(denied.contains(&"/etc/appdock".to_string()));
}
