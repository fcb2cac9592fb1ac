// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn single_app_paths_are_rooted() {
    let paths = single_app_paths("install.py");
    assert_eq!(paths.inputs, "/opt/appstore/inputs.json");
    assert_eq!(paths.permissions, "/opt/appstore/permissions.json");
    assert_eq!(paths.script, "/opt/appstore/provision/install.py");
}

#[test]
fn stack_paths_are_namespaced_per_app() {
    let paths = stack_app_paths("sonarr", "install.py");
    assert_eq!(paths.inputs, "/opt/appstore/sonarr/inputs.json");
    assert_eq!(paths.permissions, "/opt/appstore/sonarr/permissions.json");
    assert_eq!(paths.script, "/opt/appstore/provision/sonarr/install.py");
}

#[test]
fn runner_cmd_shape() {
    let paths = single_app_paths("install.py");
    let cmd = runner_cmd(Action::Install, &paths, &HashMap::new());
    assert_eq!(
        cmd,
        vec![
            "env",
            "PYTHONUNBUFFERED=1",
            "PYTHONPATH=/opt/appstore/sdk",
            "python3",
            "-u",
            "-m",
            "appstore.runner",
            "/opt/appstore/inputs.json",
            "/opt/appstore/permissions.json",
            "install",
            "/opt/appstore/provision/install.py",
        ]
    );
}

#[test]
fn runner_cmd_includes_sorted_user_env() {
    let paths = single_app_paths("install.py");
    let mut env = HashMap::new();
    env.insert("ZED".to_string(), "1".to_string());
    env.insert("APP_MODE".to_string(), "prod".to_string());

    let cmd = runner_cmd(Action::Configure, &paths, &env);
    assert_eq!(cmd[3], "APP_MODE=prod");
    assert_eq!(cmd[4], "ZED=1");
    assert!(cmd.contains(&"configure".to_string()));
}

#[test]
fn action_verbs() {
    assert_eq!(Action::Install.as_str(), "install");
    assert_eq!(Action::Configure.as_str(), "configure");
    assert_eq!(Action::Healthcheck.as_str(), "healthcheck");
}
