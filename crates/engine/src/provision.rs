// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bridge to the in-container provisioning runner.
//!
//! The engine talks to the app solely through the container manager's exec
//! stream: it pushes the SDK plus the app's assets, then invokes the Python
//! runner module with a deterministic argument vector.

use std::collections::HashMap;

/// Container-side root for everything the engine pushes.
pub(crate) const APP_ROOT: &str = "/opt/appstore";
/// Container-side SDK location; becomes `PYTHONPATH`.
pub(crate) const SDK_DIR: &str = "/opt/appstore/sdk";
/// Container-side provisioning asset root.
pub(crate) const PROVISION_DIR: &str = "/opt/appstore/provision";
/// Where staged NVIDIA libraries appear inside the container.
pub(crate) const NVIDIA_MOUNT_PATH: &str = "/usr/lib/nvidia-host";
/// ld.so.conf.d entry pointing the guest linker at the mounted libraries.
pub(crate) const NVIDIA_LD_CONF_PATH: &str = "/etc/ld.so.conf.d/nvidia-host.conf";

/// Runner action verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Install,
    Configure,
    Healthcheck,
}

impl Action {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Action::Install => "install",
            Action::Configure => "configure",
            Action::Healthcheck => "healthcheck",
        }
    }
}

/// Container-side paths the runner is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunnerPaths {
    pub inputs: String,
    pub permissions: String,
    pub script: String,
}

/// Paths for a single-app container.
pub(crate) fn single_app_paths(script: &str) -> RunnerPaths {
    RunnerPaths {
        inputs: format!("{APP_ROOT}/inputs.json"),
        permissions: format!("{APP_ROOT}/permissions.json"),
        script: format!("{PROVISION_DIR}/{script}"),
    }
}

/// App-namespaced paths inside a stack container.
pub(crate) fn stack_app_paths(app_id: &str, script: &str) -> RunnerPaths {
    RunnerPaths {
        inputs: format!("{APP_ROOT}/{app_id}/inputs.json"),
        permissions: format!("{APP_ROOT}/{app_id}/permissions.json"),
        script: format!("{PROVISION_DIR}/{app_id}/{script}"),
    }
}

/// Build the runner argument vector.
///
/// `env` carries the user's env vars; keys are already validated against
/// the reserved set, so they can never shadow the interpreter knobs set
/// here.
pub(crate) fn runner_cmd(
    action: Action,
    paths: &RunnerPaths,
    env: &HashMap<String, String>,
) -> Vec<String> {
    let mut cmd = vec![
        "env".to_string(),
        "PYTHONUNBUFFERED=1".to_string(),
        format!("PYTHONPATH={SDK_DIR}"),
    ];
    let mut user_env: Vec<_> = env.iter().collect();
    user_env.sort();
    for (key, value) in user_env {
        cmd.push(format!("{key}={value}"));
    }
    cmd.extend([
        "python3".to_string(),
        "-u".to_string(),
        "-m".to_string(),
        "appstore.runner".to_string(),
        paths.inputs.clone(),
        paths.permissions.clone(),
        action.as_str().to_string(),
        paths.script.clone(),
    ]);
    cmd
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
