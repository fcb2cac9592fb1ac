// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle operations: request types and the per-operation preparation
//! that runs synchronously before a job is persisted.

mod edit;
mod install;
mod power;
mod reconfigure;
mod reinstall;
mod stack;
mod uninstall;
mod update;

pub(crate) use edit::prepare_edit;
pub(crate) use install::prepare_install;
pub(crate) use power::{container_status, start_app, stop_app};
pub(crate) use reconfigure::reconfigure;
pub(crate) use reinstall::prepare_reinstall;
pub(crate) use stack::{prepare_stack_edit, prepare_stack_install, prepare_stack_uninstall};
pub(crate) use uninstall::prepare_uninstall;
pub(crate) use update::prepare_update;

use crate::engine::EngineInner;
use crate::error::EngineError;
use appdock_catalog::{AppManifest, Catalog};
use appdock_container::ContainerManager;
use appdock_core::validate;
use appdock_core::{
    Clock, DevicePassthrough, Install, MountKind, MountPoint, Stack, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extra bind mount supplied by the user on top of the manifest's volumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraMount {
    /// Mount path inside the container.
    pub path: String,
    pub host_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Per-volume override: bind a declared volume to a host path instead of
/// provisioning it, or place it on a different storage pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeOverride {
    /// Declared volume name this override applies to.
    pub name: String,
    /// Host path to bind instead of a managed volume; "" keeps the volume
    /// managed.
    #[serde(default)]
    pub host_path: String,
    /// Storage pool override for a managed volume; "" keeps the default.
    #[serde(default)]
    pub storage: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallRequest {
    pub app_id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub bridge: String,
    #[serde(default)]
    pub storage: String,
    #[serde(default)]
    pub pool: String,
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub disk_gb: Option<u32>,
    #[serde(default)]
    pub onboot: bool,
    #[serde(default)]
    pub unprivileged: Option<bool>,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub gpu_profile: Option<String>,
    #[serde(default)]
    pub devices: Vec<DevicePassthrough>,
    #[serde(default)]
    pub extra_mounts: Vec<ExtraMount>,
    #[serde(default)]
    pub volume_overrides: Vec<VolumeOverride>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UninstallRequest {
    #[serde(default)]
    pub keep_volumes: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub disk_gb: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconfigureRequest {
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u32>,
    /// Input changes; empty means resources only.
    #[serde(default)]
    pub inputs: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackAppRequest {
    pub app_id: String,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackInstallRequest {
    pub name: String,
    /// Provisioned in this order.
    pub apps: Vec<StackAppRequest>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub bridge: String,
    #[serde(default)]
    pub storage: String,
    #[serde(default)]
    pub pool: String,
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub disk_gb: Option<u32>,
    #[serde(default)]
    pub onboot: bool,
    #[serde(default)]
    pub unprivileged: Option<bool>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub devices: Vec<DevicePassthrough>,
    #[serde(default)]
    pub extra_mounts: Vec<ExtraMount>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StackEditRequest {
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub disk_gb: Option<u32>,
}

/// What the runner task executes: pre/post hooks around the shared install
/// pipeline, tagged per operation.
#[derive(Clone)]
pub(crate) enum OpPlan {
    Install {
        manifest: AppManifest,
    },
    Reinstall {
        manifest: AppManifest,
        install: Install,
    },
    Update {
        manifest: AppManifest,
        install: Install,
    },
    Edit {
        manifest: AppManifest,
        install: Install,
    },
    Uninstall {
        install: Install,
        keep_volumes: bool,
    },
    StackInstall {
        manifests: Vec<AppManifest>,
        stack: Stack,
    },
    StackEdit {
        manifests: Vec<AppManifest>,
        stack: Stack,
    },
    StackUninstall {
        stack: Stack,
        keep_volumes: bool,
    },
}

/// §4.7 duplicate guard: an active install or a non-terminal job for the
/// app blocks every install-like operation.
pub(crate) fn duplicate_guard<M, K, C>(
    inner: &EngineInner<M, K, C>,
    app_id: &str,
) -> Result<(), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    if let Some(install) = inner.store.active_install_for_app(app_id)? {
        return Err(EngineError::DuplicateInstall {
            app_id: app_id.to_string(),
            install_id: install.id,
        });
    }
    active_job_guard(inner, app_id)
}

/// Only the job half of the guard, for operations that target an existing
/// install.
pub(crate) fn active_job_guard<M, K, C>(
    inner: &EngineInner<M, K, C>,
    app_id: &str,
) -> Result<(), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    if let Some(job) = inner.store.active_job_for_app(app_id)? {
        return Err(EngineError::DuplicateJob {
            app_id: app_id.to_string(),
            job_id: job.id,
        });
    }
    Ok(())
}

/// Validate the request fields every operation shares.
pub(crate) fn validate_common(
    config: &crate::HostConfig,
    hostname: &str,
    ip: &str,
    bridge: &str,
    tags: &str,
    env: &HashMap<String, String>,
    devices: &[DevicePassthrough],
    extra_mounts: &[ExtraMount],
) -> Result<(), ValidationError> {
    validate::validate_hostname(hostname)?;
    validate::validate_ip(ip)?;
    validate::validate_bridge(bridge)?;
    validate::validate_tags(tags)?;
    for key in env.keys() {
        validate::validate_env_key(key)?;
    }
    for device in devices {
        validate::validate_device_path(&device.path)?;
        if let Some(mode) = &device.mode {
            validate::validate_device_mode(mode)?;
        }
    }
    let denied = config.denied_bind_dirs();
    let denied: Vec<&str> = denied.iter().map(String::as_str).collect();
    for mount in extra_mounts {
        validate::validate_bind_path(&mount.host_path, &denied)?;
    }
    Ok(())
}

/// Build the mount-point list for an install: manifest volumes (with
/// per-volume bind/storage overrides) followed by the user's extra binds.
/// Indexes are dense from 0.
pub(crate) fn build_mounts(
    config: &crate::HostConfig,
    manifest: &AppManifest,
    overrides: &[VolumeOverride],
    extra_mounts: &[ExtraMount],
) -> Result<Vec<MountPoint>, ValidationError> {
    let denied = config.denied_bind_dirs();
    let denied: Vec<&str> = denied.iter().map(String::as_str).collect();

    let mut mounts = Vec::new();
    for volume in &manifest.volumes {
        let index = mounts.len() as u32;
        let volume_override = overrides.iter().find(|o| o.name == volume.name);
        match volume_override {
            Some(o) if !o.host_path.is_empty() => {
                validate::validate_bind_path(&o.host_path, &denied)?;
                mounts.push(MountPoint {
                    index,
                    name: volume.name.clone(),
                    kind: MountKind::Bind,
                    path: volume.path.clone(),
                    host_path: o.host_path.clone(),
                    ..MountPoint::default()
                });
            }
            _ => {
                let storage = volume_override
                    .map(|o| o.storage.clone())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| volume.storage.clone());
                mounts.push(MountPoint {
                    index,
                    name: volume.name.clone(),
                    kind: MountKind::Volume,
                    path: volume.path.clone(),
                    size_gb: volume.size_gb,
                    storage,
                    ..MountPoint::default()
                });
            }
        }
    }
    for extra in extra_mounts {
        validate::validate_bind_path(&extra.host_path, &denied)?;
        mounts.push(MountPoint {
            index: mounts.len() as u32,
            name: String::new(),
            kind: MountKind::Bind,
            path: extra.path.clone(),
            host_path: extra.host_path.clone(),
            read_only: extra.read_only,
            ..MountPoint::default()
        });
    }
    Ok(mounts)
}

/// Request ← manifest ← built-in default, first non-zero wins.
pub(crate) fn pick_resource(requested: Option<u32>, manifest_default: u32, floor: u32) -> u32 {
    requested
        .filter(|v| *v > 0)
        .unwrap_or(if manifest_default > 0 {
            manifest_default
        } else {
            floor
        })
}

/// Merge devices from the request with GPU-resolved devices, deduplicated
/// by path (request wins).
pub(crate) fn merge_devices(
    requested: &[DevicePassthrough],
    gpu: Vec<DevicePassthrough>,
) -> Vec<DevicePassthrough> {
    let mut devices = requested.to_vec();
    for device in gpu {
        if !devices.iter().any(|d| d.path == device.path) {
            devices.push(device);
        }
    }
    devices
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
