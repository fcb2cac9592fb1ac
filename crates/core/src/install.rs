// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active deployment records.

use crate::mount::{DevicePassthrough, MountPoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    Running,
    Stopped,
    /// Container destroyed but managed volumes preserved; `ctid` is 0.
    Uninstalled,
}

impl InstallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallStatus::Running => "running",
            InstallStatus::Stopped => "stopped",
            InstallStatus::Uninstalled => "uninstalled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(InstallStatus::Running),
            "stopped" => Some(InstallStatus::Stopped),
            "uninstalled" => Some(InstallStatus::Uninstalled),
            _ => None,
        }
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An app deployed as a single container.
///
/// Mirrors the placement and resource fields of the job that produced it,
/// plus the catalog version installed and the full mount-point list so
/// preserved volumes can be reattached on reinstall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Install {
    pub id: String,
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub status: InstallStatus,
    /// 0 when status is `uninstalled`.
    pub ctid: u32,
    pub node: String,
    pub pool: String,
    pub storage: String,
    pub bridge: String,
    pub os_template: String,
    pub cores: u32,
    pub memory_mb: u32,
    pub disk_gb: u32,
    pub hostname: String,
    pub ip: String,
    pub onboot: bool,
    pub unprivileged: bool,
    pub inputs: HashMap<String, String>,
    pub outputs: HashMap<String, String>,
    pub mounts: Vec<MountPoint>,
    pub devices: Vec<DevicePassthrough>,
    pub env: HashMap<String, String>,
    pub tags: String,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Install {
    pub fn is_active(&self) -> bool {
        self.status != InstallStatus::Uninstalled
    }

    /// Managed (non-bind) mount points; these are what `keep_volumes`
    /// preserves across uninstall.
    pub fn managed_mounts(&self) -> impl Iterator<Item = &MountPoint> {
        self.mounts.iter().filter(|m| m.is_managed_volume())
    }
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
