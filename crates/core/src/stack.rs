// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stack records: one container hosting multiple apps.

use crate::install::InstallStatus;
use crate::mount::{DevicePassthrough, MountPoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Per-app provisioning status inside a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackAppStatus {
    Pending,
    Provisioning,
    Completed,
    Failed,
}

impl StackAppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackAppStatus::Pending => "pending",
            StackAppStatus::Provisioning => "provisioning",
            StackAppStatus::Completed => "completed",
            StackAppStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StackAppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One app within a stack, provisioned in `order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackApp {
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub order: u32,
    pub inputs: HashMap<String, String>,
    pub outputs: HashMap<String, String>,
    pub status: StackAppStatus,
    /// Per-app provisioning error; a failed app does not abort the stack.
    #[serde(default)]
    pub error: String,
}

/// A single container running multiple apps under a shared OS template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    pub name: String,
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
    /// Ordered by `order`; provisioned in request order.
    pub apps: Vec<StackApp>,
    pub mounts: Vec<MountPoint>,
    pub devices: Vec<DevicePassthrough>,
    pub env: HashMap<String, String>,
    pub tags: String,
    pub status: InstallStatus,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Stack {
    pub fn is_active(&self) -> bool {
        self.status != InstallStatus::Uninstalled
    }

    pub fn app(&self, app_id: &str) -> Option<&StackApp> {
        self.apps.iter().find(|a| a.app_id == app_id)
    }

    pub fn managed_mounts(&self) -> impl Iterator<Item = &MountPoint> {
        self.mounts.iter().filter(|m| m.is_managed_volume())
    }
}

#[cfg(test)]
#[path = "stack_tests.rs"]
mod tests;
