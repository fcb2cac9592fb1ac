// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mount points and device passthrough records.

use serde::{Deserialize, Serialize};

/// Managed volume on a storage pool, or a bind mount from a host path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountKind {
    Volume,
    Bind,
}

impl Default for MountKind {
    fn default() -> Self {
        MountKind::Volume
    }
}

/// One `mpN` entry on a container.
///
/// Indexes are dense from 0. A `Volume` mount carries `volume_id` once the
/// container exists (read back from its config); a `Bind` mount carries
/// `host_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MountPoint {
    pub index: u32,
    pub name: String,
    pub kind: MountKind,
    /// Mount path inside the container.
    pub path: String,
    /// Size of a managed volume in GB; 0 for bind mounts.
    #[serde(default)]
    pub size_gb: u32,
    /// Backing volume id, "" until read back from the container config.
    #[serde(default)]
    pub volume_id: String,
    /// Host-side source for bind mounts.
    #[serde(default)]
    pub host_path: String,
    /// Per-volume storage override; "" means the job's storage pool.
    #[serde(default)]
    pub storage: String,
    #[serde(default)]
    pub read_only: bool,
}

impl MountPoint {
    pub fn is_managed_volume(&self) -> bool {
        self.kind == MountKind::Volume
    }
}

/// Host device node passed through into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePassthrough {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    /// Octal mode string ("0666"), if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[cfg(test)]
#[path = "mount_tests.rs"]
mod tests;
