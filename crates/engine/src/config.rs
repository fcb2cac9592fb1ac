// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-wide defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Engine configuration: placement defaults and engine-owned directories.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Host node name.
    pub node: String,
    /// Resource pool new containers join; "" for none.
    pub pool: String,
    /// Default storage pool for rootfs and managed volumes.
    pub storage: String,
    /// Storage holding OS templates.
    pub template_storage: String,
    /// Default network bridge.
    pub bridge: String,
    /// Engine state directory (database, GPU staging).
    pub data_dir: PathBuf,
    /// Engine configuration directory.
    pub config_dir: PathBuf,
    /// Host directory holding the embedded provisioning SDK that gets
    /// pushed into every container.
    pub sdk_dir: PathBuf,
    /// Filesystem root probed for GPU device nodes and libraries.
    /// Overridden in tests.
    pub host_root: PathBuf,
    pub default_unprivileged: bool,
    /// Graceful shutdown timeout in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            node: "pve".to_string(),
            pool: String::new(),
            storage: "local-lvm".to_string(),
            template_storage: "local".to_string(),
            bridge: "vmbr0".to_string(),
            data_dir: PathBuf::from("/var/lib/appdock"),
            config_dir: PathBuf::from("/etc/appdock"),
            sdk_dir: PathBuf::from("/var/lib/appdock/sdk"),
            host_root: PathBuf::from("/"),
            default_unprivileged: true,
            shutdown_timeout_secs: 30,
        }
    }
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("appdock.db")
    }

    pub fn gpu_staging_dir(&self) -> PathBuf {
        self.data_dir.join("nvidia-libs")
    }

    /// Engine-owned directories added to the bind-mount deny list.
    pub fn denied_bind_dirs(&self) -> Vec<String> {
        vec![
            self.data_dir.to_string_lossy().into_owned(),
            self.config_dir.to_string_lossy().into_owned(),
        ]
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
