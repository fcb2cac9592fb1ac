// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `ContainerManager` contract.

use appdock_core::{DevicePassthrough, MountKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from host operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("host API error: {0}")]
    Api(String),
    #[error("exec failed: {0}")]
    Exec(String),
    #[error("push failed: {0}")]
    Push(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl ContainerError {
    /// True when the error means the container no longer exists. Stop,
    /// destroy and detach treat this as success.
    pub fn is_gone(&self) -> bool {
        let text = self.to_string().to_lowercase();
        text.contains("does not exist")
            || text.contains("no such container")
            || text.contains("not found")
    }
}

/// Coarse container state as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Stopped,
    Unknown,
}

/// One `mpN` create option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOpt {
    pub index: u32,
    pub kind: MountKind,
    /// Storage pool for a managed volume.
    pub storage: String,
    pub size_gb: u32,
    /// Existing volume to reattach instead of provisioning a new one.
    pub volume_id: String,
    /// Mount path inside the container.
    pub path: String,
    /// Host-side source for bind mounts.
    pub host_path: String,
    pub read_only: bool,
}

/// Everything `Create` needs.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    pub ctid: u32,
    /// Full "storage:vztmpl/..." id; resolve shorthands first.
    pub os_template: String,
    pub storage: String,
    pub rootfs_gb: u32,
    pub cores: u32,
    pub memory_mb: u32,
    pub bridge: String,
    /// Preserved MAC address, if any.
    pub hwaddr: Option<String>,
    pub hostname: String,
    /// "dhcp" or a CIDR spec.
    pub ip: String,
    pub unprivileged: bool,
    pub pool: String,
    pub features: Vec<String>,
    pub onboot: bool,
    pub tags: String,
    pub mounts: Vec<MountOpt>,
}

/// In-place config updates used by reconfigure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateParams {
    pub cores: Option<u32>,
    pub memory_mb: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfo {
    pub kind: String,
    /// Filesystem path; empty when the storage is not browsable.
    pub path: String,
    pub browsable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Adapter for the virtualization host.
///
/// API-level operations take a cancellation token. Shell-level operations
/// (`exec*`, `push*`) do not; a runaway exec is interrupted indirectly by
/// stopping the container.
#[async_trait]
pub trait ContainerManager: Clone + Send + Sync + 'static {
    /// The host's "next free id". Non-reserving: the caller must hold its
    /// allocation lock across this call *and* [`Self::create`].
    async fn next_ctid(&self, cancel: &CancellationToken) -> Result<u32, ContainerError>;

    async fn create(
        &self,
        opts: &CreateOpts,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError>;

    async fn start(&self, ctid: u32, cancel: &CancellationToken) -> Result<(), ContainerError>;

    /// Force stop.
    async fn stop(&self, ctid: u32, cancel: &CancellationToken) -> Result<(), ContainerError>;

    /// Graceful shutdown with a timeout in seconds.
    async fn shutdown(
        &self,
        ctid: u32,
        timeout_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError>;

    async fn destroy(
        &self,
        ctid: u32,
        keep_volumes: bool,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError>;

    async fn status(&self, ctid: u32) -> Result<ContainerStatus, ContainerError>;

    async fn status_detail(&self, ctid: u32) -> Result<HashMap<String, String>, ContainerError>;

    /// The container's IP, once the guest network is up.
    async fn ip(&self, ctid: u32) -> Result<Option<String>, ContainerError>;

    /// Raw container config: keys like `mp0` and `net0`, values
    /// comma-joined `key=value` lists.
    async fn config(&self, ctid: u32) -> Result<HashMap<String, String>, ContainerError>;

    async fn update_config(
        &self,
        ctid: u32,
        params: &UpdateParams,
    ) -> Result<(), ContainerError>;

    /// Remove managed volume entries from the config without destroying
    /// the backing volumes.
    async fn detach_mount_points(&self, ctid: u32, indexes: &[u32])
        -> Result<(), ContainerError>;

    /// Resolve a template shorthand to a full "storage:filename" id. May
    /// download; synchronous from the caller's point of view.
    async fn resolve_template(
        &self,
        shorthand: &str,
        storage: &str,
    ) -> Result<String, ContainerError>;

    async fn exec(&self, ctid: u32, cmd: &[String]) -> Result<ExecOutput, ContainerError>;

    /// Run a command, invoking `on_line` for every output line. Returns the
    /// exit code.
    async fn exec_stream(
        &self,
        ctid: u32,
        cmd: &[String],
        on_line: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<i32, ContainerError>;

    async fn exec_script(&self, ctid: u32, script: &str) -> Result<ExecOutput, ContainerError>;

    /// Write bytes to a file inside the container.
    async fn push(
        &self,
        ctid: u32,
        dest: &str,
        content: &[u8],
        mode: &str,
    ) -> Result<(), ContainerError>;

    /// Recursively copy a host directory into the container.
    async fn push_dir(&self, ctid: u32, src: &Path, dest: &str) -> Result<(), ContainerError>;

    /// Host-side device passthrough (cgroup allow + dev node entries).
    async fn configure_devices(
        &self,
        ctid: u32,
        devices: &[DevicePassthrough],
    ) -> Result<(), ContainerError>;

    /// Bind-mount a host path into the container via its config.
    async fn mount_host_path(
        &self,
        ctid: u32,
        host_path: &Path,
        container_path: &str,
        read_only: bool,
    ) -> Result<(), ContainerError>;

    /// Append raw allow-listed lines to the container's config.
    async fn append_lxc_config(
        &self,
        ctid: u32,
        lines: &[String],
    ) -> Result<(), ContainerError>;

    async fn storage_info(&self, id: &str) -> Result<StorageInfo, ContainerError>;
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
