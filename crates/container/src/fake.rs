// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake container manager for testing

use super::{
    ContainerError, ContainerManager, ContainerStatus, CreateOpts, ExecOutput, StorageInfo,
    UpdateParams,
};
use appdock_core::{DevicePassthrough, MountKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Recorded manager call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCall {
    NextCtid,
    Create { ctid: u32 },
    Start { ctid: u32 },
    Stop { ctid: u32 },
    Shutdown { ctid: u32, timeout_secs: u64 },
    Destroy { ctid: u32, keep_volumes: bool },
    DetachMountPoints { ctid: u32, indexes: Vec<u32> },
    UpdateConfig { ctid: u32 },
    ResolveTemplate { shorthand: String },
    Exec { ctid: u32, cmd: Vec<String> },
    ExecStream { ctid: u32, cmd: Vec<String> },
    ExecScript { ctid: u32 },
    Push { ctid: u32, dest: String },
    PushDir { ctid: u32, dest: String },
    ConfigureDevices { ctid: u32 },
    MountHostPath { ctid: u32, container_path: String },
    AppendLxcConfig { ctid: u32 },
}

/// Fake container state
#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub status: ContainerStatus,
    pub config: HashMap<String, String>,
    pub ip: Option<String>,
    pub pushed: Vec<String>,
    pub pushed_dirs: Vec<String>,
    pub devices: Vec<DevicePassthrough>,
    pub appended: Vec<String>,
    pub host_mounts: Vec<(PathBuf, String, bool)>,
}

struct FakeState {
    containers: HashMap<u32, FakeContainer>,
    calls: Vec<ManagerCall>,
    next_ctid: u32,
    /// op name → queued error messages, popped one per call
    failures: HashMap<&'static str, VecDeque<String>>,
    /// scripted (lines, exit code) results for exec_stream, popped per call
    exec_scripts: VecDeque<(Vec<String>, i32)>,
    /// exec_stream blocks until the container stops, then exits 137
    block_exec: bool,
    /// containers never report an IP (network-wait timeout path)
    no_ip: bool,
    storages: HashMap<String, StorageInfo>,
}

/// Fake container manager for testing.
///
/// Mimics the host contract closely enough for the engine: `next_ctid` is
/// deliberately non-reserving (repeated calls return the same id until a
/// container is created with it), containers carry an `mpN`/`net0` config
/// map, and "already gone" errors use the host's wording.
#[derive(Clone)]
pub struct FakeContainerManager {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeContainerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeContainerManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                containers: HashMap::new(),
                calls: Vec::new(),
                next_ctid: 100,
                failures: HashMap::new(),
                exec_scripts: VecDeque::new(),
                block_exec: false,
                no_ip: false,
                storages: HashMap::new(),
            })),
        }
    }

    /// Queue one error for the named op (`"create"`, `"destroy"`, ...).
    pub fn fail_once(&self, op: &'static str, message: &str) {
        self.inner
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(message.to_string());
    }

    /// Queue `n` errors for the named op.
    pub fn fail_times(&self, op: &'static str, message: &str, n: usize) {
        for _ in 0..n {
            self.fail_once(op, message);
        }
    }

    /// Script the next `exec_stream` call: these lines, then this exit code.
    pub fn script_exec(&self, lines: &[&str], exit_code: i32) {
        self.inner.lock().exec_scripts.push_back((
            lines.iter().map(|l| l.to_string()).collect(),
            exit_code,
        ));
    }

    /// Make `exec_stream` block until the container is stopped (simulates a
    /// long in-container install interrupted by force-stop).
    pub fn set_block_exec(&self, block: bool) {
        self.inner.lock().block_exec = block;
    }

    /// Containers stop reporting an IP (network-wait timeout path).
    pub fn set_no_ip(&self, no_ip: bool) {
        self.inner.lock().no_ip = no_ip;
    }

    pub fn set_storage(&self, id: &str, info: StorageInfo) {
        self.inner.lock().storages.insert(id.to_string(), info);
    }

    /// Overwrite a config entry (e.g. plant a known hwaddr on `net0`).
    pub fn set_config_value(&self, ctid: u32, key: &str, value: &str) {
        if let Some(container) = self.inner.lock().containers.get_mut(&ctid) {
            container.config.insert(key.to_string(), value.to_string());
        }
    }

    pub fn calls(&self) -> Vec<ManagerCall> {
        self.inner.lock().calls.clone()
    }

    pub fn container(&self, ctid: u32) -> Option<FakeContainer> {
        self.inner.lock().containers.get(&ctid).cloned()
    }

    pub fn exists(&self, ctid: u32) -> bool {
        self.inner.lock().containers.contains_key(&ctid)
    }

    fn record(&self, call: ManagerCall) {
        self.inner.lock().calls.push(call);
    }

    fn take_failure(&self, op: &'static str) -> Option<String> {
        self.inner
            .lock()
            .failures
            .get_mut(op)
            .and_then(VecDeque::pop_front)
    }

    fn check(
        &self,
        op: &'static str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ContainerError> {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                return Err(ContainerError::Cancelled);
            }
        }
        match self.take_failure(op) {
            Some(message) => Err(ContainerError::Api(message)),
            None => Ok(()),
        }
    }

    fn gone(ctid: u32) -> ContainerError {
        ContainerError::Api(format!("container {ctid} does not exist"))
    }

    fn fake_hwaddr(ctid: u32) -> String {
        format!(
            "BC:24:11:{:02X}:{:02X}:{:02X}",
            (ctid >> 16) & 0xff,
            (ctid >> 8) & 0xff,
            ctid & 0xff
        )
    }
}

#[async_trait]
impl ContainerManager for FakeContainerManager {
    async fn next_ctid(&self, cancel: &CancellationToken) -> Result<u32, ContainerError> {
        self.record(ManagerCall::NextCtid);
        self.check("next_ctid", Some(cancel))?;
        // Non-reserving: does not advance until a container is created.
        Ok(self.inner.lock().next_ctid)
    }

    async fn create(
        &self,
        opts: &CreateOpts,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError> {
        self.record(ManagerCall::Create { ctid: opts.ctid });
        self.check("create", Some(cancel))?;

        let mut state = self.inner.lock();
        if state.containers.contains_key(&opts.ctid) {
            return Err(ContainerError::Api(format!(
                "unable to create CT {}: config file already exists",
                opts.ctid
            )));
        }

        let mut config = HashMap::new();
        config.insert(
            "rootfs".to_string(),
            format!("{}:vm-{}-disk-0,size={}G", opts.storage, opts.ctid, opts.rootfs_gb),
        );
        for mount in &opts.mounts {
            let value = match mount.kind {
                MountKind::Volume => {
                    let volume_id = if mount.volume_id.is_empty() {
                        let storage = if mount.storage.is_empty() {
                            &opts.storage
                        } else {
                            &mount.storage
                        };
                        format!("{}:vm-{}-disk-{}", storage, opts.ctid, mount.index + 1)
                    } else {
                        mount.volume_id.clone()
                    };
                    format!("{},mp={},size={}G", volume_id, mount.path, mount.size_gb)
                }
                MountKind::Bind => format!("{},mp={}", mount.host_path, mount.path),
            };
            config.insert(format!("mp{}", mount.index), value);
        }
        let hwaddr = opts
            .hwaddr
            .clone()
            .unwrap_or_else(|| Self::fake_hwaddr(opts.ctid));
        config.insert(
            "net0".to_string(),
            format!(
                "name=eth0,bridge={},hwaddr={},ip={},type=veth",
                opts.bridge, hwaddr, opts.ip
            ),
        );
        config.insert("cores".to_string(), opts.cores.to_string());
        config.insert("memory".to_string(), opts.memory_mb.to_string());

        state.containers.insert(
            opts.ctid,
            FakeContainer {
                status: ContainerStatus::Stopped,
                config,
                ip: None,
                pushed: Vec::new(),
                pushed_dirs: Vec::new(),
                devices: Vec::new(),
                appended: Vec::new(),
                host_mounts: Vec::new(),
            },
        );
        if opts.ctid >= state.next_ctid {
            state.next_ctid = opts.ctid + 1;
        }
        Ok(())
    }

    async fn start(&self, ctid: u32, cancel: &CancellationToken) -> Result<(), ContainerError> {
        self.record(ManagerCall::Start { ctid });
        self.check("start", Some(cancel))?;
        let mut state = self.inner.lock();
        let no_ip = state.no_ip;
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        container.status = ContainerStatus::Running;
        if !no_ip {
            container.ip = Some(format!("192.168.100.{}", ctid % 200));
        }
        Ok(())
    }

    async fn stop(&self, ctid: u32, cancel: &CancellationToken) -> Result<(), ContainerError> {
        self.record(ManagerCall::Stop { ctid });
        self.check("stop", Some(cancel))?;
        let mut state = self.inner.lock();
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        container.status = ContainerStatus::Stopped;
        container.ip = None;
        Ok(())
    }

    async fn shutdown(
        &self,
        ctid: u32,
        timeout_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError> {
        self.record(ManagerCall::Shutdown { ctid, timeout_secs });
        self.check("shutdown", Some(cancel))?;
        let mut state = self.inner.lock();
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        container.status = ContainerStatus::Stopped;
        container.ip = None;
        Ok(())
    }

    async fn destroy(
        &self,
        ctid: u32,
        keep_volumes: bool,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError> {
        self.record(ManagerCall::Destroy { ctid, keep_volumes });
        self.check("destroy", Some(cancel))?;
        let mut state = self.inner.lock();
        state
            .containers
            .remove(&ctid)
            .map(|_| ())
            .ok_or_else(|| Self::gone(ctid))
    }

    async fn status(&self, ctid: u32) -> Result<ContainerStatus, ContainerError> {
        let state = self.inner.lock();
        Ok(state
            .containers
            .get(&ctid)
            .map_or(ContainerStatus::Unknown, |c| c.status))
    }

    async fn status_detail(&self, ctid: u32) -> Result<HashMap<String, String>, ContainerError> {
        let state = self.inner.lock();
        let container = state.containers.get(&ctid).ok_or_else(|| Self::gone(ctid))?;
        let mut detail = HashMap::new();
        detail.insert(
            "status".to_string(),
            match container.status {
                ContainerStatus::Running => "running",
                ContainerStatus::Stopped => "stopped",
                ContainerStatus::Unknown => "unknown",
            }
            .to_string(),
        );
        Ok(detail)
    }

    async fn ip(&self, ctid: u32) -> Result<Option<String>, ContainerError> {
        let state = self.inner.lock();
        Ok(state.containers.get(&ctid).and_then(|c| c.ip.clone()))
    }

    async fn config(&self, ctid: u32) -> Result<HashMap<String, String>, ContainerError> {
        let state = self.inner.lock();
        state
            .containers
            .get(&ctid)
            .map(|c| c.config.clone())
            .ok_or_else(|| Self::gone(ctid))
    }

    async fn update_config(
        &self,
        ctid: u32,
        params: &UpdateParams,
    ) -> Result<(), ContainerError> {
        self.record(ManagerCall::UpdateConfig { ctid });
        self.check("update_config", None)?;
        let mut state = self.inner.lock();
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        if let Some(cores) = params.cores {
            container.config.insert("cores".to_string(), cores.to_string());
        }
        if let Some(memory_mb) = params.memory_mb {
            container
                .config
                .insert("memory".to_string(), memory_mb.to_string());
        }
        Ok(())
    }

    async fn detach_mount_points(
        &self,
        ctid: u32,
        indexes: &[u32],
    ) -> Result<(), ContainerError> {
        self.record(ManagerCall::DetachMountPoints {
            ctid,
            indexes: indexes.to_vec(),
        });
        self.check("detach_mount_points", None)?;
        let mut state = self.inner.lock();
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        for index in indexes {
            container.config.remove(&format!("mp{index}"));
        }
        Ok(())
    }

    async fn resolve_template(
        &self,
        shorthand: &str,
        storage: &str,
    ) -> Result<String, ContainerError> {
        self.record(ManagerCall::ResolveTemplate {
            shorthand: shorthand.to_string(),
        });
        self.check("resolve_template", None)?;
        if shorthand.contains(':') {
            Ok(shorthand.to_string())
        } else {
            Ok(format!("{storage}:vztmpl/{shorthand}"))
        }
    }

    async fn exec(&self, ctid: u32, cmd: &[String]) -> Result<ExecOutput, ContainerError> {
        self.record(ManagerCall::Exec {
            ctid,
            cmd: cmd.to_vec(),
        });
        self.check("exec", None)?;
        if !self.exists(ctid) {
            return Err(Self::gone(ctid));
        }
        Ok(ExecOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    async fn exec_stream(
        &self,
        ctid: u32,
        cmd: &[String],
        on_line: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<i32, ContainerError> {
        self.record(ManagerCall::ExecStream {
            ctid,
            cmd: cmd.to_vec(),
        });
        self.check("exec_stream", None)?;
        if !self.exists(ctid) {
            return Err(Self::gone(ctid));
        }

        let scripted = self.inner.lock().exec_scripts.pop_front();
        if let Some((lines, exit_code)) = scripted {
            for line in &lines {
                on_line(line);
            }
            return Ok(exit_code);
        }

        if self.inner.lock().block_exec {
            // Simulate a long-running command: only a force-stop (or
            // destroy) of the container gets us out of here.
            loop {
                {
                    let state = self.inner.lock();
                    match state.containers.get(&ctid) {
                        Some(c) if c.status == ContainerStatus::Running => {}
                        _ => return Ok(137),
                    }
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        }

        Ok(0)
    }

    async fn exec_script(&self, ctid: u32, _script: &str) -> Result<ExecOutput, ContainerError> {
        self.record(ManagerCall::ExecScript { ctid });
        self.check("exec_script", None)?;
        if !self.exists(ctid) {
            return Err(Self::gone(ctid));
        }
        Ok(ExecOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    async fn push(
        &self,
        ctid: u32,
        dest: &str,
        _content: &[u8],
        _mode: &str,
    ) -> Result<(), ContainerError> {
        self.record(ManagerCall::Push {
            ctid,
            dest: dest.to_string(),
        });
        self.check("push", None)?;
        let mut state = self.inner.lock();
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        container.pushed.push(dest.to_string());
        Ok(())
    }

    async fn push_dir(&self, ctid: u32, _src: &Path, dest: &str) -> Result<(), ContainerError> {
        self.record(ManagerCall::PushDir {
            ctid,
            dest: dest.to_string(),
        });
        self.check("push_dir", None)?;
        let mut state = self.inner.lock();
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        container.pushed_dirs.push(dest.to_string());
        Ok(())
    }

    async fn configure_devices(
        &self,
        ctid: u32,
        devices: &[DevicePassthrough],
    ) -> Result<(), ContainerError> {
        self.record(ManagerCall::ConfigureDevices { ctid });
        self.check("configure_devices", None)?;
        let mut state = self.inner.lock();
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        container.devices.extend(devices.iter().cloned());
        Ok(())
    }

    async fn mount_host_path(
        &self,
        ctid: u32,
        host_path: &Path,
        container_path: &str,
        read_only: bool,
    ) -> Result<(), ContainerError> {
        self.record(ManagerCall::MountHostPath {
            ctid,
            container_path: container_path.to_string(),
        });
        self.check("mount_host_path", None)?;
        let mut state = self.inner.lock();
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        container
            .host_mounts
            .push((host_path.to_path_buf(), container_path.to_string(), read_only));
        Ok(())
    }

    async fn append_lxc_config(
        &self,
        ctid: u32,
        lines: &[String],
    ) -> Result<(), ContainerError> {
        self.record(ManagerCall::AppendLxcConfig { ctid });
        self.check("append_lxc_config", None)?;
        let mut state = self.inner.lock();
        let container = state.containers.get_mut(&ctid).ok_or_else(|| Self::gone(ctid))?;
        container.appended.extend(lines.iter().cloned());
        Ok(())
    }

    async fn storage_info(&self, id: &str) -> Result<StorageInfo, ContainerError> {
        let state = self.inner.lock();
        Ok(state.storages.get(id).cloned().unwrap_or(StorageInfo {
            kind: "dir".to_string(),
            path: "/var/lib/vz".to_string(),
            browsable: true,
        }))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
