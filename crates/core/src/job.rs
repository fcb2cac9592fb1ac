// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and pipeline state machine.

use crate::clock::Clock;
use crate::mount::{DevicePassthrough, MountPoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// What kind of lifecycle operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Install,
    Uninstall,
    Reinstall,
    Update,
    Edit,
    Stack,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Install => "install",
            JobType::Uninstall => "uninstall",
            JobType::Reinstall => "reinstall",
            JobType::Update => "update",
            JobType::Edit => "edit",
            JobType::Stack => "stack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "install" => Some(JobType::Install),
            "uninstall" => Some(JobType::Uninstall),
            "reinstall" => Some(JobType::Reinstall),
            "update" => Some(JobType::Update),
            "edit" => Some(JobType::Edit),
            "stack" => Some(JobType::Stack),
            _ => None,
        }
    }

    /// Operations that drive the install pipeline and are subject to the
    /// per-app duplicate guard.
    pub fn is_install_like(&self) -> bool {
        matches!(
            self,
            JobType::Install | JobType::Reinstall | JobType::Update | JobType::Edit
        )
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of the job pipeline.
///
/// Pipeline states run in the order declared here; the three terminal states
/// are final and always carry a `completed_at` timestamp on the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    ValidateRequest,
    ValidateManifest,
    ValidatePlacement,
    AllocateCtid,
    CreateContainer,
    ReadVolumeIds,
    ConfigureContainer,
    StartContainer,
    WaitForNetwork,
    SetupGpuRuntime,
    InstallBasePackages,
    PushAssets,
    Provision,
    Healthcheck,
    CollectOutputs,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::ValidateRequest => "validate_request",
            JobState::ValidateManifest => "validate_manifest",
            JobState::ValidatePlacement => "validate_placement",
            JobState::AllocateCtid => "allocate_ctid",
            JobState::CreateContainer => "create_container",
            JobState::ReadVolumeIds => "read_volume_ids",
            JobState::ConfigureContainer => "configure_container",
            JobState::StartContainer => "start_container",
            JobState::WaitForNetwork => "wait_for_network",
            JobState::SetupGpuRuntime => "setup_gpu_runtime",
            JobState::InstallBasePackages => "install_base_packages",
            JobState::PushAssets => "push_assets",
            JobState::Provision => "provision",
            JobState::Healthcheck => "healthcheck",
            JobState::CollectOutputs => "collect_outputs",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobState::Queued),
            "validate_request" => Some(JobState::ValidateRequest),
            "validate_manifest" => Some(JobState::ValidateManifest),
            "validate_placement" => Some(JobState::ValidatePlacement),
            "allocate_ctid" => Some(JobState::AllocateCtid),
            "create_container" => Some(JobState::CreateContainer),
            "read_volume_ids" => Some(JobState::ReadVolumeIds),
            "configure_container" => Some(JobState::ConfigureContainer),
            "start_container" => Some(JobState::StartContainer),
            "wait_for_network" => Some(JobState::WaitForNetwork),
            "setup_gpu_runtime" => Some(JobState::SetupGpuRuntime),
            "install_base_packages" => Some(JobState::InstallBasePackages),
            "push_assets" => Some(JobState::PushAssets),
            "provision" => Some(JobState::Provision),
            "healthcheck" => Some(JobState::Healthcheck),
            "collect_outputs" => Some(JobState::CollectOutputs),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "cancelled" => Some(JobState::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for creating a new job
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub id: String,
    pub job_type: Option<JobType>,
    pub app_id: String,
    pub app_name: String,
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
    pub hwaddr: String,
    pub onboot: bool,
    pub unprivileged: bool,
    pub inputs: HashMap<String, String>,
    pub mounts: Vec<MountPoint>,
    pub devices: Vec<DevicePassthrough>,
    pub env: HashMap<String, String>,
    pub tags: String,
    pub stack_id: Option<String>,
    /// Preset CTID (uninstall jobs target an existing container).
    pub ctid: u32,
}

/// The engine's unit of asynchronous work.
///
/// A job row survives process restarts; every state transition is persisted
/// before the next pipeline step runs. Only the runner task that owns the job
/// mutates it after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub state: JobState,
    pub app_id: String,
    pub app_name: String,
    /// Allocated container id; 0 until `allocate_ctid` has run.
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
    /// "" (use default), "dhcp", or a CIDR spec.
    pub ip: String,
    /// Preserved MAC address, threaded through edit so the recreated
    /// container keeps its DHCP lease. "" when unset.
    #[serde(default)]
    pub hwaddr: String,
    pub onboot: bool,
    pub unprivileged: bool,
    pub inputs: HashMap<String, String>,
    pub outputs: HashMap<String, String>,
    pub mounts: Vec<MountPoint>,
    pub devices: Vec<DevicePassthrough>,
    pub env: HashMap<String, String>,
    pub tags: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
    /// Non-empty iff the job terminated in `failed` or `cancelled`.
    #[serde(default)]
    pub error: String,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl Job {
    /// Create a new job in the `queued` state.
    pub fn new(config: NewJob, clock: &impl Clock) -> Self {
        let now = clock.epoch_ms();
        Self {
            id: config.id,
            job_type: config.job_type.unwrap_or(JobType::Install),
            state: JobState::Queued,
            app_id: config.app_id,
            app_name: config.app_name,
            ctid: config.ctid,
            node: config.node,
            pool: config.pool,
            storage: config.storage,
            bridge: config.bridge,
            os_template: config.os_template,
            cores: config.cores,
            memory_mb: config.memory_mb,
            disk_gb: config.disk_gb,
            hostname: config.hostname,
            ip: config.ip,
            hwaddr: config.hwaddr,
            onboot: config.onboot,
            unprivileged: config.unprivileged,
            inputs: config.inputs,
            outputs: HashMap::new(),
            mounts: config.mounts,
            devices: config.devices,
            env: config.env,
            tags: config.tags,
            stack_id: config.stack_id,
            error: String::new(),
            created_at_ms: now,
            updated_at_ms: now,
            completed_at_ms: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to a non-terminal pipeline state.
    pub fn advance(&mut self, state: JobState, clock: &impl Clock) {
        debug_assert!(!state.is_terminal());
        self.state = state;
        self.updated_at_ms = clock.epoch_ms();
    }

    /// Move to a terminal state, stamping `completed_at`.
    pub fn finish(&mut self, state: JobState, error: impl Into<String>, clock: &impl Clock) {
        debug_assert!(state.is_terminal());
        let now = clock.epoch_ms();
        self.state = state;
        self.error = error.into();
        self.updated_at_ms = now;
        self.completed_at_ms = Some(now);
    }

    /// Record the allocated container id. Set once, 0 → N.
    pub fn set_ctid(&mut self, ctid: u32, clock: &impl Clock) {
        debug_assert!(self.ctid == 0 || self.ctid == ctid);
        self.ctid = ctid;
        self.updated_at_ms = clock.epoch_ms();
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
