// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The install pipeline: an ordered step table over the job state machine.
//!
//! Every compound operation that materializes a container funnels through
//! this table; the per-operation differences live in the pre/post hooks in
//! `runner.rs` and in the stack-aware branches of individual steps.

use crate::applog::{self, AppLogLine};
use crate::error::StepError;
use crate::provision::{self, Action};
use crate::runner::Runner;
use appdock_catalog::{self as catalog, Catalog};
use appdock_container::{ContainerManager, CreateOpts, MountOpt};
use appdock_core::{Clock, JobState, LogLevel, StackAppStatus};
use std::collections::HashMap;
use std::time::Duration;

/// Run order. Terminal states are reached only through the runner's
/// completion/failure/cancellation paths.
pub(crate) const PIPELINE: &[JobState] = &[
    JobState::ValidateRequest,
    JobState::ValidateManifest,
    JobState::ValidatePlacement,
    JobState::AllocateCtid,
    JobState::CreateContainer,
    JobState::ReadVolumeIds,
    JobState::ConfigureContainer,
    JobState::StartContainer,
    JobState::WaitForNetwork,
    JobState::SetupGpuRuntime,
    JobState::InstallBasePackages,
    JobState::PushAssets,
    JobState::Provision,
    JobState::Healthcheck,
    JobState::CollectOutputs,
];

const NETWORK_WAIT_ATTEMPTS: u32 = 30;
const NETWORK_WAIT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed,
    Failed,
    Cancelled,
}

impl<M, K, C> Runner<M, K, C>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    /// Drive the job through the step table. The cancellation signal is
    /// checked between any two steps; a step error promotes the job to
    /// `failed` unless the signal explains it.
    pub(crate) async fn run_pipeline(&mut self) -> Outcome {
        for state in PIPELINE {
            if self.cancel.is_cancelled() {
                self.cancelled_terminal().await;
                return Outcome::Cancelled;
            }
            if let Err(err) = self.transition(*state) {
                self.fail_step(*state, err).await;
                return Outcome::Failed;
            }
            match self.run_step(*state).await {
                Ok(()) => {}
                Err(_) if self.cancel.is_cancelled() => {
                    self.cancelled_terminal().await;
                    return Outcome::Cancelled;
                }
                Err(err) => {
                    self.fail_step(*state, err).await;
                    return Outcome::Failed;
                }
            }
        }
        Outcome::Completed
    }

    fn transition(&mut self, state: JobState) -> Result<(), StepError> {
        self.job.advance(state, &self.inner.clock);
        self.persist_job()?;
        self.log(LogLevel::Info, &format!("Entering {}", state.as_str()));
        Ok(())
    }

    async fn run_step(&mut self, state: JobState) -> Result<(), StepError> {
        match state {
            JobState::ValidateRequest => self.step_validate_request(),
            JobState::ValidateManifest => self.step_validate_manifest(),
            JobState::ValidatePlacement => self.step_validate_placement().await,
            JobState::AllocateCtid => self.step_allocate_ctid().await,
            JobState::CreateContainer => self.step_create_container().await,
            JobState::ReadVolumeIds => self.step_read_volume_ids().await,
            JobState::ConfigureContainer => self.step_configure_container().await,
            JobState::StartContainer => self.step_start_container().await,
            JobState::WaitForNetwork => self.step_wait_for_network().await,
            JobState::SetupGpuRuntime => self.step_setup_gpu_runtime().await,
            JobState::InstallBasePackages => self.step_install_base_packages().await,
            JobState::PushAssets => self.step_push_assets().await,
            JobState::Provision => self.step_provision().await,
            JobState::Healthcheck => self.step_healthcheck().await,
            JobState::CollectOutputs => self.step_collect_outputs(),
            // Terminal states never appear in the table.
            _ => Ok(()),
        }
    }

    // ----- validation steps --------------------------------------------

    fn step_validate_request(&mut self) -> Result<(), StepError> {
        match &self.stack {
            None => {
                let manifest = &self.manifests[0];
                catalog::validate_inputs(&manifest.inputs, &self.job.inputs)?;
            }
            Some(stack) => {
                for (app, manifest) in stack.apps.iter().zip(&self.manifests) {
                    catalog::validate_inputs(&manifest.inputs, &app.inputs)?;
                }
            }
        }
        Ok(())
    }

    fn step_validate_manifest(&mut self) -> Result<(), StepError> {
        for manifest in &self.manifests {
            manifest.validate()?;
        }
        if let Some(first) = self.manifests.first() {
            for manifest in &self.manifests[1..] {
                if manifest.os_template != first.os_template {
                    return Err(StepError::new(format!(
                        "apps {} and {} declare different os templates",
                        first.id, manifest.id
                    )));
                }
            }
        }
        Ok(())
    }

    async fn step_validate_placement(&mut self) -> Result<(), StepError> {
        if self.job.storage.is_empty() {
            return Err(StepError::new("no storage pool selected"));
        }
        if self.job.bridge.is_empty() {
            return Err(StepError::new("no network bridge selected"));
        }
        let info = self.inner.manager.storage_info(&self.job.storage).await?;
        self.log(
            LogLevel::Info,
            &format!("Placing rootfs on {} ({})", self.job.storage, info.kind),
        );
        Ok(())
    }

    // ----- container lifecycle steps -----------------------------------

    /// Takes the engine-wide CTID mutex. The host's "next free id" is
    /// non-reserving, so the lock is held until `create_container` has
    /// claimed the id (see `step_create_container`).
    async fn step_allocate_ctid(&mut self) -> Result<(), StepError> {
        let guard = self.inner.ctid_mu.clone().lock_owned().await;
        self.ctid_guard = Some(guard);

        let ctid = self.inner.manager.next_ctid(&self.cancel).await?;
        self.job.set_ctid(ctid, &self.inner.clock);
        self.persist_job()?;
        self.log(LogLevel::Info, &format!("Allocated CTID {ctid}"));
        Ok(())
    }

    async fn step_create_container(&mut self) -> Result<(), StepError> {
        let template = self
            .inner
            .manager
            .resolve_template(&self.job.os_template, &self.inner.config.template_storage)
            .await?;
        self.job.os_template = template.clone();

        let mut features: Vec<String> = Vec::new();
        for manifest in &self.manifests {
            for feature in &manifest.features {
                if !features.contains(feature) {
                    features.push(feature.clone());
                }
            }
        }

        let job = &self.job;
        let opts = CreateOpts {
            ctid: job.ctid,
            os_template: template,
            storage: job.storage.clone(),
            rootfs_gb: job.disk_gb,
            cores: job.cores,
            memory_mb: job.memory_mb,
            bridge: job.bridge.clone(),
            hwaddr: (!job.hwaddr.is_empty()).then(|| job.hwaddr.clone()),
            hostname: job.hostname.clone(),
            ip: if job.ip.is_empty() {
                "dhcp".to_string()
            } else {
                job.ip.clone()
            },
            unprivileged: job.unprivileged,
            pool: job.pool.clone(),
            features,
            onboot: job.onboot,
            tags: job.tags.clone(),
            mounts: job
                .mounts
                .iter()
                .map(|m| MountOpt {
                    index: m.index,
                    kind: m.kind,
                    storage: m.storage.clone(),
                    size_gb: m.size_gb,
                    volume_id: m.volume_id.clone(),
                    path: m.path.clone(),
                    host_path: m.host_path.clone(),
                    read_only: m.read_only,
                })
                .collect(),
        };

        let result = self.inner.manager.create(&opts, &self.cancel).await;
        // The id is claimed (or the attempt is over); later jobs may
        // allocate again.
        self.ctid_guard.take();
        result?;

        self.persist_job()?;
        self.log(LogLevel::Info, &format!("Created container {}", self.job.ctid));
        Ok(())
    }

    async fn step_read_volume_ids(&mut self) -> Result<(), StepError> {
        if !self.job.mounts.iter().any(|m| m.is_managed_volume()) {
            return Ok(());
        }
        let config = self.inner.manager.config(self.job.ctid).await?;
        for mount in self
            .job
            .mounts
            .iter_mut()
            .filter(|m| m.is_managed_volume())
        {
            if let Some(value) = config.get(&format!("mp{}", mount.index)) {
                let volume_id = value.split(',').next().unwrap_or_default();
                mount.volume_id = volume_id.to_string();
            }
        }
        if let Some(stack) = &mut self.stack {
            stack.mounts = self.job.mounts.clone();
        }
        self.persist_job()?;
        Ok(())
    }

    async fn step_configure_container(&mut self) -> Result<(), StepError> {
        let ctid = self.job.ctid;
        if !self.job.devices.is_empty() {
            self.inner
                .manager
                .configure_devices(ctid, &self.job.devices)
                .await?;
            self.log(
                LogLevel::Info,
                &format!("Configured {} passthrough device(s)", self.job.devices.len()),
            );
        }

        let wants_nvidia = self.job.devices.iter().any(|d| d.path.contains("nvidia"));
        if wants_nvidia {
            let staging = self.inner.config.gpu_staging_dir();
            if let Some(dir) = self.inner.gpu.stage_nvidia_libs(&staging)? {
                self.inner
                    .manager
                    .mount_host_path(ctid, &dir, provision::NVIDIA_MOUNT_PATH, true)
                    .await?;
                self.nvidia_mounted = true;
                self.log(LogLevel::Info, "Mounted NVIDIA userspace libraries");
            } else {
                self.log(
                    LogLevel::Warn,
                    "NVIDIA device requested but no userspace libraries found on host",
                );
            }
        }

        let mut lines = Vec::new();
        for manifest in &self.manifests {
            for line in &manifest.extra_config {
                appdock_core::validate::validate_extra_config(line)?;
                lines.push(line.clone());
            }
        }
        if !lines.is_empty() {
            self.inner.manager.append_lxc_config(ctid, &lines).await?;
            self.log(
                LogLevel::Info,
                &format!("Applied {} extra config line(s)", lines.len()),
            );
        }
        Ok(())
    }

    async fn step_start_container(&mut self) -> Result<(), StepError> {
        self.inner.manager.start(self.job.ctid, &self.cancel).await?;
        self.log(LogLevel::Info, &format!("Started container {}", self.job.ctid));
        Ok(())
    }

    /// Soft step: a container without an address can still provision;
    /// output templates just render without an IP.
    async fn step_wait_for_network(&mut self) -> Result<(), StepError> {
        for attempt in 0..NETWORK_WAIT_ATTEMPTS {
            if self.cancel.is_cancelled() {
                return Err(StepError::new("cancelled"));
            }
            if let Some(ip) = self.inner.manager.ip(self.job.ctid).await? {
                self.ip = Some(ip.clone());
                self.log(LogLevel::Info, &format!("Container IP: {ip}"));
                return Ok(());
            }
            if attempt + 1 < NETWORK_WAIT_ATTEMPTS {
                tokio::time::sleep(NETWORK_WAIT_DELAY).await;
            }
        }
        self.log(
            LogLevel::Warn,
            "Timed out waiting for container network; continuing",
        );
        Ok(())
    }

    async fn step_setup_gpu_runtime(&mut self) -> Result<(), StepError> {
        if !self.nvidia_mounted {
            return Ok(());
        }
        let script = format!(
            "echo '{}' > {} && ldconfig",
            provision::NVIDIA_MOUNT_PATH,
            provision::NVIDIA_LD_CONF_PATH
        );
        let out = self.inner.manager.exec_script(self.job.ctid, &script).await?;
        if out.exit_code != 0 {
            return Err(StepError::new(format!(
                "ldconfig setup exited with status {}",
                out.exit_code
            )));
        }
        self.log(LogLevel::Info, "Configured NVIDIA runtime in container");
        Ok(())
    }

    async fn step_install_base_packages(&mut self) -> Result<(), StepError> {
        let cmd = vec![
            "sh".to_string(),
            "-lc".to_string(),
            "export DEBIAN_FRONTEND=noninteractive; \
             apt-get update -qq && \
             apt-get install -y -qq python3 ca-certificates curl"
                .to_string(),
        ];
        let (_, _, exit) = self.exec_streamed(&cmd, "setup").await?;
        if exit != 0 {
            return Err(StepError::new(format!(
                "base package install exited with status {exit}"
            )));
        }
        Ok(())
    }

    async fn step_push_assets(&mut self) -> Result<(), StepError> {
        let ctid = self.job.ctid;

        let out = self
            .inner
            .manager
            .exec(ctid, &["python3".to_string(), "--version".to_string()])
            .await?;
        if out.exit_code != 0 {
            return Err(StepError::new("python3 is not available in the container"));
        }

        self.inner
            .manager
            .push_dir(ctid, &self.inner.config.sdk_dir, provision::SDK_DIR)
            .await?;

        match &self.stack {
            None => {
                let manifest = &self.manifests[0];
                let paths = provision::single_app_paths(&manifest.provision.script);
                self.push_app_files(&self.job.inputs, &manifest.permissions, &paths)
                    .await?;
                if let Some(dir) = self.inner.catalog.provision_dir(&self.job.app_id) {
                    self.inner
                        .manager
                        .push_dir(ctid, &dir, provision::PROVISION_DIR)
                        .await?;
                }
            }
            Some(stack) => {
                // Apps share one container, so every app gets the union of
                // the declared permission allow-lists.
                let mut permissions = appdock_catalog::PermissionSpec::default();
                for manifest in &self.manifests {
                    for command in &manifest.permissions.allow {
                        if !permissions.allow.contains(command) {
                            permissions.allow.push(command.clone());
                        }
                    }
                }
                for (app, manifest) in stack.apps.iter().zip(&self.manifests) {
                    let paths = provision::stack_app_paths(&app.app_id, &manifest.provision.script);
                    self.push_app_files(&app.inputs, &permissions, &paths).await?;
                    if let Some(dir) = self.inner.catalog.provision_dir(&app.app_id) {
                        let dest = format!("{}/{}", provision::PROVISION_DIR, app.app_id);
                        self.inner.manager.push_dir(ctid, &dir, &dest).await?;
                    }
                }
            }
        }
        self.log(LogLevel::Info, "Pushed provisioning assets");
        Ok(())
    }

    async fn push_app_files(
        &self,
        inputs: &HashMap<String, String>,
        permissions: &appdock_catalog::PermissionSpec,
        paths: &provision::RunnerPaths,
    ) -> Result<(), StepError> {
        let ctid = self.job.ctid;
        let inputs_json = serde_json::to_vec_pretty(inputs)?;
        self.inner
            .manager
            .push(ctid, &paths.inputs, &inputs_json, "0600")
            .await?;
        let permissions_json = serde_json::to_vec_pretty(permissions)?;
        self.inner
            .manager
            .push(ctid, &paths.permissions, &permissions_json, "0644")
            .await?;
        Ok(())
    }

    // ----- provisioning ------------------------------------------------

    async fn step_provision(&mut self) -> Result<(), StepError> {
        if self.stack.is_some() {
            self.provision_stack().await
        } else {
            self.provision_single().await
        }
    }

    async fn provision_single(&mut self) -> Result<(), StepError> {
        let manifest = self.manifests[0].clone();
        let paths = provision::single_app_paths(&manifest.provision.script);
        let cmd = provision::runner_cmd(Action::Install, &paths, &self.job.env);

        self.log(LogLevel::Info, &format!("Provisioning {}", self.job.app_name));
        let (outputs, last_error, exit) = self.exec_streamed(&cmd, "provision").await?;
        self.job.outputs.extend(outputs);
        self.persist_job()?;

        if exit != 0 {
            return Err(StepError::new(match last_error {
                Some(message) => format!("provisioning failed: {message}"),
                None => format!("provisioning exited with status {exit}"),
            }));
        }
        Ok(())
    }

    /// Per-app failure does not abort the stack: the app is marked failed
    /// and the loop continues.
    async fn provision_stack(&mut self) -> Result<(), StepError> {
        let manifests = self.manifests.clone();
        for index in 0..manifests.len() {
            if self.cancel.is_cancelled() {
                return Err(StepError::new("cancelled"));
            }
            let manifest = &manifests[index];
            let app_id = {
                let stack = self.stack.as_mut().ok_or_else(|| StepError::new("no stack"))?;
                let app = &mut stack.apps[index];
                app.status = StackAppStatus::Provisioning;
                app.app_id.clone()
            };

            self.log(LogLevel::Info, &format!("[{app_id}] provisioning"));
            let paths = provision::stack_app_paths(&app_id, &manifest.provision.script);
            let cmd = provision::runner_cmd(Action::Install, &paths, &self.job.env);
            let result = self.exec_streamed(&cmd, &app_id).await;

            let stack = self.stack.as_mut().ok_or_else(|| StepError::new("no stack"))?;
            let app = &mut stack.apps[index];
            match result {
                Ok((outputs, _, 0)) => {
                    app.outputs = outputs;
                    app.status = StackAppStatus::Completed;
                }
                Ok((_, last_error, exit)) => {
                    app.status = StackAppStatus::Failed;
                    app.error = last_error
                        .unwrap_or_else(|| format!("provision exited with status {exit}"));
                    let error = app.error.clone();
                    self.log(LogLevel::Error, &format!("[{app_id}] {error}"));
                }
                Err(err) => {
                    app.status = StackAppStatus::Failed;
                    app.error = err.to_string();
                    self.log(LogLevel::Error, &format!("[{app_id}] {err}"));
                }
            }
        }
        Ok(())
    }

    /// Soft step: a failing healthcheck is recorded, never fatal.
    async fn step_healthcheck(&mut self) -> Result<(), StepError> {
        match &self.stack {
            None => {
                let manifest = &self.manifests[0];
                let paths = provision::single_app_paths(&manifest.provision.script);
                let cmd = provision::runner_cmd(Action::Healthcheck, &paths, &self.job.env);
                match self.exec_streamed(&cmd, "healthcheck").await {
                    Ok((_, _, 0)) => {}
                    Ok((_, _, exit)) => self.log(
                        LogLevel::Warn,
                        &format!("Healthcheck exited with status {exit}"),
                    ),
                    Err(err) => self.log(LogLevel::Warn, &format!("Healthcheck failed: {err}")),
                }
            }
            Some(stack) => {
                for (app, manifest) in stack.apps.iter().zip(&self.manifests) {
                    if app.status != StackAppStatus::Completed {
                        continue;
                    }
                    let paths = provision::stack_app_paths(&app.app_id, &manifest.provision.script);
                    let cmd = provision::runner_cmd(Action::Healthcheck, &paths, &self.job.env);
                    match self.exec_streamed(&cmd, &app.app_id).await {
                        Ok((_, _, 0)) => {}
                        Ok((_, _, exit)) => self.log(
                            LogLevel::Warn,
                            &format!("[{}] healthcheck exited with status {exit}", app.app_id),
                        ),
                        Err(err) => self.log(
                            LogLevel::Warn,
                            &format!("[{}] healthcheck failed: {err}", app.app_id),
                        ),
                    }
                }
            }
        }
        Ok(())
    }

    /// Render declared outputs: `{{ip}}` and `{{<input-key>}}` are literal
    /// text replacements applied after provisioning.
    fn step_collect_outputs(&mut self) -> Result<(), StepError> {
        let ip = self.ip.clone().unwrap_or_default();
        match &mut self.stack {
            None => {
                let manifest = &self.manifests[0];
                for (key, template) in &manifest.outputs {
                    let value = render_output(template, &ip, &self.job.inputs);
                    self.job.outputs.insert(key.clone(), value);
                }
                self.persist_job()?;
                self.log(
                    LogLevel::Info,
                    &format!("Collected {} output value(s)", self.job.outputs.len()),
                );
            }
            Some(stack) => {
                for (app, manifest) in stack.apps.iter_mut().zip(&self.manifests) {
                    for (key, template) in &manifest.outputs {
                        let value = render_output(template, &ip, &app.inputs);
                        app.outputs.insert(key.clone(), value);
                    }
                }
            }
        }
        Ok(())
    }

    // ----- exec plumbing -----------------------------------------------

    /// Run a command inside the container, streaming output into the job
    /// log. Sentinel lines become structured rows and outputs; everything
    /// else is recorded as plain info prefixed with the source.
    async fn exec_streamed(
        &self,
        cmd: &[String],
        prefix: &str,
    ) -> Result<(HashMap<String, String>, Option<String>, i32), StepError> {
        let store = &self.inner.store;
        let clock = &self.inner.clock;
        let job_id = self.job.id.clone();

        let mut outputs = HashMap::new();
        let mut last_error: Option<String> = None;
        let mut on_line = |raw: &str| {
            let line = raw.trim();
            if line.is_empty() {
                return;
            }
            match applog::parse_line(line) {
                Some(AppLogLine::Message { level, message }) => {
                    if level == LogLevel::Error {
                        last_error = Some(message.clone());
                    }
                    if let Err(err) = store.append_log(&job_id, level, &message, clock.epoch_ns())
                    {
                        tracing::warn!(job_id = %job_id, %err, "failed to append sdk log line");
                    }
                }
                Some(AppLogLine::Output { key, value }) => {
                    outputs.insert(key, value);
                }
                None => {
                    let message = format!("[{prefix}] {line}");
                    if let Err(err) =
                        store.append_log(&job_id, LogLevel::Info, &message, clock.epoch_ns())
                    {
                        tracing::warn!(job_id = %job_id, %err, "failed to append log line");
                    }
                }
            }
        };

        let exit = self
            .inner
            .manager
            .exec_stream(self.job.ctid, cmd, &mut on_line)
            .await?;
        Ok((outputs, last_error, exit))
    }
}

fn render_output(template: &str, ip: &str, inputs: &HashMap<String, String>) -> String {
    let mut value = template.replace("{{ip}}", ip);
    for (key, input) in inputs {
        value = value.replace(&format!("{{{{{key}}}}}"), input);
    }
    value
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
