// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-job runner task.
//!
//! One runner per in-flight job; it is the only mutator of its job row.
//! Compound operations wrap pre/post work around the shared pipeline in
//! `pipeline.rs`.

use crate::engine::EngineInner;
use crate::error::StepError;
use crate::ops::OpPlan;
use crate::pipeline::Outcome;
use appdock_catalog::{AppManifest, Catalog};
use appdock_container::{ContainerError, ContainerManager};
use appdock_core::{
    Clock, IdGen, Install, InstallStatus, Job, JobState, LogLevel, MountPoint, Stack,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

/// Destroy retry policy: backing-storage cleanup occasionally lags.
const DESTROY_ATTEMPTS: u32 = 5;
const DESTROY_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Pause between destroying an old container and recreating it, letting
/// the storage layer release volume names.
const REPLACE_SETTLE_DELAY: Duration = Duration::from_secs(3);
/// Pause between stop and destroy in the failure-cleanup path.
const CLEANUP_STOP_DELAY: Duration = Duration::from_secs(2);

pub(crate) struct Runner<M, K, C: Clock> {
    pub(crate) inner: Arc<EngineInner<M, K, C>>,
    pub(crate) job: Job,
    pub(crate) cancel: CancellationToken,
    pub(crate) manifests: Vec<AppManifest>,
    /// Working stack record for stack plans.
    pub(crate) stack: Option<Stack>,
    pub(crate) plan: OpPlan,
    /// Discovered container IP, set by the network-wait step.
    pub(crate) ip: Option<String>,
    /// Set when NVIDIA libraries were bind-mounted into the container.
    pub(crate) nvidia_mounted: bool,
    /// Held from `allocate_ctid` until `create_container` returns.
    pub(crate) ctid_guard: Option<OwnedMutexGuard<()>>,
}

impl<M, K, C> Runner<M, K, C>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    pub(crate) fn new(
        inner: Arc<EngineInner<M, K, C>>,
        job: Job,
        plan: OpPlan,
        cancel: CancellationToken,
    ) -> Self {
        let (manifests, stack) = match &plan {
            OpPlan::Install { manifest }
            | OpPlan::Reinstall { manifest, .. }
            | OpPlan::Update { manifest, .. }
            | OpPlan::Edit { manifest, .. } => (vec![manifest.clone()], None),
            OpPlan::Uninstall { .. } => (Vec::new(), None),
            OpPlan::StackInstall { manifests, stack }
            | OpPlan::StackEdit { manifests, stack } => {
                (manifests.clone(), Some(stack.clone()))
            }
            OpPlan::StackUninstall { stack, .. } => (Vec::new(), Some(stack.clone())),
        };
        Self {
            inner,
            job,
            cancel,
            manifests,
            stack,
            plan,
            ip: None,
            nvidia_mounted: false,
            ctid_guard: None,
        }
    }

    pub(crate) async fn run(mut self) {
        let job_id = self.job.id.clone();
        tracing::info!(job_id = %job_id, job_type = %self.job.job_type, "runner started");

        match self.plan.clone() {
            OpPlan::Install { .. } => self.run_install(None, true).await,
            OpPlan::Reinstall { install, .. } => self.run_install(Some(install), true).await,
            OpPlan::Update { install, .. } => self.run_replace(install, true).await,
            OpPlan::Edit { install, .. } => self.run_replace(install, false).await,
            OpPlan::Uninstall {
                install,
                keep_volumes,
            } => self.run_uninstall(install, keep_volumes).await,
            OpPlan::StackInstall { .. } => self.run_stack_install().await,
            OpPlan::StackEdit { stack, .. } => self.run_stack_edit(stack).await,
            OpPlan::StackUninstall {
                stack,
                keep_volumes,
            } => self.run_stack_uninstall(stack, keep_volumes).await,
        }

        self.inner.cancels.lock().remove(&job_id);
        tracing::info!(job_id = %job_id, state = %self.job.state, "runner finished");
    }

    // ----- operation drivers -------------------------------------------

    /// Install and reinstall: the pipeline plus an install-record write.
    async fn run_install(&mut self, existing: Option<Install>, set_version: bool) {
        if self.run_pipeline().await != Outcome::Completed {
            return;
        }
        match self.write_install_record(existing, set_version) {
            Ok(()) => self.finish_completed(),
            Err(err) => {
                let state = self.job.state;
                self.fail_step(state, StepError::new(err.to_string())).await;
            }
        }
    }

    /// Update and edit: tear down the old container (volumes preserved),
    /// then run the pipeline into a fresh one.
    async fn run_replace(&mut self, install: Install, set_version: bool) {
        let old_ctid = install.ctid;
        if self.check_cancelled_early().await {
            return;
        }
        self.log(
            LogLevel::Info,
            &format!("Replacing container {old_ctid} for {}", self.job.app_name),
        );

        let preserve_mac = matches!(self.plan, OpPlan::Edit { .. });
        if let Err(err) = self.teardown_old_container(old_ctid, preserve_mac).await {
            let state = self.job.state;
            self.fail_step(state, err).await;
            return;
        }
        if self.check_cancelled_early().await {
            return;
        }

        self.run_install(Some(install), set_version).await;
    }

    async fn run_stack_install(&mut self) {
        if self.run_pipeline().await != Outcome::Completed {
            return;
        }
        match self.write_stack_record() {
            Ok(()) => self.finish_completed(),
            Err(err) => {
                let state = self.job.state;
                self.fail_step(state, StepError::new(err.to_string())).await;
            }
        }
    }

    async fn run_stack_edit(&mut self, stack: Stack) {
        let old_ctid = stack.ctid;
        if self.check_cancelled_early().await {
            return;
        }
        self.log(
            LogLevel::Info,
            &format!("Replacing container {old_ctid} for stack {}", stack.name),
        );
        if let Err(err) = self.teardown_old_container(old_ctid, true).await {
            let state = self.job.state;
            self.fail_step(state, err).await;
            return;
        }
        if self.check_cancelled_early().await {
            return;
        }
        self.run_stack_install().await;
    }

    async fn run_uninstall(&mut self, mut install: Install, keep_volumes: bool) {
        if self.check_cancelled_early().await {
            return;
        }
        self.log(
            LogLevel::Info,
            &format!("Uninstalling {} (container {})", install.app_name, install.ctid),
        );

        let mut mounts = install.mounts.clone();
        match self
            .teardown_container(install.ctid, keep_volumes, &mut mounts)
            .await
        {
            Ok(()) => {}
            Err(err) => {
                let state = self.job.state;
                self.fail_step(state, err).await;
                return;
            }
        }

        let has_managed = mounts.iter().any(MountPoint::is_managed_volume);
        let result = if keep_volumes && has_managed {
            install.status = InstallStatus::Uninstalled;
            install.ctid = 0;
            install.mounts = mounts;
            install.updated_at_ms = self.inner.clock.epoch_ms();
            self.log(LogLevel::Info, "Volumes preserved; install record retained");
            self.inner.store.put_install(&install)
        } else {
            self.inner.store.delete_install(&install.id)
        };
        match result {
            Ok(()) => self.finish_completed(),
            Err(err) => {
                let state = self.job.state;
                self.fail_step(state, StepError::new(err.to_string())).await;
            }
        }
    }

    async fn run_stack_uninstall(&mut self, mut stack: Stack, keep_volumes: bool) {
        if self.check_cancelled_early().await {
            return;
        }
        self.log(
            LogLevel::Info,
            &format!("Uninstalling stack {} (container {})", stack.name, stack.ctid),
        );

        let mut mounts = stack.mounts.clone();
        match self
            .teardown_container(stack.ctid, keep_volumes, &mut mounts)
            .await
        {
            Ok(()) => {}
            Err(err) => {
                let state = self.job.state;
                self.fail_step(state, err).await;
                return;
            }
        }

        let has_managed = mounts.iter().any(MountPoint::is_managed_volume);
        let result = if keep_volumes && has_managed {
            stack.status = InstallStatus::Uninstalled;
            stack.ctid = 0;
            stack.mounts = mounts;
            stack.updated_at_ms = self.inner.clock.epoch_ms();
            self.log(LogLevel::Info, "Volumes preserved; stack record retained");
            self.inner.store.put_stack(&stack)
        } else {
            self.inner.store.delete_stack(&stack.id)
        };
        match result {
            Ok(()) => self.finish_completed(),
            Err(err) => {
                let state = self.job.state;
                self.fail_step(state, StepError::new(err.to_string())).await;
            }
        }
    }

    // ----- teardown building blocks ------------------------------------

    /// Force-stop, optionally detach managed volumes (capturing their
    /// ids), then destroy with retries. "Already gone" at any point
    /// short-circuits to success.
    async fn teardown_container(
        &mut self,
        ctid: u32,
        keep_volumes: bool,
        mounts: &mut [MountPoint],
    ) -> Result<(), StepError> {
        let mut gone = false;
        match self.inner.manager.status(ctid).await {
            Ok(appdock_container::ContainerStatus::Unknown) => {
                gone = true;
                self.log(LogLevel::Info, &format!("Container {ctid} is already gone"));
            }
            Ok(appdock_container::ContainerStatus::Stopped) => {}
            Ok(appdock_container::ContainerStatus::Running) | Err(_) => {
                match self.inner.manager.stop(ctid, &self.cancel).await {
                    Ok(()) => {}
                    Err(err) if err.is_gone() => {
                        gone = true;
                        self.log(LogLevel::Info, &format!("Container {ctid} is already gone"));
                    }
                    Err(ContainerError::Cancelled) => return Err(StepError::new("cancelled")),
                    Err(err) => {
                        // Destroy force-stops anyway.
                        self.log(LogLevel::Warn, &format!("Failed to stop container: {err}"));
                    }
                }
            }
        }

        if keep_volumes && !gone {
            gone = self.detach_volumes(ctid, mounts).await?;
        }

        if !gone {
            self.destroy_with_retries(ctid, keep_volumes).await?;
        }
        Ok(())
    }

    /// Pre-step for update/edit: capture volume ids (and the MAC for
    /// edits) from the old container, detach, destroy, and give storage a
    /// moment to settle. The captured state is threaded into the job so
    /// the pipeline recreates the container with the same volumes (and
    /// DHCP lease, for edits).
    async fn teardown_old_container(
        &mut self,
        old_ctid: u32,
        preserve_mac: bool,
    ) -> Result<(), StepError> {
        let config = match self.inner.manager.config(old_ctid).await {
            Ok(config) => Some(config),
            Err(err) if err.is_gone() => None,
            Err(err) => return Err(err.into()),
        };

        if let Some(config) = &config {
            if preserve_mac {
                if let Some(hwaddr) = config
                    .get("net0")
                    .and_then(|net0| appdock_core::validate::extract_hwaddr(net0))
                {
                    self.log(LogLevel::Info, &format!("Preserving MAC address {hwaddr}"));
                    self.job.hwaddr = hwaddr;
                }
            }

            let mut mounts = std::mem::take(&mut self.job.mounts);
            let result = self.teardown_container(old_ctid, true, &mut mounts).await;
            self.job.mounts = mounts;
            result?;
            if let Some(stack) = &mut self.stack {
                stack.mounts = self.job.mounts.clone();
            }
            self.persist_job()?;

            tokio::time::sleep(REPLACE_SETTLE_DELAY).await;
        } else {
            self.log(
                LogLevel::Info,
                &format!("Container {old_ctid} is already gone"),
            );
        }
        Ok(())
    }

    /// §4.6 volume detach: read the current config, take the first
    /// comma-field of each managed `mpN` as the volume id, persist them
    /// into the mount list, then detach. Returns true when the container
    /// turned out to be gone.
    pub(crate) async fn detach_volumes(
        &self,
        ctid: u32,
        mounts: &mut [MountPoint],
    ) -> Result<bool, StepError> {
        let config = match self.inner.manager.config(ctid).await {
            Ok(config) => config,
            Err(err) if err.is_gone() => return Ok(true),
            Err(err) => return Err(err.into()),
        };

        let mut indexes = Vec::new();
        for mount in mounts.iter_mut().filter(|m| m.is_managed_volume()) {
            if let Some(value) = config.get(&format!("mp{}", mount.index)) {
                let volume_id = value.split(',').next().unwrap_or_default();
                mount.volume_id = volume_id.to_string();
                indexes.push(mount.index);
            }
        }
        if indexes.is_empty() {
            return Ok(false);
        }

        self.log(
            LogLevel::Info,
            &format!("Detaching {} managed volume(s)", indexes.len()),
        );
        match self.inner.manager.detach_mount_points(ctid, &indexes).await {
            Ok(()) => Ok(false),
            Err(err) if err.is_gone() => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    /// Destroy with up to five attempts, five seconds apart. "Already
    /// gone" is success.
    pub(crate) async fn destroy_with_retries(
        &self,
        ctid: u32,
        keep_volumes: bool,
    ) -> Result<(), StepError> {
        let mut last = String::new();
        for attempt in 1..=DESTROY_ATTEMPTS {
            match self
                .inner
                .manager
                .destroy(ctid, keep_volumes, &self.cancel)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) if err.is_gone() => return Ok(()),
                Err(ContainerError::Cancelled) => return Err(StepError::new("cancelled")),
                Err(err) => {
                    self.log(
                        LogLevel::Warn,
                        &format!(
                            "Destroy attempt {attempt}/{DESTROY_ATTEMPTS} for container {ctid} failed: {err}"
                        ),
                    );
                    last = err.to_string();
                    if attempt < DESTROY_ATTEMPTS {
                        tokio::time::sleep(DESTROY_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(StepError::new(format!(
            "failed to destroy container {ctid} after {DESTROY_ATTEMPTS} attempts: {last}"
        )))
    }

    // ----- record writes -----------------------------------------------

    fn write_install_record(
        &mut self,
        existing: Option<Install>,
        set_version: bool,
    ) -> Result<(), appdock_store::StoreError> {
        let manifest = &self.manifests[0];
        let now = self.inner.clock.epoch_ms();
        let job = &self.job;

        let mut install = existing.unwrap_or_else(|| Install {
            id: self.inner.ids.next(),
            app_id: job.app_id.clone(),
            app_name: job.app_name.clone(),
            app_version: manifest.version.clone(),
            status: InstallStatus::Running,
            ctid: 0,
            node: String::new(),
            pool: String::new(),
            storage: String::new(),
            bridge: String::new(),
            os_template: String::new(),
            cores: 0,
            memory_mb: 0,
            disk_gb: 0,
            hostname: String::new(),
            ip: String::new(),
            onboot: false,
            unprivileged: true,
            inputs: Default::default(),
            outputs: Default::default(),
            mounts: Vec::new(),
            devices: Vec::new(),
            env: Default::default(),
            tags: String::new(),
            created_at_ms: now,
            updated_at_ms: now,
        });

        install.status = InstallStatus::Running;
        install.ctid = job.ctid;
        install.node = job.node.clone();
        install.pool = job.pool.clone();
        install.storage = job.storage.clone();
        install.bridge = job.bridge.clone();
        install.os_template = job.os_template.clone();
        install.cores = job.cores;
        install.memory_mb = job.memory_mb;
        install.disk_gb = job.disk_gb;
        install.hostname = job.hostname.clone();
        install.ip = self.ip.clone().unwrap_or_else(|| job.ip.clone());
        install.onboot = job.onboot;
        install.unprivileged = job.unprivileged;
        install.inputs = job.inputs.clone();
        install.outputs = job.outputs.clone();
        install.mounts = job.mounts.clone();
        install.devices = job.devices.clone();
        install.env = job.env.clone();
        install.tags = job.tags.clone();
        install.updated_at_ms = now;
        if set_version {
            install.app_version = manifest.version.clone();
        }

        self.inner.store.put_install(&install)?;
        self.log(
            LogLevel::Info,
            &format!("Recorded install {} at version {}", install.id, install.app_version),
        );
        Ok(())
    }

    fn write_stack_record(&mut self) -> Result<(), appdock_store::StoreError> {
        let Some(stack) = &mut self.stack else {
            return Ok(());
        };
        stack.ctid = self.job.ctid;
        stack.status = InstallStatus::Running;
        stack.ip = self.ip.clone().unwrap_or_else(|| stack.ip.clone());
        stack.mounts = self.job.mounts.clone();
        stack.updated_at_ms = self.inner.clock.epoch_ms();
        self.inner.store.put_stack(stack)?;

        let failed = stack
            .apps
            .iter()
            .filter(|a| a.status == appdock_core::StackAppStatus::Failed)
            .count();
        let message = if failed == 0 {
            format!("Recorded stack {} with {} app(s)", stack.id, stack.apps.len())
        } else {
            format!(
                "Recorded stack {} with {} app(s), {} failed",
                stack.id,
                stack.apps.len(),
                failed
            )
        };
        self.log(LogLevel::Info, &message);
        Ok(())
    }

    // ----- terminal transitions ----------------------------------------

    /// Cancellation before any container work: clean transition, no
    /// cleanup.
    async fn check_cancelled_early(&mut self) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        self.cancelled_terminal().await;
        true
    }

    pub(crate) fn finish_completed(&mut self) {
        self.job
            .finish(JobState::Completed, "", &self.inner.clock);
        self.persist_job_best_effort();
        self.log(LogLevel::Info, "Job completed");
    }

    pub(crate) async fn fail_step(&mut self, state: JobState, err: StepError) {
        let error = format!("{}: {}", state.as_str(), err);
        self.log(LogLevel::Error, &error);
        self.ctid_guard.take();
        if self.job.ctid != 0 && state_needs_cleanup(state) {
            self.cleanup_container().await;
        }
        self.job.finish(JobState::Failed, error, &self.inner.clock);
        self.persist_job_best_effort();
    }

    pub(crate) async fn cancelled_terminal(&mut self) {
        self.ctid_guard.take();
        self.log(LogLevel::Info, "Job cancelled by user");
        if self.job.ctid != 0 && !matches!(self.plan, OpPlan::Uninstall { .. } | OpPlan::StackUninstall { .. })
        {
            self.cleanup_container().await;
        }
        self.job
            .finish(JobState::Cancelled, "cancelled by user", &self.inner.clock);
        self.persist_job_best_effort();
    }

    /// §4.8 failure cleanup: best-effort stop, short wait, destroy,
    /// tolerating "already gone". Runs on a fresh token; the job's own
    /// token may already be cancelled.
    async fn cleanup_container(&mut self) {
        let ctid = self.job.ctid;
        let token = CancellationToken::new();
        // Reattached volumes belong to a surviving install; never destroy
        // them with the partial container. Fresh installs have nothing to
        // preserve.
        let reattaching = matches!(
            self.plan,
            OpPlan::Reinstall { .. }
                | OpPlan::Update { .. }
                | OpPlan::Edit { .. }
                | OpPlan::StackEdit { .. }
        );
        let keep_volumes = reattaching
            && self
                .job
                .mounts
                .iter()
                .any(|m| m.is_managed_volume() && !m.volume_id.is_empty());

        if let Err(err) = self.inner.manager.stop(ctid, &token).await {
            if !err.is_gone() {
                self.log(LogLevel::Warn, &format!("Cleanup stop failed: {err}"));
            }
        }
        tokio::time::sleep(CLEANUP_STOP_DELAY).await;
        match self.inner.manager.destroy(ctid, keep_volumes, &token).await {
            Ok(()) => self.log(LogLevel::Info, &format!("Cleaned up container {ctid}")),
            Err(err) if err.is_gone() => {}
            Err(err) => self.log(
                LogLevel::Warn,
                &format!("Failed to destroy container {ctid} during cleanup: {err}"),
            ),
        }
    }

    // ----- small helpers -----------------------------------------------

    pub(crate) fn log(&self, level: LogLevel, message: &str) {
        if let Err(err) =
            self.inner
                .store
                .append_log(&self.job.id, level, message, self.inner.clock.epoch_ns())
        {
            tracing::warn!(job_id = %self.job.id, %err, "failed to append job log");
        }
    }

    pub(crate) fn persist_job(&self) -> Result<(), StepError> {
        Ok(self.inner.store.put_job(&self.job)?)
    }

    fn persist_job_best_effort(&self) {
        if let Err(err) = self.inner.store.put_job(&self.job) {
            tracing::error!(job_id = %self.job.id, %err, "failed to persist terminal job state");
        }
    }
}

/// Cleanup applies from CTID allocation onward; validation-phase failures
/// have no container to clean.
fn state_needs_cleanup(state: JobState) -> bool {
    !matches!(
        state,
        JobState::Queued
            | JobState::ValidateRequest
            | JobState::ValidateManifest
            | JobState::ValidatePlacement
    )
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
