// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine facade: public entry points, the job registry, the cancellation
//! map, and the CTID allocation mutex.

use crate::config::HostConfig;
use crate::error::EngineError;
use crate::gpu::GpuResolver;
use crate::ops::{
    self, EditRequest, InstallRequest, OpPlan, ReconfigureRequest, StackEditRequest,
    StackInstallRequest, UninstallRequest,
};
use crate::runner::Runner;
use appdock_catalog::Catalog;
use appdock_container::ContainerManager;
use appdock_core::{
    Clock, HexIdGen, Install, Job, JobId, LogEntry, Stack, SystemClock,
};
use appdock_store::Store;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) struct EngineInner<M, K, C: Clock> {
    pub(crate) store: Store,
    pub(crate) manager: M,
    pub(crate) catalog: K,
    pub(crate) config: HostConfig,
    pub(crate) clock: C,
    pub(crate) gpu: GpuResolver,
    pub(crate) ids: HexIdGen,
    /// Per-job cancellation signals. Guarded by a short-lived lock;
    /// lookups copy the token out before use.
    pub(crate) cancels: Mutex<HashMap<String, CancellationToken>>,
    /// Serializes CTID allocation: held across `next_ctid` *and* `create`
    /// because the host's "next free id" endpoint does not reserve the id.
    pub(crate) ctid_mu: Arc<tokio::sync::Mutex<()>>,
}

/// The deployment engine. Cheap to clone; all state lives behind an `Arc`.
pub struct Engine<M, K, C: Clock = SystemClock> {
    pub(crate) inner: Arc<EngineInner<M, K, C>>,
}

impl<M, K, C> Clone for Engine<M, K, C>
where
    C: Clock,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M, K, C> Engine<M, K, C>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    pub fn new(store: Store, manager: M, catalog: K, config: HostConfig, clock: C) -> Self {
        let gpu = GpuResolver::new(config.host_root.clone());
        Self {
            inner: Arc::new(EngineInner {
                store,
                manager,
                catalog,
                config,
                clock,
                gpu,
                ids: HexIdGen,
                cancels: Mutex::new(HashMap::new()),
                ctid_mu: Arc::new(tokio::sync::Mutex::new(())),
            }),
        }
    }

    /// Open the store at the configured path, recover orphaned jobs, and
    /// destroy any containers those jobs had allocated. Returns the engine
    /// and the recovered job ids.
    pub async fn open(
        manager: M,
        catalog: K,
        config: HostConfig,
        clock: C,
    ) -> Result<(Self, Vec<JobId>), EngineError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let (store, recovered) = Store::open(&config.db_path(), &clock)?;
        let engine = Self::new(store, manager, catalog, config, clock);

        let mut recovered_ids = Vec::new();
        for id in recovered {
            engine.destroy_orphan_container(&id).await;
            recovered_ids.push(JobId::new(id));
        }
        Ok((engine, recovered_ids))
    }

    async fn destroy_orphan_container(&self, job_id: &str) {
        use appdock_core::JobType;

        let Ok(job) = self.inner.store.get_job(job_id) else {
            return;
        };
        if job.ctid == 0 || job.job_type == JobType::Uninstall {
            return;
        }
        // Reattached volumes belong to a surviving install record; only a
        // fresh install's partial volumes go down with the container.
        let keep_volumes = matches!(
            job.job_type,
            JobType::Reinstall | JobType::Update | JobType::Edit
        ) && job
            .mounts
            .iter()
            .any(|m| m.is_managed_volume() && !m.volume_id.is_empty());

        tracing::warn!(job_id, ctid = job.ctid, "destroying container of orphaned job");
        let token = CancellationToken::new();
        if let Err(err) = self.inner.manager.stop(job.ctid, &token).await {
            if !err.is_gone() {
                tracing::warn!(job_id, %err, "failed to stop orphaned container");
            }
        }
        match self
            .inner
            .manager
            .destroy(job.ctid, keep_volumes, &token)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_gone() => {}
            Err(err) => tracing::warn!(job_id, %err, "failed to destroy orphaned container"),
        }
    }

    // ----- lifecycle operations ----------------------------------------

    pub async fn install(&self, req: InstallRequest) -> Result<JobId, EngineError> {
        let (job, plan) = ops::prepare_install(&self.inner, req)?;
        self.spawn_job(job, plan)
    }

    pub async fn reinstall(&self, install_id: &str) -> Result<JobId, EngineError> {
        let (job, plan) = ops::prepare_reinstall(&self.inner, install_id)?;
        self.spawn_job(job, plan)
    }

    pub async fn update(&self, install_id: &str) -> Result<JobId, EngineError> {
        let (job, plan) = ops::prepare_update(&self.inner, install_id)?;
        self.spawn_job(job, plan)
    }

    pub async fn edit(&self, install_id: &str, req: EditRequest) -> Result<JobId, EngineError> {
        let (job, plan) = ops::prepare_edit(&self.inner, install_id, req)?;
        self.spawn_job(job, plan)
    }

    pub async fn uninstall(
        &self,
        install_id: &str,
        req: UninstallRequest,
    ) -> Result<JobId, EngineError> {
        let (job, plan) = ops::prepare_uninstall(&self.inner, install_id, req)?;
        self.spawn_job(job, plan)
    }

    /// In-place, synchronous; no job row is created and errors return
    /// directly to the caller.
    pub async fn reconfigure(
        &self,
        install_id: &str,
        req: ReconfigureRequest,
    ) -> Result<(), EngineError> {
        ops::reconfigure(&self.inner, install_id, req).await
    }

    /// Start a stopped install's container. Synchronous, no job row.
    pub async fn start_app(&self, install_id: &str) -> Result<(), EngineError> {
        ops::start_app(&self.inner, install_id).await
    }

    /// Gracefully shut down an install's container (30 s timeout, then
    /// force stop). Synchronous, no job row.
    pub async fn stop_app(&self, install_id: &str) -> Result<(), EngineError> {
        ops::stop_app(&self.inner, install_id).await
    }

    /// Live container state for an install as the host reports it.
    pub async fn container_status(
        &self,
        install_id: &str,
    ) -> Result<(appdock_container::ContainerStatus, HashMap<String, String>), EngineError> {
        ops::container_status(&self.inner, install_id).await
    }

    pub async fn stack_install(&self, req: StackInstallRequest) -> Result<JobId, EngineError> {
        let (job, plan) = ops::prepare_stack_install(&self.inner, req)?;
        self.spawn_job(job, plan)
    }

    pub async fn stack_edit(
        &self,
        stack_id: &str,
        req: StackEditRequest,
    ) -> Result<JobId, EngineError> {
        let (job, plan) = ops::prepare_stack_edit(&self.inner, stack_id, req)?;
        self.spawn_job(job, plan)
    }

    pub async fn stack_uninstall(
        &self,
        stack_id: &str,
        req: UninstallRequest,
    ) -> Result<JobId, EngineError> {
        let (job, plan) = ops::prepare_stack_uninstall(&self.inner, stack_id, req)?;
        self.spawn_job(job, plan)
    }

    /// Cancel a job: raise its signal (aborting outstanding API calls and
    /// branching the runner into cleanup at its next between-step check)
    /// and force-stop the job's container in the background, which is the
    /// only way to interrupt a long-running in-container exec.
    pub async fn cancel_job(&self, job_id: &str) -> Result<(), EngineError> {
        let job = self.inner.store.get_job(job_id)?;
        if job.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "job {job_id} already finished as {}",
                job.state
            )));
        }

        let token = self.inner.cancels.lock().get(job_id).cloned();
        if let Some(token) = token {
            token.cancel();
        }

        if job.ctid != 0 {
            let manager = self.inner.manager.clone();
            let ctid = job.ctid;
            let id = job_id.to_string();
            tokio::spawn(async move {
                let token = CancellationToken::new();
                match manager.stop(ctid, &token).await {
                    Ok(()) => {}
                    Err(err) if err.is_gone() => {}
                    Err(err) => {
                        tracing::warn!(job_id = %id, ctid, %err, "cancel force-stop failed")
                    }
                }
            });
        }
        tracing::info!(job_id, "cancellation requested");
        Ok(())
    }

    // ----- reads -------------------------------------------------------

    pub fn job(&self, job_id: &str) -> Result<Job, EngineError> {
        Ok(self.inner.store.get_job(job_id)?)
    }

    pub fn jobs(&self) -> Result<Vec<Job>, EngineError> {
        Ok(self.inner.store.list_jobs()?)
    }

    /// Log rows after `after_id` plus the new polling cursor.
    pub fn logs_since(
        &self,
        job_id: &str,
        after_id: i64,
    ) -> Result<(Vec<LogEntry>, i64), EngineError> {
        Ok(self.inner.store.logs_since(job_id, after_id)?)
    }

    pub fn install_record(&self, install_id: &str) -> Result<Install, EngineError> {
        Ok(self.inner.store.get_install(install_id)?)
    }

    pub fn installs(&self) -> Result<Vec<Install>, EngineError> {
        Ok(self.inner.store.list_installs()?)
    }

    pub fn install_for_app(&self, app_id: &str) -> Result<Option<Install>, EngineError> {
        Ok(self.inner.store.install_for_app(app_id)?)
    }

    pub fn has_active_install_for_app(&self, app_id: &str) -> Result<bool, EngineError> {
        Ok(self.inner.store.active_install_for_app(app_id)?.is_some())
    }

    pub fn stack(&self, stack_id: &str) -> Result<Stack, EngineError> {
        Ok(self.inner.store.get_stack(stack_id)?)
    }

    pub fn stacks(&self) -> Result<Vec<Stack>, EngineError> {
        Ok(self.inner.store.list_stacks()?)
    }

    /// Admin sweep: delete terminal jobs and their logs.
    pub fn clear_terminal_jobs(&self) -> Result<usize, EngineError> {
        Ok(self.inner.store.clear_terminal_jobs()?)
    }

    // ----- internals ---------------------------------------------------

    fn spawn_job(&self, job: Job, plan: OpPlan) -> Result<JobId, EngineError> {
        self.inner.store.put_job(&job)?;
        let job_id = JobId::new(job.id.clone());

        let cancel = CancellationToken::new();
        self.inner
            .cancels
            .lock()
            .insert(job.id.clone(), cancel.clone());

        let runner = Runner::new(self.inner.clone(), job, plan, cancel);
        tokio::spawn(runner.run());
        Ok(job_id)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
