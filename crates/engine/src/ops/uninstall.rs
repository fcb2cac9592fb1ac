// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uninstall preparation.

use super::{active_job_guard, OpPlan, UninstallRequest};
use crate::engine::EngineInner;
use crate::error::EngineError;
use appdock_catalog::Catalog;
use appdock_container::ContainerManager;
use appdock_core::{Clock, IdGen, Job, JobType, NewJob};

pub(crate) fn prepare_uninstall<M, K, C>(
    inner: &EngineInner<M, K, C>,
    install_id: &str,
    req: UninstallRequest,
) -> Result<(Job, OpPlan), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let install = inner.store.get_install(install_id)?;
    if !install.is_active() {
        return Err(EngineError::Conflict(format!(
            "install {install_id} is already uninstalled"
        )));
    }
    active_job_guard(inner, &install.app_id)?;

    let job = Job::new(
        NewJob {
            id: inner.ids.next(),
            job_type: Some(JobType::Uninstall),
            app_id: install.app_id.clone(),
            app_name: install.app_name.clone(),
            node: install.node.clone(),
            pool: install.pool.clone(),
            storage: install.storage.clone(),
            bridge: install.bridge.clone(),
            os_template: install.os_template.clone(),
            cores: install.cores,
            memory_mb: install.memory_mb,
            disk_gb: install.disk_gb,
            mounts: install.mounts.clone(),
            // Uninstall targets an existing container.
            ctid: install.ctid,
            ..NewJob::default()
        },
        &inner.clock,
    );

    Ok((
        job,
        OpPlan::Uninstall {
            install,
            keep_volumes: req.keep_volumes,
        },
    ))
}
