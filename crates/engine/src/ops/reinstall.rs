// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reinstall preparation: bring an uninstalled app back from its
//! preserved volumes.

use super::{active_job_guard, OpPlan};
use crate::engine::EngineInner;
use crate::error::EngineError;
use appdock_catalog::{self as catalog, Catalog};
use appdock_container::ContainerManager;
use appdock_core::{Clock, IdGen, Job, JobType, NewJob};

pub(crate) fn prepare_reinstall<M, K, C>(
    inner: &EngineInner<M, K, C>,
    install_id: &str,
) -> Result<(Job, OpPlan), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let install = inner.store.get_install(install_id)?;
    if install.is_active() {
        return Err(EngineError::Conflict(format!(
            "install {install_id} is still active; reinstall only applies to uninstalled apps"
        )));
    }
    if install.managed_mounts().next().is_none() {
        return Err(EngineError::Conflict(format!(
            "install {install_id} has no preserved volumes to reinstall from"
        )));
    }
    active_job_guard(inner, &install.app_id)?;

    let manifest = inner
        .catalog
        .get(&install.app_id)
        .ok_or_else(|| EngineError::AppNotFound(install.app_id.clone()))?;
    manifest.validate()?;

    let inputs = catalog::merge_defaults(&manifest.inputs, &install.inputs);
    catalog::validate_inputs(&manifest.inputs, &inputs)?;

    let job = Job::new(
        NewJob {
            id: inner.ids.next(),
            job_type: Some(JobType::Reinstall),
            app_id: install.app_id.clone(),
            app_name: install.app_name.clone(),
            node: install.node.clone(),
            pool: install.pool.clone(),
            storage: install.storage.clone(),
            bridge: install.bridge.clone(),
            os_template: manifest.os_template.clone(),
            cores: install.cores,
            memory_mb: install.memory_mb,
            disk_gb: install.disk_gb,
            hostname: install.hostname.clone(),
            ip: install.ip.clone(),
            onboot: install.onboot,
            unprivileged: install.unprivileged,
            inputs,
            // Carries the captured volume ids; the pipeline reattaches
            // instead of provisioning fresh volumes.
            mounts: install.mounts.clone(),
            devices: install.devices.clone(),
            env: install.env.clone(),
            tags: install.tags.clone(),
            ..NewJob::default()
        },
        &inner.clock,
    );

    Ok((job, OpPlan::Reinstall { manifest, install }))
}
