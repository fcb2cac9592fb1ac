// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Update preparation: same container identity, newer catalog version.

use super::{active_job_guard, OpPlan};
use crate::engine::EngineInner;
use crate::error::EngineError;
use appdock_catalog::{self as catalog, Catalog};
use appdock_container::ContainerManager;
use appdock_core::{is_newer_version, Clock, IdGen, Job, JobType, NewJob};

pub(crate) fn prepare_update<M, K, C>(
    inner: &EngineInner<M, K, C>,
    install_id: &str,
) -> Result<(Job, OpPlan), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let install = inner.store.get_install(install_id)?;
    if !install.is_active() {
        return Err(EngineError::Conflict(format!(
            "cannot update uninstalled install {install_id}"
        )));
    }
    active_job_guard(inner, &install.app_id)?;

    let manifest = inner
        .catalog
        .get(&install.app_id)
        .ok_or_else(|| EngineError::AppNotFound(install.app_id.clone()))?;
    manifest.validate()?;
    if !is_newer_version(&manifest.version, &install.app_version) {
        return Err(EngineError::Conflict(format!(
            "catalog version {} is not newer than installed {}",
            manifest.version, install.app_version
        )));
    }

    // Inputs carry over; the new manifest may introduce inputs with
    // defaults.
    let inputs = catalog::merge_defaults(&manifest.inputs, &install.inputs);
    catalog::validate_inputs(&manifest.inputs, &inputs)?;

    let job = Job::new(
        NewJob {
            id: inner.ids.next(),
            job_type: Some(JobType::Update),
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
            mounts: install.mounts.clone(),
            devices: install.devices.clone(),
            env: install.env.clone(),
            tags: install.tags.clone(),
            ..NewJob::default()
        },
        &inner.clock,
    );

    Ok((job, OpPlan::Update { manifest, install }))
}
