// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Edit preparation: resize an install, preserving volumes and MAC.

use super::{active_job_guard, EditRequest, OpPlan};
use crate::engine::EngineInner;
use crate::error::EngineError;
use appdock_catalog::Catalog;
use appdock_container::ContainerManager;
use appdock_core::{Clock, IdGen, Job, JobType, NewJob};

pub(crate) fn prepare_edit<M, K, C>(
    inner: &EngineInner<M, K, C>,
    install_id: &str,
    req: EditRequest,
) -> Result<(Job, OpPlan), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let install = inner.store.get_install(install_id)?;
    if !install.is_active() {
        return Err(EngineError::Conflict(format!(
            "cannot edit uninstalled install {install_id}"
        )));
    }
    active_job_guard(inner, &install.app_id)?;

    // Rootfs can only grow; the host cannot shrink a container volume.
    if let Some(disk_gb) = req.disk_gb {
        if disk_gb < install.disk_gb {
            return Err(EngineError::Conflict(format!(
                "cannot shrink disk from {}G to {}G",
                install.disk_gb, disk_gb
            )));
        }
    }

    let manifest = inner
        .catalog
        .get(&install.app_id)
        .ok_or_else(|| EngineError::AppNotFound(install.app_id.clone()))?;
    manifest.validate()?;

    let job = Job::new(
        NewJob {
            id: inner.ids.next(),
            job_type: Some(JobType::Edit),
            app_id: install.app_id.clone(),
            app_name: install.app_name.clone(),
            node: install.node.clone(),
            pool: install.pool.clone(),
            storage: install.storage.clone(),
            bridge: install.bridge.clone(),
            os_template: install.os_template.clone(),
            cores: req.cores.unwrap_or(install.cores),
            memory_mb: req.memory_mb.unwrap_or(install.memory_mb),
            disk_gb: req.disk_gb.unwrap_or(install.disk_gb),
            hostname: install.hostname.clone(),
            ip: install.ip.clone(),
            onboot: install.onboot,
            unprivileged: install.unprivileged,
            inputs: install.inputs.clone(),
            mounts: install.mounts.clone(),
            devices: install.devices.clone(),
            env: install.env.clone(),
            tags: install.tags.clone(),
            ..NewJob::default()
        },
        &inner.clock,
    );

    Ok((job, OpPlan::Edit { manifest, install }))
}
