// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Install preparation.

use super::{
    build_mounts, duplicate_guard, merge_devices, pick_resource, validate_common, InstallRequest,
    OpPlan,
};
use crate::engine::EngineInner;
use crate::error::EngineError;
use appdock_catalog::{self as catalog, Catalog};
use appdock_container::ContainerManager;
use appdock_core::{Clock, IdGen, Job, JobType, NewJob};

pub(crate) fn prepare_install<M, K, C>(
    inner: &EngineInner<M, K, C>,
    req: InstallRequest,
) -> Result<(Job, OpPlan), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let manifest = inner
        .catalog
        .get(&req.app_id)
        .ok_or_else(|| EngineError::AppNotFound(req.app_id.clone()))?;
    manifest.validate()?;

    duplicate_guard(inner, &req.app_id)?;
    validate_common(
        &inner.config,
        &req.hostname,
        &req.ip,
        &req.bridge,
        &req.tags,
        &req.env,
        &req.devices,
        &req.extra_mounts,
    )?;

    let inputs = catalog::merge_defaults(&manifest.inputs, &req.inputs);
    catalog::validate_inputs(&manifest.inputs, &inputs)?;

    // GPU resolution is synchronous: a request the host cannot satisfy
    // never becomes a job.
    let gpu_devices = inner
        .gpu
        .resolve(req.gpu_profile.as_deref(), manifest.gpu.as_ref())?;
    let devices = merge_devices(&req.devices, gpu_devices);

    let mounts = build_mounts(&inner.config, &manifest, &req.volume_overrides, &req.extra_mounts)?;

    let config = &inner.config;
    let job = Job::new(
        NewJob {
            id: inner.ids.next(),
            job_type: Some(JobType::Install),
            app_id: manifest.id.clone(),
            app_name: manifest.name.clone(),
            node: config.node.clone(),
            pool: pick_string(&req.pool, &config.pool),
            storage: pick_string(&req.storage, &config.storage),
            bridge: pick_string(&req.bridge, &config.bridge),
            os_template: manifest.os_template.clone(),
            cores: pick_resource(req.cores, manifest.resources.cores, 1),
            memory_mb: pick_resource(req.memory_mb, manifest.resources.memory_mb, 512),
            disk_gb: pick_resource(req.disk_gb, manifest.resources.disk_gb, 4),
            hostname: req.hostname,
            ip: req.ip,
            onboot: req.onboot,
            unprivileged: req.unprivileged.unwrap_or(config.default_unprivileged),
            inputs,
            mounts,
            devices,
            env: req.env,
            tags: req.tags,
            ..NewJob::default()
        },
        &inner.clock,
    );

    Ok((job, OpPlan::Install { manifest }))
}

pub(crate) fn pick_string(requested: &str, default: &str) -> String {
    if requested.is_empty() {
        default.to_string()
    } else {
        requested.to_string()
    }
}
