// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stack preparation: several apps sharing one container.

use super::{
    active_job_guard, build_mounts, duplicate_guard, pick_resource, validate_common, OpPlan,
    StackEditRequest, StackInstallRequest, UninstallRequest,
};
use crate::engine::EngineInner;
use crate::error::EngineError;
use crate::ops::install::pick_string;
use appdock_catalog::{self as catalog, Catalog};
use appdock_container::ContainerManager;
use appdock_core::{
    Clock, IdGen, InstallStatus, Job, JobType, MountPoint, NewJob, Stack, StackApp,
    StackAppStatus,
};
use std::collections::HashMap;

pub(crate) fn prepare_stack_install<M, K, C>(
    inner: &EngineInner<M, K, C>,
    req: StackInstallRequest,
) -> Result<(Job, OpPlan), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    if req.apps.is_empty() {
        return Err(EngineError::Conflict("stack has no apps".to_string()));
    }

    let mut manifests = Vec::new();
    for app in &req.apps {
        let manifest = inner
            .catalog
            .get(&app.app_id)
            .ok_or_else(|| EngineError::AppNotFound(app.app_id.clone()))?;
        manifest.validate()?;
        duplicate_guard(inner, &app.app_id)?;
        manifests.push(manifest);
    }

    // All apps live in one container: the declared OS templates must agree.
    let os_template = manifests[0].os_template.clone();
    for manifest in &manifests[1..] {
        if manifest.os_template != os_template {
            return Err(EngineError::Conflict(format!(
                "apps {} and {} declare different os templates",
                manifests[0].id, manifest.id
            )));
        }
    }

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

    let mut apps = Vec::new();
    for (order, (app_req, manifest)) in req.apps.iter().zip(&manifests).enumerate() {
        let inputs = catalog::merge_defaults(&manifest.inputs, &app_req.inputs);
        catalog::validate_inputs(&manifest.inputs, &inputs)?;
        apps.push(StackApp {
            app_id: manifest.id.clone(),
            app_name: manifest.name.clone(),
            app_version: manifest.version.clone(),
            order: order as u32,
            inputs,
            outputs: HashMap::new(),
            status: StackAppStatus::Pending,
            error: String::new(),
        });
    }

    // Recommended resources: max cores, summed memory and disk.
    let cores_default = manifests.iter().map(|m| m.resources.cores).max().unwrap_or(0);
    let memory_default: u32 = manifests.iter().map(|m| m.resources.memory_mb).sum();
    let disk_default: u32 = manifests.iter().map(|m| m.resources.disk_gb).sum();

    // Mount points: union across apps, deduplicated by mount path (first
    // app wins); user extras appended after.
    let mut mounts: Vec<MountPoint> = Vec::new();
    for manifest in &manifests {
        let app_mounts = build_mounts(&inner.config, manifest, &[], &[])?;
        for mount in app_mounts {
            if mounts.iter().any(|m| m.path == mount.path) {
                continue;
            }
            mounts.push(MountPoint {
                index: mounts.len() as u32,
                ..mount
            });
        }
    }
    for extra in &req.extra_mounts {
        mounts.push(MountPoint {
            index: mounts.len() as u32,
            kind: appdock_core::MountKind::Bind,
            path: extra.path.clone(),
            host_path: extra.host_path.clone(),
            read_only: extra.read_only,
            ..MountPoint::default()
        });
    }

    let config = &inner.config;
    let now = inner.clock.epoch_ms();
    let stack = Stack {
        id: inner.ids.next(),
        name: req.name.clone(),
        ctid: 0,
        node: config.node.clone(),
        pool: pick_string(&req.pool, &config.pool),
        storage: pick_string(&req.storage, &config.storage),
        bridge: pick_string(&req.bridge, &config.bridge),
        os_template,
        cores: pick_resource(req.cores, cores_default, 1),
        memory_mb: pick_resource(req.memory_mb, memory_default, 512),
        disk_gb: pick_resource(req.disk_gb, disk_default, 4),
        hostname: req.hostname.clone(),
        ip: req.ip.clone(),
        onboot: req.onboot,
        unprivileged: req.unprivileged.unwrap_or(config.default_unprivileged),
        apps,
        mounts,
        devices: req.devices.clone(),
        env: req.env.clone(),
        tags: req.tags.clone(),
        status: InstallStatus::Running,
        created_at_ms: now,
        updated_at_ms: now,
    };

    let job = stack_job(inner, &stack, JobType::Stack);
    Ok((job, OpPlan::StackInstall { manifests, stack }))
}

pub(crate) fn prepare_stack_edit<M, K, C>(
    inner: &EngineInner<M, K, C>,
    stack_id: &str,
    req: StackEditRequest,
) -> Result<(Job, OpPlan), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let mut stack = inner.store.get_stack(stack_id)?;
    if !stack.is_active() {
        return Err(EngineError::Conflict(format!(
            "cannot edit uninstalled stack {stack_id}"
        )));
    }
    active_job_guard(inner, &stack.id)?;

    if let Some(disk_gb) = req.disk_gb {
        if disk_gb < stack.disk_gb {
            return Err(EngineError::Conflict(format!(
                "cannot shrink disk from {}G to {}G",
                stack.disk_gb, disk_gb
            )));
        }
    }

    let mut manifests = Vec::new();
    for app in &stack.apps {
        let manifest = inner
            .catalog
            .get(&app.app_id)
            .ok_or_else(|| EngineError::AppNotFound(app.app_id.clone()))?;
        manifests.push(manifest);
    }

    stack.cores = req.cores.unwrap_or(stack.cores);
    stack.memory_mb = req.memory_mb.unwrap_or(stack.memory_mb);
    stack.disk_gb = req.disk_gb.unwrap_or(stack.disk_gb);
    for app in &mut stack.apps {
        app.status = StackAppStatus::Pending;
        app.error.clear();
    }

    let job = stack_job(inner, &stack, JobType::Stack);
    Ok((job, OpPlan::StackEdit { manifests, stack }))
}

pub(crate) fn prepare_stack_uninstall<M, K, C>(
    inner: &EngineInner<M, K, C>,
    stack_id: &str,
    req: UninstallRequest,
) -> Result<(Job, OpPlan), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let stack = inner.store.get_stack(stack_id)?;
    if !stack.is_active() {
        return Err(EngineError::Conflict(format!(
            "stack {stack_id} is already uninstalled"
        )));
    }
    active_job_guard(inner, &stack.id)?;

    let mut job = stack_job(inner, &stack, JobType::Uninstall);
    job.ctid = stack.ctid;
    Ok((
        job,
        OpPlan::StackUninstall {
            stack,
            keep_volumes: req.keep_volumes,
        },
    ))
}

/// A stack job is keyed by the stack id, so the active-job guard covers
/// the stack as a whole.
fn stack_job<M, K, C>(inner: &EngineInner<M, K, C>, stack: &Stack, job_type: JobType) -> Job
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    Job::new(
        NewJob {
            id: inner.ids.next(),
            job_type: Some(job_type),
            app_id: stack.id.clone(),
            app_name: stack.name.clone(),
            node: stack.node.clone(),
            pool: stack.pool.clone(),
            storage: stack.storage.clone(),
            bridge: stack.bridge.clone(),
            os_template: stack.os_template.clone(),
            cores: stack.cores,
            memory_mb: stack.memory_mb,
            disk_gb: stack.disk_gb,
            hostname: stack.hostname.clone(),
            ip: stack.ip.clone(),
            onboot: stack.onboot,
            unprivileged: stack.unprivileged,
            mounts: stack.mounts.clone(),
            devices: stack.devices.clone(),
            env: stack.env.clone(),
            tags: stack.tags.clone(),
            stack_id: Some(stack.id.clone()),
            ..NewJob::default()
        },
        &inner.clock,
    )
}

#[cfg(test)]
#[path = "stack_tests.rs"]
mod tests;
