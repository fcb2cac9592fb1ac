// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconfigure: in-place, synchronous, no job row.

use super::{active_job_guard, ReconfigureRequest};
use crate::engine::EngineInner;
use crate::error::EngineError;
use crate::provision::{self, Action};
use appdock_catalog::{self as catalog, Catalog};
use appdock_container::{ContainerError, ContainerManager, UpdateParams};
use appdock_core::Clock;

pub(crate) async fn reconfigure<M, K, C>(
    inner: &EngineInner<M, K, C>,
    install_id: &str,
    req: ReconfigureRequest,
) -> Result<(), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let mut install = inner.store.get_install(install_id)?;
    if !install.is_active() {
        return Err(EngineError::Conflict(format!(
            "cannot reconfigure uninstalled install {install_id}"
        )));
    }
    active_job_guard(inner, &install.app_id)?;

    if req.cores.is_some() || req.memory_mb.is_some() {
        let params = UpdateParams {
            cores: req.cores,
            memory_mb: req.memory_mb,
        };
        inner.manager.update_config(install.ctid, &params).await?;
        if let Some(cores) = req.cores {
            install.cores = cores;
        }
        if let Some(memory_mb) = req.memory_mb {
            install.memory_mb = memory_mb;
        }
        tracing::info!(install_id, ctid = install.ctid, "updated container resources");
    }

    if !req.inputs.is_empty() {
        let manifest = inner
            .catalog
            .get(&install.app_id)
            .ok_or_else(|| EngineError::AppNotFound(install.app_id.clone()))?;

        let mut inputs = install.inputs.clone();
        inputs.extend(req.inputs);
        let inputs = catalog::merge_defaults(&manifest.inputs, &inputs);
        catalog::validate_inputs(&manifest.inputs, &inputs)?;

        let paths = provision::single_app_paths(&manifest.provision.script);
        let payload = serde_json::to_vec_pretty(&inputs)
            .map_err(|e| EngineError::Conflict(format!("failed to encode inputs: {e}")))?;
        inner
            .manager
            .push(install.ctid, &paths.inputs, &payload, "0600")
            .await?;

        let cmd = provision::runner_cmd(Action::Configure, &paths, &install.env);
        let mut last_line = String::new();
        let exit = inner
            .manager
            .exec_stream(install.ctid, &cmd, &mut |line| {
                if !line.trim().is_empty() {
                    last_line = line.trim().to_string();
                }
            })
            .await?;
        if exit != 0 {
            return Err(EngineError::Container(ContainerError::Exec(format!(
                "configure exited with status {exit}: {last_line}"
            ))));
        }
        install.inputs = inputs;
    }

    install.updated_at_ms = inner.clock.epoch_ms();
    inner.store.put_install(&install)?;
    Ok(())
}
