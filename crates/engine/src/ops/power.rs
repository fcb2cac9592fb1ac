// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Start/stop of an installed app: synchronous, no job row.

use super::active_job_guard;
use crate::engine::EngineInner;
use crate::error::EngineError;
use appdock_catalog::Catalog;
use appdock_container::{ContainerManager, ContainerStatus};
use appdock_core::{Clock, InstallStatus};
use tokio_util::sync::CancellationToken;

pub(crate) async fn start_app<M, K, C>(
    inner: &EngineInner<M, K, C>,
    install_id: &str,
) -> Result<(), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let mut install = inner.store.get_install(install_id)?;
    if !install.is_active() {
        return Err(EngineError::Conflict(format!(
            "cannot start uninstalled install {install_id}"
        )));
    }
    active_job_guard(inner, &install.app_id)?;

    let token = CancellationToken::new();
    inner.manager.start(install.ctid, &token).await?;
    install.status = InstallStatus::Running;
    install.updated_at_ms = inner.clock.epoch_ms();
    inner.store.put_install(&install)?;
    tracing::info!(install_id, ctid = install.ctid, "started container");
    Ok(())
}

/// Graceful shutdown with the configured timeout; falls back to a force
/// stop when the guest ignores it.
pub(crate) async fn stop_app<M, K, C>(
    inner: &EngineInner<M, K, C>,
    install_id: &str,
) -> Result<(), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let mut install = inner.store.get_install(install_id)?;
    if !install.is_active() {
        return Err(EngineError::Conflict(format!(
            "cannot stop uninstalled install {install_id}"
        )));
    }
    active_job_guard(inner, &install.app_id)?;

    let token = CancellationToken::new();
    if let Err(err) = inner
        .manager
        .shutdown(install.ctid, inner.config.shutdown_timeout_secs, &token)
        .await
    {
        if err.is_gone() {
            return Err(EngineError::Container(err));
        }
        tracing::warn!(install_id, %err, "graceful shutdown failed, force stopping");
        inner.manager.stop(install.ctid, &token).await?;
    }
    install.status = InstallStatus::Stopped;
    install.updated_at_ms = inner.clock.epoch_ms();
    inner.store.put_install(&install)?;
    tracing::info!(install_id, ctid = install.ctid, "stopped container");
    Ok(())
}

/// Live container state for an install, as the host reports it.
pub(crate) async fn container_status<M, K, C>(
    inner: &EngineInner<M, K, C>,
    install_id: &str,
) -> Result<(ContainerStatus, std::collections::HashMap<String, String>), EngineError>
where
    M: ContainerManager,
    K: Catalog,
    C: Clock,
{
    let install = inner.store.get_install(install_id)?;
    if !install.is_active() {
        return Ok((ContainerStatus::Unknown, Default::default()));
    }
    let status = inner.manager.status(install.ctid).await?;
    let detail = match inner.manager.status_detail(install.ctid).await {
        Ok(detail) => detail,
        Err(err) if err.is_gone() => Default::default(),
        Err(err) => return Err(err.into()),
    };
    Ok((status, detail))
}

#[cfg(test)]
#[path = "power_tests.rs"]
mod tests;
