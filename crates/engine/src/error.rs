// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types surfaced by the engine's public entry points.
//!
//! Everything here is synchronous-path only: once a job is spawned,
//! failures land on the job row, never on the caller.

use appdock_catalog::{InputError, ManifestError};
use appdock_container::ContainerError;
use appdock_core::ValidationError;
use appdock_store::StoreError;
use thiserror::Error;

use crate::gpu::GpuError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("app not found in catalog: {0}")]
    AppNotFound(String),
    /// An install with status other than `uninstalled` blocks the request.
    #[error("app {app_id} is already installed (install {install_id})")]
    DuplicateInstall { app_id: String, install_id: String },
    /// A non-terminal job for the app blocks the request.
    #[error("app {app_id} already has an active job ({job_id})")]
    DuplicateJob { app_id: String, job_id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Only from synchronous container work (reconfigure, power ops).
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error from one pipeline step. The job's terminal error string is
/// `"<state>: <message>"`; this is the message half.
#[derive(Debug)]
pub(crate) struct StepError(pub String);

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl StepError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

macro_rules! step_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StepError {
                fn from(err: $ty) -> Self {
                    Self(err.to_string())
                }
            }
        )*
    };
}

step_error_from!(
    ContainerError,
    StoreError,
    ValidationError,
    InputError,
    ManifestError,
    GpuError,
    serde_json::Error,
);
