// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalog entry describing an installable app.

use appdock_core::validate::{self, ValidationError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from manifest schema validation.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest field {0} must not be empty")]
    MissingField(&'static str),
    #[error("duplicate volume name: {0}")]
    DuplicateVolume(String),
    #[error("volume {name} mount path must be absolute: {path}")]
    VolumePath { name: String, path: String },
    #[error("duplicate input key: {0}")]
    DuplicateInput(String),
    #[error("input {key}: min {min} exceeds max {max}")]
    InputBounds { key: String, min: f64, max: f64 },
    #[error(transparent)]
    ExtraConfig(#[from] ValidationError),
}

/// Resource defaults for an app. The request and host config may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceSpec {
    #[serde(default)]
    pub cores: u32,
    #[serde(default)]
    pub memory_mb: u32,
    #[serde(default)]
    pub disk_gb: u32,
}

/// Managed volume the app declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    /// Mount path inside the container.
    pub path: String,
    #[serde(default)]
    pub size_gb: u32,
    /// Per-volume storage override; "" means the install's storage pool.
    #[serde(default)]
    pub storage: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    #[default]
    String,
    Secret,
    Number,
}

/// Typed input the app asks the user for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: InputKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Numeric bounds, honored for `number` inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Length bounds, honored for `string`/`secret` inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    /// Anchored regular expression the value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Enum of allowed literal values; empty means unrestricted.
    #[serde(default)]
    pub options: Vec<String>,
}

/// In-container provisioning entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSpec {
    /// Script path relative to the app's provision directory.
    pub script: String,
}

impl Default for ProvisionSpec {
    fn default() -> Self {
        Self {
            script: "provision.py".to_string(),
        }
    }
}

/// Commands the provisioning SDK may run inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PermissionSpec {
    #[serde(default)]
    pub allow: Vec<String>,
}

/// GPU requirements declared by the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GpuSpec {
    #[serde(default)]
    pub required: bool,
    /// Profile names in preference order.
    #[serde(default)]
    pub profiles: Vec<String>,
}

/// One catalog entry. Deserialized from `manifest.toml` in the app's
/// catalog directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// OS template shorthand ("debian-12-standard_12.2-1_amd64.tar.zst") or
    /// full "storage:vztmpl/..." id.
    pub os_template: String,
    #[serde(default)]
    pub resources: ResourceSpec,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    /// Declared outputs; values may contain `{{ip}}` and `{{<input-key>}}`
    /// placeholders. Order is the manifest's declaration order.
    #[serde(default)]
    pub outputs: IndexMap<String, String>,
    #[serde(default)]
    pub provision: ProvisionSpec,
    #[serde(default)]
    pub permissions: PermissionSpec,
    /// Container features (e.g. "nesting", "keyctl").
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<GpuSpec>,
    /// Raw container config lines appended verbatim; allow-listed keys only.
    #[serde(default)]
    pub extra_config: Vec<String>,
}

impl AppManifest {
    /// Schema check run by the pipeline's `validate_manifest` step.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.id.is_empty() {
            return Err(ManifestError::MissingField("id"));
        }
        if self.name.is_empty() {
            return Err(ManifestError::MissingField("name"));
        }
        if self.version.is_empty() {
            return Err(ManifestError::MissingField("version"));
        }
        if self.os_template.is_empty() {
            return Err(ManifestError::MissingField("os_template"));
        }

        let mut volume_names = std::collections::HashSet::new();
        for volume in &self.volumes {
            if !volume_names.insert(volume.name.as_str()) {
                return Err(ManifestError::DuplicateVolume(volume.name.clone()));
            }
            if !volume.path.starts_with('/') {
                return Err(ManifestError::VolumePath {
                    name: volume.name.clone(),
                    path: volume.path.clone(),
                });
            }
        }

        let mut input_keys = std::collections::HashSet::new();
        for input in &self.inputs {
            if !input_keys.insert(input.key.as_str()) {
                return Err(ManifestError::DuplicateInput(input.key.clone()));
            }
            if let (Some(min), Some(max)) = (input.min, input.max) {
                if min > max {
                    return Err(ManifestError::InputBounds {
                        key: input.key.clone(),
                        min,
                        max,
                    });
                }
            }
        }

        for line in &self.extra_config {
            validate::validate_extra_config(line)?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
