// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalog lookup: app id → manifest.

use crate::manifest::{AppManifest, ManifestError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog dir {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid manifest {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: ManifestError,
    },
}

/// Read-only app lookup. The engine only ever reads manifests; authoring
/// and refresh are outside the engine.
pub trait Catalog: Send + Sync + 'static {
    fn get(&self, app_id: &str) -> Option<AppManifest>;

    fn list(&self) -> Vec<AppManifest>;

    /// Host-side directory holding the app's provisioning assets (script,
    /// templates). `None` when the catalog has no on-disk assets.
    fn provision_dir(&self, _app_id: &str) -> Option<PathBuf> {
        None
    }
}

/// In-memory catalog, used by tests and embedded app sets.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    apps: HashMap<String, AppManifest>,
}

impl MemoryCatalog {
    pub fn new(manifests: impl IntoIterator<Item = AppManifest>) -> Self {
        Self {
            apps: manifests.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    pub fn insert(&mut self, manifest: AppManifest) {
        self.apps.insert(manifest.id.clone(), manifest);
    }
}

impl Catalog for MemoryCatalog {
    fn get(&self, app_id: &str) -> Option<AppManifest> {
        self.apps.get(app_id).cloned()
    }

    fn list(&self) -> Vec<AppManifest> {
        let mut all: Vec<_> = self.apps.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

/// Catalog rooted at a directory: `<root>/<app-id>/manifest.toml` plus the
/// app's provisioning assets alongside it.
#[derive(Debug, Clone)]
pub struct DirCatalog {
    root: PathBuf,
    apps: HashMap<String, AppManifest>,
}

impl DirCatalog {
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let root = root.into();
        let mut apps = HashMap::new();

        let entries = std::fs::read_dir(&root).map_err(|source| CatalogError::Io {
            path: root.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| CatalogError::Io {
                path: root.clone(),
                source,
            })?;
            let manifest_path = entry.path().join("manifest.toml");
            if !manifest_path.is_file() {
                continue;
            }
            let raw =
                std::fs::read_to_string(&manifest_path).map_err(|source| CatalogError::Io {
                    path: manifest_path.clone(),
                    source,
                })?;
            let manifest: AppManifest =
                toml::from_str(&raw).map_err(|source| CatalogError::Parse {
                    path: manifest_path.clone(),
                    source,
                })?;
            manifest.validate().map_err(|source| CatalogError::Invalid {
                path: manifest_path.clone(),
                source,
            })?;
            tracing::debug!(app_id = %manifest.id, version = %manifest.version, "loaded manifest");
            apps.insert(manifest.id.clone(), manifest);
        }

        Ok(Self { root, apps })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Catalog for DirCatalog {
    fn get(&self, app_id: &str) -> Option<AppManifest> {
        self.apps.get(app_id).cloned()
    }

    fn list(&self) -> Vec<AppManifest> {
        let mut all: Vec<_> = self.apps.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    fn provision_dir(&self, app_id: &str) -> Option<PathBuf> {
        self.apps
            .contains_key(app_id)
            .then(|| self.root.join(app_id))
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
