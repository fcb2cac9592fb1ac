// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GPU profile resolution and NVIDIA library staging.

use appdock_catalog::GpuSpec;
use appdock_core::DevicePassthrough;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("unknown gpu profile: {0}")]
    UnknownProfile(String),
    #[error("gpu profile {profile} requires missing device node {device}")]
    DeviceMissing { profile: String, device: String },
    #[error("app requires a gpu but no declared profile resolves on this host")]
    NoneResolved,
    #[error("failed to stage nvidia libraries: {0}")]
    Staging(String),
}

struct ProfileDevice {
    path: &'static str,
    gid: Option<u32>,
    mode: Option<&'static str>,
}

struct Profile {
    name: &'static str,
    devices: &'static [ProfileDevice],
}

/// Built-in profiles. `dri-render` covers VAAPI-style transcode; the
/// render node is group `render` (gid 44) and world-writable in the guest.
const PROFILES: &[Profile] = &[
    Profile {
        name: "dri-render",
        devices: &[ProfileDevice {
            path: "/dev/dri/renderD128",
            gid: Some(44),
            mode: Some("0666"),
        }],
    },
    Profile {
        name: "nvidia-basic",
        devices: &[
            ProfileDevice {
                path: "/dev/nvidia0",
                gid: None,
                mode: None,
            },
            ProfileDevice {
                path: "/dev/nvidiactl",
                gid: None,
                mode: None,
            },
            ProfileDevice {
                path: "/dev/nvidia-uvm",
                gid: None,
                mode: None,
            },
        ],
    },
];

/// Library name patterns staged for NVIDIA userspace when the packaged
/// `nvidia/current` directory is absent.
const NVIDIA_LIB_PATTERNS: &[&str] = &[
    "libnvidia-*.so*",
    "libcuda*.so*",
    "libnvcuvid*",
    "libnvoptix*",
    "libvdpau_nvidia*",
    "libEGL_nvidia*",
    "libGLX_nvidia*",
    "libGLESv*_nvidia*",
];

const LIB_DIRS: &[&str] = &[
    "usr/lib/x86_64-linux-gnu",
    "usr/lib/aarch64-linux-gnu",
    "usr/lib",
    "usr/lib64",
];

/// Resolves GPU profiles against the host's device nodes.
///
/// `root` is `/` in production; tests point it at a scratch tree.
#[derive(Debug, Clone)]
pub struct GpuResolver {
    root: PathBuf,
}

impl GpuResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn host_path(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }

    fn profile(name: &str) -> Option<&'static Profile> {
        PROFILES.iter().find(|p| p.name == name)
    }

    fn missing_device(&self, profile: &Profile) -> Option<&'static str> {
        profile
            .devices
            .iter()
            .find(|d| !self.host_path(d.path).exists())
            .map(|d| d.path)
    }

    fn passthroughs(profile: &Profile) -> Vec<DevicePassthrough> {
        profile
            .devices
            .iter()
            .map(|d| DevicePassthrough {
                path: d.path.to_string(),
                gid: d.gid,
                mode: d.mode.map(str::to_string),
            })
            .collect()
    }

    /// Resolve the device list for a request.
    ///
    /// An explicit profile must exist and have all of its device nodes
    /// present. Auto-select walks the app's declared profiles in order and
    /// takes the first whose nodes are all present; when none resolves the
    /// result is empty unless the app requires a GPU, which is an error.
    /// One rule for both paths.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        spec: Option<&GpuSpec>,
    ) -> Result<Vec<DevicePassthrough>, GpuError> {
        if let Some(name) = explicit {
            let profile =
                Self::profile(name).ok_or_else(|| GpuError::UnknownProfile(name.to_string()))?;
            if let Some(device) = self.missing_device(profile) {
                return Err(GpuError::DeviceMissing {
                    profile: name.to_string(),
                    device: device.to_string(),
                });
            }
            return Ok(Self::passthroughs(profile));
        }

        let Some(spec) = spec else {
            return Ok(Vec::new());
        };
        for name in &spec.profiles {
            let Some(profile) = Self::profile(name) else {
                tracing::warn!(profile = %name, "manifest names unknown gpu profile, skipping");
                continue;
            };
            if self.missing_device(profile).is_none() {
                return Ok(Self::passthroughs(profile));
            }
        }
        if spec.required {
            return Err(GpuError::NoneResolved);
        }
        Ok(Vec::new())
    }

    /// NVIDIA kernel driver present on the host.
    pub fn nvidia_kernel_present(&self) -> bool {
        self.host_path("/proc/driver/nvidia/version").exists()
    }

    /// Prepare the host-side library directory to bind-mount read-only
    /// into the container.
    ///
    /// Prefers the packaged `nvidia/current` directory when it holds `.so`
    /// files. Otherwise globs the known userspace library patterns across
    /// the standard lib dirs, resolves each symlink to its real target,
    /// and builds a fresh staging directory of symlinks. Returns `None`
    /// when no libraries are found.
    pub fn stage_nvidia_libs(&self, staging_dir: &Path) -> Result<Option<PathBuf>, GpuError> {
        let packaged = self.host_path("/usr/lib/x86_64-linux-gnu/nvidia/current");
        if dir_has_libs(&packaged) {
            return Ok(Some(packaged));
        }

        let mut targets: Vec<PathBuf> = Vec::new();
        for lib_dir in LIB_DIRS {
            let dir = self.root.join(lib_dir);
            if !dir.is_dir() {
                continue;
            }
            for pattern in NVIDIA_LIB_PATTERNS {
                let full = dir.join(pattern);
                let Some(full) = full.to_str() else { continue };
                let paths = glob::glob(full)
                    .map_err(|e| GpuError::Staging(e.to_string()))?
                    .flatten();
                for path in paths {
                    let real = std::fs::canonicalize(&path)
                        .map_err(|e| GpuError::Staging(e.to_string()))?;
                    if !targets.contains(&real) {
                        targets.push(real);
                    }
                }
            }
        }
        if targets.is_empty() {
            return Ok(None);
        }

        // Fresh staging dir on every install; stale links from a previous
        // driver version must not survive.
        if staging_dir.exists() {
            std::fs::remove_dir_all(staging_dir).map_err(|e| GpuError::Staging(e.to_string()))?;
        }
        std::fs::create_dir_all(staging_dir).map_err(|e| GpuError::Staging(e.to_string()))?;
        for target in &targets {
            let Some(file_name) = target.file_name() else {
                continue;
            };
            let link = staging_dir.join(file_name);
            if link.exists() {
                continue;
            }
            std::os::unix::fs::symlink(target, &link)
                .map_err(|e| GpuError::Staging(e.to_string()))?;
        }
        tracing::info!(count = targets.len(), dir = %staging_dir.display(), "staged nvidia libraries");
        Ok(Some(staging_dir.to_path_buf()))
    }
}

fn dir_has_libs(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().contains(".so") {
            return true;
        }
    }
    false
}

#[cfg(test)]
#[path = "gpu_tests.rs"]
mod tests;
