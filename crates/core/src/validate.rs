// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure request validators.
//!
//! Everything here is a plain function over strings; nothing touches the
//! host. Optional fields accept the empty string.

use thiserror::Error;

/// Errors from request validation. Always returned synchronously, before a
/// job row is persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid hostname: {0:?}")]
    Hostname(String),
    #[error("invalid bridge: {0:?} (expected vmbrN)")]
    Bridge(String),
    #[error("invalid ip spec: {0:?}")]
    Ip(String),
    #[error("invalid tags: {0:?}")]
    Tags(String),
    #[error("bind mount host path not allowed: {0}")]
    BindPath(String),
    #[error("device path not allowed: {0}")]
    DevicePath(String),
    #[error("invalid device mode: {0:?} (expected octal 0NNN)")]
    DeviceMode(String),
    #[error("environment variable not allowed: {0}")]
    EnvKey(String),
    #[error("extra config line not allowed: {0:?}")]
    ExtraConfig(String),
}

/// Host path prefixes that may never back a bind mount. The engine adds its
/// own data and config directories on top of these.
pub const DENIED_BIND_PREFIXES: &[&str] = &[
    "/etc", "/proc", "/sys", "/dev", "/root", "/boot", "/usr", "/bin", "/sbin", "/lib", "/lib64",
];

/// Environment keys the provisioning runner owns; user env may not shadow
/// them (checked case-insensitively).
pub const RESERVED_ENV_KEYS: &[&str] = &[
    "PATH",
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "PYTHONPATH",
    "PYTHONUNBUFFERED",
    "HOME",
    "USER",
    "SHELL",
    "TERM",
];

/// Container config keys a manifest's extra lines may set.
pub const ALLOWED_EXTRA_CONFIG_PREFIXES: &[&str] = &[
    "lxc.cgroup2.devices.allow",
    "lxc.cgroup.devices.allow",
    "lxc.mount.entry",
    "lxc.mount.auto",
    "lxc.environment",
];

/// Optional. 1-63 chars, alphanumeric with inner hyphens.
pub fn validate_hostname(hostname: &str) -> Result<(), ValidationError> {
    if hostname.is_empty() {
        return Ok(());
    }
    let bytes = hostname.as_bytes();
    let ok = hostname.len() <= 63
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'-');
    if ok {
        Ok(())
    } else {
        Err(ValidationError::Hostname(hostname.to_string()))
    }
}

/// Optional. `vmbr` followed by at least one digit.
pub fn validate_bridge(bridge: &str) -> Result<(), ValidationError> {
    if bridge.is_empty() {
        return Ok(());
    }
    let ok = bridge
        .strip_prefix("vmbr")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::Bridge(bridge.to_string()))
    }
}

/// Optional. `dhcp`, or a dotted quad with an optional `/mask`. Format
/// check only; octet ranges are not enforced.
pub fn validate_ip(ip: &str) -> Result<(), ValidationError> {
    if ip.is_empty() || ip == "dhcp" {
        return Ok(());
    }
    let (addr, mask) = match ip.split_once('/') {
        Some((a, m)) => (a, Some(m)),
        None => (ip, None),
    };
    let quad_ok = addr.split('.').count() == 4
        && addr
            .split('.')
            .all(|octet| !octet.is_empty() && octet.len() <= 3 && octet.bytes().all(|b| b.is_ascii_digit()));
    let mask_ok = mask.map_or(true, |m| {
        !m.is_empty() && m.len() <= 2 && m.bytes().all(|b| b.is_ascii_digit())
    });
    if quad_ok && mask_ok {
        Ok(())
    } else {
        Err(ValidationError::Ip(ip.to_string()))
    }
}

/// Optional. Alphanumerics plus `-`, `_`, `;`.
pub fn validate_tags(tags: &str) -> Result<(), ValidationError> {
    let ok = tags
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ';'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::Tags(tags.to_string()))
    }
}

/// Bind-mount host path: absolute, cleaned (no `.`, `..`, empty or trailing
/// components), and not equal to or under any denied prefix. `extra_denied`
/// carries the engine's own data and config dirs.
pub fn validate_bind_path(path: &str, extra_denied: &[&str]) -> Result<(), ValidationError> {
    let deny = || Err(ValidationError::BindPath(path.to_string()));
    if !path.starts_with('/') || path.len() < 2 {
        return deny();
    }
    for component in path[1..].split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return deny();
        }
    }
    for prefix in DENIED_BIND_PREFIXES.iter().copied().chain(extra_denied.iter().copied()) {
        if path == prefix || path.starts_with(&format!("{}/", prefix)) {
            return deny();
        }
    }
    Ok(())
}

/// Device node allow-list: DRI card/render nodes, NVIDIA devices, and the
/// TUN device.
pub fn validate_device_path(path: &str) -> Result<(), ValidationError> {
    let numbered = |rest: &str| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit());
    let ok = path
        .strip_prefix("/dev/dri/card")
        .is_some_and(numbered)
        || path.strip_prefix("/dev/dri/renderD").is_some_and(numbered)
        || path.strip_prefix("/dev/nvidia").is_some_and(numbered)
        || path == "/dev/nvidiactl"
        || path == "/dev/nvidia-uvm"
        || path == "/dev/nvidia-uvm-tools"
        || path == "/dev/net/tun";
    if ok {
        Ok(())
    } else {
        Err(ValidationError::DevicePath(path.to_string()))
    }
}

/// Device mode, if set, must be octal `0NNN`.
pub fn validate_device_mode(mode: &str) -> Result<(), ValidationError> {
    let bytes = mode.as_bytes();
    let ok = bytes.len() == 4
        && bytes[0] == b'0'
        && bytes[1..].iter().all(|b| (b'0'..=b'7').contains(b));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::DeviceMode(mode.to_string()))
    }
}

/// Env key: `[A-Za-z_][A-Za-z0-9_]*`, not shadowing a reserved key.
pub fn validate_env_key(key: &str) -> Result<(), ValidationError> {
    let bytes = key.as_bytes();
    let shape_ok = !key.is_empty()
        && (bytes[0].is_ascii_alphabetic() || bytes[0] == b'_')
        && bytes[1..].iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_');
    if !shape_ok {
        return Err(ValidationError::EnvKey(key.to_string()));
    }
    if RESERVED_ENV_KEYS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(key))
    {
        return Err(ValidationError::EnvKey(key.to_string()));
    }
    Ok(())
}

/// Extra container config lines. Each non-empty line must not begin with
/// `-` (would be parsed as a flag by `set` commands), must contain `=` or
/// `:`, and its key must match an allowed prefix.
pub fn validate_extra_config(lines: &str) -> Result<(), ValidationError> {
    for line in lines.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('-') {
            return Err(ValidationError::ExtraConfig(line.to_string()));
        }
        let delim = line.find(['=', ':']);
        let Some(delim) = delim else {
            return Err(ValidationError::ExtraConfig(line.to_string()));
        };
        let key = line[..delim].trim();
        let allowed = ALLOWED_EXTRA_CONFIG_PREFIXES
            .iter()
            .any(|prefix| key == *prefix || key.starts_with(prefix));
        if !allowed {
            return Err(ValidationError::ExtraConfig(line.to_string()));
        }
    }
    Ok(())
}

/// Extract the `hwaddr=` value from a comma-joined NIC config string
/// (`name=eth0,bridge=vmbr0,hwaddr=BC:24:11:0A:0B:0C,ip=dhcp`). Returns
/// `None` unless the value is a well-formed MAC.
pub fn extract_hwaddr(net_config: &str) -> Option<String> {
    net_config
        .split(',')
        .find_map(|kv| kv.trim().strip_prefix("hwaddr="))
        .filter(|mac| is_mac(mac))
        .map(str::to_string)
}

fn is_mac(s: &str) -> bool {
    let groups: Vec<&str> = s.split(':').collect();
    groups.len() == 6
        && groups
            .iter()
            .all(|g| g.len() == 2 && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
