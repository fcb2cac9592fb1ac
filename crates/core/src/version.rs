// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version comparison for catalog updates.

/// Returns true when `candidate` is strictly newer than `current`.
///
/// Both sides tolerate a leading `v`/`V` and a pre-release or build suffix
/// (`1.2.0-beta`, `1.2.0+44`); the suffix is ignored for ordering. Missing
/// components count as zero, so `1.2` == `1.2.0`. When either side does not
/// parse as a version at all, falls back to raw string inequality so that a
/// moving tag like `latest` still triggers an update.
pub fn is_newer_version(candidate: &str, current: &str) -> bool {
    match (parse(candidate), parse(current)) {
        (Some(a), Some(b)) => a > b,
        _ => candidate != current,
    }
}

fn parse(version: &str) -> Option<[u64; 3]> {
    let v = version.trim();
    let v = v.strip_prefix(['v', 'V']).unwrap_or(v);
    // Cut the pre-release / build-metadata suffix.
    let core = v
        .split_once(['-', '+'])
        .map(|(head, _)| head)
        .unwrap_or(v);
    if core.is_empty() {
        return None;
    }

    let mut parts = [0u64; 3];
    let mut count = 0;
    for piece in core.split('.') {
        if count == 3 {
            return None;
        }
        parts[count] = piece.parse().ok()?;
        count += 1;
    }
    Some(parts)
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
