// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured log framing from the in-container provisioning SDK.
//!
//! The SDK prefixes structured lines with `@@APPLOG@@` followed by a JSON
//! object. Parsing uses a tolerant field extractor rather than a JSON
//! parser: the payload is machine-generated, the hot path is per-line, and
//! the only escapes the SDK emits are `\"`, `\\`, `\n`, `\t` and `\uXXXX`.

use appdock_core::LogLevel;

pub(crate) const SENTINEL: &str = "@@APPLOG@@";

/// One parsed SDK line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AppLogLine {
    /// `info` / `warn` / `error` become job log rows.
    Message { level: LogLevel, message: String },
    /// `output` populates the job's outputs map.
    Output { key: String, value: String },
}

/// Parse a trimmed output line. Returns `None` for anything that is not a
/// well-formed sentinel line; callers record those as plain text.
pub(crate) fn parse_line(line: &str) -> Option<AppLogLine> {
    let payload = line.strip_prefix(SENTINEL)?;
    let level = extract_field(payload, "level")?;
    match level.as_str() {
        "info" | "warn" | "error" => {
            let message = extract_field(payload, "message")?;
            let level = LogLevel::parse(&level)?;
            Some(AppLogLine::Message { level, message })
        }
        "output" => {
            let key = extract_field(payload, "key")?;
            let value = extract_field(payload, "value")?;
            Some(AppLogLine::Output { key, value })
        }
        _ => None,
    }
}

/// Extract the string value of `"key": "..."` from a JSON-ish payload.
/// Tolerates arbitrary whitespace around the colon and handles `\"`,
/// `\\`, `\/`, `\n`, `\r`, `\t` and `\uXXXX` escapes in the value.
pub(crate) fn extract_field(payload: &str, key: &str) -> Option<String> {
    let needle = format!("\"{key}\"");
    let mut search_from = 0;
    loop {
        let found = payload[search_from..].find(&needle)? + search_from;
        let after_key = &payload[found + needle.len()..];
        let after_colon = after_key.trim_start();
        if let Some(rest) = after_colon.strip_prefix(':') {
            let rest = rest.trim_start();
            if let Some(value) = rest.strip_prefix('"') {
                return unescape_until_quote(value);
            }
        }
        // The needle appeared inside a value; keep looking.
        search_from = found + needle.len();
    }
}

fn unescape_until_quote(s: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next()? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                '/' => out.push('/'),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                'u' => {
                    let mut code = 0u32;
                    for _ in 0..4 {
                        code = code * 16 + chars.next()?.to_digit(16)?;
                    }
                    out.push(char::from_u32(code)?);
                }
                // Unknown escape: keep it verbatim rather than dropping data.
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            other => out.push(other),
        }
    }
    None
}

#[cfg(test)]
#[path = "applog_tests.rs"]
mod tests;
