// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed validation of user inputs against a manifest's input specs.

use crate::manifest::{InputKind, InputSpec};
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("input {0} is required")]
    Required(String),
    #[error("input {0} must be a number")]
    NotANumber(String),
    #[error("input {key} must be at least {min}")]
    BelowMin { key: String, min: f64 },
    #[error("input {key} must be at most {max}")]
    AboveMax { key: String, max: f64 },
    #[error("input {key} must be at least {min} characters")]
    TooShort { key: String, min: usize },
    #[error("input {key} must be at most {max} characters")]
    TooLong { key: String, max: usize },
    #[error("input {key} does not match the required pattern")]
    PatternMismatch { key: String },
    #[error("input {key} carries an unusable pattern: {pattern}")]
    BadPattern { key: String, pattern: String },
    #[error("input {key} must be one of: {options}")]
    NotAnOption { key: String, options: String },
}

/// Validate `values` against the declared input specs.
///
/// Missing values fall back to the spec default. An absent optional input
/// skips the typed checks entirely; an absent required input fails.
pub fn validate_inputs(
    specs: &[InputSpec],
    values: &HashMap<String, String>,
) -> Result<(), InputError> {
    for spec in specs {
        let value = values
            .get(&spec.key)
            .map(String::as_str)
            .or(spec.default.as_deref())
            .unwrap_or("");

        if value.is_empty() {
            if spec.required {
                return Err(InputError::Required(spec.key.clone()));
            }
            continue;
        }

        if !spec.options.is_empty() && !spec.options.iter().any(|o| o == value) {
            return Err(InputError::NotAnOption {
                key: spec.key.clone(),
                options: spec.options.join(", "),
            });
        }

        match spec.kind {
            InputKind::Number => {
                let parsed: f64 = value
                    .parse()
                    .map_err(|_| InputError::NotANumber(spec.key.clone()))?;
                if let Some(min) = spec.min {
                    if parsed < min {
                        return Err(InputError::BelowMin {
                            key: spec.key.clone(),
                            min,
                        });
                    }
                }
                if let Some(max) = spec.max {
                    if parsed > max {
                        return Err(InputError::AboveMax {
                            key: spec.key.clone(),
                            max,
                        });
                    }
                }
            }
            InputKind::String | InputKind::Secret => {
                let len = value.chars().count();
                if let Some(min) = spec.min_len {
                    if len < min {
                        return Err(InputError::TooShort {
                            key: spec.key.clone(),
                            min,
                        });
                    }
                }
                if let Some(max) = spec.max_len {
                    if len > max {
                        return Err(InputError::TooLong {
                            key: spec.key.clone(),
                            max,
                        });
                    }
                }
                if let Some(pattern) = &spec.pattern {
                    let re = Regex::new(pattern).map_err(|_| InputError::BadPattern {
                        key: spec.key.clone(),
                        pattern: pattern.clone(),
                    })?;
                    if !re.is_match(value) {
                        return Err(InputError::PatternMismatch {
                            key: spec.key.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Merge request values over spec defaults, producing the effective input
/// map handed to the provisioning runner.
pub fn merge_defaults(
    specs: &[InputSpec],
    values: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = values.clone();
    for spec in specs {
        if let Some(default) = &spec.default {
            merged
                .entry(spec.key.clone())
                .or_insert_with(|| default.clone());
        }
    }
    merged
}

#[cfg(test)]
#[path = "inputs_tests.rs"]
mod tests;
