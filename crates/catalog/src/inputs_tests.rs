// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spec(key: &str) -> InputSpec {
    InputSpec {
        key: key.to_string(),
        label: String::new(),
        kind: InputKind::String,
        required: false,
        default: None,
        min: None,
        max: None,
        min_len: None,
        max_len: None,
        pattern: None,
        options: vec![],
    }
}

fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn required_empty_fails() {
    let mut s = spec("name");
    s.required = true;
    let err = validate_inputs(&[s], &values(&[])).unwrap_err();
    assert_eq!(err, InputError::Required("name".to_string()));
}

#[test]
fn required_satisfied_by_default() {
    let mut s = spec("name");
    s.required = true;
    s.default = Some("web".to_string());
    validate_inputs(&[s], &values(&[])).unwrap();
}

#[test]
fn optional_empty_skips_checks() {
    let mut s = spec("name");
    s.min_len = Some(10);
    validate_inputs(&[s], &values(&[])).unwrap();
}

#[yare::parameterized(
    integer   = { "8080", true },
    float     = { "3.5", true },
    negative  = { "-1", true },
    word      = { "eighty", false },
    empty_dot = { ".", false },
)]
fn number_parsing(value: &str, ok: bool) {
    let mut s = spec("port");
    s.kind = InputKind::Number;
    let result = validate_inputs(&[s], &values(&[("port", value)]));
    assert_eq!(result.is_ok(), ok);
}

#[test]
fn number_bounds() {
    let mut s = spec("port");
    s.kind = InputKind::Number;
    s.min = Some(1024.0);
    s.max = Some(65535.0);

    validate_inputs(
        std::slice::from_ref(&s),
        &values(&[("port", "8080")]),
    )
    .unwrap();
    assert_eq!(
        validate_inputs(std::slice::from_ref(&s), &values(&[("port", "80")])),
        Err(InputError::BelowMin {
            key: "port".to_string(),
            min: 1024.0
        })
    );
    assert_eq!(
        validate_inputs(std::slice::from_ref(&s), &values(&[("port", "70000")])),
        Err(InputError::AboveMax {
            key: "port".to_string(),
            max: 65535.0
        })
    );
}

#[test]
fn string_length_bounds() {
    let mut s = spec("user");
    s.min_len = Some(3);
    s.max_len = Some(8);

    validate_inputs(std::slice::from_ref(&s), &values(&[("user", "alice")])).unwrap();
    assert!(matches!(
        validate_inputs(std::slice::from_ref(&s), &values(&[("user", "al")])),
        Err(InputError::TooShort { .. })
    ));
    assert!(matches!(
        validate_inputs(std::slice::from_ref(&s), &values(&[("user", "alexandria")])),
        Err(InputError::TooLong { .. })
    ));
}

#[test]
fn pattern_matching() {
    let mut s = spec("slug");
    s.pattern = Some("^[a-z0-9-]+$".to_string());

    validate_inputs(std::slice::from_ref(&s), &values(&[("slug", "my-app-1")])).unwrap();
    assert!(matches!(
        validate_inputs(std::slice::from_ref(&s), &values(&[("slug", "My App")])),
        Err(InputError::PatternMismatch { .. })
    ));
}

#[test]
fn bad_pattern_reported() {
    let mut s = spec("slug");
    s.pattern = Some("[unclosed".to_string());
    assert!(matches!(
        validate_inputs(&[s], &values(&[("slug", "x")])),
        Err(InputError::BadPattern { .. })
    ));
}

#[test]
fn enum_options() {
    let mut s = spec("channel");
    s.options = vec!["stable".to_string(), "beta".to_string()];

    validate_inputs(std::slice::from_ref(&s), &values(&[("channel", "beta")])).unwrap();
    assert!(matches!(
        validate_inputs(std::slice::from_ref(&s), &values(&[("channel", "nightly")])),
        Err(InputError::NotAnOption { .. })
    ));
}

#[test]
fn secret_honors_length_bounds() {
    let mut s = spec("api_key");
    s.kind = InputKind::Secret;
    s.min_len = Some(16);
    assert!(matches!(
        validate_inputs(&[s], &values(&[("api_key", "short")])),
        Err(InputError::TooShort { .. })
    ));
}

#[test]
fn merge_defaults_fills_missing_only() {
    let mut a = spec("port");
    a.default = Some("8080".to_string());
    let mut b = spec("host");
    b.default = Some("0.0.0.0".to_string());

    let merged = merge_defaults(&[a, b], &values(&[("port", "9090")]));
    assert_eq!(merged.get("port").map(String::as_str), Some("9090"));
    assert_eq!(merged.get("host").map(String::as_str), Some("0.0.0.0"));
}
