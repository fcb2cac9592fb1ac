// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn pipeline_order() {
    let names: Vec<_> = PIPELINE.iter().map(|s| s.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "validate_request",
            "validate_manifest",
            "validate_placement",
            "allocate_ctid",
            "create_container",
            "read_volume_ids",
            "configure_container",
            "start_container",
            "wait_for_network",
            "setup_gpu_runtime",
            "install_base_packages",
            "push_assets",
            "provision",
            "healthcheck",
            "collect_outputs",
        ]
    );
}

#[test]
fn pipeline_has_no_terminal_states() {
    assert!(PIPELINE.iter().all(|s| !s.is_terminal()));
}

#[test]
fn output_rendering_substitutes_ip_and_inputs() {
    let mut inputs = HashMap::new();
    inputs.insert("port".to_string(), "8096".to_string());
    inputs.insert("user".to_string(), "admin".to_string());

    assert_eq!(
        render_output("http://{{ip}}:{{port}}/u/{{user}}", "10.0.0.9", &inputs),
        "http://10.0.0.9:8096/u/admin"
    );
}

#[test]
fn output_rendering_leaves_unknown_placeholders() {
    let inputs = HashMap::new();
    assert_eq!(
        render_output("{{ip}} and {{mystery}}", "10.0.0.9", &inputs),
        "10.0.0.9 and {{mystery}}"
    );
}

#[test]
fn output_rendering_with_empty_ip() {
    let inputs = HashMap::new();
    assert_eq!(render_output("http://{{ip}}/", "", &inputs), "http:///");
}
