//! Scenario: version comparison driving update eligibility.

use appdock_core::is_newer_version;

#[test]
fn spec_examples() {
    assert!(is_newer_version("v1.2.0", "1.1.9"));
    assert!(!is_newer_version("1.0.0", "1.0.0"));
    assert!(is_newer_version("1.0.1-beta", "1.0.0"));
    // Unparseable pairs fall back to string inequality.
    assert!(is_newer_version("latest", "stable"));
    assert!(!is_newer_version("latest", "latest"));
}

#[test]
fn strict_partial_order_on_semver() {
    let chain = ["3.1.0", "3.0.2", "2.9.9", "0.1.0"];
    for (i, newer) in chain.iter().enumerate() {
        assert!(!is_newer_version(newer, newer));
        for older in &chain[i + 1..] {
            assert!(is_newer_version(newer, older));
            assert!(!is_newer_version(older, newer));
        }
    }
}
