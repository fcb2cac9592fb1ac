// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    empty          = { "", true },
    simple         = { "web1", true },
    hyphenated     = { "my-app-01", true },
    single_char    = { "a", true },
    leading_hyphen = { "-web", false },
    trailing_hyphen = { "web-", false },
    underscore     = { "my_app", false },
    too_long       = { "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", false },
)]
fn hostname(input: &str, ok: bool) {
    assert_eq!(validate_hostname(input).is_ok(), ok);
}

#[yare::parameterized(
    empty     = { "", true },
    vmbr0     = { "vmbr0", true },
    vmbr12    = { "vmbr12", true },
    bare      = { "vmbr", false },
    eth       = { "eth0", false },
    suffixed  = { "vmbr0x", false },
)]
fn bridge(input: &str, ok: bool) {
    assert_eq!(validate_bridge(input).is_ok(), ok);
}

#[yare::parameterized(
    empty        = { "", true },
    dhcp         = { "dhcp", true },
    plain        = { "192.168.1.50", true },
    cidr         = { "10.0.0.5/24", true },
    out_of_range = { "999.999.999.999", true },
    three_octets = { "10.0.0", false },
    empty_octet  = { "10..0.1", false },
    word         = { "auto", false },
    bad_mask     = { "10.0.0.1/abc", false },
    empty_mask   = { "10.0.0.1/", false },
)]
fn ip(input: &str, ok: bool) {
    assert_eq!(validate_ip(input).is_ok(), ok);
}

#[yare::parameterized(
    empty     = { "", true },
    single    = { "appstore", true },
    multi     = { "appstore;media_4;x-y", true },
    space     = { "a b", false },
    comma     = { "a,b", false },
)]
fn tags(input: &str, ok: bool) {
    assert_eq!(validate_tags(input).is_ok(), ok);
}

#[yare::parameterized(
    srv             = { "/srv/media", true },
    mnt             = { "/mnt/tank/data", true },
    etc             = { "/etc", false },
    etc_child       = { "/etc/passwd", false },
    dev             = { "/dev/shm", false },
    usr             = { "/usr/share", false },
    lib64           = { "/lib64", false },
    relative        = { "srv/media", false },
    dotdot          = { "/srv/../etc", false },
    dot             = { "/srv/./x", false },
    double_slash    = { "/srv//media", false },
    trailing_slash  = { "/srv/media/", false },
    root            = { "/", false },
    prefix_sibling  = { "/etcetera", true },
)]
fn bind_path(input: &str, ok: bool) {
    assert_eq!(validate_bind_path(input, &[]).is_ok(), ok);
}

#[test]
fn bind_path_respects_extra_denied() {
    assert!(validate_bind_path("/var/lib/appdock/x", &[]).is_ok());
    assert!(validate_bind_path("/var/lib/appdock/x", &["/var/lib/appdock"]).is_err());
    assert!(validate_bind_path("/var/lib/appdock", &["/var/lib/appdock"]).is_err());
}

#[yare::parameterized(
    card        = { "/dev/dri/card0", true },
    render      = { "/dev/dri/renderD128", true },
    nvidia0     = { "/dev/nvidia0", true },
    nvidiactl   = { "/dev/nvidiactl", true },
    uvm         = { "/dev/nvidia-uvm", true },
    uvm_tools   = { "/dev/nvidia-uvm-tools", true },
    tun         = { "/dev/net/tun", true },
    sda         = { "/dev/sda", false },
    mem         = { "/dev/mem", false },
    card_word   = { "/dev/dri/cardX", false },
    nvidia_bare = { "/dev/nvidia", false },
)]
fn device_path(input: &str, ok: bool) {
    assert_eq!(validate_device_path(input).is_ok(), ok);
}

#[yare::parameterized(
    rw_all   = { "0666", true },
    ro       = { "0444", true },
    no_zero  = { "666", false },
    too_long = { "06666", false },
    eight    = { "0668", false },
    word     = { "rw", false },
)]
fn device_mode(input: &str, ok: bool) {
    assert_eq!(validate_device_mode(input).is_ok(), ok);
}

#[yare::parameterized(
    simple       = { "APP_PORT", true },
    lower        = { "db_url", true },
    leading_us   = { "_PRIVATE", true },
    digit_lead   = { "1BAD", false },
    dash         = { "MY-VAR", false },
    empty        = { "", false },
    path         = { "PATH", false },
    path_lower   = { "path", false },
    ld_preload   = { "LD_PRELOAD", false },
    pythonpath   = { "PythonPath", false },
    home         = { "HOME", false },
)]
fn env_key(input: &str, ok: bool) {
    assert_eq!(validate_env_key(input).is_ok(), ok);
}

#[yare::parameterized(
    empty        = { "", true },
    blank_lines  = { "\n\n", true },
    cgroup2      = { "lxc.cgroup2.devices.allow = c 226:* rwm", true },
    mount_entry  = { "lxc.mount.entry = /dev/dri/renderD128 dev/dri/renderD128 none bind,optional,create=file", true },
    mount_auto   = { "lxc.mount.auto: cgroup", true },
    environment  = { "lxc.environment = NVIDIA_VISIBLE_DEVICES=all", true },
    multi        = { "lxc.cgroup2.devices.allow = c 195:* rwm\nlxc.mount.auto: sys", true },
    flag_inject  = { "--dangerous = x", false },
    no_delim     = { "lxc.mount.auto cgroup", false },
    rootfs       = { "lxc.rootfs.path = /tmp/evil", false },
    hook         = { "lxc.hook.pre-start = /bin/sh", false },
)]
fn extra_config(input: &str, ok: bool) {
    assert_eq!(validate_extra_config(input).is_ok(), ok);
}

#[test]
fn hwaddr_extracted_from_nic_config() {
    let net0 = "name=eth0,bridge=vmbr0,hwaddr=BC:24:11:0A:0B:0C,ip=dhcp,type=veth";
    assert_eq!(
        extract_hwaddr(net0).as_deref(),
        Some("BC:24:11:0A:0B:0C")
    );
}

#[yare::parameterized(
    missing   = { "name=eth0,bridge=vmbr0,ip=dhcp" },
    malformed = { "name=eth0,hwaddr=BC:24:11,ip=dhcp" },
    non_hex   = { "hwaddr=GG:24:11:0A:0B:0C" },
    empty     = { "" },
)]
fn hwaddr_rejects(net0: &str) {
    assert_eq!(extract_hwaddr(net0), None);
}
