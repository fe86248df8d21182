// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;
use std::io::Write;

use super::*;

fn clear_env() {
    for key in [
        "SANDBOXD_SERVER__HOST",
        "SANDBOXD_SERVER__PORT",
        "SANDBOXD_STATE_DIR",
        "SANDBOXD_RECONCILER__INTERVAL_SECS",
        "SANDBOXD_WARM_POOL__INTERVAL_SECS",
        "SANDBOXD_DRIVER__TYPE",
        "SANDBOXD_DRIVER__SOCKET",
        "SANDBOXD_DRIVER__NAMESPACE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/sandboxd.toml")).unwrap();
    assert_eq!(config.server.port, 8080);
    assert!(matches!(config.driver, DriverConfig::Docker { socket: None }));
    assert!(config.profiles.is_empty());
}

#[test]
#[serial]
fn malformed_file_is_a_fatal_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "this is not valid toml [[[").unwrap();

    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseToml { .. }));
}

#[test]
#[serial]
fn toml_file_is_parsed_and_profiles_round_trip() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [[profiles]]
        id = "python-default"
        image = "sandboxd/python:3.12"
        cpus = 1.0
        memory = "512m"
        capabilities = ["shell", "filesystem"]
        idle_timeout_secs = 1800
        runtime_port = 8000
        warm_pool_size = 2
        warm_rotate_ttl_secs = 1800
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.profiles.len(), 1);
    assert_eq!(config.profiles[0].id, "python-default");
}

#[test]
#[serial]
fn env_override_wins_over_file_value() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nport = 9000\n").unwrap();

    std::env::set_var("SANDBOXD_SERVER__PORT", "7777");
    let config = Config::load(file.path()).unwrap();
    std::env::remove_var("SANDBOXD_SERVER__PORT");

    assert_eq!(config.server.port, 7777);
}

#[test]
#[serial]
fn invalid_env_override_is_a_fatal_error() {
    clear_env();
    std::env::set_var("SANDBOXD_SERVER__PORT", "not-a-port");
    let err = Config::load(Path::new("/nonexistent/sandboxd.toml")).unwrap_err();
    std::env::remove_var("SANDBOXD_SERVER__PORT");

    assert!(matches!(err, ConfigError::EnvOverride { key: "SANDBOXD_SERVER__PORT", .. }));
}

#[test]
#[serial]
fn driver_type_override_selects_k8s_and_requires_namespace() {
    clear_env();
    std::env::set_var("SANDBOXD_DRIVER__TYPE", "k8s");
    let err = Config::load(Path::new("/nonexistent/sandboxd.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::EnvOverride { key: "SANDBOXD_DRIVER__NAMESPACE", .. }));

    std::env::set_var("SANDBOXD_DRIVER__NAMESPACE", "sandboxes");
    let config = Config::load(Path::new("/nonexistent/sandboxd.toml")).unwrap();
    std::env::remove_var("SANDBOXD_DRIVER__TYPE");
    std::env::remove_var("SANDBOXD_DRIVER__NAMESPACE");

    assert!(matches!(config.driver, DriverConfig::K8s { namespace } if namespace == "sandboxes"));
}

#[test]
#[serial]
fn unknown_driver_type_is_a_fatal_error() {
    clear_env();
    std::env::set_var("SANDBOXD_DRIVER__TYPE", "qemu");
    let err = Config::load(Path::new("/nonexistent/sandboxd.toml")).unwrap_err();
    std::env::remove_var("SANDBOXD_DRIVER__TYPE");

    assert!(matches!(err, ConfigError::EnvOverride { key: "SANDBOXD_DRIVER__TYPE", .. }));
}

#[test]
#[serial]
fn resolve_path_prefers_flag_then_env_then_default() {
    clear_env();
    assert_eq!(Config::resolve_path(Some("/tmp/custom.toml")), PathBuf::from("/tmp/custom.toml"));

    std::env::set_var("SANDBOXD_CONFIG_FILE", "/tmp/from-env.toml");
    assert_eq!(Config::resolve_path(None), PathBuf::from("/tmp/from-env.toml"));
    std::env::remove_var("SANDBOXD_CONFIG_FILE");

    assert_eq!(Config::resolve_path(None), PathBuf::from("./sandboxd.toml"));
}
