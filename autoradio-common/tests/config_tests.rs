//! Tests for configuration file discovery
//!
//! Tests that touch environment variables are marked #[serial] so they run
//! sequentially and do not observe each other's variables.

use autoradio_common::config::{default_data_folder, resolve_config_path, APP_DIR_NAME};
use autoradio_common::Error;
use serial_test::serial;
use std::env;
use std::path::Path;
use tempfile::TempDir;

const TEST_ENV_VAR: &str = "AUTORADIO_TEST_CONFIG";

#[test]
#[serial]
fn test_cli_argument_wins_over_env() {
    let dir = TempDir::new().unwrap();
    let cli_file = dir.path().join("cli.toml");
    let env_file = dir.path().join("env.toml");
    std::fs::write(&cli_file, "port = 1").unwrap();
    std::fs::write(&env_file, "port = 2").unwrap();

    env::set_var(TEST_ENV_VAR, &env_file);
    let resolved = resolve_config_path(Some(&cli_file), TEST_ENV_VAR).unwrap();
    env::remove_var(TEST_ENV_VAR);

    assert_eq!(resolved, Some(cli_file));
}

#[test]
#[serial]
fn test_missing_cli_file_is_an_error() {
    env::remove_var(TEST_ENV_VAR);
    let result = resolve_config_path(
        Some(Path::new("/nonexistent/autoradio/config.toml")),
        TEST_ENV_VAR,
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_var_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let env_file = dir.path().join("env.toml");
    std::fs::write(&env_file, "").unwrap();

    env::set_var(TEST_ENV_VAR, &env_file);
    let resolved = resolve_config_path(None, TEST_ENV_VAR).unwrap();
    env::remove_var(TEST_ENV_VAR);

    assert_eq!(resolved, Some(env_file));
}

#[test]
#[serial]
fn test_env_var_pointing_nowhere_is_an_error() {
    env::set_var(TEST_ENV_VAR, "/nonexistent/env/config.toml");
    let result = resolve_config_path(None, TEST_ENV_VAR);
    env::remove_var(TEST_ENV_VAR);

    match result {
        Err(Error::Config(msg)) => assert!(msg.contains(TEST_ENV_VAR)),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_no_overrides_never_errors() {
    env::remove_var(TEST_ENV_VAR);
    // Platform file may or may not exist on the test machine
    assert!(resolve_config_path(None, TEST_ENV_VAR).is_ok());
}

#[test]
fn test_default_data_folder_is_app_scoped() {
    let folder = default_data_folder();
    assert!(folder.to_string_lossy().contains(APP_DIR_NAME));
}
