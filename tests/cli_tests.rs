//! CLI tests for the junos_rpc binary
//!
//! This test suite covers:
//! - Argument parsing with clap
//! - Module argument files (JSON and key=value)
//! - Command-line overrides and check mode
//! - Config file defaults
//! - Failure JSON and exit status
//! - Log file output
//!
//! None of these tests reach a device: they either stop in check mode or
//! fail before a connection is attempted.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;
use tempfile::{tempdir, NamedTempFile};

// Helper to get a command isolated from the caller's config and environment
fn junos_rpc_cmd(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("junos_rpc").unwrap();
    cmd.arg("--config")
        .arg(config)
        .env_remove("RUST_LOG")
        .env_remove("JUNOS_RPC_CONFIG")
        .env_remove("JUNOS_RPC_USER")
        .env_remove("JUNOS_RPC_PORT")
        .env_remove("JUNOS_RPC_TIMEOUT")
        .env_remove("JUNOS_RPC_FORMAT")
        .env_remove("JUNOS_RPC_LOGFILE")
        .env_remove("JUNOS_RPC_PRIVATE_KEY_FILE");
    cmd
}

// Helper to create a config file
fn create_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

// Helper to create a module arguments file
fn create_args_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be a JSON result")
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

#[test]
fn test_version_flag() {
    Command::cargo_bin("junos_rpc")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("junos_rpc"));
}

#[test]
fn test_help_flag() {
    Command::cargo_bin("junos_rpc")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Execute an RPC"));
}

// =============================================================================
// Failure Results
// =============================================================================

#[test]
fn test_missing_host_fails() {
    let config = create_config("");
    let output = junos_rpc_cmd(config.path())
        .args(["-a", "rpc=get-software-information"])
        .assert()
        .code(1)
        .get_output()
        .clone();

    let result = stdout_json(&output);
    assert_eq!(result["failed"], serde_json::json!(true));
    assert_eq!(
        result["msg"],
        serde_json::json!("Missing required parameter: host")
    );
}

#[test]
fn test_telnet_mode_fails_without_connecting() {
    let config = create_config("");
    junos_rpc_cmd(config.path())
        .args(["-a", "host=192.0.2.1"])
        .args(["-a", "rpc=get-software-information"])
        .args(["-a", "mode=telnet"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"failed\":true"))
        .stdout(predicate::str::contains("telnet"));
}

#[test]
fn test_invalid_format_fails() {
    let config = create_config("");
    junos_rpc_cmd(config.path())
        .args(["-a", "host=r1", "-a", "rpc=x", "-a", "format=yaml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Invalid format 'yaml'"));
}

#[test]
fn test_malformed_args_file_reports_path() {
    let config = create_config("");
    let args = create_args_file("{\"ANSIBLE_MODULE_ARGS\": ");
    let path = args.path().display().to_string();

    junos_rpc_cmd(config.path())
        .arg(args.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"failed\":true"))
        .stdout(predicate::str::contains(path));
}

// =============================================================================
// Check Mode
// =============================================================================

#[test]
fn test_json_args_file_in_check_mode() {
    let config = create_config("");
    let args = create_args_file(
        r#"{"ANSIBLE_MODULE_ARGS": {
            "host": "192.0.2.1",
            "rpc": "get-interface-information",
            "kwargs": "interface_name=em0,media=True",
            "_ansible_check_mode": true
        }}"#,
    );

    let output = junos_rpc_cmd(config.path())
        .arg(args.path())
        .assert()
        .success()
        .get_output()
        .clone();

    let result = stdout_json(&output);
    assert_eq!(result["changed"], serde_json::json!(false));
    assert_eq!(result["rpc"], serde_json::json!("get-interface-information"));
    assert_eq!(
        result["kwargs"],
        serde_json::json!({"interface_name": "em0", "media": true})
    );
    assert!(result.get("failed").is_none());
}

#[test]
fn test_key_value_args_file_with_override() {
    let config = create_config("");
    let args = create_args_file("host=192.0.2.1 rpc=get-software-information");

    let output = junos_rpc_cmd(config.path())
        .arg(args.path())
        .args(["-a", "rpc=get-chassis-inventory", "--check"])
        .assert()
        .success()
        .get_output()
        .clone();

    let result = stdout_json(&output);
    assert_eq!(result["rpc"], serde_json::json!("get-chassis-inventory"));
    assert_eq!(result["kwargs"], serde_json::json!({}));
}

// =============================================================================
// Config and Logging
// =============================================================================

#[test]
fn test_config_defaults_apply() {
    let config = create_config("[defaults]\nformat = \"yaml\"\n");
    junos_rpc_cmd(config.path())
        .args(["-a", "host=r1", "-a", "rpc=x", "--check"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Invalid format 'yaml'"));
}

#[test]
fn test_options_win_over_config_defaults() {
    let config = create_config("[defaults]\nformat = \"yaml\"\n");
    junos_rpc_cmd(config.path())
        .args(["-a", "host=r1", "-a", "rpc=x", "-a", "format=text", "--check"])
        .assert()
        .success();
}

#[test]
fn test_failure_logged_to_logfile() {
    let config = create_config("");
    let dir = tempdir().unwrap();
    let logfile = dir.path().join("junos_rpc.log");

    junos_rpc_cmd(config.path())
        .args(["-a", "host=192.0.2.1", "-a", "rpc=get-software-information"])
        .args(["-a", "mode=serial"])
        .arg("-a")
        .arg(format!("logfile={}", logfile.display()))
        .assert()
        .code(1);

    let log = std::fs::read_to_string(&logfile).unwrap();
    assert!(log.contains("junos_rpc failed"));
    assert!(log.contains("serial"));
    assert!(!log.contains("\u{1b}["));
}
