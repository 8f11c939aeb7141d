//! Integration tests for the `canlight` binary.
//!
//! These tests exercise the CLI binary via `assert_cmd`, covering commands
//! that need no bus (help, version, config) and argument errors that are
//! rejected before any device is contacted.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn cli() -> assert_cmd::Command {
    cargo_bin_cmd!("canlight")
}

#[test]
fn cli_help_succeeds() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("canlight"));
}

#[test]
fn cli_version_prints_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_config_json_produces_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "interface = \"vcan0\"\ndevice_id = 17\n\n[[registers]]\nindex = 1\ntime = 0.5\ncolor = \"red\"\n",
    )
    .unwrap();

    let output = cli()
        .arg("--config")
        .arg(&path)
        .args(["--json", "config"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value =
        serde_json::from_slice(&output).expect("config --json should produce valid JSON");
    assert!(
        json["settings"].is_object(),
        "JSON output should contain 'settings' object"
    );
    assert_eq!(json["config_file_exists"], true);
    assert_eq!(json["settings"]["interface"], "vcan0");
    assert_eq!(json["settings"]["device_id"], 17);
    assert_eq!(json["settings"]["registers"][0]["color"], "red");
    assert!(json["problems"].as_array().unwrap().is_empty());
}

#[test]
fn cli_config_reports_overrides_and_problems() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.toml");

    let output = cli()
        .arg("--config")
        .arg(&path)
        .args(["--id", "99", "--interface", "can7", "--json", "config"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["config_file_exists"], false);
    assert_eq!(json["settings"]["interface"], "can7");
    assert_eq!(json["settings"]["device_id"], 99);
    assert_eq!(json["problems"].as_array().unwrap().len(), 1);
}

#[test]
fn cli_config_human_output() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("not found, using defaults"))
        .stdout(predicate::str::contains("can0"));
}

#[test]
fn cli_config_init_writes_effective_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    cli()
        .arg("--config")
        .arg(&path)
        .args(["--id", "12", "config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("# CANLight configuration"));
    assert!(contents.contains("device_id = 12"));

    // The written file is what `config` now reports.
    let output = cli()
        .arg("--config")
        .arg(&path)
        .args(["--json", "config"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["config_file_exists"], true);
    assert_eq!(json["settings"]["device_id"], 12);
}

#[test]
fn cli_config_init_keeps_existing_file_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "device_id = 9\n").unwrap();

    cli()
        .arg("--config")
        .arg(&path)
        .args(["config", "--init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "device_id = 9\n");

    cli()
        .arg("--config")
        .arg(&path)
        .args(["--id", "20", "config", "--init", "--force"])
        .assert()
        .success();
    assert!(std::fs::read_to_string(&path).unwrap().contains("device_id = 20"));
}

#[test]
fn cli_config_init_rejects_invalid_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    cli()
        .arg("--config")
        .arg(&path)
        .args(["--id", "99", "config", "--init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("device_id 99"));
    assert!(!path.exists());
}

#[test]
fn cli_config_force_requires_init() {
    cli().args(["config", "--force"]).assert().failure();
}

// ── --verbose flag ──

#[test]
fn cli_verbose_flag_accepted() {
    cli().args(["-v", "config"]).assert().success();
}

#[test]
fn cli_verbose_long_flag_accepted() {
    cli().args(["--verbose", "config"]).assert().success();
}

// ── Rejected before the bus ──

#[test]
fn cli_invalid_identifier_fails() {
    cli()
        .args(["--id", "0", "reset"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn cli_bad_color_fails() {
    cli()
        .args(["show", "not-a-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn cli_watch_zero_interval_fails() {
    cli()
        .args(["watch", "--interval", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval"));
}

#[test]
fn cli_missing_argument_is_usage_error() {
    cli().args(["flash"]).assert().failure().code(2);
}

// ── Subcommand help ──
// Device-requiring commands tested via --help to avoid bus-dependent errors.

#[test]
fn cli_show_help_succeeds() {
    cli()
        .args(["show", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("color"));
}

#[test]
fn cli_write_help_succeeds() {
    cli()
        .args(["write", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("register"));
}

#[test]
fn cli_cycle_help_succeeds() {
    cli()
        .args(["cycle", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registers"));
}

#[test]
fn cli_blink_help_succeeds() {
    cli()
        .args(["blink", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("diagnostic LED"));
}

#[test]
fn cli_info_help_succeeds() {
    cli()
        .args(["info", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("metadata"));
}

#[test]
fn cli_setup_help_succeeds() {
    cli()
        .args(["setup", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("register programme"));
}
