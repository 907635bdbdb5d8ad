//! Integration tests for the unisonctrl binary.
//!
//! These tests exercise the actual compiled binary using assert_cmd.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{TempDir, tempdir};

/// Get a Command for the unisonctrl binary
fn unisonctrl_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("unisonctrl"));
    cmd.env("NO_COLOR", "1").env_remove("UNISONCTRL_CONFIG").env_remove("RUST_LOG");
    cmd
}

/// Sync root with four top-level directories and a config pointing at it.
fn setup(unison_path: &Path, extra_rule: &str) -> (TempDir, PathBuf) {
    let temp = tempdir().unwrap();
    for dir in ["10", "11", "12", "20"] {
        fs::create_dir_all(temp.path().join("share").join(dir)).unwrap();
    }

    let config = format!(
        r#"
unison_path = "{unison}"
unison_local_root = "{root}"
unison_remote_root = "/srv/remote"
unison_remote_ssh_conn = "sync-host"
unison_local_hostname = "nas01"
unison_home_dir = "{home}"
unison_user = "syncd"
data_dir = "{data}"
unison_log_dir = "{logs}"
global_unison_config_options = ["-batch"]

[termination]
grace_period_ms = 1000
kill_period_ms = 2000
poll_interval_ms = 20

[[sync_hierarchy_rules]]
syncname = "batch1"
dir_selector = "1*"
sort_count = 2
{extra_rule}
[[sync_hierarchy_rules]]
syncname = "catchall"
dir_selector = "*"
"#,
        unison = unison_path.display(),
        root = temp.path().join("share").display(),
        home = temp.path().display(),
        data = temp.path().join("data").display(),
        logs = temp.path().join("logs").display(),
    );
    let path = temp.path().join("config.toml");
    fs::write(&path, config).unwrap();
    (temp, path)
}

/// Executable stand-in for unison that stays alive until SIGTERM. It does not
/// exec away, so the process keeps showing up as a run of this script.
fn fake_unison(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-unison");
    fs::write(
        &path,
        "#!/bin/sh\ntrap 'kill $! 2>/dev/null; exit 0' TERM\nsleep 30 &\nwait\n",
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ============================================================================
// Help and Configuration
// ============================================================================

#[test]
fn test_help_output() {
    unisonctrl_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("unison"))
        .stdout(predicate::str::contains("reconcile"));
}

#[test]
fn test_missing_config_fails() {
    unisonctrl_cmd()
        .args(["--config", "/nonexistent/unisonctrl.toml", "validate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("/nonexistent/unisonctrl.toml"));
}

#[test]
fn test_validate_reports_rules() {
    let (_temp, config) = setup(Path::new("/usr/bin/unison"), "");

    unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"))
        .stdout(predicate::str::contains("2 rules"))
        .stdout(predicate::str::contains("ssh://sync-host//srv/remote"));
}

#[test]
fn test_config_from_environment() {
    let (_temp, config) = setup(Path::new("/usr/bin/unison"), "");

    unisonctrl_cmd()
        .env("UNISONCTRL_CONFIG", &config)
        .args(["validate", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"batch1\""));
}

#[test]
fn test_validate_collects_violations() {
    let (temp, _) = setup(Path::new("/usr/bin/unison"), "");
    let config = temp.path().join("bad.toml");
    fs::write(
        &config,
        r#"
unison_local_root = "relative"
unison_remote_root = "/r"
unison_remote_ssh_conn = ""
unison_local_hostname = "h"
unison_home_dir = "/home/x"
unison_user = "x"

[[sync_hierarchy_rules]]
syncname = "a"
dir_selector = "*"

[[sync_hierarchy_rules]]
syncname = "a"
dir_selector = "*"
"#,
    )
    .unwrap();

    unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must be absolute"))
        .stderr(predicate::str::contains("unison_remote_ssh_conn"))
        .stderr(predicate::str::contains("duplicate syncname 'a'"));
}

#[test]
fn test_unknown_sort_method_is_a_warning() {
    let (_temp, config) = setup(Path::new("/usr/bin/unison"), "sort_method = \"bogus\"\n");

    unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("bogus"));
}

// ============================================================================
// Passes
// ============================================================================

#[test]
fn test_plan_json_lists_creates() {
    let (_temp, config) = setup(Path::new("/usr/bin/unison"), "");

    let output = unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .args(["plan", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let actions = plan["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0]["action"], "create");
    assert_eq!(actions[0]["syncname"], "batch1");
    assert_eq!(actions[0]["dirs"], serde_json::json!(["12", "11"]));
    assert_eq!(actions[1]["dirs"], serde_json::json!(["20", "10"]));
}

#[test]
fn test_plan_aborts_on_unknown_sort_method() {
    let (_temp, config) = setup(Path::new("/usr/bin/unison"), "sort_method = \"bogus\"\n");

    unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("partitioning aborted"));
}

#[test]
fn test_spawn_failures_exit_with_two() {
    let (temp, config) = setup(Path::new("/nonexistent/unison"), "");

    unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .args(["reconcile", "--no-wait"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("batch1"))
        .stdout(predicate::str::contains("2 failed"));

    let records = temp.path().join("data/running-sync-instances");
    assert_eq!(fs::read_dir(records).unwrap().count(), 0);
}

#[test]
fn test_list_without_instances() {
    let (_temp, config) = setup(Path::new("/usr/bin/unison"), "");

    unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No sync instances recorded"));
}

#[test]
fn test_reconcile_then_stop() {
    let scripts = tempdir().unwrap();
    let unison = fake_unison(scripts.path());
    let (temp, config) = setup(&unison, "");

    unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .arg("reconcile")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 created"));

    let records = temp.path().join("data/running-sync-instances");
    assert!(records.join("batch1.json").is_file());
    assert!(records.join("catchall.json").is_file());

    unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("batch1"))
        .stdout(predicate::str::contains("catchall"))
        .stdout(predicate::str::contains("running"))
        .stdout(predicate::str::contains("dead").not());

    unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .arg("reconcile")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 created"))
        .stdout(predicate::str::contains("2 unchanged"))
        .stdout(predicate::str::contains("process gone").not());

    let output = unisonctrl_cmd()
        .arg("--config")
        .arg(&config)
        .args(["stop", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["killed"], serde_json::json!(["batch1", "catchall"]));

    assert_eq!(fs::read_dir(records).unwrap().count(), 0);
}
