//! Argument handling and commands that need no backends.

use predicates::prelude::*;

fn delve(args: &[&str]) -> assert_cmd::Command {
    let bin = assert_cmd::cargo::cargo_bin!("delve");
    let mut c = std::process::Command::new(bin);
    // No credentials at all: these commands must not reach the backends.
    c.args(args).env_clear().env("RUST_LOG", "off");
    assert_cmd::Command::from_std(c)
}

#[test]
fn version_runs_without_credentials() {
    let out = delve(&["version"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["kind"], "version");
    assert_eq!(v["ok"], true);
    assert_eq!(v["name"], "delve");
    assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));

    delve(&["version", "--output", "text"])
        .assert()
        .success()
        .stdout(format!("delve {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_slot_policy_is_rejected_before_configuration() {
    delve(&["research", "topic", "--slot-policy", "greedy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown slot policy: greedy"))
        .stderr(predicate::str::contains("allowed: release, hold"))
        .stderr(predicate::str::contains("DELVE_FEATHERLESS_API_KEY").not());
}

#[test]
fn research_rejects_non_numeric_breadth() {
    delve(&["research", "topic", "--breadth", "wide"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--breadth"));
}

#[test]
fn missing_env_file_is_a_startup_error() {
    let bin = assert_cmd::cargo::cargo_bin!("delve");
    let mut c = std::process::Command::new(bin);
    c.arg("version")
        .env_clear()
        .env("DELVE_ENV_FILE", "/nonexistent/delve.env")
        .env("RUST_LOG", "off");
    assert_cmd::Command::from_std(c)
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading env file /nonexistent/delve.env"));
}
