// ABOUTME: Integration tests for the quayd command line.
// ABOUTME: Validates --help output and startup failures that happen before serving.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn quayd_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("quayd"))
}

#[test]
fn help_shows_options() {
    quayd_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--listen"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--debug"));
}

#[test]
fn version_flag_prints_version() {
    quayd_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_config_file_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    quayd_cmd()
        .current_dir(temp_dir.path())
        .env_remove("QUAYD_CONFIG")
        .args(["--config", "does-not-exist.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn invalid_listen_address_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    quayd_cmd()
        .current_dir(temp_dir.path())
        .env_remove("QUAYD_CONFIG")
        .args(["--listen", "ftp://nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown listen address"));
}

#[test]
fn malformed_config_file_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("quayd.yml"), "listen: [\n").unwrap();

    quayd_cmd()
        .current_dir(temp_dir.path())
        .env_remove("QUAYD_CONFIG")
        .assert()
        .failure()
        .stderr(predicate::str::contains("YAML parse error"));
}
