//! Integration tests for the CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[test]
fn test_cli_scan_help() {
    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("scan").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Scan project dependencies"));
}

#[test]
fn test_cli_check_help() {
    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("check").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Check the health of a single package"));
}

#[test]
fn test_cli_alternatives_help() {
    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("alternatives").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("List known alternatives"));
}

#[test]
fn test_cli_alternatives_known_package() {
    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("alternatives").arg("requests");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("httpx"));
}

#[test]
fn test_cli_alternatives_unknown_package() {
    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("alternatives").arg("some-bespoke-internal-lib");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No known alternatives"));
}

#[test]
fn test_cli_scan_empty_directory() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("--no-cache").arg("scan").arg(dir.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No dependencies found"));
}

#[test]
fn test_cli_rejects_bad_severity() {
    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("scan").arg(".").arg("--fail-on").arg("apocalyptic");

    cmd.assert().failure();
}

#[test]
#[ignore] // Requires network access
fn test_cli_scan_sample_project() {
    let sample_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("sample_project");

    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("--no-cache").arg("scan").arg(sample_path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Dependency Health Summary"));
}

#[test]
#[ignore] // Requires network access
fn test_cli_scan_json_format() {
    let sample_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("sample_project");

    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("--no-cache")
        .arg("scan")
        .arg(sample_path)
        .arg("--format")
        .arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"health\""));
}

#[test]
#[ignore] // Requires network access
fn test_cli_check_package() {
    let mut cmd = Command::cargo_bin("pkg-health").unwrap();
    cmd.arg("--no-cache").arg("check").arg("requests");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("requests"));
}
