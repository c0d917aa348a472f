//! CLI end-to-end tests

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the davpush binary
#[allow(deprecated)]
fn davpush_cmd() -> Command {
    let mut cmd = Command::cargo_bin("davpush").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("DAVPUSH_URL")
        .env_remove("DAVPUSH_USER")
        .env_remove("DAVPUSH_PASS")
        .env_remove("DAVPUSH_TOKEN");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    davpush_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    davpush_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("davpush"));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("davpush.toml");
    fs::write(
        &config,
        "[remote]\nurl = \"http://web.dav/dest/\"\ntoken = \"tok\"\n",
    )
    .unwrap();

    davpush_cmd()
        .arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Root: /dest/"));
}

#[test]
fn test_cli_validate_rejects_digest_without_credentials() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("davpush.toml");
    fs::write(
        &config,
        "[remote]\nurl = \"http://web.dav/dest/\"\ndigest = true\n",
    )
    .unwrap();

    davpush_cmd()
        .arg("validate")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Digest"));
}

#[test]
fn test_cli_push_dry_run_lists_destinations() {
    let work = tempdir().unwrap();
    let out = work.path().join("out");
    fs::create_dir_all(out.join("low")).unwrap();
    fs::write(out.join("master.m3u8"), "#EXTM3U\nlow/index.m3u8\n").unwrap();
    fs::write(out.join("low/index.m3u8"), "#EXTM3U\n#EXTINF:6.000,\n01.ts\n").unwrap();
    fs::write(out.join("low/01.ts"), b"segment").unwrap();

    let config = work.path().join("davpush.toml");
    fs::write(&config, "[remote]\nurl = \"http://web.dav/dest/\"\n").unwrap();

    davpush_cmd()
        .arg("--config")
        .arg(&config)
        .arg("push")
        .arg(&out)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("/dest/master.m3u8"))
        .stdout(predicate::str::contains("/dest/low/index.m3u8"))
        .stdout(predicate::str::contains("/dest/low/01.ts"))
        .stdout(predicate::str::contains("3 files would be pushed"));
}

#[test]
fn test_cli_push_missing_dir_fails() {
    davpush_cmd()
        .arg("push")
        .arg("/nonexistent/davpush/out")
        .arg("--dry-run")
        .assert()
        .failure();
}
