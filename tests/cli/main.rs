//! CLI surface tests: argument validation, exit codes, and terminal output.
//!
//! These run the real `upkit` binary against local manifest and package
//! files. Exit codes are the contract scripts rely on: 0 success or up to
//! date, 1 bad arguments or configuration, 2 failed update.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// A bare upkit command with colors off.
fn upkit() -> Command {
    let mut cmd = Command::cargo_bin("upkit").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

/// One on-disk release: an application directory holding a version 1
/// binary, and a JSON manifest pointing at a real zip package.
struct CliFixture {
    temp: TempDir,
    app_dir: PathBuf,
    staging_dir: PathBuf,
    manifest: String,
}

impl CliFixture {
    fn new(version: &str, package_entries: &[(&str, &[u8])]) -> Self {
        let temp = TempDir::new().unwrap();
        let app_dir = temp.path().join("acme");
        let staging_dir = temp.path().join("staging");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(app_dir.join("acme"), b"binary-v1").unwrap();

        let package = zip_package(package_entries);
        let package_path = temp.path().join(format!("acme-{version}.zip"));
        std::fs::write(&package_path, &package).unwrap();

        let manifest_path = temp.path().join("manifest.json");
        std::fs::write(&manifest_path, manifest_json(version, &package_path, &package)).unwrap();

        Self {
            temp,
            app_dir,
            staging_dir,
            manifest: location(&manifest_path),
        }
    }

    /// An upkit command pointed at this fixture, isolated from any global
    /// configuration on the host.
    fn command(&self) -> Command {
        let mut cmd = upkit();
        cmd.env("UPKIT_CONFIG_PATH", self.temp.path().join("absent-config.toml"))
            .arg("--directory")
            .arg(&self.app_dir)
            .arg("--package-manifest")
            .arg(&self.manifest)
            .arg("--staging-dir")
            .arg(&self.staging_dir)
            .arg("--no-progress");
        cmd
    }

    /// Swap the manifest's checksum for one that cannot match.
    fn break_checksum(&self) {
        let path = self.temp.path().join("manifest.json");
        let doc = std::fs::read_to_string(&path).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&doc).unwrap();
        value["packages"][0]["checksum"] =
            serde_json::Value::String(format!("sha256:{}", "0".repeat(64)));
        std::fs::write(&path, value.to_string()).unwrap();
    }

    fn app_file(&self, rel: &str) -> Vec<u8> {
        std::fs::read(self.app_dir.join(rel)).unwrap()
    }
}

fn location(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

fn zip_package(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn manifest_json(version: &str, package_path: &Path, bytes: &[u8]) -> String {
    format!(
        r#"{{
    "name": "acme",
    "packages": [
        {{
            "version": "{version}",
            "url": "{url}",
            "checksum": "sha256:{checksum}",
            "size": {size}
        }}
    ]
}}"#,
        url = location(package_path),
        checksum = hex::encode(Sha256::digest(bytes)),
        size = bytes.len()
    )
}

/// Without the required flags the process exits 1 with a usage error.
#[test]
fn test_missing_arguments_exit_code_one() {
    upkit().assert().failure().code(1).stderr(predicate::str::contains("--directory"));
}

/// `--help` is not an error.
#[test]
fn test_help_exits_zero() {
    upkit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--package-manifest"));
}

/// `--version` prints the crate version and exits 0.
#[test]
fn test_version_flag() {
    upkit().arg("--version").assert().success().stdout(predicate::str::contains("upkit"));
}

/// A malformed --current-version is rejected at parse time.
#[test]
fn test_invalid_current_version_rejected() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    fixture
        .command()
        .arg("--current-version")
        .arg("not-a-version")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--current-version"));
}

/// `--executable-args` is only valid together with `--executable`.
#[test]
fn test_executable_args_require_executable() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    fixture
        .command()
        .arg("--executable-args")
        .arg("resume")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--executable"));
}

/// A directory that does not exist is a configuration error (exit 1),
/// not an update failure.
#[test]
fn test_missing_directory_is_configuration_error() {
    let temp = TempDir::new().unwrap();
    let manifest = temp.path().join("manifest.json");
    std::fs::write(&manifest, r#"{ "packages": [] }"#).unwrap();

    upkit()
        .env("UPKIT_CONFIG_PATH", temp.path().join("absent-config.toml"))
        .arg("--directory")
        .arg(temp.path().join("no-such-app"))
        .arg("--package-manifest")
        .arg(&manifest)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid configuration"));
}

/// An unreadable global configuration file aborts before any update work.
#[test]
fn test_invalid_global_config_rejected() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    let config = fixture.temp.path().join("config.toml");
    std::fs::write(&config, "this is not toml [").unwrap();

    fixture
        .command()
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to load configuration"));
}

/// A complete update through the binary: exit 0, a success line, and the
/// new file contents on disk.
#[test]
fn test_update_installs_and_exits_zero() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    fixture
        .command()
        .arg("--current-version")
        .arg("1.0")
        .assert()
        .success()
        .stdout(predicate::str::contains("Update installed"));

    assert_eq!(fixture.app_file("acme"), b"binary-v2");
}

/// When nothing newer is published the run exits 0 and says so.
#[test]
fn test_up_to_date_exit_zero() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    fixture
        .command()
        .arg("--current-version")
        .arg("2.0")
        .assert()
        .success()
        .stdout(predicate::str::contains("already up to date"));

    assert_eq!(fixture.app_file("acme"), b"binary-v1");
}

/// A failed update exits 2 and explains the failure on stderr.
#[test]
fn test_failed_update_exit_code_two() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    fixture.break_checksum();

    fixture
        .command()
        .arg("--current-version")
        .arg("1.0")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Checksum mismatch"));

    assert_eq!(fixture.app_file("acme"), b"binary-v1");
}

/// A manifest published for a different application fails the update
/// (exit 2); the mismatch is only visible once resolution runs.
#[test]
fn test_manifest_name_mismatch_exit_code_two() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    fixture
        .command()
        .arg("--name")
        .arg("other-product")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("manifest is for"));
}

/// `--quiet` suppresses all status output on a successful update.
#[test]
fn test_quiet_update_prints_nothing() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    fixture
        .command()
        .arg("--quiet")
        .arg("--current-version")
        .arg("1.0")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

/// `--verbose` turns on debug logging to stderr without touching stdout.
#[test]
fn test_verbose_logs_to_stderr() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    fixture
        .command()
        .arg("--verbose")
        .arg("--current-version")
        .arg("1.0")
        .assert()
        .success()
        .stderr(predicate::str::contains("logging initialized"));
}

/// Waiting on a process ID that cannot exist returns immediately instead
/// of blocking the update.
#[test]
fn test_wait_for_absent_process_does_not_block() {
    let fixture = CliFixture::new("2.0", &[("acme", b"binary-v2")]);
    fixture
        .command()
        .arg("--wait-for-process")
        .arg("4294967295")
        .arg("--current-version")
        .arg("1.0")
        .timeout(Duration::from_secs(30))
        .assert()
        .success();
}

/// After a successful update the configured executable is started, with
/// its executable bit repaired first.
#[cfg(unix)]
#[test]
fn test_relaunch_starts_updated_executable() {
    let fixture = CliFixture::new(
        "2.0",
        &[
            ("acme", b"binary-v2"),
            ("bin/launch.sh", b"#!/bin/sh\ntouch relaunched\n"),
        ],
    );

    fixture
        .command()
        .arg("--current-version")
        .arg("1.0")
        .arg("--executable")
        .arg("bin/launch.sh")
        .assert()
        .success()
        .stdout(predicate::str::contains("Started"));

    // The script runs detached with the application directory as its
    // working directory; give it a moment to drop the marker.
    let marker = fixture.app_dir.join("relaunched");
    for _ in 0..50 {
        if marker.exists() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(marker.exists(), "relaunched script should have run");
}
