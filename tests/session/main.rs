//! End-to-end update session tests over file-backed manifests and packages.
//!
//! Everything here drives a real [`UpdatingSession`] against local files:
//! a manifest in a release directory, a package archive next to it, and an
//! application directory that gets updated, rolled back, or left alone.

mod fixtures;

use fixtures::{
    TestInstall, sha256_hex, single_package_manifest, stored_zip_package, targz_package,
    zip_package,
};
use tokio::sync::broadcast;
use upkit::backup::BackupManager;
use upkit::config::SessionConfig;
use upkit::core::{CancellationToken, UpdateError};
use upkit::session::{SessionEvent, UpdaterState, UpdatingSession};
use upkit::version::PackageVersion;

/// Collect every event already buffered on a receiver.
fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// The state-machine path taken, in emission order.
fn states(events: &[SessionEvent]) -> Vec<UpdaterState> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StateChanged { new, .. } => Some(*new),
            _ => None,
        })
        .collect()
}

fn session_config(install: &TestInstall, manifest: &str) -> SessionConfig {
    SessionConfig::new(&install.app_dir, manifest).with_staging_dir(&install.staging_dir)
}

/// A zip package flows through resolve, download, verify, backup and
/// install, ending with the new files on disk and no backup left behind.
#[tokio::test]
async fn test_zip_package_installs_end_to_end() {
    let install = TestInstall::new();
    install.seed_v1();

    let package = zip_package(&[
        ("acme", b"binary-v2"),
        ("plugins/greeter.so", b"plugin-v2"),
        ("lib/core.so", b"lib-v2"),
    ]);
    let manifest = install.publish_release("2.0.0", "acme-2.0.0.zip", &package);

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();
    let mut events = session.subscribe();

    let outcome = session.run().await.unwrap();

    assert!(outcome.succeeded());
    assert!(!outcome.already_up_to_date);
    let installed = outcome.installed.expect("a package was installed");
    assert_eq!(installed.version, PackageVersion::new(2, 0, 0, 0));

    // New content in place, files the package does not carry are kept.
    assert_eq!(install.app_file("acme"), b"binary-v2");
    assert_eq!(install.app_file("plugins/greeter.so"), b"plugin-v2");
    assert_eq!(install.app_file("lib/core.so"), b"lib-v2");
    assert_eq!(install.app_file("config/settings.toml"), b"theme = \"dark\"\n");

    // Backup discarded, staging cleaned.
    assert!(!install.backup_dir().exists());
    assert!(install.staged_packages().is_empty());
    assert!(install.partial_downloads().is_empty());

    let events = drain(&mut events);
    assert_eq!(
        states(&events),
        vec![
            UpdaterState::Initializing,
            UpdaterState::ResolvingPackage,
            UpdaterState::DownloadingPackage,
            UpdaterState::VerifyingPackage,
            UpdaterState::BackingUpApplication,
            UpdaterState::InstallingPackage,
            UpdaterState::Succeeded,
        ]
    );

    let resolved = events.iter().find_map(|event| match event {
        SessionEvent::PackageResolved { version, size, .. } => Some((*version, *size)),
        _ => None,
    });
    assert_eq!(
        resolved,
        Some((PackageVersion::new(2, 0, 0, 0), Some(package.len() as u64)))
    );

    let last_install_percent = events.iter().rev().find_map(|event| match event {
        SessionEvent::InstallProgress { percent } => Some(*percent),
        _ => None,
    });
    assert_eq!(last_install_percent, Some(100));
}

/// Gzip-compressed tar packages install through the same pipeline.
#[tokio::test]
async fn test_tar_gz_package_installs() {
    let install = TestInstall::new();
    install.seed_v1();

    let package = targz_package(&[("acme", b"binary-v2-tar"), ("lib/core.so", b"lib-v2")]);
    let manifest = install.publish_release("2.1", "acme-2.1.tar.gz", &package);

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();

    let outcome = session.run().await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(install.app_file("acme"), b"binary-v2-tar");
    assert_eq!(install.app_file("lib/core.so"), b"lib-v2");
    assert!(!install.backup_dir().exists());
}

/// An `.xml` manifest resolves and installs like a JSON one.
#[tokio::test]
async fn test_xml_manifest_installs() {
    let install = TestInstall::new();
    install.seed_v1();

    let package = zip_package(&[("acme", b"binary-from-xml")]);
    let url = install.publish_package("acme-3.0.zip", &package);
    let manifest = install.publish_manifest(
        "manifest.xml",
        &format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<packages name="acme">
    <package>
        <version>3.0</version>
        <url>{url}</url>
        <checksum>sha256:{checksum}</checksum>
        <size>{size}</size>
    </package>
</packages>"#,
            checksum = sha256_hex(&package),
            size = package.len(),
        ),
    );

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(2, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();

    let outcome = session.run().await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.installed.unwrap().version, PackageVersion::new(3, 0, 0, 0));
    assert_eq!(install.app_file("acme"), b"binary-from-xml");
}

/// `file://` URLs work for both the manifest location and the package URL.
#[tokio::test]
async fn test_file_url_locations() {
    let install = TestInstall::new();
    install.seed_v1();

    let package = zip_package(&[("acme", b"binary-v2")]);
    let package_path = install.publish_package("acme-2.0.zip", &package);
    let manifest_path = install.publish_manifest(
        "manifest.json",
        &single_package_manifest("2.0", &format!("file://{package_path}"), &package),
    );

    let config = session_config(&install, &format!("file://{manifest_path}"))
        .with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();

    let outcome = session.run().await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(install.app_file("acme"), b"binary-v2");
}

/// Package selection honors the configured platform and its synonyms: a
/// manifest tagged `x64` matches a session selecting for `x86_64`.
#[tokio::test]
async fn test_platform_tags_select_the_right_package() {
    let install = TestInstall::new();
    install.seed_v1();

    let linux_pkg = zip_package(&[("acme", b"linux-build")]);
    let windows_pkg = zip_package(&[("acme", b"windows-build")]);
    let linux_url = install.publish_package("acme-3.0-linux.zip", &linux_pkg);
    let windows_url = install.publish_package("acme-3.0-windows.zip", &windows_pkg);

    let manifest = install.publish_manifest(
        "manifest.json",
        &format!(
            r#"{{ "name": "acme", "packages": [
                {{ "version": "3.0", "url": "{windows_url}", "checksum": "sha256:{windows_sum}", "os": "windows", "arch": "x64" }},
                {{ "version": "3.0", "url": "{linux_url}", "checksum": "sha256:{linux_sum}", "os": "linux", "arch": "x64" }}
            ] }}"#,
            windows_sum = sha256_hex(&windows_pkg),
            linux_sum = sha256_hex(&linux_pkg),
        ),
    );

    let config = session_config(&install, &manifest)
        .with_base_version(PackageVersion::new(1, 0, 0, 0))
        .with_platform("linux", "x86_64");
    let mut session = UpdatingSession::new(config).unwrap();

    let outcome = session.run().await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(install.app_file("acme"), b"linux-build");
}

/// A manifest with nothing newer than the installed version short
/// circuits to success without fetching any package.
#[tokio::test]
async fn test_up_to_date_install_downloads_nothing() {
    let install = TestInstall::new();
    install.seed_v1();
    let before = install.app_snapshot();

    // The package URL is unreachable on purpose; resolution must never
    // follow it when the version is not an upgrade.
    let manifest = install.publish_manifest(
        "manifest.json",
        &format!(
            r#"{{ "name": "acme", "packages": [
                {{ "version": "2.0", "url": "https://releases.invalid/acme-2.0.zip", "checksum": "sha256:{}", "size": 10 }}
            ] }}"#,
            "0".repeat(64),
        ),
    );

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(2, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();
    let mut events = session.subscribe();

    let outcome = session.run().await.unwrap();
    assert!(outcome.succeeded());
    assert!(outcome.already_up_to_date);
    assert!(outcome.installed.is_none());

    assert_eq!(install.app_snapshot(), before);
    assert!(install.staged_packages().is_empty());
    assert_eq!(
        states(&drain(&mut events)),
        vec![
            UpdaterState::Initializing,
            UpdaterState::ResolvingPackage,
            UpdaterState::Succeeded,
        ]
    );
}

/// A manifest entry without checksum or size installs on trust; the
/// reduced assurance is logged, not fatal.
#[tokio::test]
async fn test_package_without_integrity_metadata_installs() {
    let install = TestInstall::new();
    install.seed_v1();

    let package = zip_package(&[("acme", b"binary-v2")]);
    let url = install.publish_package("acme-2.0.zip", &package);
    let manifest = install.publish_manifest(
        "manifest.json",
        &format!(r#"{{ "name": "acme", "packages": [ {{ "version": "2.0", "url": "{url}" }} ] }}"#),
    );

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();

    let outcome = session.run().await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(install.app_file("acme"), b"binary-v2");
}

/// A package whose content does not match the declared checksum fails the
/// update before the application directory is touched, and the bad staged
/// file is removed so the next run downloads fresh.
#[tokio::test]
async fn test_checksum_mismatch_leaves_app_untouched() {
    let install = TestInstall::new();
    install.seed_v1();
    let before = install.app_snapshot();

    let package = zip_package(&[("acme", b"binary-v2")]);
    let url = install.publish_package("acme-2.0.zip", &package);
    let manifest = install.publish_manifest(
        "manifest.json",
        &format!(
            r#"{{ "name": "acme", "packages": [
                {{ "version": "2.0", "url": "{url}", "checksum": "sha256:{}", "size": {} }}
            ] }}"#,
            "0".repeat(64),
            package.len(),
        ),
    );

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();
    let mut events = session.subscribe();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome.status, UpdaterState::Failed);
    assert!(matches!(outcome.error, Some(UpdateError::ChecksumMismatch { .. })));
    assert!(outcome.restore_error.is_none());

    assert_eq!(install.app_snapshot(), before);
    assert!(install.staged_packages().is_empty(), "corrupt staged file must not survive");
    assert!(!install.backup_dir().exists());

    let path = states(&drain(&mut events));
    assert!(!path.contains(&UpdaterState::BackingUpApplication));
    assert!(!path.contains(&UpdaterState::RestoringApplication));
    assert_eq!(path.last(), Some(&UpdaterState::Failed));
}

/// Size is checked before the checksum: a truncated or padded transfer
/// reports the byte counts, not a digest mismatch.
#[tokio::test]
async fn test_size_mismatch_wins_over_checksum() {
    let install = TestInstall::new();
    install.seed_v1();

    let package = zip_package(&[("acme", b"binary-v2")]);
    let url = install.publish_package("acme-2.0.zip", &package);
    let declared = package.len() as u64 + 1;
    let manifest = install.publish_manifest(
        "manifest.json",
        &format!(
            r#"{{ "name": "acme", "packages": [
                {{ "version": "2.0", "url": "{url}", "checksum": "sha256:{}", "size": {declared} }}
            ] }}"#,
            "0".repeat(64),
        ),
    );

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome.status, UpdaterState::Failed);
    match outcome.error {
        Some(UpdateError::IncompleteData { expected, actual }) => {
            assert_eq!(expected, declared);
            assert_eq!(actual, package.len() as u64);
        }
        other => panic!("Expected IncompleteData, got {other:?}"),
    }
}

/// When extraction fails partway through, every file the install already
/// overwrote is rolled back from the backup, byte for byte.
#[tokio::test]
async fn test_failed_install_restores_previous_version() {
    let install = TestInstall::new();
    install.seed_v1();
    let before = install.app_snapshot();

    // The second entry collides with an existing directory, so extraction
    // fails after the first entry already overwrote the binary.
    let package = zip_package(&[("acme", b"binary-v2"), ("plugins", b"collides")]);
    let manifest = install.publish_release("2.0", "acme-2.0.zip", &package);

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();
    let mut events = session.subscribe();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome.status, UpdaterState::Failed);
    assert!(matches!(outcome.error, Some(UpdateError::Io(_))));
    assert!(outcome.restore_error.is_none());

    assert_eq!(install.app_snapshot(), before, "rollback must restore the old version exactly");
    assert!(!install.backup_dir().exists(), "backup is discarded after a clean restore");

    let path = states(&drain(&mut events));
    let tail: Vec<_> = path.iter().rev().take(3).rev().copied().collect();
    assert_eq!(
        tail,
        vec![
            UpdaterState::InstallingPackage,
            UpdaterState::RestoringApplication,
            UpdaterState::Failed,
        ]
    );
}

/// A download that passes integrity checks but is not a readable archive
/// fails at install; the staged file is kept so a corrected manifest can
/// skip the download next run.
#[tokio::test]
async fn test_unreadable_package_fails_after_verification() {
    let install = TestInstall::new();
    install.seed_v1();
    let before = install.app_snapshot();

    let package = b"\xDE\xAD\xBE\xEF this is not an archive".to_vec();
    let manifest = install.publish_release("2.0", "acme-2.0.bin", &package);

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();
    let mut events = session.subscribe();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome.status, UpdaterState::Failed);
    assert!(matches!(
        outcome.error,
        Some(UpdateError::UnsupportedPackageFormat { .. })
    ));

    assert_eq!(install.app_snapshot(), before);
    assert!(!install.backup_dir().exists());
    assert_eq!(install.staged_packages().len(), 1, "verified package stays staged");

    assert_eq!(
        states(&drain(&mut events)),
        vec![
            UpdaterState::Initializing,
            UpdaterState::ResolvingPackage,
            UpdaterState::DownloadingPackage,
            UpdaterState::VerifyingPackage,
            UpdaterState::BackingUpApplication,
            UpdaterState::InstallingPackage,
            UpdaterState::RestoringApplication,
            UpdaterState::Failed,
        ]
    );
}

/// Cancelling while bytes are arriving stops the session before anything
/// mutates, leaving no partial files in staging.
#[tokio::test]
async fn test_cancel_during_download_leaves_app_untouched() {
    let install = TestInstall::new();
    install.seed_v1();
    let before = install.app_snapshot();

    // Large enough to span many read chunks.
    let payload = vec![0xA5u8; 1024 * 1024];
    let package = stored_zip_package(&[("acme", payload.as_slice())]);
    let manifest = install.publish_release("2.0", "acme-2.0.zip", &package);

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();
    let mut events = session.subscribe();

    let token = session.cancellation_token();
    let mut watcher_events = session.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = watcher_events.recv().await {
            if matches!(event, SessionEvent::DownloadProgress { .. }) {
                token.cancel();
                break;
            }
        }
    });

    let outcome = session.run().await.unwrap();
    watcher.await.unwrap();

    assert_eq!(outcome.status, UpdaterState::Cancelled);
    assert!(outcome.error.unwrap().is_cancelled());
    assert!(outcome.restore_error.is_none());

    assert_eq!(install.app_snapshot(), before);
    assert!(install.staged_packages().is_empty());
    assert!(install.partial_downloads().is_empty(), "partial download must be cleaned up");

    let path = states(&drain(&mut events));
    assert!(!path.contains(&UpdaterState::BackingUpApplication));
    assert_eq!(path.last(), Some(&UpdaterState::Cancelled));
}

/// A cancel that lands once installation is about to begin rolls the
/// application back from the backup and ends in Cancelled, not Failed.
#[tokio::test]
async fn test_cancel_at_install_rolls_back_and_reports_cancelled() {
    let install = TestInstall::new();
    install.seed_v1();
    let before = install.app_snapshot();

    let package = zip_package(&[("acme", b"binary-v2")]);
    let manifest = install.publish_release("2.0", "acme-2.0.zip", &package);

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();
    let mut events = session.subscribe();

    let token = session.cancellation_token();
    let mut watcher_events = session.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = watcher_events.recv().await {
            if matches!(
                event,
                SessionEvent::StateChanged { new: UpdaterState::InstallingPackage, .. }
            ) {
                token.cancel();
                break;
            }
        }
    });

    let outcome = session.run().await.unwrap();
    watcher.await.unwrap();

    assert_eq!(outcome.status, UpdaterState::Cancelled);
    assert!(outcome.error.unwrap().is_cancelled());
    assert!(outcome.restore_error.is_none());

    assert_eq!(install.app_snapshot(), before);
    assert!(!install.backup_dir().exists());

    let path = states(&drain(&mut events));
    assert!(path.contains(&UpdaterState::RestoringApplication));
    assert_eq!(path.last(), Some(&UpdaterState::Cancelled));
}

/// A fully downloaded package kept in staging is verified and reused by
/// the next session; the download phase is skipped entirely.
#[tokio::test]
async fn test_staged_package_skips_download_on_next_run() {
    let install = TestInstall::new();
    install.seed_v1();

    let package = zip_package(&[("acme", b"binary-v2")]);
    let manifest = install.publish_release("2.0", "acme-2.0.zip", &package);

    let config = session_config(&install, &manifest)
        .with_base_version(PackageVersion::new(1, 0, 0, 0))
        .with_keep_staged_package(true);
    let mut first = UpdatingSession::new(config.clone()).unwrap();
    assert!(first.run().await.unwrap().succeeded());
    assert_eq!(install.staged_packages().len(), 1);

    // Roll the installation back to version 1 by hand, as if the first
    // update had never happened.
    std::fs::remove_dir_all(&install.app_dir).unwrap();
    std::fs::create_dir_all(&install.app_dir).unwrap();
    install.seed_v1();

    let mut second = UpdatingSession::new(config).unwrap();
    let mut events = second.subscribe();
    let outcome = second.run().await.unwrap();

    assert!(outcome.succeeded());
    assert_eq!(install.app_file("acme"), b"binary-v2");

    let collected = drain(&mut events);
    let path = states(&collected);
    assert!(!path.contains(&UpdaterState::DownloadingPackage), "download must be skipped");
    assert!(path.contains(&UpdaterState::VerifyingPackage));
    assert!(
        !collected.iter().any(|e| matches!(e, SessionEvent::DownloadProgress { .. })),
        "no bytes should be transferred for a staged package"
    );
}

/// A staged package that no longer matches the manifest is discarded and
/// downloaded fresh.
#[tokio::test]
async fn test_stale_staged_package_is_downloaded_again() {
    let install = TestInstall::new();
    install.seed_v1();

    let package = zip_package(&[("acme", b"binary-v2")]);
    let manifest = install.publish_release("2.0", "acme-2.0.zip", &package);

    let config = session_config(&install, &manifest)
        .with_base_version(PackageVersion::new(1, 0, 0, 0))
        .with_keep_staged_package(true);
    let mut first = UpdatingSession::new(config.clone()).unwrap();
    assert!(first.run().await.unwrap().succeeded());

    // Corrupt the staged copy behind the session's back.
    let staged = install.staged_packages().remove(0);
    let mut bytes = std::fs::read(&staged).unwrap();
    bytes.extend_from_slice(b"trailing garbage");
    std::fs::write(&staged, bytes).unwrap();

    std::fs::remove_dir_all(&install.app_dir).unwrap();
    std::fs::create_dir_all(&install.app_dir).unwrap();
    install.seed_v1();

    let mut second = UpdatingSession::new(config).unwrap();
    let mut events = second.subscribe();
    let outcome = second.run().await.unwrap();
    assert!(outcome.succeeded());

    let path = states(&drain(&mut events));
    assert!(path.contains(&UpdaterState::DownloadingPackage));
    let verifications = path.iter().filter(|s| **s == UpdaterState::VerifyingPackage).count();
    assert_eq!(verifications, 2, "stale copy is verified and rejected, then the download verified");

    // The re-downloaded staged copy matches the published package again.
    let staged = install.staged_packages().remove(0);
    assert_eq!(sha256_hex(&std::fs::read(staged).unwrap()), sha256_hex(&package));
}

/// Download progress reports cumulative and previous byte counts so
/// consumers can compute deltas, with percentages derived from the total.
#[tokio::test]
async fn test_download_progress_deltas_and_totals() {
    let install = TestInstall::new();
    install.seed_v1();

    let payload = vec![0x5Au8; 1024 * 1024];
    let package = stored_zip_package(&[("acme", payload.as_slice())]);
    let manifest = install.publish_release("2.0", "acme-2.0.zip", &package);

    let config =
        session_config(&install, &manifest).with_base_version(PackageVersion::new(1, 0, 0, 0));
    let mut session = UpdatingSession::new(config).unwrap();
    let mut events = session.subscribe();

    assert!(session.run().await.unwrap().succeeded());

    let progress: Vec<(u64, u64, Option<u64>, Option<u8>)> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::DownloadProgress {
                previous_bytes,
                downloaded_bytes,
                total_bytes,
                percent,
            } => Some((previous_bytes, downloaded_bytes, total_bytes, percent)),
            _ => None,
        })
        .collect();

    let total = package.len() as u64;
    assert!(progress.len() > 1, "a multi-chunk download reports more than once");
    assert_eq!(progress[0].0, 0);
    for pair in progress.windows(2) {
        assert_eq!(pair[1].0, pair[0].1, "previous_bytes must chain to the prior count");
        assert!(pair[1].1 > pair[0].1);
    }
    let last = progress.last().unwrap();
    assert_eq!(last.1, total);
    assert_eq!(last.2, Some(total));
    assert_eq!(last.3, Some(100));
}

/// Restore is strict: when a file cannot be put back, the result says how
/// much failed and the backup stays on disk for manual recovery.
#[tokio::test]
async fn test_restore_incomplete_keeps_backup() {
    let install = TestInstall::new();
    install.write_app_file("core", b"core-v1");
    install.write_app_file("data.txt", b"records");

    let manager = BackupManager::new(&install.app_dir);
    let handle = manager.backup(&CancellationToken::new()).await.unwrap();

    // Wreck the live tree in a way restore cannot repair: the backed-up
    // file's path is now occupied by a directory.
    std::fs::remove_file(install.app_dir.join("core")).unwrap();
    std::fs::create_dir(install.app_dir.join("core")).unwrap();
    std::fs::write(install.app_dir.join("core/junk"), b"x").unwrap();

    let err = manager.restore(&handle).await.unwrap_err();
    match err {
        UpdateError::RestoreIncomplete { failed, total } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 2);
        }
        other => panic!("Expected RestoreIncomplete, got {other:?}"),
    }
    assert!(manager.backup_exists(), "backup must survive an incomplete restore");
    // The file that could be restored was.
    assert_eq!(install.app_file("data.txt"), b"records");
}

/// Waiting on a real process blocks until it exits and leaves the session
/// ready to run.
#[cfg(unix)]
#[tokio::test]
async fn test_wait_for_process_outlives_real_process() {
    use upkit::process::ProcessTarget;

    let install = TestInstall::new();
    install.seed_v1();
    let manifest =
        install.publish_manifest("manifest.json", r#"{ "name": "acme", "packages": [] }"#);

    let mut child = std::process::Command::new("sleep").arg("1").spawn().expect("spawn sleep");

    let config = session_config(&install, &manifest).with_wait_for(ProcessTarget {
        pid: Some(child.id()),
        executable: None,
    });
    let mut session = UpdatingSession::new(config).unwrap();

    let started = std::time::Instant::now();
    session.wait_for_process().await.unwrap();
    assert!(started.elapsed() >= std::time::Duration::from_millis(500));

    child.wait().unwrap();

    // The wait does not consume the session; an empty manifest then
    // resolves to "up to date".
    let outcome = session.run().await.unwrap();
    assert!(outcome.succeeded());
    assert!(outcome.already_up_to_date);
}
