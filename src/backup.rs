//! Backup and restore of the application directory
//!
//! Before installation mutates anything, [`BackupManager::backup`] snapshots
//! the whole application directory into a sibling directory
//! (`<app>.backup`). If installation later fails or is cancelled,
//! [`BackupManager::restore`] puts the snapshot back; after a successful
//! install, [`BackupManager::discard`] releases it.
//!
//! # Strategy
//!
//! The snapshot is a full recursive copy, not a move-aside: the live
//! directory stays untouched until the installer runs, so a failure during
//! backup itself needs no rollback at all. Keeping the snapshot next to the
//! original means restore happens on the same file system.
//!
//! # Restore contract
//!
//! Restore reconstructs the pre-install state exactly: files the
//! interrupted install added are deleted, then every backed-up file is
//! copied back. Individual file failures are logged and retried (files can
//! be transiently locked, especially on Windows), and restore always runs
//! to completion - but the overall result is strict: if any file could not
//! be put back, restore reports [`UpdateError::RestoreIncomplete`] and
//! keeps the backup directory on disk for manual recovery. A partial
//! restore must never look like a successful one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::{CancellationToken, UpdateError};

/// Attempts at restoring files that failed to copy back
const MAX_RESTORE_ATTEMPTS: u32 = 3;

/// Opaque reference to one on-disk snapshot
///
/// Returned by [`BackupManager::backup`]; required by restore and discard.
/// Holding a handle is the session's proof that installation was attempted.
#[derive(Debug, Clone)]
pub struct BackupHandle {
    backup_dir: PathBuf,
    /// Files captured in the snapshot
    pub file_count: usize,
    /// Files that could not be captured (locked or unreadable), relative paths
    pub skipped: Vec<PathBuf>,
}

impl BackupHandle {
    /// Directory holding the snapshot
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.backup_dir
    }
}

/// Snapshots and restores an application directory
pub struct BackupManager {
    app_dir: PathBuf,
    backup_dir: PathBuf,
}

impl BackupManager {
    /// Manager for the given application directory.
    ///
    /// The snapshot location is derived by appending `.backup` to the
    /// directory name, in the same parent.
    #[must_use]
    pub fn new(app_dir: &Path) -> Self {
        let mut backup_dir = app_dir.to_path_buf();
        backup_dir.set_file_name(format!(
            "{}.backup",
            app_dir.file_name().unwrap_or_default().to_string_lossy()
        ));
        Self {
            app_dir: app_dir.to_path_buf(),
            backup_dir,
        }
    }

    /// Where this manager keeps its snapshot
    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup_dir
    }

    /// Whether a snapshot currently exists on disk
    #[must_use]
    pub fn backup_exists(&self) -> bool {
        self.backup_dir.is_dir()
    }

    /// Snapshot the application directory.
    ///
    /// Replaces any stale snapshot left behind by an earlier crashed
    /// session. Files that cannot be read (locked by another process) are
    /// skipped with a warning and recorded on the handle - never silently
    /// dropped. Symlinks are not followed and not captured. Cancellation
    /// is checked between files; the caller is expected to discard the
    /// partial snapshot on that path.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::NotFound`] when the application directory
    /// does not exist, [`UpdateError::Cancelled`] when the token fires
    /// mid-snapshot, and [`UpdateError::Io`] when the snapshot directory
    /// cannot be created or cleared.
    pub async fn backup(&self, token: &CancellationToken) -> Result<BackupHandle, UpdateError> {
        if !self.app_dir.is_dir() {
            return Err(UpdateError::NotFound {
                what: self.app_dir.display().to_string(),
            });
        }

        if self.backup_dir.exists() {
            debug!(path = %self.backup_dir.display(), "removing stale backup");
            fs::remove_dir_all(&self.backup_dir).await?;
        }
        fs::create_dir_all(&self.backup_dir).await?;

        info!(
            from = %self.app_dir.display(),
            to = %self.backup_dir.display(),
            "creating application backup"
        );

        let mut file_count = 0usize;
        let mut skipped = Vec::new();

        for entry in WalkDir::new(&self.app_dir).min_depth(1) {
            token.err_if_cancelled()?;
            let entry = entry.map_err(|e| UpdateError::Other {
                message: format!("failed to walk application directory: {e}"),
            })?;
            let rel = entry
                .path()
                .strip_prefix(&self.app_dir)
                .expect("walked entries stay under their root")
                .to_path_buf();
            let target = self.backup_dir.join(&rel);

            if entry.path_is_symlink() {
                warn!(path = %rel.display(), "skipping symlink in backup");
                continue;
            }
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).await?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            match fs::copy(entry.path(), &target).await {
                Ok(_) => file_count += 1,
                Err(e) => {
                    warn!(
                        path = %rel.display(),
                        error = %e,
                        "could not capture file in backup"
                    );
                    skipped.push(rel);
                }
            }
        }

        info!(files = file_count, skipped = skipped.len(), "backup complete");
        Ok(BackupHandle {
            backup_dir: self.backup_dir.clone(),
            file_count,
            skipped,
        })
    }

    /// Restore the application directory from a snapshot.
    ///
    /// Deletes everything installation added, then copies every backed-up
    /// file back over, retrying transient failures. On success the
    /// application directory's contents equal the snapshot byte for byte.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::RestoreIncomplete`] when any file could not
    /// be restored after retries; the snapshot is kept on disk in that
    /// case. Returns [`UpdateError::NotFound`] when the handle's snapshot
    /// directory no longer exists.
    pub async fn restore(&self, handle: &BackupHandle) -> Result<(), UpdateError> {
        if !handle.backup_dir.is_dir() {
            return Err(UpdateError::NotFound {
                what: handle.backup_dir.display().to_string(),
            });
        }

        warn!(
            from = %handle.backup_dir.display(),
            to = %self.app_dir.display(),
            "restoring application from backup"
        );

        let mut failures = self.attempt_restore(handle).await;
        let mut attempts = 1;
        while !failures.is_empty() && attempts < MAX_RESTORE_ATTEMPTS {
            warn!(
                attempt = attempts,
                remaining = failures.len(),
                "restore attempt left files behind, retrying"
            );
            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            failures = self.attempt_restore(handle).await;
            attempts += 1;
        }

        if failures.is_empty() {
            info!("application restored from backup");
            Ok(())
        } else {
            for path in &failures {
                tracing::error!(path = %path.display(), "file could not be restored");
            }
            Err(UpdateError::RestoreIncomplete {
                failed: failures.len(),
                total: handle.file_count,
            })
        }
    }

    /// One best-effort restore sweep; returns the files that failed.
    async fn attempt_restore(&self, handle: &BackupHandle) -> Vec<PathBuf> {
        let mut failures = Vec::new();

        // Relative paths present in the snapshot, to identify extras.
        let mut snapshot: HashSet<PathBuf> = HashSet::new();
        for entry in WalkDir::new(&handle.backup_dir).min_depth(1).into_iter().flatten() {
            if let Ok(rel) = entry.path().strip_prefix(&handle.backup_dir) {
                snapshot.insert(rel.to_path_buf());
            }
        }

        // Pass 1: delete anything installation added. Children first so
        // emptied directories can be removed on the same sweep.
        for entry in
            WalkDir::new(&self.app_dir).min_depth(1).contents_first(true).into_iter().flatten()
        {
            let Ok(rel) = entry.path().strip_prefix(&self.app_dir) else {
                continue;
            };
            if snapshot.contains(rel) {
                continue;
            }
            let result = if entry.file_type().is_dir() {
                fs::remove_dir_all(entry.path()).await
            } else {
                fs::remove_file(entry.path()).await
            };
            if let Err(e) = result {
                warn!(path = %rel.display(), error = %e, "could not remove added entry");
                failures.push(rel.to_path_buf());
            }
        }

        // Pass 2: copy every backed-up file over the live tree.
        for entry in WalkDir::new(&handle.backup_dir).min_depth(1).into_iter().flatten() {
            let Ok(rel) = entry.path().strip_prefix(&handle.backup_dir) else {
                continue;
            };
            let target = self.app_dir.join(rel);

            if entry.file_type().is_dir() {
                if let Err(e) = fs::create_dir_all(&target).await {
                    warn!(path = %rel.display(), error = %e, "could not recreate directory");
                    failures.push(rel.to_path_buf());
                }
                continue;
            }

            if let Some(parent) = target.parent()
                && let Err(e) = fs::create_dir_all(parent).await
            {
                warn!(path = %rel.display(), error = %e, "could not recreate parent directory");
                failures.push(rel.to_path_buf());
                continue;
            }
            if let Err(e) = fs::copy(entry.path(), &target).await {
                warn!(path = %rel.display(), error = %e, "could not restore file");
                failures.push(rel.to_path_buf());
            }
        }

        failures
    }

    /// Release a snapshot after a successful install.
    ///
    /// Idempotent: a missing snapshot directory is fine.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Io`] when the snapshot exists but cannot be
    /// removed.
    pub async fn discard(&self, handle: BackupHandle) -> Result<(), UpdateError> {
        if handle.backup_dir.exists() {
            debug!(path = %handle.backup_dir.display(), "discarding backup");
            fs::remove_dir_all(&handle.backup_dir).await?;
        }
        Ok(())
    }
}
