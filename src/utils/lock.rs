//! Inter-process locking for update sessions
//!
//! Two updaters racing on the same application directory would interleave
//! backup, install, and restore steps into a corrupt mess. An exclusive
//! OS-level file lock serializes them: the second process blocks until the
//! first finishes. Locks are keyed by the application directory and live
//! under `.locks/` in the staging root, so they survive the application
//! directory itself being rewritten mid-update.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::UpdateError;

/// Exclusive lock over one application directory's update
///
/// The lock is held for the lifetime of the value and released on drop.
/// The lock file itself is left in place for reuse.
pub struct UpdateLock {
    _file: File,
    path: PathBuf,
}

impl UpdateLock {
    /// Acquire the exclusive update lock for `app_dir`.
    ///
    /// Blocks until any other holder releases it. The blocking OS call
    /// runs on the blocking thread pool so the async runtime keeps
    /// turning.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Io`] when the locks directory or lock file
    /// cannot be created, or the file system does not support locking.
    pub async fn acquire(staging_root: &Path, app_dir: &Path) -> Result<Self, UpdateError> {
        let locks_dir = staging_root.join(".locks");
        tokio::fs::create_dir_all(&locks_dir).await?;

        let lock_path = locks_dir.join(lock_name(app_dir));
        debug!(path = %lock_path.display(), "acquiring update lock");

        let path_for_task = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || -> Result<File, UpdateError> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path_for_task)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| UpdateError::Other {
            message: format!("lock acquisition task failed: {e}"),
        })??;

        debug!(path = %lock_path.display(), "update lock acquired");
        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        // Closing the file would release the lock anyway; unlock explicitly
        // so failures are at least visible.
        if let Err(e) = FileExt::unlock(&self._file) {
            warn!(path = %self.path.display(), error = %e, "failed to release update lock");
        }
    }
}

/// Stable lock file name for an application directory.
///
/// Uses a digest of the canonical path, so `/opt/app` and `/opt/./app`
/// contend on the same lock.
fn lock_name(app_dir: &Path) -> String {
    let canonical =
        std::fs::canonicalize(app_dir).unwrap_or_else(|_| app_dir.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}.lock", &digest[..16])
}
