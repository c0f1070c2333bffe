//! File system utilities for cross-platform file operations
//!
//! Small helpers shared across the crate. The important one is
//! [`atomic_write`]: configuration and other small files are written with a
//! write-then-rename so a crash mid-write never leaves a torn file behind.

use std::path::Path;

use crate::core::UpdateError;

/// Ensures a directory exists, creating it and all parents if necessary.
///
/// # Errors
///
/// Returns [`UpdateError::Configuration`] when the path exists but is not a
/// directory, and [`UpdateError::Io`] when creation fails.
pub fn ensure_dir(path: &Path) -> Result<(), UpdateError> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    } else if !path.is_dir() {
        return Err(UpdateError::Configuration {
            message: format!("path exists but is not a directory: {}", path.display()),
        });
    }
    Ok(())
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// Content goes to a `.tmp` sibling first, is synced to disk, and is then
/// renamed into place. Readers see either the old contents or the new ones,
/// never a partial write. Parent directories are created as needed.
///
/// # Errors
///
/// Returns [`UpdateError::Io`] when any step of the write fails.
///
/// # Examples
///
/// ```no_run
/// use upkit::utils::fs::atomic_write;
/// use std::path::Path;
///
/// # fn example() -> Result<(), upkit::UpdateError> {
/// atomic_write(Path::new("settings/config.toml"), b"[http]\n")?;
/// # Ok(())
/// # }
/// ```
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), UpdateError> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Marks a file as executable.
///
/// After installation the freshly extracted application binary may need its
/// execute bits back before relaunch. No-op on platforms without Unix
/// permission bits.
///
/// # Errors
///
/// Returns [`UpdateError::Io`] when the permissions cannot be read or set.
pub fn set_executable(path: &Path) -> Result<(), UpdateError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(permissions.mode() | 0o111);
        std::fs::set_permissions(path, permissions)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
