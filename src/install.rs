//! Package installation into the application directory
//!
//! A verified package is an archive; installation extracts it over the
//! application directory, overwriting files in place. The archive format is
//! detected from magic bytes, never from the file name: download URLs often
//! carry query strings or no extension at all.
//!
//! Supported formats are zip, gzip-compressed tar, and plain tar. Entries
//! with path traversal components are rejected outright, and symlink
//! entries are skipped. Extraction is sequential, checks for cancellation
//! between entries, and reports coarse percentage progress.

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::read::GzDecoder;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::core::{CancellationToken, UpdateError};

/// Archive container formats the installer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
    Zip,
    TarGz,
    Tar,
}

impl std::fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zip => write!(f, "zip"),
            Self::TarGz => write!(f, "tar.gz"),
            Self::Tar => write!(f, "tar"),
        }
    }
}

/// Identify an archive format from its leading bytes.
///
/// Plain tar has no magic at offset zero; it is recognized by the `ustar`
/// marker inside the first header block, which covers both POSIX and GNU
/// variants.
#[must_use]
pub fn detect_format(data: &[u8]) -> Option<PackageFormat> {
    match data {
        [0x50, 0x4B, 0x03, 0x04, ..] => Some(PackageFormat::Zip),
        [0x1F, 0x8B, ..] => Some(PackageFormat::TarGz),
        _ if data.len() >= 262 && &data[257..262] == b"ustar" => Some(PackageFormat::Tar),
        _ => None,
    }
}

/// What an installation run did
#[derive(Debug, Clone, Copy)]
pub struct InstallSummary {
    pub format: PackageFormat,
    /// Files written into the application directory
    pub files: usize,
    /// Directory entries created
    pub dirs: usize,
}

/// Extracts update packages over the application directory
pub struct PackageInstaller;

impl PackageInstaller {
    /// Install `package_path` into `app_dir`.
    ///
    /// Detects the archive format, then extracts every entry, overwriting
    /// existing files. Unix permission bits recorded in the archive are
    /// applied. `on_progress` receives whole percentages, deduplicated.
    ///
    /// Cancellation is honored between entries; an already-extracted
    /// prefix is left behind for the caller's restore step to undo.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::UnsupportedPackageFormat`] when magic bytes
    /// match no known archive, or when the archive is corrupt or contains
    /// an entry that would escape the target directory.
    /// [`UpdateError::Cancelled`] and [`UpdateError::Io`] pass through
    /// from the extraction loop.
    pub async fn install(
        package_path: &Path,
        app_dir: &Path,
        token: &CancellationToken,
        on_progress: impl Fn(u8) + Send + 'static,
    ) -> Result<InstallSummary, UpdateError> {
        let format = Self::sniff_format(package_path).await?;
        info!(
            package = %package_path.display(),
            target = %app_dir.display(),
            %format,
            "installing package"
        );

        // A cancel that lands before extraction must stop us while the
        // target directory is still untouched.
        token.err_if_cancelled()?;
        tokio::fs::create_dir_all(app_dir).await?;

        let package = package_path.to_path_buf();
        let target = app_dir.to_path_buf();
        let token = token.clone();
        let summary = tokio::task::spawn_blocking(move || {
            let mut last = None;
            let mut emit = move |percent: u8| {
                if last != Some(percent) {
                    last = Some(percent);
                    on_progress(percent);
                }
            };
            match format {
                PackageFormat::Zip => extract_zip(&package, &target, &token, &mut emit),
                PackageFormat::TarGz => extract_tar(&package, &target, true, &token, &mut emit),
                PackageFormat::Tar => extract_tar(&package, &target, false, &token, &mut emit),
            }
        })
        .await
        .map_err(|e| UpdateError::Other {
            message: format!("install task failed: {e}"),
        })??;

        info!(files = summary.files, dirs = summary.dirs, "package installed");
        Ok(summary)
    }

    /// Read the head of the package file and detect its format.
    async fn sniff_format(package_path: &Path) -> Result<PackageFormat, UpdateError> {
        let mut file = tokio::fs::File::open(package_path).await?;
        // One tar header block is enough for every supported format.
        let mut header = [0u8; 512];
        let mut filled = 0;
        loop {
            let n = file.read(&mut header[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
            if filled == header.len() {
                break;
            }
        }
        detect_format(&header[..filled]).ok_or_else(|| UpdateError::UnsupportedPackageFormat {
            detail: format!(
                "{} does not start with a recognized archive signature",
                package_path.display()
            ),
        })
    }
}

fn extract_zip(
    package: &Path,
    target: &Path,
    token: &CancellationToken,
    emit: &mut dyn FnMut(u8),
) -> Result<InstallSummary, UpdateError> {
    let file = std::fs::File::open(package)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| UpdateError::UnsupportedPackageFormat {
        detail: format!("corrupt zip archive: {e}"),
    })?;

    let total = archive.len();
    let mut files = 0usize;
    let mut dirs = 0usize;

    for index in 0..total {
        token.err_if_cancelled()?;

        let mut entry = archive
            .by_index(index)
            .map_err(|e| UpdateError::UnsupportedPackageFormat {
                detail: format!("corrupt zip entry {index}: {e}"),
            })?;
        let Some(rel) = entry.enclosed_name() else {
            return Err(UpdateError::UnsupportedPackageFormat {
                detail: format!("zip entry '{}' escapes the target directory", entry.name()),
            });
        };
        let dest = target.join(&rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&dest)?;
            dirs += 1;
        } else {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&dest)?;
            std::io::copy(&mut entry, &mut out)?;
            files += 1;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode))?;
            }
        }
        debug!(entry = %rel.display(), "extracted");
        emit(entry_percent(index + 1, total));
    }

    emit(100);
    Ok(InstallSummary {
        format: PackageFormat::Zip,
        files,
        dirs,
    })
}

fn extract_tar(
    package: &Path,
    target: &Path,
    gzipped: bool,
    token: &CancellationToken,
    emit: &mut dyn FnMut(u8),
) -> Result<InstallSummary, UpdateError> {
    let file = std::fs::File::open(package)?;
    let total_bytes = file.metadata()?.len();
    // Entry counts are unknown until the stream ends, so progress tracks
    // compressed bytes consumed from the package file instead.
    let reader = CountingReader::new(file);
    let consumed = reader.counter();
    let inner: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };
    let mut archive = tar::Archive::new(inner);

    let mut files = 0usize;
    let mut dirs = 0usize;

    for entry in archive.entries()? {
        token.err_if_cancelled()?;

        let mut entry = entry?;
        let rel: PathBuf = entry.path()?.into_owned();
        for part in rel.components() {
            match part {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(UpdateError::UnsupportedPackageFormat {
                        detail: format!("tar entry '{}' escapes the target directory", rel.display()),
                    });
                }
            }
        }
        let dest = target.join(&rel);

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                std::fs::create_dir_all(&dest)?;
                dirs += 1;
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut out = std::fs::File::create(&dest)?;
                std::io::copy(&mut entry, &mut out)?;
                files += 1;

                #[cfg(unix)]
                if let Ok(mode) = entry.header().mode() {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode))?;
                }
            }
            other => {
                warn!(entry = %rel.display(), kind = ?other, "skipping non-regular tar entry");
                continue;
            }
        }
        debug!(entry = %rel.display(), "extracted");

        let read = consumed.load(Ordering::Relaxed).min(total_bytes);
        if total_bytes > 0 {
            emit((read * 100 / total_bytes) as u8);
        }
    }

    emit(100);
    Ok(InstallSummary {
        format: if gzipped { PackageFormat::TarGz } else { PackageFormat::Tar },
        files,
        dirs,
    })
}

fn entry_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        100
    } else {
        ((done * 100) / total).min(100) as u8
    }
}

/// Wraps a reader and counts bytes pulled through it.
struct CountingReader<R> {
    inner: R,
    read: Arc<AtomicU64>,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            read: Arc::new(AtomicU64::new(0)),
        }
    }

    fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.read)
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}
