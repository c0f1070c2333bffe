//! Downloaded package verification
//!
//! Verification gates installation: no archive is ever extracted into the
//! application directory before it passes here. Two checks run in order:
//!
//! 1. **Size** - when the manifest declares a byte size, the staged file's
//!    actual size must match exactly. A mismatch fails before any hashing
//!    happens, in either direction (truncated and over-long downloads are
//!    both integrity violations).
//! 2. **Checksum** - when the manifest declares a digest, the same
//!    algorithm is computed over the full file content and compared
//!    case-insensitively.
//!
//! A descriptor with neither checksum nor size passes trivially; that
//! reduced-assurance condition is logged at warn level.

use std::path::Path;

use sha2::{Digest, Sha256, Sha512};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::core::UpdateError;
use crate::manifest::{ChecksumAlgorithm, PackageDescriptor};

/// Read buffer for streamed hashing
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Integrity verification for staged package files
pub struct PackageVerifier;

impl PackageVerifier {
    /// Verify a staged package file against its descriptor.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::IncompleteData`] when a declared size differs from
    ///   the file's actual size
    /// - [`UpdateError::ChecksumMismatch`] when the computed digest differs
    ///   from the declared one
    /// - [`UpdateError::Io`] when the file cannot be read
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use upkit::verify::PackageVerifier;
    /// # async fn example(descriptor: &upkit::manifest::PackageDescriptor) -> Result<(), upkit::core::UpdateError> {
    /// PackageVerifier::verify(std::path::Path::new("/tmp/staged.zip"), descriptor).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn verify(
        package_path: &Path,
        descriptor: &PackageDescriptor,
    ) -> Result<(), UpdateError> {
        info!(path = %package_path.display(), "verifying downloaded package");

        let actual_size = fs::metadata(package_path).await?.len();
        if let Some(declared) = descriptor.size
            && actual_size != declared
        {
            return Err(UpdateError::IncompleteData {
                expected: declared,
                actual: actual_size,
            });
        }

        let Some(checksum) = &descriptor.checksum else {
            if descriptor.size.is_none() {
                warn!(
                    path = %package_path.display(),
                    "package declares neither checksum nor size; integrity assurance is reduced"
                );
            }
            return Ok(());
        };

        let actual = Self::compute_digest(package_path, checksum.algorithm).await?;
        // Declared digests are normalized to lowercase at parse time.
        if actual != checksum.digest {
            return Err(UpdateError::ChecksumMismatch {
                expected: checksum.to_string(),
                actual: format!("{}:{}", checksum.algorithm, actual),
            });
        }

        info!(algorithm = %checksum.algorithm, "package verification successful");
        Ok(())
    }

    /// Compute the hex digest of a file with the given algorithm.
    ///
    /// Hashes in fixed-size chunks so arbitrarily large packages never
    /// need to fit in memory. Returns lowercase hex without an algorithm
    /// prefix.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Io`] when the file cannot be opened or read.
    pub async fn compute_digest(
        path: &Path,
        algorithm: ChecksumAlgorithm,
    ) -> Result<String, UpdateError> {
        debug!(path = %path.display(), algorithm = %algorithm, "computing package digest");
        match algorithm {
            ChecksumAlgorithm::Sha256 => hash_file::<Sha256>(path).await,
            ChecksumAlgorithm::Sha512 => hash_file::<Sha512>(path).await,
        }
    }
}

async fn hash_file<D: Digest>(path: &Path) -> Result<String, UpdateError> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
