//! Package manifest parsing and candidate selection
//!
//! An update manifest lists downloadable packages: version, download URL,
//! optional checksum and size, and a platform tag (operating system,
//! architecture, self-contained flag). Manifests come in two formats, JSON
//! and XML, distinguished by the manifest location's file extension - the
//! source is trusted to indicate its format, so there is no content
//! sniffing. Field names are fixed by the wire format: `version`,
//! `url`/`uri`, `checksum`/`hash`, `size`, `os`/`operating-system`,
//! `arch`/`architecture`, `self-contained`.
//!
//! Selection picks, among the packages applicable to the running platform
//! and the self-contained constraint, the one with the highest version
//! strictly greater than the installed base version (or the highest overall
//! when no base version is known). When nothing qualifies the resolver
//! reports [`UpdateError::NoApplicablePackage`], which the session treats
//! as "already up to date", not as a failure.
//!
//! # Examples
//!
//! ```rust
//! use upkit::manifest::{ManifestFormat, parse_manifest, select_package};
//!
//! let doc = br#"{
//!     "name": "demo",
//!     "packages": [
//!         { "version": "1.1", "url": "https://example.com/demo-1.1.zip" }
//!     ]
//! }"#;
//!
//! let manifest = parse_manifest(doc, ManifestFormat::Json).unwrap();
//! let base = "1.0".parse().ok();
//! let chosen = select_package(manifest.packages, base, false, "linux", "x86_64").unwrap();
//! assert_eq!(chosen.version.to_string(), "1.1");
//! ```

pub mod json;
pub mod xml;

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::core::UpdateError;
use crate::version::PackageVersion;

/// Manifest document format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// JSON document (the default)
    Json,
    /// XML document (locations ending in `.xml`)
    Xml,
}

impl ManifestFormat {
    /// Determine the format from a manifest location (URL or path).
    ///
    /// Only the path portion is considered; query strings and fragments are
    /// ignored. An `.xml` extension (case-insensitive) selects XML,
    /// everything else is JSON.
    #[must_use]
    pub fn from_location(location: &str) -> Self {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        let extension =
            path.rsplit('/').next().and_then(|segment| segment.rsplit_once('.').map(|(_, ext)| ext));
        match extension {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => Self::Xml,
            _ => Self::Json,
        }
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "JSON"),
            Self::Xml => write!(f, "XML"),
        }
    }
}

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// SHA-256, 64 hex digits
    Sha256,
    /// SHA-512, 128 hex digits
    Sha512,
}

impl ChecksumAlgorithm {
    /// Length of the hex-encoded digest for this algorithm
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha512 => write!(f, "sha512"),
        }
    }
}

/// A declared package checksum: algorithm plus lowercase hex digest
///
/// Accepted spellings: `sha256:<hex>`, `sha512:<hex>`, or a bare hex digest
/// whose length identifies the algorithm. Comparison elsewhere is
/// case-insensitive because the digest is normalized to lowercase here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    /// Hash algorithm the digest was produced with
    pub algorithm: ChecksumAlgorithm,
    /// Lowercase hex digest
    pub digest: String,
}

impl FromStr for Checksum {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = |reason: String| UpdateError::Parse {
            format: "checksum".to_string(),
            reason,
        };

        let trimmed = s.trim().to_ascii_lowercase();
        let (algorithm, digest) = if let Some(rest) = trimmed.strip_prefix("sha256:") {
            (ChecksumAlgorithm::Sha256, rest.to_string())
        } else if let Some(rest) = trimmed.strip_prefix("sha512:") {
            (ChecksumAlgorithm::Sha512, rest.to_string())
        } else {
            match trimmed.len() {
                64 => (ChecksumAlgorithm::Sha256, trimmed),
                128 => (ChecksumAlgorithm::Sha512, trimmed),
                len => {
                    return Err(parse_error(format!(
                        "digest length {len} matches no supported algorithm"
                    )));
                }
            }
        };

        if digest.len() != algorithm.hex_len() {
            return Err(parse_error(format!(
                "{algorithm} digest must be {} hex digits, got {}",
                algorithm.hex_len(),
                digest.len()
            )));
        }
        if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(parse_error("digest contains non-hex characters".to_string()));
        }

        Ok(Self {
            algorithm,
            digest,
        })
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

/// Platform applicability tag on a package entry
///
/// Empty fields are wildcards: an entry with no `os` applies to every
/// operating system. Values are matched through a small synonym table
/// (`x64` equals `x86_64`, `darwin` equals `macos`, and so on) so manifests
/// written against other naming conventions still resolve.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlatformTag {
    /// Target operating system, if restricted
    pub os: Option<String>,
    /// Target processor architecture, if restricted
    pub arch: Option<String>,
    /// Whether the package bundles its own runtime
    pub self_contained: bool,
}

impl PlatformTag {
    /// Whether this tag applies to the given operating system and architecture
    #[must_use]
    pub fn matches(&self, os: &str, arch: &str) -> bool {
        let os_ok = self.os.as_deref().is_none_or(|tag| normalize_os(tag) == normalize_os(os));
        let arch_ok =
            self.arch.as_deref().is_none_or(|tag| normalize_arch(tag) == normalize_arch(arch));
        os_ok && arch_ok
    }
}

fn normalize_os(os: &str) -> &'static str {
    match os.trim().to_ascii_lowercase().as_str() {
        "macos" | "osx" | "darwin" => "macos",
        "windows" | "win" | "win32" | "win64" => "windows",
        "linux" => "linux",
        "freebsd" => "freebsd",
        _ => "other",
    }
}

fn normalize_arch(arch: &str) -> &'static str {
    match arch.trim().to_ascii_lowercase().as_str() {
        "x86_64" | "x64" | "amd64" => "x86_64",
        "aarch64" | "arm64" => "aarch64",
        "x86" | "i686" | "i386" => "x86",
        "arm" => "arm",
        _ => "other",
    }
}

/// One resolvable update package, produced by manifest parsing
///
/// Immutable once built; the session stores the selected descriptor for the
/// rest of its life and every later phase (download, verify) works from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Package version used for ordering and selection
    pub version: PackageVersion,
    /// Optional display version ("2.0 beta 3"), opaque text
    pub informational_version: Option<String>,
    /// Where to download the package archive from
    pub download_url: String,
    /// Declared content checksum, if any
    pub checksum: Option<Checksum>,
    /// Declared archive size in bytes, if any
    pub size: Option<u64>,
    /// Platform applicability
    pub platform: PlatformTag,
}

/// A parsed manifest: optional application name plus package entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    /// Application name declared by the manifest, display-only
    pub name: Option<String>,
    /// All package entries, in document order
    pub packages: Vec<PackageDescriptor>,
}

/// Untyped package fields as read from a document, before validation
///
/// Both format modules lower their serde shapes into this struct so the
/// string-to-type conversion (and its error classification) lives in one
/// place.
#[derive(Debug, Default)]
pub(crate) struct RawPackageFields {
    pub version: Option<String>,
    pub informational_version: Option<String>,
    pub url: Option<String>,
    pub checksum: Option<String>,
    pub size: Option<u64>,
    pub os: Option<String>,
    pub arch: Option<String>,
    pub self_contained: Option<bool>,
}

impl RawPackageFields {
    /// Validate and convert into a typed descriptor.
    ///
    /// `index` is the entry's position in the document, used only for error
    /// messages.
    pub(crate) fn into_descriptor(
        self,
        format: ManifestFormat,
        index: usize,
    ) -> Result<PackageDescriptor, UpdateError> {
        let entry_error = |reason: String| UpdateError::Parse {
            format: format!("{format} manifest"),
            reason: format!("package entry {index}: {reason}"),
        };

        let version_text =
            self.version.ok_or_else(|| entry_error("missing 'version'".to_string()))?;
        let version = version_text
            .parse::<PackageVersion>()
            .map_err(|e| entry_error(format!("invalid version '{version_text}': {e}")))?;

        let download_url = match self.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(entry_error("missing 'url' (or 'uri')".to_string())),
        };

        let checksum = match self.checksum {
            Some(text) => Some(
                text.parse::<Checksum>()
                    .map_err(|e| entry_error(format!("invalid checksum: {e}")))?,
            ),
            None => None,
        };

        Ok(PackageDescriptor {
            version,
            informational_version: self.informational_version,
            download_url,
            checksum,
            size: self.size,
            platform: PlatformTag {
                os: self.os,
                arch: self.arch,
                self_contained: self.self_contained.unwrap_or(false),
            },
        })
    }
}

/// Parse manifest bytes in the given format.
///
/// # Errors
///
/// Returns [`UpdateError::Parse`] when the document is not valid UTF-8,
/// not valid JSON/XML, or contains a package entry with missing or
/// malformed required fields.
pub fn parse_manifest(
    content: &[u8],
    format: ManifestFormat,
) -> Result<ResolvedManifest, UpdateError> {
    let text = std::str::from_utf8(content).map_err(|e| UpdateError::Parse {
        format: format!("{format} manifest"),
        reason: format!("document is not valid UTF-8: {e}"),
    })?;

    let manifest = match format {
        ManifestFormat::Json => json::parse(text)?,
        ManifestFormat::Xml => xml::parse(text)?,
    };
    debug!(
        format = %format,
        packages = manifest.packages.len(),
        "parsed update manifest"
    );
    Ok(manifest)
}

/// Apply the selection policy to a list of package descriptors.
///
/// Filters by platform applicability and the self-contained constraint,
/// then picks the highest version strictly greater than `base_version`
/// when one is supplied, or the highest version overall when none is. Ties
/// keep the first-encountered entry in manifest order.
///
/// # Errors
///
/// Returns [`UpdateError::NoApplicablePackage`] when no entry qualifies -
/// the "already up to date" signal, not a failure.
pub fn select_package(
    packages: Vec<PackageDescriptor>,
    base_version: Option<PackageVersion>,
    self_contained_only: bool,
    os: &str,
    arch: &str,
) -> Result<PackageDescriptor, UpdateError> {
    let mut best: Option<PackageDescriptor> = None;

    for descriptor in packages {
        if !descriptor.platform.matches(os, arch) {
            continue;
        }
        if self_contained_only && !descriptor.platform.self_contained {
            continue;
        }
        if let Some(base) = base_version
            && descriptor.version <= base
        {
            continue;
        }
        // Strictly-greater comparison keeps the first entry on version ties.
        match &best {
            Some(current) if descriptor.version <= current.version => {}
            _ => best = Some(descriptor),
        }
    }

    match best {
        Some(descriptor) => {
            debug!(
                version = %descriptor.version,
                url = %descriptor.download_url,
                "selected update package"
            );
            Ok(descriptor)
        }
        None => Err(UpdateError::NoApplicablePackage),
    }
}
