//! Four-field package version parsing and ordering.
//!
//! Update manifests in the wild carry versions like `2`, `2.1`, `2.1.0.5` -
//! up to four dot-separated numeric fields (major, minor, build, revision).
//! Semver cannot represent the two- and four-field forms, so upkit uses its
//! own ordered tuple type. Comparison is field by field with missing fields
//! treated as zero, which makes `1.2` equal to `1.2.0.0`.
//!
//! # Examples
//!
//! ```rust
//! use upkit::version::PackageVersion;
//!
//! let installed: PackageVersion = "1.4".parse().unwrap();
//! let candidate: PackageVersion = "1.4.0.2".parse().unwrap();
//!
//! assert!(candidate > installed);
//! assert_eq!(installed, "v1.4.0".parse().unwrap());
//! ```

use std::fmt;
use std::str::FromStr;

use crate::core::UpdateError;

/// An ordered `major.minor.build.revision` version.
///
/// Derived ordering compares the fields in declaration order, which is
/// exactly the required field-by-field comparison. The type is `Copy` and
/// cheap to pass around; manifests store versions as strings and convert
/// through [`FromStr`] during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PackageVersion {
    /// First version field
    pub major: u64,
    /// Second version field
    pub minor: u64,
    /// Third version field
    pub build: u64,
    /// Fourth version field
    pub revision: u64,
}

impl PackageVersion {
    /// Build a version from explicit fields.
    #[must_use]
    pub const fn new(major: u64, minor: u64, build: u64, revision: u64) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl FromStr for PackageVersion {
    type Err = UpdateError;

    /// Parse `major[.minor[.build[.revision]]]`, tolerating a leading `v`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Parse`] when the string is empty, has more
    /// than four fields, or contains a non-numeric field.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = |reason: String| UpdateError::Parse {
            format: "version string".to_string(),
            reason,
        };

        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(parse_error("empty version".to_string()));
        }

        let mut fields = [0u64; 4];
        let mut count = 0;
        for part in trimmed.split('.') {
            if count == 4 {
                return Err(parse_error(format!("'{s}' has more than four fields")));
            }
            fields[count] = part
                .parse::<u64>()
                .map_err(|_| parse_error(format!("'{part}' is not a number in '{s}'")))?;
            count += 1;
        }

        Ok(Self {
            major: fields[0],
            minor: fields[1],
            build: fields[2],
            revision: fields[3],
        })
    }
}

impl fmt::Display for PackageVersion {
    /// Render with trailing zero fields elided, always keeping `major.minor`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision != 0 {
            write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
        } else if self.build != 0 {
            write!(f, "{}.{}.{}", self.major, self.minor, self.build)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}
