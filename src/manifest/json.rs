//! JSON manifest format
//!
//! Canonical shape:
//!
//! ```json
//! {
//!     "name": "MyApp",
//!     "packages": [
//!         {
//!             "version": "1.2.3.4",
//!             "informational-version": "1.2.3 beta 4",
//!             "url": "https://example.com/myapp-1.2.3.4-linux-x64.zip",
//!             "checksum": "sha256:0123...cdef",
//!             "size": 1048576,
//!             "os": "linux",
//!             "arch": "x64",
//!             "self-contained": true
//!         }
//!     ]
//! }
//! ```
//!
//! `uri` is accepted for `url`, `hash` for `checksum`, `operating-system`
//! for `os` and `architecture` for `arch`. Unknown fields are ignored so
//! manifests can carry extra metadata for other consumers.

use serde::Deserialize;

use super::{ManifestFormat, RawPackageFields, ResolvedManifest};
use crate::core::UpdateError;

#[derive(Debug, Deserialize)]
struct JsonManifest {
    name: Option<String>,
    #[serde(default)]
    packages: Vec<JsonPackageEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JsonPackageEntry {
    version: Option<String>,
    informational_version: Option<String>,
    #[serde(alias = "uri")]
    url: Option<String>,
    #[serde(alias = "hash")]
    checksum: Option<String>,
    size: Option<u64>,
    #[serde(alias = "operating-system")]
    os: Option<String>,
    #[serde(alias = "architecture")]
    arch: Option<String>,
    self_contained: Option<bool>,
}

impl From<JsonPackageEntry> for RawPackageFields {
    fn from(entry: JsonPackageEntry) -> Self {
        Self {
            version: entry.version,
            informational_version: entry.informational_version,
            url: entry.url,
            checksum: entry.checksum,
            size: entry.size,
            os: entry.os,
            arch: entry.arch,
            self_contained: entry.self_contained,
        }
    }
}

/// Parse a JSON manifest document.
pub fn parse(text: &str) -> Result<ResolvedManifest, UpdateError> {
    let document: JsonManifest = serde_json::from_str(text).map_err(|e| UpdateError::Parse {
        format: "JSON manifest".to_string(),
        reason: e.to_string(),
    })?;

    let packages = document
        .packages
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            RawPackageFields::from(entry).into_descriptor(ManifestFormat::Json, index)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResolvedManifest {
        name: document.name,
        packages,
    })
}
