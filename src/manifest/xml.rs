//! XML manifest format
//!
//! Canonical shape:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <packages name="MyApp">
//!     <package>
//!         <version>1.2.3.4</version>
//!         <url>https://example.com/myapp-1.2.3.4-linux-x64.zip</url>
//!         <checksum>sha256:0123...cdef</checksum>
//!         <size>1048576</size>
//!         <os>linux</os>
//!         <arch>x64</arch>
//!         <self-contained>true</self-contained>
//!     </package>
//! </packages>
//! ```
//!
//! Fields may equally be given as attributes on `<package>`; the same
//! aliases as the JSON format apply (`uri`, `hash`, `operating-system`,
//! `architecture`).

use serde::Deserialize;

use super::{ManifestFormat, RawPackageFields, ResolvedManifest};
use crate::core::UpdateError;

#[derive(Debug, Deserialize)]
struct XmlManifest {
    name: Option<String>,
    #[serde(rename = "package", default)]
    packages: Vec<XmlPackageEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct XmlPackageEntry {
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

impl From<XmlPackageEntry> for RawPackageFields {
    fn from(entry: XmlPackageEntry) -> Self {
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

/// Parse an XML manifest document.
pub fn parse(text: &str) -> Result<ResolvedManifest, UpdateError> {
    let document: XmlManifest = serde_xml_rs::from_str(text).map_err(|e| UpdateError::Parse {
        format: "XML manifest".to_string(),
        reason: e.to_string(),
    })?;

    let packages = document
        .packages
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            RawPackageFields::from(entry).into_descriptor(ManifestFormat::Xml, index)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResolvedManifest {
        name: document.name,
        packages,
    })
}
