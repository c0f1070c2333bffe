//! Shared fixtures for session integration tests
//!
//! Every test gets a [`TestInstall`]: a throwaway application directory to
//! update, a staging directory, and a local release directory standing in
//! for the download server. Packages are built in memory with the same
//! archive crates the installer reads them with.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// One disposable installation under a temp directory.
///
/// The temp directory is cleaned up when the value drops.
pub struct TestInstall {
    pub temp: TempDir,
    pub app_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub release_dir: PathBuf,
}

impl TestInstall {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let app_dir = temp.path().join("acme");
        let staging_dir = temp.path().join("staging");
        let release_dir = temp.path().join("releases");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::create_dir_all(&release_dir).unwrap();
        Self {
            temp,
            app_dir,
            staging_dir,
            release_dir,
        }
    }

    /// Populate the application directory with a version 1 install.
    pub fn seed_v1(&self) {
        self.write_app_file("acme", b"binary-v1");
        self.write_app_file("config/settings.toml", b"theme = \"dark\"\n");
        self.write_app_file("plugins/greeter.so", b"plugin-v1");
    }

    pub fn write_app_file(&self, rel: &str, content: &[u8]) {
        let path = self.app_dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn app_file(&self, rel: &str) -> Vec<u8> {
        std::fs::read(self.app_dir.join(rel)).unwrap()
    }

    /// Every file under the application directory as sorted relative
    /// path / content pairs, for byte-for-byte rollback assertions.
    pub fn app_snapshot(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.app_dir).min_depth(1) {
            let entry = entry.unwrap();
            if entry.file_type().is_file() {
                let rel = entry.path().strip_prefix(&self.app_dir).unwrap().to_path_buf();
                files.push((rel, std::fs::read(entry.path()).unwrap()));
            }
        }
        files.sort();
        files
    }

    /// Write package bytes into the release directory, returning the
    /// location a manifest can reference.
    pub fn publish_package(&self, file_name: &str, bytes: &[u8]) -> String {
        let path = self.release_dir.join(file_name);
        std::fs::write(&path, bytes).unwrap();
        location(&path)
    }

    /// Write a manifest document into the release directory, returning its
    /// location.
    pub fn publish_manifest(&self, file_name: &str, contents: &str) -> String {
        let path = self.release_dir.join(file_name);
        std::fs::write(&path, contents).unwrap();
        location(&path)
    }

    /// Publish a package plus a single-entry JSON manifest whose checksum
    /// and size match the package bytes. Returns the manifest location.
    pub fn publish_release(&self, version: &str, package_file: &str, bytes: &[u8]) -> String {
        let url = self.publish_package(package_file, bytes);
        self.publish_manifest(
            "manifest.json",
            &single_package_manifest(version, &url, bytes),
        )
    }

    /// Where the session keeps its backup snapshot for this install.
    pub fn backup_dir(&self) -> PathBuf {
        self.temp.path().join("acme.backup")
    }

    /// Staged package files (`*.pkg`) currently in the staging directory.
    pub fn staged_packages(&self) -> Vec<PathBuf> {
        files_with_extension(&self.staging_dir, "pkg")
    }

    /// Partial downloads (`*.part`) currently in the staging directory.
    pub fn partial_downloads(&self) -> Vec<PathBuf> {
        files_with_extension(&self.staging_dir, "part")
    }
}

/// Location string for a path, with forward slashes so the value stays
/// valid inside a JSON manifest on every platform.
fn location(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == ext))
        .collect()
}

/// JSON manifest declaring one package with its real checksum and size.
pub fn single_package_manifest(version: &str, url: &str, bytes: &[u8]) -> String {
    format!(
        r#"{{
    "name": "acme",
    "packages": [
        {{
            "version": "{version}",
            "url": "{url}",
            "checksum": "sha256:{checksum}",
            "size": {size}
        }}
    ]
}}"#,
        checksum = sha256_hex(bytes),
        size = bytes.len()
    )
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// In-memory zip archive with default compression.
pub fn zip_package(entries: &[(&str, &[u8])]) -> Vec<u8> {
    build_zip(entries, zip::write::SimpleFileOptions::default())
}

/// In-memory zip archive with stored entries, so the archive size tracks
/// the content size. Used when a download must span several read chunks.
pub fn stored_zip_package(entries: &[(&str, &[u8])]) -> Vec<u8> {
    build_zip(
        entries,
        zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored),
    )
}

fn build_zip(entries: &[(&str, &[u8])], options: zip::write::SimpleFileOptions) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// In-memory gzip-compressed tar archive of regular files.
pub fn targz_package(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, *name, *data).unwrap();
    }
    let bytes = builder.into_inner().unwrap();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&bytes).unwrap();
    encoder.finish().unwrap()
}
