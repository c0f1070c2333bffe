//! Configuration for update sessions
//!
//! Two layers of configuration feed an update:
//!
//! 1. **Session configuration** ([`SessionConfig`]) - everything one update
//!    run needs: where the application lives, where its manifest is
//!    published, and how to talk to the network. Built by the caller,
//!    consumed by value when a session starts, and immutable from then on.
//! 2. **Global configuration** ([`GlobalConfig`]) - user-wide defaults
//!    stored as TOML (`~/.config/upkit/config.toml` on Linux). The command
//!    line merges these under its own flags; library users can ignore the
//!    file entirely.
//!
//! ## Global Configuration File
//!
//! ```toml
//! [http]
//! user-agent = "my-app-updater/1.0"
//! accept-invalid-certs = false
//!
//! [staging]
//! directory = "/var/cache/my-app/updates"
//! keep-packages = false
//! ```

pub mod global;

pub use global::{GlobalConfig, HttpConfig, StagingConfig};

use std::path::PathBuf;

use crate::core::UpdateError;
use crate::process::ProcessTarget;
use crate::source::HttpOptions;
use crate::version::PackageVersion;

/// Everything one update session needs to run
///
/// A session takes this by value and never exposes it mutably, so a
/// running update cannot have its inputs changed underneath it. Populate
/// the optional fields with the `with_` builders before handing it over.
///
/// # Examples
///
/// ```no_run
/// use upkit::config::SessionConfig;
/// use upkit::version::PackageVersion;
///
/// let config = SessionConfig::new(
///     "/opt/my-app",
///     "https://releases.example.com/my-app/manifest.json",
/// )
/// .with_base_version(PackageVersion::new(2, 1, 0, 0))
/// .with_self_contained_only(true);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory the update is applied to
    pub app_directory: PathBuf,
    /// Display name used in messages and events
    pub app_name: String,
    /// Version currently installed; `None` means unknown, which makes
    /// every published version an upgrade candidate
    pub base_version: Option<PackageVersion>,
    /// URL or file system path of the package manifest
    pub manifest_location: String,
    /// When set, the manifest's `name` must match or resolution fails
    pub expected_name: Option<String>,
    /// Restrict selection to self-contained packages
    pub self_contained_only: bool,
    /// Process to wait for before touching the application directory
    pub wait_for: ProcessTarget,
    /// HTTP behavior for manifest and package downloads
    pub http: HttpOptions,
    /// Override for the staging directory; defaults to the user cache
    pub staging_dir: Option<PathBuf>,
    /// Keep the verified package in staging after a successful install
    pub keep_staged_package: bool,
    /// Operating system used for package selection
    pub os: String,
    /// CPU architecture used for package selection
    pub arch: String,
}

impl SessionConfig {
    /// Configuration with required fields set and everything else
    /// defaulted. The display name is derived from the directory name and
    /// the platform from the running host.
    pub fn new(app_directory: impl Into<PathBuf>, manifest_location: impl Into<String>) -> Self {
        let app_directory = app_directory.into();
        let app_name = app_directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "application".to_string());
        Self {
            app_directory,
            app_name,
            base_version: None,
            manifest_location: manifest_location.into(),
            expected_name: None,
            self_contained_only: false,
            wait_for: ProcessTarget::default(),
            http: HttpOptions::default(),
            staging_dir: None,
            keep_staged_package: false,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    #[must_use]
    pub fn with_base_version(mut self, version: PackageVersion) -> Self {
        self.base_version = Some(version);
        self
    }

    #[must_use]
    pub fn with_expected_name(mut self, name: impl Into<String>) -> Self {
        self.expected_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_self_contained_only(mut self, only: bool) -> Self {
        self.self_contained_only = only;
        self
    }

    #[must_use]
    pub fn with_wait_for(mut self, target: ProcessTarget) -> Self {
        self.wait_for = target;
        self
    }

    #[must_use]
    pub fn with_http(mut self, http: HttpOptions) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_keep_staged_package(mut self, keep: bool) -> Self {
        self.keep_staged_package = keep;
        self
    }

    /// Override the platform used for package selection. Mostly useful in
    /// tests and for cross-updating a managed install.
    #[must_use]
    pub fn with_platform(mut self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        self.os = os.into();
        self.arch = arch.into();
        self
    }

    /// Check the configuration for problems that would doom the session.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Configuration`] naming the offending field.
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.manifest_location.trim().is_empty() {
            return Err(UpdateError::Configuration {
                message: "manifest location must not be empty".to_string(),
            });
        }
        if !self.app_directory.is_dir() {
            return Err(UpdateError::Configuration {
                message: format!(
                    "application directory does not exist: {}",
                    self.app_directory.display()
                ),
            });
        }
        if self.app_name.trim().is_empty() {
            return Err(UpdateError::Configuration {
                message: "application name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The directory downloaded packages are staged in.
    ///
    /// Uses the explicit override when given, otherwise a per-user cache
    /// location (`~/.cache/upkit` on Linux).
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Configuration`] when no override is set and
    /// the platform reports no cache directory.
    pub fn resolved_staging_root(&self) -> Result<PathBuf, UpdateError> {
        if let Some(dir) = &self.staging_dir {
            return Ok(dir.clone());
        }
        dirs::cache_dir()
            .map(|cache| cache.join("upkit"))
            .ok_or_else(|| UpdateError::Configuration {
                message: "no cache directory available; set an explicit staging directory"
                    .to_string(),
            })
    }
}

/// Expand a user-supplied path, resolving `~` and environment variables.
///
/// # Errors
///
/// Returns [`UpdateError::Configuration`] when an environment variable in
/// the path is not set.
pub fn expand_path(raw: &str) -> Result<PathBuf, UpdateError> {
    let expanded = shellexpand::full(raw).map_err(|e| UpdateError::Configuration {
        message: format!("cannot expand path '{raw}': {e}"),
    })?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Merge global configuration into HTTP options, with explicit options
/// winning over the global file.
#[must_use]
pub fn http_options_with_global(explicit: HttpOptions, global: &GlobalConfig) -> HttpOptions {
    HttpOptions {
        user_agent: explicit.user_agent.or_else(|| global.http.user_agent.clone()),
        referer: explicit.referer.or_else(|| global.http.referer.clone()),
        accept_invalid_certs: explicit.accept_invalid_certs || global.http.accept_invalid_certs,
    }
}

/// Staging override from the global file, when the session has none.
#[must_use]
pub fn staging_dir_from_global(explicit: Option<PathBuf>, global: &GlobalConfig) -> Option<PathBuf> {
    explicit.or_else(|| global.staging.directory.clone())
}
