//! Global configuration file handling
//!
//! User-wide defaults for the updater, stored as TOML in the platform
//! config directory (`~/.config/upkit/config.toml` on Linux,
//! `%APPDATA%\upkit\config.toml` on Windows). The location can be
//! overridden with the `UPKIT_CONFIG_PATH` environment variable.
//!
//! A missing file is not an error; it loads as the default configuration.
//! Only non-default values are written back, keeping the file minimal.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::UpdateError;

/// User-wide updater defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// HTTP defaults applied when the caller sets none
    #[serde(default, skip_serializing_if = "is_default_http")]
    pub http: HttpConfig,
    /// Where downloaded packages are staged
    #[serde(default, skip_serializing_if = "is_default_staging")]
    pub staging: StagingConfig,
}

/// `[http]` section of the global configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HttpConfig {
    /// User-Agent header for manifest and package requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Referer header, required by some release hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    /// Skip TLS certificate validation. Only for self-signed internal
    /// release servers.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub accept_invalid_certs: bool,
}

/// `[staging]` section of the global configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StagingConfig {
    /// Staging directory override; defaults to the user cache directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Keep verified packages on disk after a successful install
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keep_packages: bool,
}

fn is_default_http(http: &HttpConfig) -> bool {
    *http == HttpConfig::default()
}

fn is_default_staging(staging: &StagingConfig) -> bool {
    *staging == StagingConfig::default()
}

impl GlobalConfig {
    /// Load from the default location, or return defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Configuration`] when the default path cannot
    /// be determined, [`UpdateError::Io`] when the file exists but cannot
    /// be read, and [`UpdateError::Parse`] for invalid TOML.
    pub async fn load() -> Result<Self, UpdateError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            debug!(path = %path.display(), "no global config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// The staging directory may use `~` and environment variables; it is
    /// expanded here, right after parsing.
    ///
    /// # Errors
    ///
    /// Same conditions as [`GlobalConfig::load`], minus path resolution.
    pub async fn load_from(path: &Path) -> Result<Self, UpdateError> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: Self = toml::from_str(&content).map_err(|e| UpdateError::Parse {
            format: "global configuration".to_string(),
            reason: format!("{} in {}", e.message(), path.display()),
        })?;
        if let Some(dir) = &config.staging.directory {
            config.staging.directory = Some(crate::config::expand_path(&dir.to_string_lossy())?);
        }
        debug!(path = %path.display(), "loaded global config");
        Ok(config)
    }

    /// Write to a specific file, atomically, creating parents as needed.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Io`] when the write fails.
    pub async fn save_to(&self, path: &Path) -> Result<(), UpdateError> {
        let content = toml::to_string_pretty(self).map_err(|e| UpdateError::Other {
            message: format!("failed to serialize global config: {e}"),
        })?;
        crate::utils::fs::atomic_write(path, content.as_bytes())
    }

    /// Default configuration file location.
    ///
    /// Honors `UPKIT_CONFIG_PATH` when set, otherwise the platform config
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Configuration`] when the platform reports no
    /// config directory.
    pub fn default_path() -> Result<PathBuf, UpdateError> {
        if let Ok(path) = std::env::var("UPKIT_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("upkit").join("config.toml")).ok_or_else(|| {
            UpdateError::Configuration {
                message: "cannot determine config directory; set UPKIT_CONFIG_PATH".to_string(),
            }
        })
    }
}
