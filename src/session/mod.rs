//! Update session orchestration
//!
//! [`UpdatingSession`] drives one update from manifest to installed
//! application: resolve, download, verify, back up, install, and - when
//! anything goes wrong after the backup exists - restore. Phases run
//! strictly in sequence under an exclusive per-application lock, every
//! state change and progress tick is published as a typed
//! [`SessionEvent`], and a [`CancellationToken`] stops the session at the
//! next chunk or file boundary.
//!
//! A session is single-use: construct it with a validated
//! [`SessionConfig`], call [`UpdatingSession::run`] once, and read the
//! [`UpdateOutcome`]. Interrupted runs leave their fully downloaded
//! package in staging; the next session verifies it and skips the
//! download when it still matches the manifest.
//!
//! # Examples
//!
//! ```no_run
//! use upkit::config::SessionConfig;
//! use upkit::session::UpdatingSession;
//!
//! # async fn example() -> Result<(), upkit::UpdateError> {
//! let config = SessionConfig::new("/opt/my-app", "https://releases.example.com/manifest.json");
//! let mut session = UpdatingSession::new(config)?;
//!
//! let mut events = session.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//!
//! let outcome = session.run().await?;
//! println!("finished: {}", outcome.status);
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod message;
pub mod state;

pub use events::SessionEvent;
pub use message::{EnglishCatalog, MessageCatalog, MessageKey};
pub use state::UpdaterState;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::backup::{BackupHandle, BackupManager};
use crate::config::SessionConfig;
use crate::core::{CancellationToken, UpdateError};
use crate::install::PackageInstaller;
use crate::manifest::{ManifestFormat, PackageDescriptor, parse_manifest, select_package};
use crate::process;
use crate::source::{SourceStream, source_for};
use crate::utils::lock::UpdateLock;
use crate::verify::PackageVerifier;

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How one update session ended
///
/// Failure and cancellation are results, not panics: the cause travels
/// here and in the event stream, never as an unwound error from
/// [`UpdatingSession::run`].
#[derive(Debug)]
pub struct UpdateOutcome {
    /// Terminal state: `Succeeded`, `Failed`, or `Cancelled`
    pub status: UpdaterState,
    /// No applicable package was published; nothing was touched
    pub already_up_to_date: bool,
    /// The package that was installed, on success
    pub installed: Option<PackageDescriptor>,
    /// What stopped the update, when it did not succeed
    pub error: Option<UpdateError>,
    /// Set when rollback itself could not put every file back; the
    /// backup stays on disk in that case
    pub restore_error: Option<UpdateError>,
}

impl UpdateOutcome {
    /// True when the session ended in `Succeeded`, including the
    /// up-to-date short circuit.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == UpdaterState::Succeeded
    }

    /// True when the session ended in `Cancelled`.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.status == UpdaterState::Cancelled
    }
}

/// One single-use update run
pub struct UpdatingSession {
    config: SessionConfig,
    staging_root: PathBuf,
    state: UpdaterState,
    message: String,
    token: CancellationToken,
    events: broadcast::Sender<SessionEvent>,
    catalog: Arc<dyn MessageCatalog>,
    resolved: Option<PackageDescriptor>,
    backup_handle: Option<BackupHandle>,
    lock: Option<UpdateLock>,
    waiting_for_process: bool,
}

impl UpdatingSession {
    /// Build a session from a validated configuration.
    ///
    /// The configuration is consumed and can no longer be changed;
    /// whatever this session does, it does with these inputs.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Configuration`] when the configuration is
    /// invalid or no staging directory can be resolved.
    pub fn new(config: SessionConfig) -> Result<Self, UpdateError> {
        config.validate()?;
        let staging_root = config.resolved_staging_root()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config,
            staging_root,
            state: UpdaterState::Idle,
            message: String::new(),
            token: CancellationToken::new(),
            events,
            catalog: Arc::new(EnglishCatalog),
            resolved: None,
            backup_handle: None,
            lock: None,
            waiting_for_process: false,
        })
    }

    /// Replace the built-in English status messages.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn MessageCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// A new receiver for this session's event stream.
    ///
    /// Subscribe before calling [`run`](Self::run) to observe every
    /// event; later subscribers see only what happens after they join.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Token that stops this session when cancelled. Clone it freely.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request cancellation. The session stops at the next chunk or file
    /// boundary and rolls back if installation already began.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> UpdaterState {
        self.state
    }

    /// Current human-readable status line.
    #[must_use]
    pub fn status_message(&self) -> &str {
        &self.message
    }

    /// The configuration this session runs with.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// True while [`wait_for_process`](Self::wait_for_process) is blocked
    /// on the configured process.
    #[must_use]
    pub const fn is_waiting_for_process(&self) -> bool {
        self.waiting_for_process
    }

    /// Block until the configured process has exited.
    ///
    /// Call this before [`run`](Self::run) when the application being
    /// updated may still be running. Returns immediately when no process
    /// target is configured or no matching process exists; otherwise polls
    /// until the process is gone or the session is cancelled. There is no
    /// timeout.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::InvalidState`] when the session already ran
    /// - [`UpdateError::Cancelled`] when cancelled mid-wait
    pub async fn wait_for_process(&mut self) -> Result<(), UpdateError> {
        if self.state != UpdaterState::Idle {
            return Err(UpdateError::InvalidState {
                expected: UpdaterState::Idle.to_string(),
                actual: self.state.to_string(),
            });
        }
        let Some(found) = process::currently_running(&self.config.wait_for) else {
            return Ok(());
        };

        info!(pid = found.pid, name = %found.name, "waiting for application to exit");
        self.set_message(MessageKey::WaitingForApplication, &[&found.name]);
        self.emit(SessionEvent::WaitingForProcess {
            pid: found.pid,
            name: found.name,
        });

        self.waiting_for_process = true;
        let result = process::wait_for_exit(&self.config.wait_for, &self.token).await;
        self.waiting_for_process = false;
        result
    }

    /// Run the update to a terminal state.
    ///
    /// Every result of the update itself - success, nothing to do,
    /// failure, cancellation - comes back as an [`UpdateOutcome`].
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidState`] when called on a session
    /// that already ran. That is a caller bug, not an update result.
    pub async fn run(&mut self) -> Result<UpdateOutcome, UpdateError> {
        if self.state != UpdaterState::Idle {
            return Err(UpdateError::InvalidState {
                expected: UpdaterState::Idle.to_string(),
                actual: self.state.to_string(),
            });
        }

        info!(
            app = %self.config.app_name,
            directory = %self.config.app_directory.display(),
            manifest = %self.config.manifest_location,
            "starting update session"
        );

        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(cause) => self.conclude_failure(cause).await,
        };

        // Release the application lock only after restore had its chance.
        self.lock = None;

        info!(status = %outcome.status, "update session finished");
        Ok(outcome)
    }

    /// The happy path; any error unwinds into [`Self::conclude_failure`].
    async fn drive(&mut self) -> Result<UpdateOutcome, UpdateError> {
        self.enter(UpdaterState::Initializing, MessageKey::Initializing);
        let lock = UpdateLock::acquire(&self.staging_root, &self.config.app_directory).await?;
        self.lock = Some(lock);
        self.token.err_if_cancelled()?;

        self.enter(UpdaterState::ResolvingPackage, MessageKey::CheckingForUpdates);
        let descriptor = match self.resolve_package().await? {
            Some(descriptor) => descriptor,
            None => {
                info!(app = %self.config.app_name, "no applicable package, already up to date");
                self.enter(UpdaterState::Succeeded, MessageKey::UpToDate);
                return Ok(UpdateOutcome {
                    status: UpdaterState::Succeeded,
                    already_up_to_date: true,
                    installed: None,
                    error: None,
                    restore_error: None,
                });
            }
        };
        self.resolved = Some(descriptor.clone());
        let version_text = descriptor.version.to_string();
        self.set_message(MessageKey::UpdateAvailable, &[&version_text]);

        let staged_path = self.staging_root.join(staged_file_name(&self.config.app_name, &descriptor));

        // A package staged by an interrupted run skips the download if it
        // still matches the manifest.
        let mut package_ready = false;
        if tokio::fs::try_exists(&staged_path).await.unwrap_or(false) {
            self.enter(UpdaterState::VerifyingPackage, MessageKey::Verifying);
            match PackageVerifier::verify(&staged_path, &descriptor).await {
                Ok(()) => {
                    info!(path = %staged_path.display(), "reusing staged package from earlier run");
                    package_ready = true;
                }
                Err(e) => {
                    warn!(error = %e, "staged package is stale, downloading again");
                    let _ = tokio::fs::remove_file(&staged_path).await;
                }
            }
        }

        if !package_ready {
            self.enter(UpdaterState::DownloadingPackage, MessageKey::Downloading);
            self.download_package(&descriptor, &staged_path).await?;

            self.enter(UpdaterState::VerifyingPackage, MessageKey::Verifying);
            if let Err(e) = PackageVerifier::verify(&staged_path, &descriptor).await {
                // A package that fails verification must not look
                // resumable to the next run.
                let _ = tokio::fs::remove_file(&staged_path).await;
                return Err(e);
            }
        }

        self.enter(UpdaterState::BackingUpApplication, MessageKey::BackingUp);
        let manager = BackupManager::new(&self.config.app_directory);
        match manager.backup(&self.token).await {
            Ok(handle) => self.backup_handle = Some(handle),
            Err(e) => {
                // A partial snapshot must never be restored from.
                if manager.backup_exists() {
                    let _ = tokio::fs::remove_dir_all(manager.backup_path()).await;
                }
                return Err(e);
            }
        }

        self.enter(UpdaterState::InstallingPackage, MessageKey::Installing);
        let progress_events = self.events.clone();
        PackageInstaller::install(
            &staged_path,
            &self.config.app_directory,
            &self.token,
            move |percent| {
                let _ = progress_events.send(SessionEvent::InstallProgress { percent });
            },
        )
        .await?;

        if let Some(handle) = self.backup_handle.take() {
            if let Err(e) = manager.discard(handle).await {
                warn!(error = %e, "could not remove backup after successful install");
            }
        }
        if !self.config.keep_staged_package {
            let _ = tokio::fs::remove_file(&staged_path).await;
        }

        self.enter(UpdaterState::Succeeded, MessageKey::Succeeded);
        Ok(UpdateOutcome {
            status: UpdaterState::Succeeded,
            already_up_to_date: false,
            installed: self.resolved.clone(),
            error: None,
            restore_error: None,
        })
    }

    /// Roll back when a backup exists, then settle on `Failed` or
    /// `Cancelled`.
    async fn conclude_failure(&mut self, cause: UpdateError) -> UpdateOutcome {
        let cancelled = cause.is_cancelled();
        if cancelled {
            info!("update cancelled");
        } else {
            error!(error = %cause, "update failed");
        }

        let mut restore_error = None;
        if let Some(handle) = self.backup_handle.take() {
            self.enter(UpdaterState::RestoringApplication, MessageKey::Restoring);
            let manager = BackupManager::new(&self.config.app_directory);
            match manager.restore(&handle).await {
                Ok(()) => {
                    let _ = manager.discard(handle).await;
                }
                Err(e) => {
                    error!(error = %e, "rollback did not complete; backup kept on disk");
                    restore_error = Some(e);
                }
            }
        }

        let (status, key) = if cancelled {
            (UpdaterState::Cancelled, MessageKey::Cancelled)
        } else {
            (UpdaterState::Failed, MessageKey::Failed)
        };
        self.enter(status, key);

        UpdateOutcome {
            status,
            already_up_to_date: false,
            installed: None,
            error: Some(cause),
            restore_error,
        }
    }

    /// Fetch and parse the manifest, then choose a package.
    ///
    /// Returns `None` when no published package is strictly newer than
    /// the base version.
    async fn resolve_package(&mut self) -> Result<Option<PackageDescriptor>, UpdateError> {
        let format = ManifestFormat::from_location(&self.config.manifest_location);
        let bytes = self.fetch_all(&self.config.manifest_location).await?;
        let manifest = parse_manifest(&bytes, format)?;

        if let Some(expected) = &self.config.expected_name {
            match manifest.name.as_deref() {
                Some(name) if name == expected => {}
                Some(name) => {
                    return Err(UpdateError::Configuration {
                        message: format!("manifest is for '{name}', expected '{expected}'"),
                    });
                }
                None => {
                    return Err(UpdateError::Configuration {
                        message: format!(
                            "manifest declares no application name, expected '{expected}'"
                        ),
                    });
                }
            }
        }

        match select_package(
            manifest.packages,
            self.config.base_version,
            self.config.self_contained_only,
            &self.config.os,
            &self.config.arch,
        ) {
            Ok(descriptor) => {
                info!(
                    version = %descriptor.version,
                    url = %descriptor.download_url,
                    "resolved update package"
                );
                self.emit(SessionEvent::PackageResolved {
                    version: descriptor.version,
                    informational_version: descriptor.informational_version.clone(),
                    url: descriptor.download_url.clone(),
                    size: descriptor.size,
                });
                Ok(Some(descriptor))
            }
            Err(e) if e.is_no_applicable_package() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read an entire source into memory, for manifests.
    async fn fetch_all(&self, location: &str) -> Result<Vec<u8>, UpdateError> {
        let source = source_for(location, &self.config.http)?;
        debug!(source = %source.description(), "fetching manifest");
        let mut stream = source.open().await?;
        let mut data = Vec::new();
        while let Some(chunk) = stream.next_chunk().await? {
            self.token.err_if_cancelled()?;
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    /// Stream the package into staging; the staged name appears only
    /// after the download completed, partials are deleted on any exit.
    async fn download_package(
        &self,
        descriptor: &PackageDescriptor,
        staged_path: &Path,
    ) -> Result<(), UpdateError> {
        let source = source_for(&descriptor.download_url, &self.config.http)?;
        info!(url = %descriptor.download_url, to = %staged_path.display(), "downloading package");
        let mut stream = source.open().await?;
        let total = stream.content_length().or(descriptor.size);

        sweep_partials(staged_path).await;
        let part = part_path(staged_path);
        match self.stream_to_file(&mut stream, &part, total).await {
            Ok(()) => {
                tokio::fs::rename(&part, staged_path).await?;
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    async fn stream_to_file(
        &self,
        stream: &mut SourceStream,
        path: &Path,
        total: Option<u64>,
    ) -> Result<(), UpdateError> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut downloaded: u64 = 0;
        let mut previous: u64 = 0;

        while let Some(chunk) = stream.next_chunk().await? {
            self.token.err_if_cancelled()?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            self.emit(SessionEvent::DownloadProgress {
                previous_bytes: previous,
                downloaded_bytes: downloaded,
                total_bytes: total,
                percent: download_percent(downloaded, total),
            });
            previous = downloaded;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Advance the state machine and publish the change.
    fn enter(&mut self, next: UpdaterState, key: MessageKey) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        let old = self.state;
        self.state = next;
        debug!(from = %old, to = %next, "state changed");
        self.emit(SessionEvent::StateChanged { old, new: next });
        self.set_message(key, &[]);
    }

    fn set_message(&mut self, key: MessageKey, args: &[&str]) {
        let new = self.catalog.message(key, args);
        if new != self.message {
            let old = std::mem::replace(&mut self.message, new.clone());
            self.emit(SessionEvent::MessageChanged { old, new });
        }
    }

    /// Publish one event; nobody listening is fine.
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Download percentage, or `None` while no total is known.
fn download_percent(downloaded: u64, total: Option<u64>) -> Option<u8> {
    total.map(|t| {
        if t == 0 {
            100
        } else {
            ((downloaded * 100) / t).min(100) as u8
        }
    })
}

/// Deterministic staged file name for a package, so an interrupted run
/// and its successor agree on where the package lives.
fn staged_file_name(app_name: &str, descriptor: &PackageDescriptor) -> String {
    let safe: String = app_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let tag = descriptor.checksum.as_ref().map_or_else(
        || descriptor.size.map_or_else(|| "pkg".to_string(), |s| s.to_string()),
        |c| c.digest[..12.min(c.digest.len())].to_string(),
    );
    format!("{safe}-{}-{tag}.pkg", descriptor.version)
}

/// Per-session partial download name. The staged name only appears once
/// the download completed, and concurrent sessions never collide on the
/// same partial file.
fn part_path(staged: &Path) -> PathBuf {
    let mut name = staged.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.part", uuid::Uuid::new_v4().simple()));
    staged.with_file_name(name)
}

/// Remove partial downloads a killed predecessor left next to the staged
/// path. Best-effort; a partial that cannot be removed is skipped.
async fn sweep_partials(staged: &Path) {
    let (Some(dir), Some(file_name)) = (staged.parent(), staged.file_name()) else {
        return;
    };
    let prefix = format!("{}.", file_name.to_string_lossy());
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".part") {
            debug!(file = %name, "removing stale partial download");
            let _ = tokio::fs::remove_file(entry.path()).await;
        }
    }
}
