//! Command-line interface for upkit.
//!
//! The CLI wraps one [`UpdatingSession`] run: it parses the update request
//! from flags, merges in defaults from the global configuration file,
//! renders session events as status lines and progress bars, and maps the
//! session outcome to an exit code. After a successful update it can mark
//! the application's executable and relaunch it.
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Update installed, or already up to date |
//! | 1 | Invalid arguments or configuration |
//! | 2 | Update failed (application restored where possible) |
//! | 3 | Update cancelled |
//!
//! # Usage Patterns
//!
//! ```bash
//! # Minimal invocation: directory plus manifest location
//! upkit --directory /opt/acme --package-manifest https://releases.example.com/manifest.json
//!
//! # Invoked by the application itself before exiting
//! upkit --directory /opt/acme \
//!     --package-manifest https://releases.example.com/manifest.json \
//!     --wait-for-process 4242 \
//!     --executable bin/acme --executable-args "--resume-session"
//!
//! # Air-gapped update from a mounted share
//! upkit --directory /opt/acme --package-manifest /mnt/releases/manifest.xml \
//!     --current-version 2.0.1 --self-contained-only
//! ```
//!
//! # Configuration Precedence
//!
//! Flags beat the global configuration file, which beats built-in
//! defaults. The global file lives at the platform config directory
//! (`~/.config/upkit/config.toml` on Linux) unless `--config` or
//! `UPKIT_CONFIG_PATH` points elsewhere.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{GlobalConfig, SessionConfig, http_options_with_global, staging_dir_from_global};
use crate::core::user_friendly_error;
use crate::process::ProcessTarget;
use crate::session::{SessionEvent, UpdateOutcome, UpdaterState, UpdatingSession};
use crate::source::HttpOptions;
use crate::utils::progress::ProgressBar;
use crate::utils::set_executable;
use crate::version::PackageVersion;

/// Exit code for a successful or already-up-to-date run
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for invalid arguments or configuration
pub const EXIT_INVALID_ARGUMENT: i32 = 1;
/// Exit code for a failed update
pub const EXIT_FAILED: i32 = 2;
/// Exit code for a cancelled update
pub const EXIT_CANCELLED: i32 = 3;

/// Updates an installed application from a published package manifest.
///
/// One invocation performs one update attempt against one application
/// directory. The manifest may be an `http(s)` URL, a `file://` URL, or a
/// plain file system path; its extension decides the format (`.xml` for
/// XML, anything else JSON).
#[derive(Debug, Parser)]
#[command(
    name = "upkit",
    about = "Update an installed application from a package manifest",
    version,
    long_about = "upkit resolves the best update package from a JSON or XML manifest, \
downloads and verifies it, backs the application up and installs the package over it. \
If anything goes wrong mid-install the backup is restored before upkit exits."
)]
pub struct Cli {
    /// Application directory to update
    #[arg(short, long, value_name = "DIR")]
    pub directory: PathBuf,

    /// URL or path of the package manifest
    #[arg(short = 'm', long, value_name = "LOCATION")]
    pub package_manifest: String,

    /// Application name the manifest must declare.
    ///
    /// When set, a manifest naming a different application aborts the
    /// update before anything is downloaded. Also used as the display
    /// name in status output.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Version currently installed, e.g. "2.0.1".
    ///
    /// Only packages strictly newer than this are considered. Without it
    /// the highest applicable package wins regardless of what is
    /// installed.
    #[arg(long, value_name = "VERSION")]
    pub current_version: Option<PackageVersion>,

    /// Executable to start after a successful update.
    ///
    /// Relative paths resolve inside the application directory. On Unix
    /// the file is marked executable first, since archive extraction may
    /// not preserve permission bits.
    #[arg(short, long, value_name = "PATH")]
    pub executable: Option<PathBuf>,

    /// Arguments passed to the relaunched executable, whitespace-separated
    #[arg(long, value_name = "ARGS", requires = "executable", allow_hyphen_values = true)]
    pub executable_args: Option<String>,

    /// Process ID to wait for before updating.
    ///
    /// Combined with `--executable`, the wait also covers any process
    /// running that executable. There is no timeout; Ctrl-C cancels.
    #[arg(long, value_name = "PID")]
    pub wait_for_process: Option<u32>,

    /// Only consider packages that bundle their own runtime
    #[arg(long)]
    pub self_contained_only: bool,

    /// User-Agent header for manifest and package requests
    #[arg(long, value_name = "AGENT")]
    pub user_agent: Option<String>,

    /// Referer header for manifest and package requests
    #[arg(long, value_name = "URL")]
    pub referer: Option<String>,

    /// Accept invalid TLS certificates for this run.
    ///
    /// Intended for servers with self-signed certificates on closed
    /// networks. Applies to every request the updater makes.
    #[arg(long)]
    pub accept_invalid_certs: bool,

    /// Directory for staged package downloads.
    ///
    /// Defaults to the per-user cache directory. Interrupted downloads
    /// resume from here on the next run.
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Keep the verified package file in staging after a successful update
    #[arg(long)]
    pub keep_staged_package: bool,

    /// Path to a custom global configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (log level debug)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    /// Run the update described by the parsed arguments.
    ///
    /// Returns the process exit code. Configuration problems surface as
    /// errors (the caller renders them and exits with
    /// [`EXIT_INVALID_ARGUMENT`]); update failures and cancellations are
    /// rendered here and returned as their exit codes.
    ///
    /// # Errors
    ///
    /// Returns an error when the global configuration file is unreadable
    /// or the session configuration is invalid.
    pub async fn execute(self) -> Result<i32> {
        self.init_logging();

        let global = match &self.config {
            Some(path) => GlobalConfig::load_from(path)
                .await
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => GlobalConfig::load().await?,
        };

        let config = self.build_session_config(&global);
        let mut session = UpdatingSession::new(config)?;

        // Ctrl-C requests cancellation; the session stops at the next
        // chunk or file boundary and rolls back if needed.
        let token = session.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling update");
                token.cancel();
            }
        });

        let renderer = if self.quiet {
            None
        } else {
            let events = session.subscribe();
            let show_bars = !self.no_progress;
            Some(tokio::spawn(render_events(events, show_bars)))
        };

        if let Err(e) = session.wait_for_process().await {
            if e.is_cancelled() {
                drop(session);
                if let Some(task) = renderer {
                    let _ = task.await;
                }
                eprintln!("{}", "Update cancelled.".yellow());
                return Ok(EXIT_CANCELLED);
            }
            return Err(e.into());
        }

        let outcome = session.run().await?;

        // Dropping the session closes the event channel and ends the
        // renderer after it drains the remaining events.
        drop(session);
        if let Some(task) = renderer {
            let _ = task.await;
        }

        self.conclude(outcome)
    }

    /// Map the session outcome to terminal output and an exit code.
    fn conclude(&self, outcome: UpdateOutcome) -> Result<i32> {
        match outcome.status {
            UpdaterState::Succeeded => {
                if outcome.already_up_to_date {
                    if !self.quiet {
                        println!("{}", "The application is already up to date.".green());
                    }
                } else {
                    if !self.quiet {
                        let version = outcome
                            .installed
                            .as_ref()
                            .map_or_else(String::new, |d| format!(" to {}", d.version));
                        println!("{}", format!("Update installed{version}.").green().bold());
                    }
                    self.relaunch()?;
                }
                Ok(EXIT_SUCCESS)
            }
            UpdaterState::Cancelled => {
                eprintln!("{}", "Update cancelled.".yellow());
                if let Some(restore_error) = &outcome.restore_error {
                    render_restore_error(restore_error);
                }
                Ok(EXIT_CANCELLED)
            }
            _ => {
                if let Some(error) = outcome.error {
                    user_friendly_error(error.into()).display();
                }
                if let Some(restore_error) = &outcome.restore_error {
                    render_restore_error(restore_error);
                }
                Ok(EXIT_FAILED)
            }
        }
    }

    /// Start the configured executable, marking it executable first.
    fn relaunch(&self) -> Result<()> {
        let Some(exe) = &self.executable else {
            return Ok(());
        };
        let path = if exe.is_absolute() {
            exe.clone()
        } else {
            self.directory.join(exe)
        };

        if let Err(e) = set_executable(&path) {
            warn!(path = %path.display(), error = %e, "could not mark file as executable");
        }

        let args: Vec<&str> =
            self.executable_args.as_deref().map(str::split_whitespace).into_iter().flatten().collect();
        info!(path = %path.display(), ?args, "starting application");
        std::process::Command::new(&path)
            .args(&args)
            .current_dir(&self.directory)
            .spawn()
            .with_context(|| format!("failed to start {}", path.display()))?;

        if !self.quiet {
            println!("Started {}.", path.display());
        }
        Ok(())
    }

    /// Translate flags plus global defaults into a session configuration.
    fn build_session_config(&self, global: &GlobalConfig) -> SessionConfig {
        let mut config = SessionConfig::new(&self.directory, self.package_manifest.clone())
            .with_self_contained_only(self.self_contained_only)
            .with_keep_staged_package(self.keep_staged_package || global.staging.keep_packages);

        if let Some(name) = &self.name {
            config = config.with_name(name.clone()).with_expected_name(name.clone());
        }
        if let Some(version) = self.current_version {
            config = config.with_base_version(version);
        }
        if self.wait_for_process.is_some() || self.executable.is_some() {
            config = config.with_wait_for(ProcessTarget {
                pid: self.wait_for_process,
                executable: self.executable.clone(),
            });
        }

        let http = http_options_with_global(
            HttpOptions {
                user_agent: self.user_agent.clone(),
                referer: self.referer.clone(),
                accept_invalid_certs: self.accept_invalid_certs,
            },
            global,
        );
        config = config.with_http(http);

        if let Some(dir) = staging_dir_from_global(self.staging_dir.clone(), global) {
            config = config.with_staging_dir(dir);
        }
        config
    }

    /// Install the tracing subscriber.
    ///
    /// `UPKIT_LOG` takes precedence; otherwise verbosity flags choose the
    /// level (debug for `--verbose`, error for `--quiet`, warn by
    /// default). Logs go to stderr so stdout stays scriptable.
    fn init_logging(&self) {
        let filter = std::env::var("UPKIT_LOG").map_or_else(
            |_| {
                let level = if self.verbose {
                    "upkit=debug"
                } else if self.quiet {
                    "upkit=error"
                } else {
                    "upkit=warn"
                };
                EnvFilter::new(level)
            },
            EnvFilter::new,
        );
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init();
        debug!(verbose = self.verbose, quiet = self.quiet, "logging initialized");
    }
}

fn render_restore_error(error: &crate::core::UpdateError) {
    eprintln!(
        "{}: {error}",
        "the previous version could not be fully restored".red().bold()
    );
    eprintln!("The backup directory was kept next to the application directory.");
}

/// Render session events until the channel closes.
///
/// Status messages print as plain lines; download and install phases get
/// a progress bar when `show_bars` is set. A receiver that lags simply
/// skips ahead - display is best-effort.
async fn render_events(mut events: broadcast::Receiver<SessionEvent>, show_bars: bool) {
    let mut bar: Option<ProgressBar> = None;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "event renderer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            SessionEvent::StateChanged { new, .. } => {
                if let Some(active) = bar.take() {
                    active.finish_and_clear();
                }
                if new.is_terminal() {
                    break;
                }
            }
            SessionEvent::MessageChanged { new, .. } => {
                if let Some(active) = &bar {
                    active.set_message(new);
                } else {
                    println!("{new}");
                }
            }
            SessionEvent::PackageResolved { version, informational_version, size, .. } => {
                let display = informational_version.unwrap_or_else(|| version.to_string());
                let size_note = size
                    .map_or_else(String::new, |s| format!(" ({})", indicatif::HumanBytes(s)));
                println!("Update available: {}{size_note}", display.bold());
            }
            SessionEvent::WaitingForProcess { pid, name } => {
                println!("Waiting for {name} (pid {pid}) to exit...");
            }
            SessionEvent::DownloadProgress { downloaded_bytes, total_bytes, .. } => {
                if !show_bars {
                    continue;
                }
                let active = bar.get_or_insert_with(|| {
                    let b = ProgressBar::new_download(total_bytes);
                    b.set_message("Downloading".to_string());
                    b
                });
                active.set_position(downloaded_bytes);
            }
            SessionEvent::InstallProgress { percent } => {
                if !show_bars {
                    continue;
                }
                let active = bar.get_or_insert_with(|| {
                    let b = ProgressBar::new(100);
                    b.set_message("Installing".to_string());
                    b
                });
                active.set_position(u64::from(percent));
            }
        }
    }

    if let Some(active) = bar.take() {
        active.finish_and_clear();
    }
}
