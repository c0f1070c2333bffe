//! upkit - application update engine
//!
//! An update engine for installed desktop and server applications: it reads
//! a published package manifest, picks the right package for the running
//! installation, downloads and verifies it, snapshots the current
//! application directory, and installs the package over it - rolling back
//! from the snapshot when anything goes wrong mid-install.
//!
//! # Architecture Overview
//!
//! upkit follows a session model where:
//! - A [`config::SessionConfig`] describes one installation: where the
//!   application lives, where its manifest is published, and what is
//!   currently installed
//! - An [`session::UpdatingSession`] drives a single update attempt through
//!   a fixed sequence of phases, each observable as a state change
//! - Hosts watch the session through a typed event stream instead of
//!   callbacks, and stop it through a shared cancellation token
//! - Every failure path that already modified the application directory
//!   restores the pre-update snapshot before the session reports its outcome
//!
//! ## Key Features
//!
//! - **Manifest-driven**: JSON or XML manifests list versioned packages with
//!   download URLs, checksums, sizes, and platform tags
//! - **Integrity-checked**: declared sizes and SHA-256/SHA-512 digests are
//!   verified before a package is ever opened
//! - **Transactional**: the application directory is snapshotted before
//!   installation and restored byte-for-byte on failure or cancellation
//! - **Resumable**: a fully downloaded package from an interrupted run is
//!   re-verified and reused, skipping the download
//! - **Cancellable**: cancellation is honored between download chunks and
//!   archive entries, never mid-file
//! - **Single-writer**: an exclusive per-application lock keeps concurrent
//!   updaters off the same installation
//!
//! # Core Modules
//!
//! ## Orchestration
//! - [`session`] - the update state machine, its events and status messages
//! - [`config`] - per-session configuration and the global config file
//! - [`core`] - error taxonomy and the cancellation token
//! - [`cli`] - command-line front end over the session
//!
//! ## Package Pipeline
//! - [`manifest`] - manifest parsing (JSON/XML) and package selection
//! - [`source`] - byte stream sources: HTTP(S), local files, memory
//! - [`verify`] - size and checksum verification of downloaded packages
//! - [`install`] - zip and tar archive extraction over the application
//!
//! ## Application Directory
//! - [`backup`] - pre-install snapshots and strict restore
//! - [`process`] - waiting for the target application to exit
//!
//! ## Supporting Modules
//! - [`utils`] - file system helpers, the update lock, progress bars
//! - [`version`] - four-component package version parsing and ordering
//!
//! # Library Usage
//!
//! ```no_run
//! use upkit::config::SessionConfig;
//! use upkit::session::{SessionEvent, UpdatingSession};
//!
//! # async fn example() -> Result<(), upkit::UpdateError> {
//! let config = SessionConfig::new("/opt/acme", "https://releases.example.com/manifest.json")
//!     .with_base_version("2.0.1.0".parse()?)
//!     .with_expected_name("acme");
//!
//! let mut session = UpdatingSession::new(config)?;
//! let mut events = session.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let SessionEvent::DownloadProgress { percent: Some(p), .. } = event {
//!             println!("downloading: {p}%");
//!         }
//!     }
//! });
//!
//! let outcome = session.run().await?;
//! if outcome.succeeded() && !outcome.already_up_to_date {
//!     println!("updated to {}", outcome.installed.unwrap().version);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Update the application in /opt/acme from a published manifest
//! upkit --directory /opt/acme --package-manifest https://releases.example.com/manifest.json
//!
//! # Wait for the running application to exit first, then relaunch it
//! upkit --directory /opt/acme --package-manifest https://releases.example.com/manifest.json \
//!     --wait-for-process 4242 --executable acme
//!
//! # Only consider self-contained packages, against a local manifest file
//! upkit --directory /opt/acme --package-manifest /srv/updates/manifest.xml \
//!     --self-contained-only --current-version 2.0.1
//! ```

// Orchestration
pub mod cli;
pub mod config;
pub mod core;
pub mod session;

// Package pipeline
pub mod install;
pub mod manifest;
pub mod source;
pub mod verify;

// Application directory management
pub mod backup;
pub mod process;

// Supporting modules
pub mod utils;
pub mod version;

pub use crate::config::SessionConfig;
pub use crate::core::{CancellationToken, UpdateError};
pub use crate::session::{SessionEvent, UpdateOutcome, UpdaterState, UpdatingSession};
