//! Typed session events
//!
//! Everything observable about a running session is published as a
//! [`SessionEvent`] on a broadcast channel. Subscribers get their own
//! receiver from [`super::UpdatingSession::subscribe`]; a UI renders
//! progress bars from the same stream a test asserts on. Sending never
//! blocks the session and a slow subscriber only lags itself.

use crate::session::state::UpdaterState;
use crate::version::PackageVersion;

/// One observable step of an update session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The state machine advanced
    StateChanged {
        old: UpdaterState,
        new: UpdaterState,
    },
    /// The human-readable status line changed
    MessageChanged { old: String, new: String },
    /// Resolution picked a package to install
    PackageResolved {
        version: PackageVersion,
        informational_version: Option<String>,
        url: String,
        size: Option<u64>,
    },
    /// The session is waiting for the application to exit
    WaitingForProcess { pid: u32, name: String },
    /// Bytes arrived during download
    ///
    /// `previous_bytes` is the count at the prior event, so consumers can
    /// compute deltas without keeping state. `percent` is absent when the
    /// source reports no total length.
    DownloadProgress {
        previous_bytes: u64,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        percent: Option<u8>,
    },
    /// Extraction progress, as whole percentages
    InstallProgress { percent: u8 },
}
