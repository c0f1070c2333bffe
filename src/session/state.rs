//! Session state machine
//!
//! An update session moves through a fixed set of states in a fixed
//! direction. The diagram below is the complete transition graph; anything
//! not drawn here is a bug, and [`UpdaterState::can_transition_to`]
//! encodes it exactly.
//!
//! ```text
//! Idle -> Initializing -> ResolvingPackage -> DownloadingPackage -> VerifyingPackage
//!               |                 |    \                                  |
//!               |                 |     '-> VerifyingPackage (staged      |
//!               |                 |         package from an earlier run)  v
//!               |                 '-> Succeeded (up to date)     BackingUpApplication
//!               |                                                         |
//!               |                                                         v
//!               |                                                 InstallingPackage
//!               |                                                   |           |
//!               v                                                   v           v
//!       Failed/Cancelled <- RestoringApplication <------------- (failure)   Succeeded
//! ```
//!
//! Phases never run concurrently and never repeat, with one deliberate
//! exception: a staged package left by an interrupted run is verified
//! right after resolution, and only a stale or corrupt one sends the
//! session back through the download path.

/// Where an update session currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterState {
    /// Constructed but not started
    Idle,
    /// Validating the environment, locking, waiting for the application
    Initializing,
    /// Fetching and parsing the manifest, choosing a package
    ResolvingPackage,
    /// Streaming the package into staging
    DownloadingPackage,
    /// Checking size and checksum of the staged package
    VerifyingPackage,
    /// Snapshotting the application directory
    BackingUpApplication,
    /// Extracting the package over the application directory
    InstallingPackage,
    /// Putting the snapshot back after a failed or cancelled install
    RestoringApplication,
    /// Terminal: update applied, or nothing to do
    Succeeded,
    /// Terminal: update did not complete
    Failed,
    /// Terminal: stopped on request
    Cancelled,
}

impl UpdaterState {
    /// True for states no session ever leaves.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// True while the session is doing work.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle) && !self.is_terminal()
    }

    /// True for the phases that mutate the application directory. The
    /// update lock must be held throughout these.
    #[must_use]
    pub const fn mutates_application(self) -> bool {
        matches!(
            self,
            Self::BackingUpApplication | Self::InstallingPackage | Self::RestoringApplication
        )
    }

    /// Whether `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use UpdaterState::{
            BackingUpApplication, Cancelled, DownloadingPackage, Failed, Idle, Initializing,
            InstallingPackage, ResolvingPackage, RestoringApplication, Succeeded,
            VerifyingPackage,
        };
        matches!(
            (self, next),
            (Idle, Initializing)
                | (Initializing, ResolvingPackage | Failed | Cancelled)
                | (
                    ResolvingPackage,
                    VerifyingPackage | DownloadingPackage | Succeeded | Failed | Cancelled
                )
                | (DownloadingPackage, VerifyingPackage | Failed | Cancelled)
                | (
                    VerifyingPackage,
                    BackingUpApplication | DownloadingPackage | Failed | Cancelled
                )
                | (BackingUpApplication, InstallingPackage | Failed | Cancelled)
                | (InstallingPackage, Succeeded | RestoringApplication)
                | (RestoringApplication, Failed | Cancelled)
        )
    }
}

impl std::fmt::Display for UpdaterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Initializing => "Initializing",
            Self::ResolvingPackage => "ResolvingPackage",
            Self::DownloadingPackage => "DownloadingPackage",
            Self::VerifyingPackage => "VerifyingPackage",
            Self::BackingUpApplication => "BackingUpApplication",
            Self::InstallingPackage => "InstallingPackage",
            Self::RestoringApplication => "RestoringApplication",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}
