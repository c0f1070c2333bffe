//! Error handling for upkit
//!
//! The error system has two layers:
//! 1. [`UpdateError`] - strongly-typed failure modes for every phase of an
//!    updating session, used by library code and matched on by the session
//!    state machine to classify outcomes.
//! 2. [`ErrorContext`] - a user-facing wrapper that adds suggestions and
//!    details for CLI display.
//!
//! Two variants are deliberately *not* failures and are handled specially by
//! the session:
//! - [`UpdateError::NoApplicablePackage`] means the installation is already
//!   up to date; the session reports success.
//! - [`UpdateError::Cancelled`] marks a user-requested stop; the session
//!   reports the distinct cancelled outcome.
//!
//! All other variants end an update attempt as failed. Errors never
//! propagate out of [`crate::session::UpdatingSession::run`] as panics; they
//! are caught at phase boundaries, logged, and folded into the session
//! outcome.
//!
//! # Examples
//!
//! ```rust,no_run
//! use upkit::core::{UpdateError, user_friendly_error};
//!
//! fn fetch_manifest() -> Result<(), UpdateError> {
//!     Err(UpdateError::Network {
//!         operation: "fetch manifest".to_string(),
//!         reason: "connection refused".to_string(),
//!     })
//! }
//!
//! if let Err(e) = fetch_manifest() {
//!     let ctx = user_friendly_error(anyhow::Error::from(e));
//!     ctx.display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The error type for all update operations
///
/// Each variant corresponds to one classified failure mode of an updating
/// session. Variants carry enough context to produce an actionable message
/// without holding on to live resources (no sockets, no file handles).
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Required configuration is missing or invalid
    ///
    /// Raised when a session is constructed with a non-existent application
    /// directory, an empty manifest location, or otherwise unusable
    /// configuration. Surfaced immediately, before any phase runs.
    #[error("Invalid configuration: {message}")]
    Configuration {
        /// What is wrong with the supplied configuration
        message: String,
    },

    /// An operation was invoked in a state that does not permit it
    ///
    /// The session is single-use: `run` is valid only from the idle state
    /// and `wait_for_process` only before `run`. Calling either at the
    /// wrong time is a programming error in the host, reported here rather
    /// than silently ignored.
    #[error("Operation not valid in state {actual} (expected {expected})")]
    InvalidState {
        /// State the operation requires
        expected: String,
        /// State the session was actually in
        actual: String,
    },

    /// A network transfer failed
    ///
    /// # Fields
    /// - `operation`: what was being transferred (e.g. "fetch manifest",
    ///   "download package")
    /// - `reason`: transport-level detail from the HTTP client
    #[error("Network error during {operation}: {reason}")]
    Network {
        /// The transfer that failed
        operation: String,
        /// Underlying transport error text
        reason: String,
    },

    /// A referenced resource does not exist
    #[error("Not found: {what}")]
    NotFound {
        /// Description of the missing resource (path or URL)
        what: String,
    },

    /// A manifest document or version string could not be parsed
    #[error("Failed to parse {format}: {reason}")]
    Parse {
        /// What was being parsed ("JSON manifest", "XML manifest", "version string")
        format: String,
        /// Parser error text
        reason: String,
    },

    /// No package in the manifest applies to this installation
    ///
    /// This is the "already up to date" signal: every candidate was either
    /// for a different platform, excluded by the self-contained constraint,
    /// or not strictly newer than the installed version. The session maps
    /// this to a successful outcome, never to a failure.
    #[error("No applicable update package was found")]
    NoApplicablePackage,

    /// Downloaded package content does not match the declared checksum
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest declared by the manifest
        expected: String,
        /// Digest computed over the downloaded bytes
        actual: String,
    },

    /// Downloaded byte count differs from the declared package size
    ///
    /// Either the transfer was truncated or the server sent more bytes than
    /// the manifest declared. Both are integrity violations and fail before
    /// any checksum is computed.
    #[error("Incomplete package data: expected {expected} bytes, got {actual}")]
    IncompleteData {
        /// Size declared by the manifest
        expected: u64,
        /// Bytes actually received
        actual: u64,
    },

    /// The downloaded package is not an archive format the installer understands
    #[error("Unsupported package format: {detail}")]
    UnsupportedPackageFormat {
        /// What was detected (magic bytes or extension)
        detail: String,
    },

    /// Restore after a failed installation could not put every file back
    ///
    /// Restore is best-effort per file and always runs to completion, but
    /// the overall contract is strict: if any file failed, the restore as a
    /// whole is reported as incomplete so the host never mistakes a broken
    /// installation for a recovered one. The backup directory is kept on
    /// disk in this case.
    #[error("Restore incomplete: {failed} of {total} files could not be restored")]
    RestoreIncomplete {
        /// Files that could not be put back
        failed: usize,
        /// Files the backup contained
        total: usize,
    },

    /// The session was cancelled by request
    ///
    /// Not a failure. Rollback still runs if a backup exists before the
    /// session reaches its terminal state.
    #[error("Update was cancelled")]
    Cancelled,

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for cases not covered by specific variants
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl UpdateError {
    /// Whether this error represents a user-requested cancellation
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error is the "already up to date" resolution signal
    #[must_use]
    pub const fn is_no_applicable_package(&self) -> bool {
        matches!(self, Self::NoApplicablePackage)
    }
}

/// Error wrapper that adds user-friendly suggestions and details
///
/// This is the shape the CLI renders: the error itself in red, optional
/// details in yellow, an optional suggestion in green.
///
/// # Examples
///
/// ```rust,no_run
/// use upkit::core::{ErrorContext, UpdateError};
///
/// let ctx = ErrorContext::new(UpdateError::NotFound {
///     what: "https://example.com/manifest.json".to_string(),
/// })
/// .with_suggestion("Check that the manifest URL is correct and reachable");
///
/// ctx.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying update error
    pub error: UpdateError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new context with no suggestion or details
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion, shown in green on the terminal
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add explanatory details, shown in yellow on the terminal
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details, and suggestion to stderr with colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`]
///
/// Recognizes [`UpdateError`] values inside the [`anyhow::Error`] chain and
/// attaches variant-specific suggestions; anything else becomes
/// [`UpdateError::Other`] with the original message preserved.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    match error.downcast::<UpdateError>() {
        Ok(update_error) => create_error_context(update_error),
        Err(other) => ErrorContext::new(UpdateError::Other {
            message: other.to_string(),
        }),
    }
}

fn create_error_context(error: UpdateError) -> ErrorContext {
    match &error {
        UpdateError::Configuration {
            ..
        } => ErrorContext::new(error)
            .with_details("The session was configured with missing or invalid values")
            .with_suggestion(
                "Run 'upkit --help' to see the required --directory and --package-manifest flags",
            ),
        UpdateError::Network {
            operation, ..
        } => {
            let details = format!("The {operation} request did not complete");
            ErrorContext::new(error).with_details(details).with_suggestion(
                "Check your internet connection and that the server is reachable, then retry",
            )
        }
        UpdateError::NotFound {
            what,
        } => {
            let suggestion = format!("Verify that '{what}' exists and is accessible");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        UpdateError::Parse {
            format, ..
        } => {
            let details = format!("The {format} did not match the expected update schema");
            ErrorContext::new(error).with_details(details).with_suggestion(
                "Confirm the manifest URL points at an update manifest, not another document",
            )
        }
        UpdateError::ChecksumMismatch {
            ..
        } => ErrorContext::new(error)
            .with_details("The downloaded package content differs from what the manifest declares")
            .with_suggestion(
                "Retry the update; if the mismatch persists, the published package may be corrupt",
            ),
        UpdateError::IncompleteData {
            ..
        } => ErrorContext::new(error)
            .with_details("The download ended with a different byte count than the manifest declares")
            .with_suggestion("Retry the update on a stable connection"),
        UpdateError::UnsupportedPackageFormat {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Only zip and tar.gz update packages are supported"),
        UpdateError::RestoreIncomplete {
            ..
        } => ErrorContext::new(error)
            .with_details("The previous installation could only be partially restored")
            .with_suggestion(
                "The backup directory was kept next to the application directory; restore the remaining files manually before relaunching",
            ),
        UpdateError::Io(_) => ErrorContext::new(error)
            .with_suggestion("Check file permissions and available disk space"),
        _ => ErrorContext::new(error),
    }
}
