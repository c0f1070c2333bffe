//! Core types shared by every part of upkit
//!
//! This module holds the foundations the rest of the crate builds on:
//!
//! ## Error Management
//! - [`UpdateError`] - enumerated failure modes for every update phase
//! - [`ErrorContext`] - user-friendly wrapper with suggestions and details
//! - [`user_friendly_error`] - convert any error to the user-facing shape
//!
//! Two "errors" are really signals, not failures: `NoApplicablePackage`
//! (already up to date) and `Cancelled`. The session state machine maps
//! them to their own terminal outcomes instead of reporting a failure.
//!
//! ## Cancellation
//! - [`CancellationToken`] - shared cooperative cancellation flag, passed
//!   explicitly through every long-running call and checked at chunk
//!   granularity
//!
//! # Design Principles
//!
//! Every fallible operation returns a `Result` carrying [`UpdateError`];
//! nothing in the library panics on expected failure modes. Host-facing
//! presentation (colors, suggestions) lives in [`ErrorContext`] and is only
//! used at the CLI boundary.

pub mod cancel;
pub mod error;

pub use cancel::CancellationToken;
pub use error::{ErrorContext, UpdateError, user_friendly_error};
