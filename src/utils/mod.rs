//! Cross-platform utilities and helpers
//!
//! Shared plumbing for the rest of the crate: atomic file writes, an
//! inter-process lock around the application directory, and progress
//! reporting for interactive runs.
//!
//! # Modules
//!
//! - [`fs`] - File system operations with atomic writes
//! - [`lock`] - Exclusive per-application update locking
//! - [`progress`] - Progress bars and spinners for long-running operations

pub mod fs;
pub mod lock;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, set_executable};
pub use lock::UpdateLock;
pub use progress::ProgressBar;
