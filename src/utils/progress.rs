//! Progress indicators for interactive runs
//!
//! Thin wrappers around `indicatif` with consistent styling for the three
//! shapes of feedback an update produces: byte-accurate download bars,
//! percentage install bars, and spinners for phases with no measurable
//! progress.
//!
//! # Environment Variables
//!
//! - `UPKIT_NO_PROGRESS`: set to any value to disable all indicators. Use
//!   in CI or when piping output.
//!
//! # Examples
//!
//! ```rust
//! use upkit::utils::progress::ProgressBar;
//!
//! let bar = ProgressBar::new_download(Some(1_000_000));
//! bar.set_message("app-2.1.0.zip");
//! bar.set_position(250_000);
//! bar.finish_with_message("downloaded");
//! ```

use std::time::Duration;

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};

/// Checks if progress bars should be disabled.
///
/// Disabled whenever the `UPKIT_NO_PROGRESS` environment variable is set
/// to any value.
fn is_progress_disabled() -> bool {
    std::env::var("UPKIT_NO_PROGRESS").is_ok()
}

/// A progress bar with consistent styling.
///
/// When progress is disabled the bar is hidden and every operation becomes
/// a silent no-op, so call sites never need to branch.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Bar for work with a known number of units.
    #[must_use]
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(bar_style());
            bar
        };
        Self { inner: bar }
    }

    /// Byte-denominated bar for downloads.
    ///
    /// With no known total length the bar renders as a spinner with a byte
    /// counter, which is what an HTTP response without `Content-Length`
    /// gets.
    #[must_use]
    pub fn new_download(total_bytes: Option<u64>) -> Self {
        if is_progress_disabled() {
            return Self {
                inner: IndicatifBar::hidden(),
            };
        }
        let bar = match total_bytes {
            Some(total) => {
                let bar = IndicatifBar::new(total);
                bar.set_style(download_style());
                bar
            }
            None => {
                let bar = IndicatifBar::new_spinner();
                bar.set_style(byte_spinner_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        Self { inner: bar }
    }

    /// Spinner for phases with no measurable progress.
    #[must_use]
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self { inner: bar }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.inner.set_message(message.into());
    }

    pub fn set_position(&self, pos: u64) {
        self.inner.set_position(pos);
    }

    pub fn set_length(&self, len: u64) {
        self.inner.set_length(len);
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn finish_with_message(&self, message: impl Into<String>) {
        self.inner.finish_with_message(message.into());
    }

    /// Remove the bar from the terminal entirely.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn bar_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{msg:.bold} [{bar:40.cyan/blue}] {percent}%")
        .unwrap()
        .progress_chars("━╸━")
}

fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{msg:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap()
        .progress_chars("━╸━")
}

fn byte_spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{msg:.bold} {spinner:.cyan} {bytes}")
        .unwrap()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{msg:.bold} {spinner:.cyan}")
        .unwrap()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}
