//! upkit CLI entry point
//!
//! Parses the update request from the command line, runs one updating
//! session, and maps the result to the documented exit codes:
//! `0` success or already up to date, `1` invalid arguments or
//! configuration, `2` update failed, `3` update cancelled.

use clap::Parser;
use clap::error::ErrorKind;
use upkit::cli::{Cli, EXIT_INVALID_ARGUMENT, EXIT_SUCCESS};
use upkit::core::user_friendly_error;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests are not argument errors.
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_INVALID_ARGUMENT,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Convert to user-friendly error with context and suggestions
            user_friendly_error(e).display();
            std::process::exit(EXIT_INVALID_ARGUMENT);
        }
    }
}
