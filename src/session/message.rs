//! Status message catalog
//!
//! Status lines shown to users come from a catalog keyed by a closed enum,
//! so embedders can localize without string-matching message text. The
//! session looks messages up at the moment it emits them; supplying a
//! custom catalog changes every user-visible string in one place. The core
//! treats returned text as opaque.

/// Keys for every status line an update session can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    Initializing,
    WaitingForApplication,
    CheckingForUpdates,
    UpToDate,
    UpdateAvailable,
    Downloading,
    Verifying,
    BackingUp,
    Installing,
    Restoring,
    Succeeded,
    Failed,
    Cancelled,
}

/// Source of localized status messages
///
/// `args` carries key-specific detail in a fixed order:
/// [`MessageKey::WaitingForApplication`] gets the process name and
/// [`MessageKey::UpdateAvailable`] the version; every other key gets an
/// empty slice. Catalogs are free to ignore the arguments.
pub trait MessageCatalog: Send + Sync {
    /// The status line for `key`.
    fn message(&self, key: MessageKey, args: &[&str]) -> String;
}

/// Built-in English messages
#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishCatalog;

impl MessageCatalog for EnglishCatalog {
    fn message(&self, key: MessageKey, args: &[&str]) -> String {
        match key {
            MessageKey::Initializing => "Preparing update...".to_string(),
            MessageKey::WaitingForApplication => match args.first() {
                Some(name) => format!("Waiting for {name} to close..."),
                None => "Waiting for the application to close...".to_string(),
            },
            MessageKey::CheckingForUpdates => "Checking for updates...".to_string(),
            MessageKey::UpToDate => "The application is up to date.".to_string(),
            MessageKey::UpdateAvailable => match args.first() {
                Some(version) => format!("Version {version} is available."),
                None => "An update is available.".to_string(),
            },
            MessageKey::Downloading => "Downloading update...".to_string(),
            MessageKey::Verifying => "Verifying update package...".to_string(),
            MessageKey::BackingUp => "Backing up the application...".to_string(),
            MessageKey::Installing => "Installing update...".to_string(),
            MessageKey::Restoring => "Restoring the previous version...".to_string(),
            MessageKey::Succeeded => "Update installed successfully.".to_string(),
            MessageKey::Failed => "The update failed.".to_string(),
            MessageKey::Cancelled => "The update was cancelled.".to_string(),
        }
    }
}
