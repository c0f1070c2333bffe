//! Waiting for the target application to exit
//!
//! Installing over a running application fails on platforms that lock
//! executables in use, and corrupts in-flight state everywhere else. When
//! the updater is launched by the application it is about to replace, the
//! session first waits for that process to go away.
//!
//! The process is identified by PID, by executable, or both. Polling uses
//! a fixed interval; there is no upper bound on the wait, only
//! cancellation.

use std::path::Path;
use std::time::Duration;

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, trace};

use crate::core::{CancellationToken, UpdateError};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Which process to wait for
///
/// With both fields set, a process must match the PID and the executable
/// to count. PIDs get recycled by the OS; the executable check keeps a
/// recycled PID from stalling the update behind an unrelated process.
#[derive(Debug, Clone, Default)]
pub struct ProcessTarget {
    pub pid: Option<u32>,
    /// Full path, or a bare name to match against process names
    pub executable: Option<std::path::PathBuf>,
}

impl ProcessTarget {
    /// True when nothing is configured to wait for
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pid.is_none() && self.executable.is_none()
    }
}

/// A live process matching a [`ProcessTarget`]
#[derive(Debug, Clone)]
pub struct RunningProcess {
    pub pid: u32,
    pub name: String,
}

/// One-shot check: is the target process running right now?
///
/// Returns `None` immediately for an empty target.
#[must_use]
pub fn currently_running(target: &ProcessTarget) -> Option<RunningProcess> {
    if target.is_empty() {
        return None;
    }
    let mut sys = System::new();
    refresh_for(&mut sys, target);
    find_match(&sys, target)
}

/// Block until the target process has exited.
///
/// Returns immediately when the target is empty or no matching process is
/// alive. Otherwise polls every 500ms until the match disappears.
///
/// # Errors
///
/// Returns [`UpdateError::Cancelled`] when the token fires while waiting.
pub async fn wait_for_exit(
    target: &ProcessTarget,
    token: &CancellationToken,
) -> Result<(), UpdateError> {
    if target.is_empty() {
        return Ok(());
    }

    let mut sys = System::new();
    loop {
        token.err_if_cancelled()?;
        refresh_for(&mut sys, target);
        let Some(found) = find_match(&sys, target) else {
            debug!("target process has exited");
            return Ok(());
        };
        trace!(pid = found.pid, name = %found.name, "process still running");
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Refresh only what the target needs: the single PID when one is known,
/// the whole table when matching by executable alone.
fn refresh_for(sys: &mut System, target: &ProcessTarget) {
    let pids;
    let scope = if let Some(raw) = target.pid {
        pids = [Pid::from_u32(raw)];
        ProcessesToUpdate::Some(&pids)
    } else {
        ProcessesToUpdate::All
    };
    sys.refresh_processes(scope, true);
}

fn find_match(sys: &System, target: &ProcessTarget) -> Option<RunningProcess> {
    if let Some(raw) = target.pid {
        let process = sys.process(Pid::from_u32(raw))?;
        if has_exited(process) {
            return None;
        }
        if let Some(exe) = &target.executable
            && !executable_matches(process, exe)
        {
            return None;
        }
        return Some(RunningProcess {
            pid: raw,
            name: process.name().to_string_lossy().into_owned(),
        });
    }

    let exe = target.executable.as_deref()?;
    let own_pid = std::process::id();
    sys.processes().iter().find_map(|(pid, process)| {
        // Never wait on ourselves.
        if pid.as_u32() == own_pid || has_exited(process) {
            return None;
        }
        executable_matches(process, exe).then(|| RunningProcess {
            pid: pid.as_u32(),
            name: process.name().to_string_lossy().into_owned(),
        })
    })
}

/// A zombie keeps its process table entry until the parent reaps it, but
/// holds no executables or file locks anymore.
fn has_exited(process: &sysinfo::Process) -> bool {
    matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
}

fn executable_matches(process: &sysinfo::Process, wanted: &Path) -> bool {
    // A bare name compares against the process name, a path against the
    // resolved executable.
    if wanted.parent().is_none_or(|p| p.as_os_str().is_empty()) {
        return process.name() == wanted.as_os_str();
    }
    let Some(exe) = process.exe() else {
        return false;
    };
    if exe == wanted {
        return true;
    }
    std::fs::canonicalize(wanted).is_ok_and(|resolved| exe == resolved)
}
