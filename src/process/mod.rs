//! Process enumeration, control and launch services.
//!
//! The workspace logic only talks to these traits. `system` backs them with
//! `sysinfo`, `launch` with `std::process`.

mod launch;
mod system;

#[cfg(test)]
pub(crate) mod fake;

pub use launch::DetachedLauncher;
pub use system::SystemProcessTable;

use std::path::{Path, PathBuf};
use std::time::Duration;

/// What the enumeration service reports for one live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub exe: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("no such process (pid {pid})")]
    NoSuchProcess { pid: u32 },

    #[error("access denied (pid {pid})")]
    AccessDenied { pid: u32 },

    #[error("pid {pid} still running after {waited:?}")]
    Timeout { pid: u32, waited: Duration },

    #[error("failed to enumerate processes: {0}")]
    Enumeration(String),

    #[error("failed to launch {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Pid the error is about, when it concerns a single process.
    pub fn pid(&self) -> Option<u32> {
        match self {
            ProcessError::NoSuchProcess { pid }
            | ProcessError::AccessDenied { pid }
            | ProcessError::Timeout { pid, .. } => Some(*pid),
            ProcessError::Enumeration(_) | ProcessError::Launch { .. } => None,
        }
    }
}

/// One enumeration slot: either readable metadata or the reason it was not.
pub type Probe = Result<ProcessEntry, ProcessError>;

/// Live process table.
///
/// Every call may race with processes exiting; callers treat
/// `NoSuchProcess` and `AccessDenied` as per-item outcomes.
pub trait ProcessTable: Send + Sync {
    /// Snapshot of the table in whatever order the platform yields.
    /// The outer error means the table could not be read at all.
    fn list(&self) -> Result<Vec<Probe>, ProcessError>;

    /// Ask the process to exit.
    fn terminate(&self, pid: u32) -> Result<(), ProcessError>;

    /// Force the process to exit.
    fn kill(&self, pid: u32) -> Result<(), ProcessError>;

    /// Block until the process is gone or `timeout` elapses
    /// (`ProcessError::Timeout`).
    fn wait(&self, pid: u32, timeout: Duration) -> Result<(), ProcessError>;
}

pub trait Launcher: Send + Sync {
    /// Start a new process from `exe` that outlives the assistant.
    fn launch(&self, exe: &Path) -> Result<(), ProcessError>;
}
