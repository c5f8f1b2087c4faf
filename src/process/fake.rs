//! In-memory process table and launcher for tests.

use super::{Launcher, Probe, ProcessEntry, ProcessError, ProcessTable};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// How a fake process reacts to a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Exits on terminate.
    Polite,
    /// Ignores terminate, exits on kill.
    Stubborn,
    /// Terminate fails with access denied.
    Denied,
    /// Gone by the time anyone acts on it.
    Vanished,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeProcess {
    pub slot: Slot,
    pub behavior: Behavior,
}

/// Enumeration slot; `ProcessError` is not `Clone`, so keep the recipe.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Readable(ProcessEntry),
    Unreadable(u32),
}

#[derive(Default)]
pub(crate) struct FakeTable {
    processes: Vec<FakeProcess>,
    fail_enumeration: bool,
    exited: Mutex<HashSet<u32>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_enumeration: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, pid: u32, name: &str, exe: Option<&str>, behavior: Behavior) -> Self {
        self.processes.push(FakeProcess {
            slot: Slot::Readable(ProcessEntry {
                pid,
                name: name.to_string(),
                exe: exe.map(PathBuf::from),
            }),
            behavior,
        });
        self
    }

    pub fn with_unreadable(mut self, pid: u32) -> Self {
        self.processes.push(FakeProcess {
            slot: Slot::Unreadable(pid),
            behavior: Behavior::Vanished,
        });
        self
    }

    fn behavior(&self, pid: u32) -> Option<Behavior> {
        self.processes.iter().find_map(|p| match &p.slot {
            Slot::Readable(e) if e.pid == pid => Some(p.behavior),
            Slot::Unreadable(id) if *id == pid => Some(p.behavior),
            _ => None,
        })
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessTable for FakeTable {
    fn list(&self) -> Result<Vec<Probe>, ProcessError> {
        if self.fail_enumeration {
            return Err(ProcessError::Enumeration("table unavailable".into()));
        }
        Ok(self
            .processes
            .iter()
            .map(|p| match &p.slot {
                Slot::Readable(e) => Ok(e.clone()),
                Slot::Unreadable(pid) => Err(ProcessError::AccessDenied { pid: *pid }),
            })
            .collect())
    }

    fn terminate(&self, pid: u32) -> Result<(), ProcessError> {
        self.log(format!("terminate {pid}"));
        match self.behavior(pid) {
            Some(Behavior::Polite) => {
                self.exited.lock().unwrap().insert(pid);
                Ok(())
            }
            Some(Behavior::Stubborn) => Ok(()),
            Some(Behavior::Denied) => Err(ProcessError::AccessDenied { pid }),
            Some(Behavior::Vanished) | None => Err(ProcessError::NoSuchProcess { pid }),
        }
    }

    fn kill(&self, pid: u32) -> Result<(), ProcessError> {
        self.log(format!("kill {pid}"));
        self.exited.lock().unwrap().insert(pid);
        Ok(())
    }

    fn wait(&self, pid: u32, timeout: Duration) -> Result<(), ProcessError> {
        self.log(format!("wait {pid}"));
        if self.exited.lock().unwrap().contains(&pid) {
            Ok(())
        } else {
            Err(ProcessError::Timeout {
                pid,
                waited: timeout,
            })
        }
    }
}

/// Records launches instead of performing them.
#[derive(Default)]
pub(crate) struct FakeLauncher {
    launched: Mutex<Vec<PathBuf>>,
    fail_with: Option<std::io::ErrorKind>,
}

impl FakeLauncher {
    /// Every launch fails with `kind`.
    pub fn failing(kind: std::io::ErrorKind) -> Self {
        Self {
            fail_with: Some(kind),
            ..Self::default()
        }
    }

    pub fn launched(&self) -> Vec<PathBuf> {
        self.launched.lock().unwrap().clone()
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, exe: &Path) -> Result<(), ProcessError> {
        if let Some(kind) = self.fail_with {
            return Err(ProcessError::Launch {
                path: exe.to_path_buf(),
                source: std::io::Error::new(kind, "permission denied"),
            });
        }
        self.launched.lock().unwrap().push(exe.to_path_buf());
        Ok(())
    }
}
