use super::{Probe, ProcessEntry, ProcessError, ProcessTable};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{
    Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, Signal, System, UpdateKind,
};

const WAIT_POLL: Duration = Duration::from_millis(50);

/// `ProcessTable` backed by `sysinfo`.
pub struct SystemProcessTable {
    // sysinfo refreshes need `&mut System`; the table itself is shared.
    system: Mutex<System>,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn with_system<T>(&self, f: impl FnOnce(&mut System) -> T) -> Result<T, ProcessError> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| ProcessError::Enumeration("process table lock poisoned".into()))?;
        Ok(f(&mut system))
    }

    /// Refresh a single pid and report whether it is still alive.
    fn is_alive(system: &mut System, pid: Pid) -> bool {
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        match system.process(pid) {
            // Zombies have exited; their parent just has not reaped them yet.
            Some(p) => !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
            None => false,
        }
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError> {
        let pid_t = Pid::from_u32(pid);
        self.with_system(|system| {
            if !Self::is_alive(system, pid_t) {
                return Err(ProcessError::NoSuchProcess { pid });
            }
            let process = system
                .process(pid_t)
                .ok_or(ProcessError::NoSuchProcess { pid })?;
            // `None` means the platform has no such signal; fall back to a plain kill.
            let sent = process.kill_with(signal).unwrap_or_else(|| process.kill());
            if sent {
                Ok(())
            } else if Self::is_alive(system, pid_t) {
                Err(ProcessError::AccessDenied { pid })
            } else {
                Err(ProcessError::NoSuchProcess { pid })
            }
        })?
    }
}

impl SystemProcessTable {
    /// Parent, grandparent and so on of `pid`, nearest first.
    pub fn ancestors(&self, pid: u32) -> Vec<u32> {
        self.with_system(|system| {
            system.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing(),
            );
            let mut chain = Vec::new();
            let mut current = Pid::from_u32(pid);
            while let Some(parent) = system.process(current).and_then(|p| p.parent()) {
                if parent.as_u32() == 0 || parent.as_u32() == pid || chain.contains(&parent.as_u32())
                {
                    break;
                }
                chain.push(parent.as_u32());
                current = parent;
            }
            chain
        })
        .unwrap_or_default()
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn list(&self) -> Result<Vec<Probe>, ProcessError> {
        self.with_system(|system| {
            system.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
            );
            system
                .processes()
                .values()
                // Linux threads show up as tasks; only whole processes are closable.
                .filter(|p| p.thread_kind().is_none())
                .filter(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
                .map(|p| {
                    Ok(ProcessEntry {
                        pid: p.pid().as_u32(),
                        name: p.name().to_string_lossy().into_owned(),
                        exe: p.exe().map(|path| path.to_path_buf()),
                    })
                })
                .collect()
        })
    }

    fn terminate(&self, pid: u32) -> Result<(), ProcessError> {
        self.signal(pid, Signal::Term)
    }

    fn kill(&self, pid: u32) -> Result<(), ProcessError> {
        self.signal(pid, Signal::Kill)
    }

    fn wait(&self, pid: u32, timeout: Duration) -> Result<(), ProcessError> {
        let pid_t = Pid::from_u32(pid);
        let deadline = Instant::now() + timeout;
        loop {
            // Release the lock between polls so other callers are not starved.
            if !self.with_system(|system| Self::is_alive(system, pid_t))? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ProcessError::Timeout {
                    pid,
                    waited: timeout,
                });
            }
            std::thread::sleep(WAIT_POLL);
        }
    }
}
