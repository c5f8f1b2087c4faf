//! Close and restore passes over the live process table.
//!
//! Each process or record is handled on its own and produces a
//! `Result<String, ItemFailure>`; the pass folds those into an `Outcome`.
//! One misbehaving process never stops the rest of the pass.

use crate::classifier::ProcessClassifier;
use crate::model::{ItemFailure, ProcessRecord, RestoreOutcome, TerminationOutcome};
use crate::process::{Launcher, ProcessEntry, ProcessError, ProcessTable};
use crate::storage::SessionStore;
use std::sync::Arc;
use std::time::Duration;

pub const PATH_NOT_FOUND: &str = "path not found";

/// Fixed delays of a close/restore cycle.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub grace_period: Duration,
    pub settle_period: Duration,
    pub launch_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(3),
            settle_period: Duration::from_secs(1),
            launch_delay: Duration::from_millis(500),
        }
    }
}

pub struct WorkspaceController {
    table: Arc<dyn ProcessTable>,
    launcher: Arc<dyn Launcher>,
    classifier: ProcessClassifier,
    timing: Timing,
}

impl WorkspaceController {
    pub fn new(
        table: Arc<dyn ProcessTable>,
        launcher: Arc<dyn Launcher>,
        classifier: ProcessClassifier,
        timing: Timing,
    ) -> Self {
        Self {
            table,
            launcher,
            classifier,
            timing,
        }
    }

    /// Terminate every running process that is not protected.
    pub fn close_all_apps(&self) -> TerminationOutcome {
        let mut outcome = TerminationOutcome::default();
        let probes = match self.table.list() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("error closing apps: {e}");
                return outcome;
            }
        };

        for probe in probes {
            match probe {
                Ok(entry) => {
                    if self.classifier.is_protected_process(entry.pid, &entry.name) {
                        continue;
                    }
                    outcome.record(self.close_one(&entry));
                }
                Err(e) => {
                    // Unreadable entry: we cannot classify it, so never touch it.
                    if e.pid().is_some_and(|pid| self.classifier.is_protected_pid(pid)) {
                        continue;
                    }
                    let name = e.pid().map_or_else(|| "unknown".into(), |pid| format!("pid {pid}"));
                    outcome.record(Err(ItemFailure::new(name, e.to_string())));
                }
            }
        }

        if outcome.is_empty() {
            tracing::info!("nothing to close");
        }
        tracing::info!(
            closed = outcome.total,
            failed = outcome.failed.len(),
            "close pass finished"
        );
        outcome
    }

    /// Graceful termination, escalating to a kill after the grace period.
    fn close_one(&self, entry: &ProcessEntry) -> Result<String, ItemFailure> {
        let fail = |e: ProcessError| ItemFailure::new(&entry.name, e.to_string());

        self.table.terminate(entry.pid).map_err(fail)?;
        match self.table.wait(entry.pid, self.timing.grace_period) {
            Ok(()) => {}
            Err(ProcessError::Timeout { .. }) => {
                tracing::debug!(pid = entry.pid, "{} ignored terminate, killing", entry.name);
                self.table.kill(entry.pid).map_err(fail)?;
                match self.table.wait(entry.pid, self.timing.grace_period) {
                    // Gone between our kill and the check.
                    Ok(()) | Err(ProcessError::NoSuchProcess { .. }) => {}
                    Err(e) => return Err(fail(e)),
                }
            }
            Err(ProcessError::NoSuchProcess { .. }) => {}
            Err(e) => return Err(fail(e)),
        }

        tracing::info!(pid = entry.pid, "closed: {}", entry.name);
        Ok(entry.name.clone())
    }

    /// Relaunch `apps` in stored order after the settle period.
    pub fn restore_workspace(&self, apps: &[ProcessRecord]) -> RestoreOutcome {
        let mut outcome = RestoreOutcome::default();
        std::thread::sleep(self.timing.settle_period);

        for app in apps {
            let launched = self.restore_one(app);
            let pause = launched.is_ok();
            outcome.record(launched);
            if pause {
                std::thread::sleep(self.timing.launch_delay);
            }
        }

        tracing::info!(
            restored = outcome.total,
            failed = outcome.failed.len(),
            "restore pass finished"
        );
        outcome
    }

    fn restore_one(&self, app: &ProcessRecord) -> Result<String, ItemFailure> {
        let exe = match app.executable_path.as_deref() {
            Some(p) if p.exists() => p,
            other => {
                tracing::warn!(
                    "could not find {} at {}",
                    app.name,
                    other.map_or_else(|| "<none>".into(), |p| p.display().to_string())
                );
                return Err(ItemFailure::new(&app.name, PATH_NOT_FOUND));
            }
        };

        match self.launcher.launch(exe) {
            Ok(()) => {
                tracing::info!("restored: {}", app.name);
                Ok(app.name.clone())
            }
            Err(e) => {
                tracing::warn!("error restoring {}: {e}", app.name);
                Err(ItemFailure::new(&app.name, e.to_string()))
            }
        }
    }

    pub fn restore_session(&self, store: &SessionStore, name: &str) -> RestoreOutcome {
        let apps = store.load_session(name);
        self.restore_workspace(&apps)
    }

    /// Restore the most recent session, if there is one.
    pub fn restore_latest(&self, store: &SessionStore) -> Option<RestoreOutcome> {
        let latest = store.latest_session()?;
        tracing::info!("restoring session {latest}");
        Some(self.restore_session(store, &latest))
    }
}
