//! Session persistence.
//!
//! A session is one pretty-printed JSON file, `<dir>/<name>.json`. The
//! default name is a local timestamp (`20240601_093000`), so sorting names
//! in reverse yields the most recent session first.

use crate::classifier::ProcessClassifier;
use crate::model::{ProcessRecord, Session};
use crate::process::ProcessTable;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::macros::format_description;
use time::OffsetDateTime;

const SESSION_EXT: &str = "json";

pub struct SessionStore {
    dir: PathBuf,
    table: Arc<dyn ProcessTable>,
    classifier: ProcessClassifier,
}

impl SessionStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        table: Arc<dyn ProcessTable>,
        classifier: ProcessClassifier,
    ) -> Self {
        Self {
            dir: dir.into(),
            table,
            classifier,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Eligible applications in enumeration order.
    ///
    /// Protected processes, our own pid, processes without an executable
    /// path and processes whose metadata could not be read are skipped.
    pub fn capture_running_apps(&self) -> Vec<ProcessRecord> {
        let probes = match self.table.list() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("error getting running apps: {e}");
                return Vec::new();
            }
        };

        let mut apps = Vec::new();
        for probe in probes {
            let entry = match probe {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("skipping process: {e}");
                    continue;
                }
            };
            if self.classifier.is_protected_process(entry.pid, &entry.name) {
                continue;
            }
            let Some(exe) = entry.exe else {
                continue;
            };
            apps.push(ProcessRecord {
                pid: entry.pid,
                name: entry.name,
                executable_path: Some(exe),
            });
        }
        apps
    }

    /// Capture and persist the current workspace.
    ///
    /// Returns the written file, or `None` when the session could not be
    /// saved (the cause is logged).
    pub fn save_session(&self, name: Option<&str>) -> Option<PathBuf> {
        let now = now_local();
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => default_session_name(now),
        };
        let session = Session {
            name,
            timestamp: now
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            apps: self.capture_running_apps(),
        };

        match self.write_session(&session) {
            Ok(path) => {
                tracing::info!(apps = session.apps.len(), "session saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::error!("error saving session: {e:#}");
                None
            }
        }
    }

    pub fn write_session(&self, session: &Session) -> Result<PathBuf> {
        let path = self.session_path(&session.name)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create {}", self.dir.display()))?;
        let data = serde_json::to_vec_pretty(session).context("serialize session")?;
        std::fs::write(&path, data).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn read_session(&self, name: &str) -> Result<Session> {
        let path = self.session_path(name)?;
        let data =
            std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("parse {}", path.display()))
    }

    /// Apps stored in the named session; empty when it cannot be read.
    pub fn load_session(&self, name: &str) -> Vec<ProcessRecord> {
        match self.read_session(name) {
            Ok(session) => session.apps,
            Err(e) => {
                tracing::error!("error loading session: {e:#}");
                Vec::new()
            }
        }
    }

    /// Session names, most recent first. Empty when nothing is stored yet.
    pub fn list_sessions(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::error!("error listing sessions in {}: {e}", self.dir.display());
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(SESSION_EXT))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort_unstable_by(|a, b| b.cmp(a));
        names
    }

    pub fn latest_session(&self) -> Option<String> {
        self.list_sessions().into_iter().next()
    }

    fn session_path(&self, name: &str) -> Result<PathBuf> {
        validate_session_name(name)?;
        Ok(self.dir.join(format!("{name}.{SESSION_EXT}")))
    }
}

/// Names become file names; keep them inside the sessions directory.
fn validate_session_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("session name is empty");
    }
    if name.contains(['/', '\\']) || name.contains("..") || name.contains('\0') {
        anyhow::bail!("invalid session name '{name}'");
    }
    Ok(())
}

fn now_local() -> OffsetDateTime {
    // The local offset is unavailable on some platforms once threads exist.
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn default_session_name(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_else(|_| at.unix_timestamp().to_string())
}
