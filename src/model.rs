use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration assembled from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub sessions_dir: PathBuf,
    /// How long a terminated process gets to exit before it is killed.
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
    /// Pause before the first relaunch of a restore.
    #[serde(with = "humantime_serde")]
    pub settle_period: Duration,
    /// Pause between two consecutive relaunches.
    #[serde(with = "humantime_serde")]
    pub launch_delay: Duration,
    #[serde(default)]
    pub extra_protected: Vec<String>,
    pub listen_command: Option<String>,
    #[serde(with = "humantime_serde")]
    pub listen_timeout: Duration,
    pub speak_command: Option<String>,
    pub hotkeys: bool,
    #[serde(default)]
    pub hotkey_overrides: Vec<String>,
}

/// One observed user-application process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    #[serde(rename = "exe", default)]
    pub executable_path: Option<PathBuf>,
}

/// A named, timestamped snapshot of eligible applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub apps: Vec<ProcessRecord>,
}

/// A single item that could not be closed or restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub name: String,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.reason)
    }
}

/// Aggregate of per-item results for one close or restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<ItemFailure>,
    pub total: usize,
}

impl Outcome {
    /// Fold one per-item result into the aggregate.
    pub fn record(&mut self, item: Result<String, ItemFailure>) {
        match item {
            Ok(name) => {
                self.succeeded.push(name);
                self.total = self.succeeded.len();
            }
            Err(failure) => self.failed.push(failure),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }
}

pub type TerminationOutcome = Outcome;
pub type RestoreOutcome = Outcome;

/// Symbolic commands shared by the voice and hotkey sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Save,
    Close,
    Restore,
    Start,
    Stop,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Save,
        Command::Close,
        Command::Restore,
        Command::Start,
        Command::Stop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Save => "save",
            Command::Close => "close",
            Command::Restore => "restore",
            Command::Start => "start",
            Command::Stop => "stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("unknown command '{s}'"))
    }
}
