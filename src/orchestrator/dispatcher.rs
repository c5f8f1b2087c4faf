//! Command dispatcher.
//!
//! Owns the store and the controller and executes commands from the single
//! command channel one at a time, so a hotkey and a voice command can never
//! run a close and a restore concurrently.

use super::Lifecycle;
use crate::model::Command;
use crate::output::Console;
use crate::storage::SessionStore;
use crate::text_summary::{build_text_summary, spoken_summary};
use crate::voice::Speaker;
use crate::workspace::WorkspaceController;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Everything a command needs to run.
#[derive(Clone)]
pub struct Assistant {
    pub store: Arc<SessionStore>,
    pub controller: Arc<WorkspaceController>,
    pub speaker: Arc<dyn Speaker>,
    pub console: Console,
}

impl Assistant {
    fn say(&self, line: &str) {
        self.speaker.speak(line);
    }

    async fn save_workspace(&self) -> Result<()> {
        self.console.out("Saving workspace...");
        self.say("Saving workspace");

        let store = self.store.clone();
        let saved = tokio::task::spawn_blocking(move || store.save_session(None))
            .await
            .context("save task failed")?;
        match saved {
            Some(path) => {
                self.console.out(format!("Workspace saved: {}", path.display()));
                self.say("Workspace saved successfully");
            }
            None => {
                self.console.err("Failed to save workspace");
                self.say("Failed to save workspace");
            }
        }
        Ok(())
    }

    async fn close_all_apps(&self) -> Result<()> {
        self.console.out("Closing all applications...");
        self.say("Closing all applications");

        let controller = self.controller.clone();
        let outcome = tokio::task::spawn_blocking(move || controller.close_all_apps())
            .await
            .context("close task failed")?;
        for line in build_text_summary("Closed", &outcome).lines {
            self.console.out(line);
        }
        self.say(&spoken_summary("Closed", &outcome));
        Ok(())
    }

    async fn restore_workspace(&self) -> Result<()> {
        self.console.out("Restoring workspace...");
        self.say("Restoring workspace");

        let controller = self.controller.clone();
        let store = self.store.clone();
        let outcome = tokio::task::spawn_blocking(move || controller.restore_latest(&store))
            .await
            .context("restore task failed")?;
        match outcome {
            Some(outcome) => {
                for line in build_text_summary("Restored", &outcome).lines {
                    self.console.out(line);
                }
                self.say(&spoken_summary("Restored", &outcome));
            }
            None => {
                self.console.err("No saved sessions found");
                self.say("No saved sessions found");
            }
        }
        Ok(())
    }

    async fn handle(&self, cmd: Command, lifecycle: &Lifecycle) -> Result<()> {
        tracing::info!("command: {cmd}");
        match cmd {
            Command::Save => self.save_workspace().await?,
            Command::Close => self.close_all_apps().await?,
            Command::Restore => self.restore_workspace().await?,
            Command::Start => {
                if lifecycle.activate_voice() {
                    self.say("Rose started");
                } else {
                    self.say("Rose is already running");
                }
            }
            Command::Stop => {
                self.say("Stopping Rose");
                lifecycle.stop();
            }
        }
        Ok(())
    }
}

/// Execute commands until the channel closes or the lifecycle stops.
///
/// A command that is already running finishes before the loop exits.
pub async fn run_dispatcher(
    assistant: Assistant,
    mut cmd_rx: UnboundedReceiver<Command>,
    lifecycle: Lifecycle,
) -> Result<()> {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                if let Err(e) = assistant.handle(cmd, &lifecycle).await {
                    tracing::error!("command {cmd} failed: {e:#}");
                    assistant.say("An error occurred");
                }
                if !lifecycle.is_running() {
                    break;
                }
            }
            _ = lifecycle.stopped() => break,
        }
    }
    tracing::debug!("dispatcher finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ProcessClassifier;
    use crate::output::spawn_output_writer;
    use crate::process::fake::{Behavior, FakeLauncher, FakeTable};
    use crate::workspace::Timing;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Speaker for Recorder {
        fn speak(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn assistant(
        dir: &std::path::Path,
        exe: &std::path::Path,
    ) -> (Assistant, Arc<Recorder>, Arc<FakeLauncher>) {
        let exe = exe.to_str().unwrap();
        let table = Arc::new(
            FakeTable::new()
                .with(10, "editor-app", Some(exe), Behavior::Polite)
                .with(11, "svchost", Some(exe), Behavior::Polite),
        );
        let launcher = Arc::new(FakeLauncher::default());
        let classifier = ProcessClassifier::new(1);
        let timing = Timing {
            grace_period: Duration::from_millis(1),
            settle_period: Duration::ZERO,
            launch_delay: Duration::ZERO,
        };
        let speaker = Arc::new(Recorder::default());
        let (console, _writer) = spawn_output_writer();
        let assistant = Assistant {
            store: Arc::new(SessionStore::new(dir, table.clone(), classifier.clone())),
            controller: Arc::new(WorkspaceController::new(
                table,
                launcher.clone(),
                classifier,
                timing,
            )),
            speaker: speaker.clone(),
            console,
        };
        (assistant, speaker, launcher)
    }

    #[tokio::test]
    async fn commands_run_in_order_until_stop() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tempfile::NamedTempFile::new().unwrap();
        let (assistant, speaker, launcher) = assistant(tmp.path(), exe.path());
        let lifecycle = Lifecycle::new();
        lifecycle.start(true);

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        for cmd in [
            Command::Restore,
            Command::Save,
            Command::Close,
            Command::Restore,
            Command::Start,
            Command::Stop,
            Command::Save,
        ] {
            tx.send(cmd).unwrap();
        }

        tokio::time::timeout(
            Duration::from_secs(5),
            run_dispatcher(assistant.clone(), rx, lifecycle.clone()),
        )
        .await
        .expect("dispatcher stops")
        .unwrap();

        let spoken = speaker.0.lock().unwrap().clone();
        assert_eq!(
            spoken,
            vec![
                "Restoring workspace",
                "No saved sessions found",
                "Saving workspace",
                "Workspace saved successfully",
                "Closing all applications",
                "Closed 1 applications",
                "Restoring workspace",
                "Restored 1 applications",
                "Rose is already running",
                "Stopping Rose",
            ]
        );
        assert!(!lifecycle.is_running());
        assert_eq!(assistant.store.list_sessions().len(), 1);
        assert_eq!(launcher.launched(), vec![exe.path().to_path_buf()]);
    }

    #[tokio::test]
    async fn start_reports_transition_when_voice_was_inactive() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tempfile::NamedTempFile::new().unwrap();
        let (assistant, speaker, _) = assistant(tmp.path(), exe.path());
        let lifecycle = Lifecycle::new();
        lifecycle.start(false);

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(Command::Start).unwrap();
        drop(tx);
        run_dispatcher(assistant, rx, lifecycle.clone()).await.unwrap();

        assert_eq!(*speaker.0.lock().unwrap(), vec!["Rose started"]);
        assert!(lifecycle.is_voice_active());
        assert!(lifecycle.is_running());
    }

    #[tokio::test]
    async fn external_stop_ends_an_idle_dispatcher() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tempfile::NamedTempFile::new().unwrap();
        let (assistant, _, _) = assistant(tmp.path(), exe.path());
        let lifecycle = Lifecycle::new();
        lifecycle.start(false);

        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = tokio::spawn(run_dispatcher(assistant, rx, lifecycle.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        lifecycle.stop();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("dispatcher noticed stop")
            .unwrap()
            .unwrap();
    }
}
