use crate::classifier::ProcessClassifier;
use crate::hotkeys::HotkeyBindings;
use crate::model::{AssistantConfig, Command};
use crate::orchestrator::{self, Assistant, Lifecycle};
use crate::output::{drain_writer, spawn_output_writer, Console};
use crate::process::{DetachedLauncher, SystemProcessTable};
use crate::storage::SessionStore;
use crate::text_summary::{app_line, build_session_summary, build_text_summary};
use crate::voice::{self, CommandSpeaker, CommandTranscriber, LineTranscriber, LogSpeaker};
use crate::voice::{Speaker, Transcriber};
use crate::workspace::{Timing, WorkspaceController};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const WRITER_DRAIN: Duration = Duration::from_millis(500);

#[derive(Debug, Parser, Clone)]
#[command(
    name = "rose",
    version,
    about = "Save, close and restore your running applications by voice or hotkey"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Action>,

    /// Directory holding saved sessions
    #[arg(long, global = true, default_value = "sessions")]
    pub sessions_dir: PathBuf,

    /// Store sessions in the per-user data directory instead of --sessions-dir
    #[arg(long, global = true)]
    pub user_dir: bool,

    /// How long a closed application gets to exit before it is killed
    #[arg(long, global = true, default_value = "3s")]
    pub grace: humantime::Duration,

    /// Pause before relaunching applications
    #[arg(long, global = true, default_value = "1s")]
    pub settle: humantime::Duration,

    /// Pause between two relaunches
    #[arg(long, global = true, default_value = "500ms")]
    pub launch_delay: humantime::Duration,

    /// Extra process name (substring) that must never be closed; repeatable
    #[arg(long = "protect", global = true, value_name = "NAME")]
    pub protect: Vec<String>,

    /// Speech-to-text program; prints one transcript per run
    #[arg(long, global = true)]
    pub listen_command: Option<String>,

    /// Maximum time a single listen may take
    #[arg(long, global = true, default_value = "5s")]
    pub listen_timeout: humantime::Duration,

    /// Text-to-speech program; receives the message as its last argument
    #[arg(long, global = true)]
    pub speak_command: Option<String>,

    /// Disable keyboard shortcuts (typed commands are read from stdin instead)
    #[arg(long, global = true)]
    pub no_hotkeys: bool,

    /// Rebind a shortcut, e.g. --hotkey restore=ctrl+shift+r; repeatable
    #[arg(long = "hotkey", global = true, value_name = "COMMAND=COMBO")]
    pub hotkey: Vec<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Action {
    /// Listen for voice commands and hotkeys (default)
    Run,
    /// Save the running applications as a session
    Save {
        /// Session name (defaults to the current time)
        #[arg(long)]
        name: Option<String>,
    },
    /// Close every application that is not protected
    Close,
    /// Relaunch the applications of a session
    Restore {
        /// Session to restore (defaults to the most recent)
        #[arg(long)]
        session: Option<String>,
    },
    /// List saved sessions, most recent first
    List,
    /// Print a saved session
    Show { name: String },
    /// Print the applications a save would record
    Capture,
}

/// Build an `AssistantConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<AssistantConfig> {
    let sessions_dir = if args.user_dir {
        dirs::data_local_dir()
            .context("no per-user data directory on this platform")?
            .join("rose")
            .join("sessions")
    } else {
        args.sessions_dir.clone()
    };
    Ok(AssistantConfig {
        sessions_dir,
        grace_period: Duration::from(args.grace),
        settle_period: Duration::from(args.settle),
        launch_delay: Duration::from(args.launch_delay),
        extra_protected: args.protect.clone(),
        listen_command: args.listen_command.clone(),
        listen_timeout: Duration::from(args.listen_timeout),
        speak_command: args.speak_command.clone(),
        hotkeys: !args.no_hotkeys && cfg!(feature = "hotkeys"),
        hotkey_overrides: args.hotkey.clone(),
    })
}

fn build_assistant(cfg: &AssistantConfig, console: Console) -> Result<Assistant> {
    let table = Arc::new(SystemProcessTable::new());
    let classifier = ProcessClassifier::for_current_process()
        .with_extra(&cfg.extra_protected)
        .with_ancestors(table.ancestors(std::process::id()));
    let timing = Timing {
        grace_period: cfg.grace_period,
        settle_period: cfg.settle_period,
        launch_delay: cfg.launch_delay,
    };
    let speaker: Arc<dyn Speaker> = match cfg.speak_command.as_deref() {
        Some(cmd) => Arc::new(CommandSpeaker::new(cmd, console.clone())?),
        None => Arc::new(LogSpeaker::new(console.clone())),
    };
    Ok(Assistant {
        store: Arc::new(SessionStore::new(
            &cfg.sessions_dir,
            table.clone(),
            classifier.clone(),
        )),
        controller: Arc::new(WorkspaceController::new(
            table,
            Arc::new(DetachedLauncher),
            classifier,
            timing,
        )),
        speaker,
        console,
    })
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    tracing::debug!(
        "config: {}",
        serde_json::to_string(&cfg).unwrap_or_else(|e| e.to_string())
    );

    let (console, writer) = spawn_output_writer();
    let assistant = build_assistant(&cfg, console.clone())?;
    let action = args.command.clone().unwrap_or(Action::Run);

    let res = match action {
        Action::Run => run_assistant(&cfg, assistant).await,
        other => run_once(other, args.json, assistant).await,
    };

    // The voice thread may still hold a console handle while blocked on
    // input, so the writer is only given a moment to drain.
    drop(console);
    if !drain_writer(writer, WRITER_DRAIN).await {
        tracing::debug!("console writer still busy at exit");
    }
    res
}

/// One-shot subcommands: do the work, print the result, exit.
async fn run_once(action: Action, json: bool, assistant: Assistant) -> Result<()> {
    let Assistant {
        store,
        controller,
        console,
        ..
    } = assistant;

    tokio::task::spawn_blocking(move || -> Result<()> {
        match action {
            Action::Run => anyhow::bail!("`run` is not a one-shot command"),
            Action::Save { name } => {
                let path = store
                    .save_session(name.as_deref())
                    .context("failed to save workspace")?;
                console.out(format!("Saved: {}", path.display()));
            }
            Action::Close => {
                let outcome = controller.close_all_apps();
                print_outcome(&console, json, "Closed", &outcome)?;
            }
            Action::Restore { session } => {
                let outcome = match session {
                    Some(name) => controller.restore_session(&store, &name),
                    None => controller
                        .restore_latest(&store)
                        .context("no saved sessions found")?,
                };
                print_outcome(&console, json, "Restored", &outcome)?;
            }
            Action::List => {
                let sessions = store.list_sessions();
                if json {
                    console.out(serde_json::to_string_pretty(&sessions)?);
                } else if sessions.is_empty() {
                    console.err(format!("No sessions in {}", store.dir().display()));
                } else {
                    sessions.into_iter().for_each(|s| console.out(s));
                }
            }
            Action::Show { name } => {
                let session = store.read_session(&name)?;
                if json {
                    console.out(serde_json::to_string_pretty(&session)?);
                } else {
                    build_session_summary(&session)
                        .lines
                        .into_iter()
                        .for_each(|l| console.out(l));
                }
            }
            Action::Capture => {
                let apps = store.capture_running_apps();
                if json {
                    console.out(serde_json::to_string_pretty(&apps)?);
                } else {
                    console.out(format!("{} eligible application(s)", apps.len()));
                    apps.iter().for_each(|a| console.out(app_line(a)));
                }
            }
        }
        Ok(())
    })
    .await
    .context("command task failed")?
}

fn print_outcome(
    console: &Console,
    json: bool,
    verb: &str,
    outcome: &crate::model::Outcome,
) -> Result<()> {
    if json {
        console.out(serde_json::to_string_pretty(outcome)?);
    } else {
        for line in build_text_summary(verb, outcome).lines {
            console.out(line);
        }
    }
    Ok(())
}

fn build_transcriber(cfg: &AssistantConfig) -> Result<Option<Box<dyn Transcriber>>> {
    if let Some(cmd) = cfg.listen_command.as_deref() {
        return Ok(Some(Box::new(CommandTranscriber::new(
            cmd,
            cfg.listen_timeout,
        )?)));
    }
    // Stdin is free for typed commands only when the terminal is not in raw mode.
    if !cfg.hotkeys {
        return Ok(Some(Box::new(LineTranscriber::stdin())));
    }
    Ok(None)
}

fn print_banner(console: &Console, bindings: &HotkeyBindings, cfg: &AssistantConfig) {
    console.out("Rose - workspace manager");
    console.out("Commands:");
    console.out("  Voice: 'save workspace', 'close all apps', 'restore workspace', 'start', 'stop'");
    if cfg.hotkeys {
        let keys: Vec<String> = bindings
            .iter()
            .map(|(k, c)| format!("{k} ({c})"))
            .collect();
        console.out(format!("  Hotkeys: {}", keys.join(", ")));
    }
    console.out(format!("Sessions: {}", cfg.sessions_dir.display()));
}

/// Long-running mode: voice thread, hotkey thread, dispatcher task, and this
/// task as the supervisor.
async fn run_assistant(cfg: &AssistantConfig, assistant: Assistant) -> Result<()> {
    let bindings = HotkeyBindings::default().with_overrides(&cfg.hotkey_overrides)?;
    let transcriber = build_transcriber(cfg)?;
    print_banner(&assistant.console, &bindings, cfg);

    let lifecycle = Lifecycle::new();
    lifecycle.start(transcriber.is_some());
    tracing::info!(voice = lifecycle.is_voice_active(), "rose started");
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();

    match transcriber {
        Some(t) => {
            voice::spawn_voice_listener(
                t,
                cmd_tx.clone(),
                assistant.speaker.clone(),
                lifecycle.clone(),
            )
            .context("spawn voice listener")?;
        }
        None => tracing::info!("no voice input configured; use --listen-command"),
    }

    let hotkey_thread = if cfg.hotkeys {
        Some(spawn_hotkeys(bindings, cmd_tx.clone(), lifecycle.clone())?)
    } else {
        None
    };
    drop(cmd_tx);

    let mut dispatcher = tokio::spawn(orchestrator::run_dispatcher(
        assistant,
        cmd_rx,
        lifecycle.clone(),
    ));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let drained = tokio::select! {
        _ = &mut ctrl_c => {
            tracing::info!("shutting down");
            None
        }
        _ = lifecycle.stopped() => None,
        // Every command source is gone (e.g. stdin reached EOF).
        joined = &mut dispatcher => Some(joined),
    };
    lifecycle.stop();

    let joined = match drained {
        Some(joined) => joined,
        None => dispatcher.await,
    };
    let res = joined.context("dispatcher task failed")?;
    if let Some(handle) = hotkey_thread {
        // The listener polls the lifecycle, so this returns promptly and
        // leaves the terminal out of raw mode.
        let _ = tokio::task::spawn_blocking(move || handle.join()).await;
    }
    tracing::info!("rose stopped");
    res
}

#[cfg(feature = "hotkeys")]
fn spawn_hotkeys(
    bindings: HotkeyBindings,
    cmd_tx: mpsc::UnboundedSender<Command>,
    lifecycle: Lifecycle,
) -> Result<std::thread::JoinHandle<()>> {
    crate::hotkeys::spawn_hotkey_listener(
        Box::new(crate::hotkeys::TerminalHotkeys),
        bindings,
        cmd_tx,
        lifecycle,
    )
    .context("spawn hotkey listener")
}

#[cfg(not(feature = "hotkeys"))]
fn spawn_hotkeys(
    _bindings: HotkeyBindings,
    _cmd_tx: mpsc::UnboundedSender<Command>,
    _lifecycle: Lifecycle,
) -> Result<std::thread::JoinHandle<()>> {
    anyhow::bail!("built without hotkey support")
}
