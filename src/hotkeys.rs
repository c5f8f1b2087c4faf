//! Keyboard shortcuts.
//!
//! Bindings are plain data (`ctrl+alt+s` → save) so they can be parsed from
//! the command line and tested without a terminal. `TerminalHotkeys` reads
//! key events with crossterm while the assistant's terminal has focus.

use crate::model::Command;
use crate::orchestrator::Lifecycle;
use anyhow::{bail, Context, Result};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub key: char,
}

impl FromStr for Hotkey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut hotkey = Hotkey {
            ctrl: false,
            alt: false,
            shift: false,
            key: '\0',
        };
        let parts: Vec<String> = s.split('+').map(|p| p.trim().to_lowercase()).collect();
        let Some((key, modifiers)) = parts.split_last() else {
            bail!("empty hotkey");
        };
        for m in modifiers {
            match m.as_str() {
                "ctrl" | "control" => hotkey.ctrl = true,
                "alt" | "option" => hotkey.alt = true,
                "shift" => hotkey.shift = true,
                other => bail!("unknown modifier '{other}' in '{s}'"),
            }
        }
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() => hotkey.key = c,
            _ => bail!("hotkey '{s}' must end in a single key"),
        }
        Ok(hotkey)
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("ctrl+")?;
        }
        if self.alt {
            f.write_str("alt+")?;
        }
        if self.shift {
            f.write_str("shift+")?;
        }
        write!(f, "{}", self.key)
    }
}

#[derive(Debug, Clone)]
pub struct HotkeyBindings {
    bindings: Vec<(Hotkey, Command)>,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        let defaults = [
            ("ctrl+alt+s", Command::Save),
            ("ctrl+alt+c", Command::Close),
            ("ctrl+alt+r", Command::Restore),
            ("ctrl+c", Command::Stop),
        ];
        Self {
            bindings: defaults
                .into_iter()
                .filter_map(|(combo, cmd)| combo.parse().ok().map(|k| (k, cmd)))
                .collect(),
        }
    }
}

impl HotkeyBindings {
    /// Apply `command=combo` overrides on top of the defaults. A command
    /// keeps a single binding; a combo is owned by the last command given.
    pub fn with_overrides<S: AsRef<str>>(mut self, overrides: &[S]) -> Result<Self> {
        for spec in overrides {
            let spec = spec.as_ref();
            let (cmd, combo) = spec
                .split_once('=')
                .with_context(|| format!("hotkey override '{spec}' is not command=combo"))?;
            let cmd: Command = cmd.parse()?;
            let hotkey: Hotkey = combo.parse()?;
            self.bindings.retain(|(k, c)| *c != cmd && *k != hotkey);
            self.bindings.push((hotkey, cmd));
        }
        Ok(self)
    }

    pub fn lookup(&self, hotkey: &Hotkey) -> Option<Command> {
        self.bindings
            .iter()
            .find(|(k, _)| k == hotkey)
            .map(|(_, c)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Hotkey, Command)> {
        self.bindings.iter()
    }
}

/// Blocks the calling thread, forwarding bound key presses until the
/// lifecycle stops.
pub trait HotkeyService: Send {
    fn run(
        &mut self,
        bindings: &HotkeyBindings,
        commands: &UnboundedSender<Command>,
        lifecycle: &Lifecycle,
    ) -> Result<()>;
}

pub fn spawn_hotkey_listener(
    mut service: Box<dyn HotkeyService>,
    bindings: HotkeyBindings,
    commands: UnboundedSender<Command>,
    lifecycle: Lifecycle,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("hotkeys".into())
        .spawn(move || {
            for (key, cmd) in bindings.iter() {
                tracing::debug!("hotkey {key} -> {cmd}");
            }
            tracing::info!("hotkey listener started");
            if let Err(e) = service.run(&bindings, &commands, &lifecycle) {
                tracing::error!("hotkey listener error: {e:#}");
            }
            tracing::info!("hotkey listener stopped");
        })
}

#[cfg(feature = "hotkeys")]
pub use terminal::TerminalHotkeys;

#[cfg(feature = "hotkeys")]
mod terminal {
    use super::{Hotkey, HotkeyBindings, HotkeyService};
    use crate::model::Command;
    use crate::orchestrator::Lifecycle;
    use anyhow::{Context, Result};
    use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
    use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedSender;

    const POLL: Duration = Duration::from_millis(100);

    /// Key events from the controlling terminal, in raw mode.
    #[derive(Debug, Default)]
    pub struct TerminalHotkeys;

    pub(super) fn hotkey_from_event(k: &KeyEvent) -> Option<Hotkey> {
        let KeyCode::Char(c) = k.code else {
            return None;
        };
        Some(Hotkey {
            ctrl: k.modifiers.contains(KeyModifiers::CONTROL),
            alt: k.modifiers.contains(KeyModifiers::ALT),
            shift: k.modifiers.contains(KeyModifiers::SHIFT),
            key: c.to_ascii_lowercase(),
        })
    }

    /// Leaves raw mode even if the loop bails out early.
    struct RawModeGuard;

    impl Drop for RawModeGuard {
        fn drop(&mut self) {
            let _ = disable_raw_mode();
        }
    }

    impl HotkeyService for TerminalHotkeys {
        fn run(
            &mut self,
            bindings: &HotkeyBindings,
            commands: &UnboundedSender<Command>,
            lifecycle: &Lifecycle,
        ) -> Result<()> {
            enable_raw_mode().context("enable raw mode")?;
            let _guard = RawModeGuard;

            while lifecycle.is_running() {
                if !event::poll(POLL).context("poll terminal events")? {
                    continue;
                }
                let Event::Key(k) = event::read().context("read terminal event")? else {
                    continue;
                };
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                let Some(cmd) = hotkey_from_event(&k).and_then(|h| bindings.lookup(&h)) else {
                    continue;
                };
                tracing::debug!("hotkey pressed: {cmd}");
                if commands.send(cmd).is_err() {
                    break;
                }
            }
            Ok(())
        }
    }
}
