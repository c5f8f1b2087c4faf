//! Voice input and spoken feedback.
//!
//! Speech-to-text and text-to-speech are external programs; this module only
//! defines the contracts, ships thin adapters and turns heard text into
//! commands.

mod listen;
mod speak;

pub use listen::{CommandTranscriber, LineTranscriber};
pub use speak::{CommandSpeaker, LogSpeaker};

use crate::model::Command;
use crate::orchestrator::Lifecycle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Pause between two listens.
const LISTEN_PAUSE: Duration = Duration::from_millis(500);

/// Result of one blocking listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    /// Recognized speech, lowercased and trimmed.
    Text(String),
    /// Timeout, nothing intelligible, or a recognizer error.
    Silence,
    /// The source is exhausted; stop listening.
    Closed,
}

pub trait Transcriber: Send {
    fn listen(&mut self) -> Heard;
}

/// Fire-and-forget spoken feedback. Implementations swallow their errors.
pub trait Speaker: Send + Sync {
    fn speak(&self, message: &str);
}

/// Keywords per command, checked in this order; the first hit wins.
const KEYWORDS: &[(Command, &[&str])] = &[
    (Command::Save, &["save", "saved"]),
    (Command::Close, &["close", "closing"]),
    (Command::Restore, &["restore", "restoring"]),
    (Command::Start, &["start", "begin"]),
    (Command::Stop, &["stop", "halt", "quit", "exit"]),
];

/// Map free text onto a command by keyword substring.
pub fn recognize_command(text: &str) -> Option<Command> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(cmd, _)| *cmd)
}

/// Run the voice loop on its own thread until the lifecycle stops or the
/// transcriber closes. Recognized commands go to `commands`.
pub fn spawn_voice_listener(
    mut transcriber: Box<dyn Transcriber>,
    commands: UnboundedSender<Command>,
    speaker: Arc<dyn Speaker>,
    lifecycle: Lifecycle,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("voice".into())
        .spawn(move || {
            tracing::info!("voice listener started");
            while lifecycle.is_running() {
                match transcriber.listen() {
                    Heard::Text(text) => {
                        if !lifecycle.is_running() {
                            break;
                        }
                        tracing::info!("heard: {text}");
                        match recognize_command(&text) {
                            Some(cmd) => {
                                if commands.send(cmd).is_err() {
                                    break;
                                }
                            }
                            None => {
                                tracing::info!("command not recognized: {text}");
                                speaker.speak("Command not recognized");
                            }
                        }
                    }
                    Heard::Silence => {}
                    Heard::Closed => {
                        tracing::info!("voice input closed");
                        break;
                    }
                }
                std::thread::sleep(LISTEN_PAUSE);
            }
            tracing::debug!("voice listener finished");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[test]
    fn recognizes_each_command() {
        assert_eq!(recognize_command("save workspace"), Some(Command::Save));
        assert_eq!(recognize_command("close all apps"), Some(Command::Close));
        assert_eq!(recognize_command("restore workspace"), Some(Command::Restore));
        assert_eq!(recognize_command("begin"), Some(Command::Start));
        assert_eq!(recognize_command("please halt"), Some(Command::Stop));
        assert_eq!(recognize_command("  EXIT  "), Some(Command::Stop));
    }

    #[test]
    fn earlier_commands_win() {
        // Contains both "save" and "close".
        assert_eq!(recognize_command("close and save"), Some(Command::Save));
        assert_eq!(recognize_command("stop restoring"), Some(Command::Restore));
    }

    #[test]
    fn unrelated_or_empty_text_is_none() {
        assert_eq!(recognize_command("what time is it"), None);
        assert_eq!(recognize_command(""), None);
    }

    struct Scripted(VecDeque<Heard>);

    impl Transcriber for Scripted {
        fn listen(&mut self) -> Heard {
            self.0.pop_front().unwrap_or(Heard::Closed)
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Speaker for Recorder {
        fn speak(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn listener_forwards_commands_until_closed() {
        let lifecycle = Lifecycle::new();
        lifecycle.start(true);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let speaker = Arc::new(Recorder::default());
        let script = Scripted(VecDeque::from([
            Heard::Text("save workspace".into()),
            Heard::Silence,
            Heard::Text("sing a song".into()),
            Heard::Text("close everything".into()),
        ]));

        spawn_voice_listener(Box::new(script), tx, speaker.clone(), lifecycle)
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), Command::Save);
        assert_eq!(rx.try_recv().unwrap(), Command::Close);
        assert!(rx.try_recv().is_err());
        assert_eq!(*speaker.0.lock().unwrap(), vec!["Command not recognized"]);
    }
}
