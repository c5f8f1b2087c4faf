use super::Speaker;
use crate::output::Console;
use std::process::{Command, Stdio};

/// Writes feedback to the console instead of speaking it.
pub struct LogSpeaker {
    console: Console,
}

impl LogSpeaker {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl Speaker for LogSpeaker {
    fn speak(&self, message: &str) {
        self.console.err(format!("rose: {message}"));
    }
}

/// Speaks through an external text-to-speech program (e.g. `espeak -s 150`),
/// passing the message as the last argument. Also echoes to the console.
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
    echo: LogSpeaker,
}

impl CommandSpeaker {
    pub fn new(command_line: &str, console: Console) -> anyhow::Result<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("speak command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            echo: LogSpeaker::new(console),
        })
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, message: &str) {
        self.echo.speak(message);
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg(message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => tracing::debug!("tts error: {e}"),
        }
    }
}
