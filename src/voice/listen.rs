use super::{Heard, Transcriber};
use std::io::{BufRead, Read};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Reads one command per line, e.g. typed commands on stdin.
pub struct LineTranscriber<R> {
    input: R,
}

impl<R: BufRead + Send> LineTranscriber<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl LineTranscriber<std::io::BufReader<std::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send> Transcriber for LineTranscriber<R> {
    fn listen(&mut self) -> Heard {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => Heard::Closed,
            Ok(_) => normalize(&line),
            Err(e) => {
                tracing::warn!("error reading command input: {e}");
                Heard::Closed
            }
        }
    }
}

/// Runs an external speech-to-text program per listen and takes its stdout
/// as the transcript. The program is expected to record one utterance and
/// exit; it is killed when it outlives `timeout`.
pub struct CommandTranscriber {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandTranscriber {
    /// `command_line` is split on whitespace: program first, then arguments.
    pub fn new(command_line: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("listen command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }

    fn wait_for(&self, child: &mut Child) -> Option<std::process::ExitStatus> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Ok(None) => {
                    tracing::info!("no speech detected (timeout)");
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                Err(e) => {
                    tracing::warn!("error waiting for {}: {e}", self.program);
                    return None;
                }
            }
        }
    }
}

impl Transcriber for CommandTranscriber {
    fn listen(&mut self) -> Heard {
        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("error with speech recognition program {}: {e}", self.program);
                return Heard::Closed;
            }
        };

        let Some(status) = self.wait_for(&mut child) else {
            return Heard::Silence;
        };
        if !status.success() {
            tracing::debug!("{} exited with {status}", self.program);
            return Heard::Silence;
        }

        let mut transcript = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            if let Err(e) = stdout.read_to_string(&mut transcript) {
                tracing::debug!("unreadable transcript: {e}");
                return Heard::Silence;
            }
        }
        normalize(&transcript)
    }
}

fn normalize(raw: &str) -> Heard {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        tracing::debug!("could not understand audio");
        Heard::Silence
    } else {
        Heard::Text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn lines_are_lowercased_and_blank_lines_are_silence() {
        let mut t = LineTranscriber::new(Cursor::new("Save Workspace\n\n  close \n"));
        assert_eq!(t.listen(), Heard::Text("save workspace".into()));
        assert_eq!(t.listen(), Heard::Silence);
        assert_eq!(t.listen(), Heard::Text("close".into()));
        assert_eq!(t.listen(), Heard::Closed);
    }

    #[test]
    fn empty_listen_command_is_rejected() {
        assert!(CommandTranscriber::new("   ", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn missing_program_closes_the_source() {
        let mut t =
            CommandTranscriber::new("/no/such/stt-program --once", Duration::from_secs(1))
                .unwrap();
        assert_eq!(t.listen(), Heard::Closed);
    }

    #[cfg(unix)]
    #[test]
    fn program_stdout_becomes_the_transcript() {
        let mut t = CommandTranscriber::new("echo Restore Workspace", Duration::from_secs(5))
            .unwrap();
        assert_eq!(t.listen(), Heard::Text("restore workspace".into()));
    }

    #[cfg(unix)]
    #[test]
    fn slow_program_times_out_as_silence() {
        let mut t = CommandTranscriber::new("sleep 5", Duration::from_millis(100)).unwrap();
        assert_eq!(t.listen(), Heard::Silence);
    }
}
