//! Console output.
//!
//! User-facing lines go through one writer thread so the voice thread, the
//! hotkey thread and the dispatcher never interleave partial lines. Lines end
//! in `\r\n`: while the hotkey listener holds the terminal in raw mode a bare
//! `\n` does not return the cursor.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Handle for queueing console output. Cloneable across threads.
#[derive(Clone)]
pub struct Console {
    tx: mpsc::UnboundedSender<OutputLine>,
}

impl Console {
    pub fn out(&self, line: impl Into<String>) {
        let _ = self.tx.send(OutputLine::Stdout(line.into()));
    }

    pub fn err(&self, line: impl Into<String>) {
        let _ = self.tx.send(OutputLine::Stderr(line.into()));
    }
}

/// Spawn the blocking writer. The writer exits once every `Console` clone is
/// dropped; join the handle to flush.
pub fn spawn_output_writer() -> (Console, std::thread::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = std::thread::spawn(move || {
        // Locks are taken per line: the tracing writer shares stderr.
        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let mut out = std::io::stdout().lock();
                    let _ = write_crlf(&mut out, &msg).and_then(|()| out.flush());
                }
                OutputLine::Stderr(msg) => {
                    let mut err = std::io::stderr().lock();
                    let _ = write_crlf(&mut err, &msg).and_then(|()| err.flush());
                }
            }
        }
    });
    (Console { tx }, handle)
}

/// Wait up to `deadline` for the writer to flush and exit.
///
/// Returns `false` when a `Console` clone is still alive (e.g. held by a
/// thread blocked on input); the thread is then left behind, not joined.
pub async fn drain_writer(handle: std::thread::JoinHandle<()>, deadline: Duration) -> bool {
    let until = tokio::time::Instant::now() + deadline;
    while !handle.is_finished() {
        if tokio::time::Instant::now() >= until {
            return false;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
    handle.join().is_ok()
}

fn write_crlf(w: &mut impl Write, msg: &str) -> std::io::Result<()> {
    for line in msg.lines() {
        w.write_all(line.as_bytes())?;
        w.write_all(b"\r\n")?;
    }
    if msg.is_empty() {
        w.write_all(b"\r\n")?;
    }
    Ok(())
}

/// `tracing` writer that normalizes line endings the same way as `Console`.
pub struct CrlfStderr;

impl Write for CrlfStderr {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        // One lock per event keeps concurrent log lines whole.
        static LOCK: Mutex<()> = Mutex::new(());
        let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut stderr = std::io::stderr().lock();
        let mut start = 0;
        for (i, b) in buf.iter().enumerate() {
            if *b == b'\n' && (i == 0 || buf[i - 1] != b'\r') {
                stderr.write_all(&buf[start..i])?;
                stderr.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        stderr.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_line_messages_get_crlf_per_line() {
        let mut buf = Vec::new();
        write_crlf(&mut buf, "one\ntwo").unwrap();
        write_crlf(&mut buf, "").unwrap();
        assert_eq!(buf, b"one\r\ntwo\r\n\r\n");
    }

    #[tokio::test]
    async fn drain_gives_up_on_a_live_console() {
        let (console, writer) = spawn_output_writer();
        let held = console.clone();
        drop(console);

        let started = std::time::Instant::now();
        assert!(!drain_writer(writer, Duration::from_millis(50)).await);
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(held);
    }

    #[tokio::test]
    async fn drain_joins_once_every_console_is_gone() {
        let (console, writer) = spawn_output_writer();
        console.out("last line");
        drop(console);
        assert!(drain_writer(writer, Duration::from_secs(5)).await);
    }
}
