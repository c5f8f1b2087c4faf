use super::{Launcher, ProcessError};
use std::path::Path;
use std::process::{Command, Stdio};

/// Starts executables detached from the assistant's stdio and, on Unix, its
/// process group, so a Ctrl-C in our terminal does not reach them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedLauncher;

impl Launcher for DetachedLauncher {
    fn launch(&self, exe: &Path) -> Result<(), ProcessError> {
        let mut cmd = Command::new(exe);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Launch {
            path: exe.to_path_buf(),
            source,
        })?;
        tracing::debug!(pid = child.id(), exe = %exe.display(), "launched");

        // Reap the child whenever it exits so it never lingers as a zombie.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}
