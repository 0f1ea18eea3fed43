//! Running external tools with a bounded wait.
//!
//! Every child process is owned by a [`ChildGuard`]; if the guard is dropped
//! before the process has been reaped (error, timeout, panic) the process is
//! killed and waited for, so no engine instance outlives the call.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} did not finish within {timeout:?} and was terminated")]
    Timeout { program: String, timeout: Duration },
    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stderr: String,
}

/// Kills and reaps the child on drop unless it already exited.
pub struct ChildGuard {
    child: Child,
    program: String,
    reaped: bool,
}

impl ChildGuard {
    pub fn new(child: Child, program: impl Into<String>) -> Self {
        Self {
            child,
            program: program.into(),
            reaped: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            log::debug!("kill {} (pid {}): {}", self.program, self.child.id(), e);
        }
        match self.child.wait() {
            Ok(status) => log::warn!(
                "Terminated {} (pid {}), status {}",
                self.program,
                self.child.id(),
                status
            ),
            Err(e) => log::error!(
                "Could not reap {} (pid {}): {}",
                self.program,
                self.child.id(),
                e
            ),
        }
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Spawn `command` without a console and wait at most `timeout` for it.
///
/// stdin and stdout are detached; stderr is captured for error reports.
pub fn run_bounded(command: &mut Command, timeout: Duration) -> Result<ProcessOutput, ProcessError> {
    let program = command.get_program().to_string_lossy().into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    hide_console(command);

    let child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    let mut guard = ChildGuard::new(child, program.clone());
    log::debug!("Started {} (pid {})", program, guard.id());

    let stderr_reader = guard.child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match guard.child.try_wait() {
            Ok(Some(status)) => {
                guard.reaped = true;
                break status;
            }
            Ok(None) if Instant::now() >= deadline => {
                guard.terminate();
                return Err(ProcessError::Timeout { program, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => return Err(ProcessError::Wait { program, source }),
        }
    };

    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    Ok(ProcessOutput { status, stderr })
}

/// Delete a tool's output file left over from an earlier run, so that a
/// later existence check only sees what this run produced.
pub fn remove_stale_output(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(windows)]
fn hide_console(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_command: &mut Command) {}
