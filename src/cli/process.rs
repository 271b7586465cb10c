//! Agent process spawning and control.

use std::process::ExitStatus;

use tokio::process::{Child, ChildStderr, ChildStdout};

use crate::cli::AgentCommand;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Agent binary not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error, program: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// A running agent process.
#[derive(Debug)]
pub struct AgentProcess {
    child: Child,
}

impl AgentProcess {
    /// Spawn the given invocation.
    ///
    /// Stdin is closed immediately: the agent reads its prompt from argv.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(command: &AgentCommand) -> Result<Self, SpawnError> {
        let child = command
            .to_command()
            .spawn()
            .map_err(|e| SpawnError::from_io(e, &command.program.to_string_lossy()))?;

        tracing::debug!(
            pid = child.id(),
            program = %command.program.display(),
            "Agent process spawned"
        );
        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Send SIGKILL (or the platform equivalent) without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill cannot be delivered.
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

/// Ask the process `pid` to terminate without waiting for it to exit.
///
/// On Unix this sends SIGTERM. Elsewhere there is no signal to send by pid,
/// and the owner of the `Child` handle performs the kill instead.
///
/// # Errors
///
/// Returns an error if the signal cannot be delivered.
#[cfg(unix)]
pub fn send_terminate(pid: u32) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
    kill(nix_pid, Signal::SIGTERM).map_err(std::io::Error::from)
}

/// Ask the process `pid` to terminate without waiting for it to exit.
///
/// # Errors
///
/// Never fails on this platform; the kill is performed by the handle owner.
#[cfg(not(unix))]
pub fn send_terminate(_pid: u32) -> std::io::Result<()> {
    Ok(())
}
