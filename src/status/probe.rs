//! Status probe for the agent binary.
//!
//! Answers "is the agent installed, and does it run?" without ever failing.
//! The presence check is a `PATH` lookup on a blocking thread; the version
//! query runs `<binary> --version`. Both are time-bounded and any failure
//! collapses to [`StatusRecord::unavailable`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::cli::PLAIN_OUTPUT_ENV;
use crate::config::OrchestratorConfig;

/// Result of one probe. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub installed: bool,
    pub authenticated: bool,
    pub version: Option<String>,
}

impl StatusRecord {
    /// The negative record every failure maps to.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            installed: false,
            authenticated: false,
            version: None,
        }
    }
}

/// Errors from probe steps. Never returned by [`StatusProbe::check`].
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("{step} timed out after {timeout:?}")]
    Timeout { step: &'static str, timeout: Duration },
    #[error("Version query exited with {0:?}")]
    NonZeroExit(Option<i32>),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Probe task failed: {0}")]
    Task(String),
}

/// The two checks a probe performs.
#[async_trait]
pub trait ProbeBackend: Send + Sync {
    /// Whether the binary exists.
    async fn locate(&self) -> Result<bool, ProbeError>;
    /// Raw output of the version query.
    async fn version(&self) -> Result<String, ProbeError>;
}

/// Backend that looks at the real filesystem and runs the real binary.
#[derive(Debug, Clone)]
pub struct SystemBackend {
    binary: PathBuf,
}

impl SystemBackend {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ProbeBackend for SystemBackend {
    async fn locate(&self) -> Result<bool, ProbeError> {
        let binary = self.binary.clone();
        tokio::task::spawn_blocking(move || find_executable(&binary).is_some())
            .await
            .map_err(|e| ProbeError::Task(e.to_string()))
    }

    async fn version(&self) -> Result<String, ProbeError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .envs(PLAIN_OUTPUT_ENV)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::NonZeroExit(output.status.code()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Resolve `binary` to an executable file.
///
/// Paths with more than one component are checked directly; bare names are
/// searched on `PATH`.
#[must_use]
pub fn find_executable(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 {
        return is_executable(binary).then(|| binary.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Time-bounded, failure-swallowing status check.
pub struct StatusProbe<B = SystemBackend> {
    backend: B,
    locate_timeout: Duration,
    version_timeout: Duration,
}

impl StatusProbe<SystemBackend> {
    /// Probe the binary named in `config`.
    #[must_use]
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self::with_backend(
            SystemBackend::new(&config.binary),
            config.locate_timeout(),
            config.version_timeout(),
        )
    }
}

impl<B: ProbeBackend> StatusProbe<B> {
    #[must_use]
    pub fn with_backend(backend: B, locate_timeout: Duration, version_timeout: Duration) -> Self {
        Self {
            backend,
            locate_timeout,
            version_timeout,
        }
    }

    /// Run the probe. Every failure yields [`StatusRecord::unavailable`].
    pub async fn check(&self) -> StatusRecord {
        match self.try_check().await {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(error = %e, "Agent status probe failed");
                StatusRecord::unavailable()
            }
        }
    }

    async fn try_check(&self) -> Result<StatusRecord, ProbeError> {
        let present = tokio::time::timeout(self.locate_timeout, self.backend.locate())
            .await
            .map_err(|_| ProbeError::Timeout {
                step: "Binary lookup",
                timeout: self.locate_timeout,
            })??;

        if !present {
            tracing::debug!("Agent binary not found");
            return Ok(StatusRecord::unavailable());
        }

        let version = tokio::time::timeout(self.version_timeout, self.backend.version())
            .await
            .map_err(|_| ProbeError::Timeout {
                step: "Version query",
                timeout: self.version_timeout,
            })??;

        Ok(StatusRecord {
            installed: true,
            authenticated: true,
            version: Some(version),
        })
    }
}
