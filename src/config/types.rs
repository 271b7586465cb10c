//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::{DEFAULT_CHANNEL_BUFFER, DEFAULT_READ_CHUNK};

/// Configuration for the orchestrator and its status probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Agent executable, either a bare name resolved on `PATH` or a path.
    pub binary: PathBuf,
    /// Capacity of the channel between the reader tasks and the pipeline.
    pub channel_buffer: usize,
    /// Bytes requested per read from the subprocess pipes.
    pub read_chunk_size: usize,
    /// Timeout for the status probe's presence check, in milliseconds.
    pub locate_timeout_ms: u64,
    /// Timeout for the status probe's version query, in milliseconds.
    pub version_timeout_ms: u64,
    /// Case-insensitive stderr keywords that mark a line as an error.
    pub stderr_keywords: Vec<String>,
}

impl OrchestratorConfig {
    /// Presence-check timeout as a [`Duration`].
    #[must_use]
    pub fn locate_timeout(&self) -> Duration {
        Duration::from_millis(self.locate_timeout_ms)
    }

    /// Version-query timeout as a [`Duration`].
    #[must_use]
    pub fn version_timeout(&self) -> Duration {
        Duration::from_millis(self.version_timeout_ms)
    }

    /// Same configuration with a different agent binary.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }
}

/// Default agent binary name.
pub const DEFAULT_BINARY: &str = "claude";

fn default_stderr_keywords() -> Vec<String> {
    ["error", "fatal", "panic", "exception", "failed"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
            read_chunk_size: DEFAULT_READ_CHUNK,
            locate_timeout_ms: 2000,
            version_timeout_ms: 5000,
            stderr_keywords: default_stderr_keywords(),
        }
    }
}
