//! Invocation request and the single active-invocation slot.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::agent::AgentType;

/// A request to run the agent once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    /// Session the invocation's events are tagged with.
    pub session_id: String,
    /// Prompt text, passed as the final argument.
    pub message: String,
    /// Directory to run in; the orchestrator's own cwd when absent or empty.
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    /// Persona to run under.
    #[serde(default)]
    pub agent_type: AgentType,
}

impl InvocationRequest {
    /// Create a request for the default persona in the current directory.
    #[must_use]
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            project_path: None,
            agent_type: AgentType::default(),
        }
    }

    /// Set the persona.
    #[must_use]
    pub fn with_agent(mut self, agent_type: AgentType) -> Self {
        self.agent_type = agent_type;
        self
    }

    /// Set the project directory.
    #[must_use]
    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }
}

/// Bookkeeping for the one process allowed to run at a time.
#[derive(Debug)]
pub(crate) struct ActiveInvocation {
    /// Monotonic id distinguishing this invocation from later ones.
    pub id: u64,
    pub session_id: String,
    /// Cleared with the slot as soon as the process is reaped.
    pub pid: Option<u32>,
    /// Tells the waiter to signal the process and the pipeline to drop output.
    pub cancel: CancellationToken,
}

impl ActiveInvocation {
    /// Stop the invocation. The task owning the process delivers the signal,
    /// so a pid reaped in the meantime is never signalled. Does not wait for exit.
    pub fn terminate(&self) {
        self.cancel.cancel();
        tracing::info!(
            session_id = %self.session_id,
            invocation = self.id,
            pid = ?self.pid,
            "Invocation cancelled"
        );
    }
}
