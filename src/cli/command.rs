//! Command construction for a single agent invocation.
//!
//! The invocation is always built as an argument vector, never as a joined
//! shell string, so message text cannot inject shell syntax. A shell
//! rendering is still available for logging and for execution layers that
//! only accept a string.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::agent::AgentType;

/// Flag selecting non-interactive print mode.
pub const PRINT_FLAG: &str = "-p";
/// Flag enabling verbose output (required for streamed JSON in print mode).
pub const VERBOSE_FLAG: &str = "--verbose";
/// Flag selecting the output format.
pub const OUTPUT_FORMAT_FLAG: &str = "--output-format";
/// Line-delimited JSON output format.
pub const STREAM_JSON_FORMAT: &str = "stream-json";
/// Flag carrying the persona system prompt.
pub const SYSTEM_PROMPT_FLAG: &str = "--system-prompt";

/// Environment overrides that keep escape codes out of the output.
pub const PLAIN_OUTPUT_ENV: [(&str, &str); 3] =
    [("NO_COLOR", "1"), ("FORCE_COLOR", "0"), ("TERM", "dumb")];

/// Wrap `s` in single quotes, escaping embedded quotes as `'\''`.
#[must_use]
pub fn quote_single(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            quoted.push_str(r"'\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Builder for a single agent invocation.
#[derive(Debug, Clone)]
pub struct AgentCommandBuilder {
    agent: AgentType,
    message: String,
    project_path: Option<PathBuf>,
}

impl AgentCommandBuilder {
    /// Create a builder for `message` under the given persona.
    #[must_use]
    pub fn new(agent: AgentType, message: impl Into<String>) -> Self {
        Self {
            agent,
            message: message.into(),
            project_path: None,
        }
    }

    /// Set the project directory the agent runs in.
    #[must_use]
    pub fn project_path(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.project_path = path.map(Into::into);
        self
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the persona.
    #[must_use]
    pub fn agent(&self) -> AgentType {
        self.agent
    }

    /// Build the command-line arguments. The message is always last.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        vec![
            PRINT_FLAG.to_string(),
            VERBOSE_FLAG.to_string(),
            OUTPUT_FORMAT_FLAG.to_string(),
            STREAM_JSON_FORMAT.to_string(),
            SYSTEM_PROMPT_FLAG.to_string(),
            self.agent.system_prompt().to_string(),
            self.message.clone(),
        ]
    }

    /// The directory the agent should run in.
    ///
    /// Falls back to this process's current directory when no project path
    /// was given or it is empty. `None` only if that cannot be determined
    /// either, in which case the child simply inherits it.
    #[must_use]
    pub fn working_dir(&self) -> Option<PathBuf> {
        match &self.project_path {
            Some(path) if !path.as_os_str().is_empty() => Some(path.clone()),
            _ => std::env::current_dir().ok(),
        }
    }

    /// Build the full invocation for `program`.
    #[must_use]
    pub fn build(&self, program: impl Into<PathBuf>) -> AgentCommand {
        AgentCommand {
            program: program.into(),
            args: self.build_args(),
            working_dir: self.working_dir(),
            env: PLAIN_OUTPUT_ENV
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

/// A fully resolved invocation: program, argv, working directory and env.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments, message last.
    pub args: Vec<String>,
    /// Working directory, if known.
    pub working_dir: Option<PathBuf>,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

impl AgentCommand {
    /// The positional message argument.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    /// A tokio command with piped stdout/stderr and a closed stdin.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Render the invocation as one POSIX shell string.
    ///
    /// Flags are emitted bare; the system prompt and the message are always
    /// single-quoted so each stays one token whatever it contains.
    #[must_use]
    pub fn to_shell_string(&self) -> String {
        let mut parts = vec![escape_path(&self.program)];
        let last = self.args.len().saturating_sub(1);
        let mut quote_next = false;

        for (i, arg) in self.args.iter().enumerate() {
            if quote_next || i == last {
                parts.push(quote_single(arg));
            } else {
                parts.push(shell_escape::unix::escape(Cow::Borrowed(arg.as_str())).into_owned());
            }
            quote_next = arg == SYSTEM_PROMPT_FLAG;
        }
        parts.join(" ")
    }
}

fn escape_path(path: &Path) -> String {
    shell_escape::unix::escape(path.to_string_lossy()).into_owned()
}
