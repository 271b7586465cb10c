//! Folds stream events into the final result of one invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cli::{StreamEvent, TodoItem};

/// A tool invocation and, once it arrives, its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name.
    pub name: String,
    /// Tool input parameters.
    pub input: Map<String, Value>,
    /// Tool output, absent while the call is open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Everything accumulated during one invocation, emitted once on exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    /// Session the invocation belonged to.
    pub session_id: String,
    /// Final text: the agent's own result if it sent one, else all chunks.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<TodoItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    /// Process exit code; `None` if it was ended by a signal.
    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// Cumulative state of a running invocation.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    content: String,
    thinking: String,
    todos: Option<Vec<TodoItem>>,
    tool_calls: Vec<ToolCallRecord>,
    result: Option<String>,
}

impl ResponseAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state.
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Chunk { content } => self.content.push_str(content),
            StreamEvent::Thinking { text } => self.thinking.push_str(text),
            StreamEvent::ToolCall { name, input } => self.tool_calls.push(ToolCallRecord {
                name: name.clone(),
                input: input.clone(),
                result: None,
            }),
            StreamEvent::ToolResult { content } => {
                // Oldest open call first.
                if let Some(open) = self.tool_calls.iter_mut().find(|c| c.result.is_none()) {
                    open.result = Some(content.clone());
                } else {
                    tracing::debug!("Tool result without an open tool call, ignoring");
                }
            }
            StreamEvent::Todos { todos } => self.todos = Some(todos.clone()),
            StreamEvent::Result { content } => self.result = Some(content.clone()),
            StreamEvent::Error { .. } => {}
        }
    }

    /// Concatenated chunk text so far.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Concatenated reasoning text so far.
    #[must_use]
    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    /// Latest todo snapshot, if any was received.
    #[must_use]
    pub fn todos(&self) -> Option<&[TodoItem]> {
        self.todos.as_deref()
    }

    /// Tool calls in order of creation.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    /// Number of tool calls still waiting for a result.
    #[must_use]
    pub fn open_tool_calls(&self) -> usize {
        self.tool_calls.iter().filter(|c| c.result.is_none()).count()
    }

    /// Produce the completion record.
    #[must_use]
    pub fn finish(self, session_id: impl Into<String>, exit_code: Option<i32>) -> CompletionRecord {
        CompletionRecord {
            session_id: session_id.into(),
            content: self.result.unwrap_or(self.content),
            thinking: Some(self.thinking).filter(|t| !t.is_empty()),
            todos: self.todos,
            tool_calls: Some(self.tool_calls).filter(|c| !c.is_empty()),
            exit_code,
        }
    }
}
