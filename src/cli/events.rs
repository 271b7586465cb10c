//! Wire records read from the agent's stdout and the stream events they
//! classify into.
//!
//! The agent runs with `--output-format stream-json` and writes one JSON
//! object per line. Each object carries a `type` discriminator:
//!
//! | `type`        | Fields                                   | Stream event  |
//! |---------------|------------------------------------------|---------------|
//! | `content`     | `content`                                | `chunk`       |
//! | `thinking`    | `thinking`                               | `thinking`    |
//! | `tool_use`    | `name`, `input`                          | `tool_call`   |
//! | `tool_result` | `content`                                | `tool_result` |
//! | `todo`        | `todos` or `content`+`status`+`activeForm` | `todos`     |
//! | `result`      | `result`                                 | `result`      |
//!
//! Anything else is shown to the user as plain text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Progress of a single todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// One entry of the agent's self-reported task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    /// What needs doing, in imperative form.
    pub content: String,
    /// Current progress.
    pub status: TodoStatus,
    /// Present-continuous form shown while the item is in progress.
    #[serde(default)]
    pub active_form: String,
}

/// Body of a `todo` record.
///
/// Either a full snapshot of the list or a single item. Both replace the
/// stored list when accumulated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TodoPayload {
    /// `{"type":"todo","todos":[...]}`
    Snapshot { todos: Vec<TodoItem> },
    /// `{"type":"todo","content":...,"status":...,"activeForm":...}`
    Single(TodoItem),
}

impl TodoPayload {
    /// The todo list this record describes.
    #[must_use]
    pub fn into_items(self) -> Vec<TodoItem> {
        match self {
            Self::Snapshot { todos } => todos,
            Self::Single(item) => vec![item],
        }
    }
}

/// A decoded stdout line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireRecord {
    /// Assistant text.
    Content { content: String },
    /// Reasoning trace.
    Thinking { thinking: String },
    /// The agent invoked a tool.
    ToolUse {
        name: String,
        #[serde(default)]
        input: Map<String, Value>,
    },
    /// Output of the most recent tool invocation.
    ToolResult { content: String },
    /// Task list update.
    Todo(TodoPayload),
    /// Final answer reported by the agent itself.
    Result { result: String },
    /// Catch-all for unknown record types.
    #[serde(other)]
    Unknown,
}

impl WireRecord {
    /// Map this record to its stream event, or `None` for unknown types.
    #[must_use]
    pub fn into_event(self) -> Option<StreamEvent> {
        let event = match self {
            Self::Content { content } => StreamEvent::Chunk { content },
            Self::Thinking { thinking } => StreamEvent::Thinking { text: thinking },
            Self::ToolUse { name, input } => StreamEvent::ToolCall { name, input },
            Self::ToolResult { content } => StreamEvent::ToolResult { content },
            Self::Todo(payload) => StreamEvent::Todos {
                todos: payload.into_items(),
            },
            Self::Result { result } => StreamEvent::Result { content: result },
            Self::Unknown => return None,
        };
        Some(event)
    }
}

/// One classified unit of agent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Display text.
    Chunk { content: String },
    /// Reasoning text.
    Thinking { text: String },
    /// A tool invocation was opened.
    ToolCall {
        name: String,
        input: Map<String, Value>,
    },
    /// Result for the oldest open tool invocation.
    ToolResult { content: String },
    /// Complete current task list.
    Todos { todos: Vec<TodoItem> },
    /// Explicit completion payload from the agent.
    Result { content: String },
    /// Failure detected on stderr.
    Error { message: String },
}

impl StreamEvent {
    /// Returns the tool name if this is a `ToolCall` event.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolCall { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Short name of the variant, as used on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Thinking { .. } => "thinking",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Todos { .. } => "todos",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }
}
