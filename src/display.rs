//! Colored CLI display utilities for agent output.
//!
//! This module renders broadcast events to the terminal for the binary.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;
use serde_json::{Map, Value};

use crate::cli::{StreamEvent, TodoItem, TodoStatus};
use crate::status::StatusRecord;
use crate::supervisor::{CompletionRecord, ErrorKind, ErrorNotice, StreamNotice};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to at most `max_len` characters, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let head: String = s.chars().take(max_len - 3).collect();
    format!("{head}...")
}

/// Format tool input for display, truncating long values.
#[must_use]
pub fn format_tool_input(input: &Map<String, Value>, raw_mode: bool) -> String {
    input
        .iter()
        .map(|(k, v)| {
            let value_str = match v {
                Value::String(s) => truncate(s, 50, raw_mode),
                other => truncate(&other.to_string(), 50, raw_mode),
            };
            format!("{k}={value_str}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn todo_marker(status: TodoStatus) -> &'static str {
    match status {
        TodoStatus::Pending => "[ ]",
        TodoStatus::InProgress => "[~]",
        TodoStatus::Completed => "[x]",
    }
}

fn print_todos(todos: &[TodoItem]) {
    println!("{} {} item(s)", "[TODOS]".yellow().bold(), todos.len());
    for item in todos {
        let label = if item.status == TodoStatus::InProgress && !item.active_form.is_empty() {
            &item.active_form
        } else {
            &item.content
        };
        println!("  {} {}", todo_marker(item.status), label);
    }
}

/// Print invocation start information.
pub fn print_session_start(session_id: &str, agent: &str, raw_mode: bool) {
    println!(
        "{} {} agent={}, session={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        agent.cyan(),
        truncate(session_id, 20, raw_mode).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print one stream notice.
pub fn print_stream(notice: &StreamNotice, raw_mode: bool) {
    match &notice.event {
        StreamEvent::Chunk { content } => print!("{content}"),
        StreamEvent::Thinking { text } => print!("{}", text.dimmed()),
        StreamEvent::ToolCall { name, input } => {
            println!();
            println!(
                "{} {} ({})",
                "[TOOL]".cyan().bold(),
                name.bold(),
                format_tool_input(input, raw_mode).dimmed()
            );
        }
        StreamEvent::ToolResult { content } => {
            println!("{} {}", "[RESULT]".green().bold(), truncate(content, 150, raw_mode));
        }
        StreamEvent::Todos { todos } => {
            println!();
            print_todos(todos);
        }
        // Errors are printed from the error channel.
        StreamEvent::Result { .. } | StreamEvent::Error { .. } => {}
    }
    let _ = io::stdout().flush();
}

/// Print the completion record.
pub fn print_completion(record: &CompletionRecord, raw_mode: bool) {
    let ts = timestamp();
    let tools = record.tool_calls.as_ref().map_or(0, Vec::len);
    println!();
    match record.exit_code {
        Some(0) => println!(
            "{} {} Session completed (tools: {}) {}",
            ts.dimmed(),
            "[SESSION]".blue().bold(),
            tools,
            format!("session_id={}", truncate(&record.session_id, 20, raw_mode)).dimmed()
        ),
        code => println!(
            "{} {} Agent exited with {} (tools: {}) {}",
            ts.dimmed(),
            "[SESSION]".red().bold(),
            code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")),
            tools,
            format!("session_id={}", truncate(&record.session_id, 20, raw_mode)).dimmed()
        ),
    }
    let _ = io::stdout().flush();
}

/// Print an error notice.
pub fn print_error_notice(notice: &ErrorNotice) {
    let tag = match notice.kind {
        ErrorKind::Spawn => "[SPAWN]",
        ErrorKind::Stderr => "[STDERR]",
        ErrorKind::Io => "[IO]",
    };
    println!(
        "{} {} {} {}",
        timestamp().dimmed(),
        "[ERROR]".red().bold(),
        tag.red(),
        notice.message
    );
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}

/// Print a status record.
pub fn print_status(status: &StatusRecord) {
    let yes_no = |b: bool| if b { "yes".green().to_string() } else { "no".red().to_string() };
    println!("{} installed={}", "[STATUS]".magenta().bold(), yes_no(status.installed));
    println!(
        "{} authenticated={}",
        "[STATUS]".magenta().bold(),
        yes_no(status.authenticated)
    );
    println!(
        "{} version={}",
        "[STATUS]".magenta().bold(),
        status.version.as_deref().unwrap_or("-")
    );
    let _ = io::stdout().flush();
}
