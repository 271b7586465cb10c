//! Tests for invocation building and process spawning.

use agent_orchestrator::agent::AgentType;
use agent_orchestrator::cli::{quote_single, AgentCommandBuilder, AgentProcess, SpawnError};

#[test]
fn shell_string_escapes_apostrophe() {
    let cmd = AgentCommandBuilder::new(AgentType::Developer, "It's me").build("claude");
    assert!(cmd.to_shell_string().contains(r"'It'\''s me'"));
}

#[test]
fn every_quote_is_escaped_and_token_stays_closed() {
    for message in ["'", "don't 'quote' me", "a''b", "trailing'"] {
        let quoted = quote_single(message);
        let quotes = message.matches('\'').count();

        assert!(quoted.starts_with('\''));
        assert!(quoted.ends_with('\''));
        assert_eq!(quoted.matches(r"'\''").count(), quotes);
        // Undo the escaping and the outer quotes to recover the input.
        let inner = &quoted[1..quoted.len() - 1];
        assert_eq!(inner.replace(r"'\''", "'"), message);
    }
}

#[test]
fn persona_text_follows_system_prompt_flag() {
    for agent in AgentType::ALL {
        let args = AgentCommandBuilder::new(agent, "hi").build_args();
        let flag = args.iter().position(|a| a == "--system-prompt").unwrap();
        assert_eq!(args[flag + 1], agent.system_prompt());
        assert_eq!(args.last().map(String::as_str), Some("hi"));
    }
}

#[test]
fn output_format_is_stream_json() {
    let args = AgentCommandBuilder::new(AgentType::Devops, "deploy").build_args();
    assert_eq!(&args[..4], ["-p", "--verbose", "--output-format", "stream-json"]);
}

#[tokio::test]
async fn spawn_missing_binary_is_not_found() {
    let cmd = AgentCommandBuilder::new(AgentType::Developer, "hi").build("/nonexistent/agent-bin");
    let err = AgentProcess::spawn(&cmd).unwrap_err();
    assert!(matches!(err, SpawnError::NotFound(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn spawned_process_exposes_pipes_once() {
    let cmd = AgentCommandBuilder::new(AgentType::Developer, "hi").build("true");
    let mut process = AgentProcess::spawn(&cmd).unwrap();

    assert!(process.take_stdout().is_some());
    assert!(process.take_stdout().is_none());
    assert!(process.take_stderr().is_some());
    assert!(process.take_stderr().is_none());

    let status = process.wait().await.unwrap();
    assert!(status.success());
}
