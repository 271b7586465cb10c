//! Integration tests for the process supervisor against a fake agent.

use std::time::Duration;

use agent_orchestrator::agent::AgentType;
use agent_orchestrator::cli::{StreamEvent, TodoStatus};
use agent_orchestrator::config::OrchestratorConfig;
use agent_orchestrator::supervisor::{
    ErrorKind, InvocationRequest, Supervisor, DEFAULT_TERMINATE_TIMEOUT,
};
use serde_json::json;

use super::{drain, next, FakeAgent};

fn request(session: &str, message: &str) -> InvocationRequest {
    InvocationRequest::new(session, message)
}

#[test]
fn default_terminate_timeout_is_reasonable() {
    assert!(DEFAULT_TERMINATE_TIMEOUT.as_secs() >= 1);
    assert!(DEFAULT_TERMINATE_TIMEOUT.as_secs() <= 30);
}

#[tokio::test]
async fn single_content_line_streams_then_completes() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut stream = supervisor.events().stream.subscribe();
    let mut complete = supervisor.events().complete.subscribe();

    let session = supervisor.send_message(request("session-1", "hello")).await;
    assert_eq!(session, "session-1");

    let record = next(&mut complete).await;
    assert_eq!(record.session_id, "session-1");
    assert_eq!(record.content, "Hi there");
    assert_eq!(record.exit_code, Some(0));

    let notices = drain(&mut stream);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].session_id, "session-1");
    assert_eq!(
        notices[0].event,
        StreamEvent::Chunk {
            content: "Hi there".to_string()
        }
    );

    assert!(!supervisor.is_active());
    assert!(drain(&mut complete).is_empty());
}

#[tokio::test]
async fn completion_content_is_ordered_concatenation_of_chunks() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut stream = supervisor.events().stream.subscribe();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor.send_message(request("s", "split")).await;
    let record = next(&mut complete).await;

    let chunks: Vec<String> = drain(&mut stream)
        .into_iter()
        .map(|n| match n.event {
            StreamEvent::Chunk { content } => content,
            other => panic!("Expected chunk, got {other:?}"),
        })
        .collect();
    assert_eq!(chunks, vec!["Hel", "lo", "plain text"]);
    assert_eq!(record.content, chunks.concat());
}

#[tokio::test]
async fn tool_result_is_attached_to_its_call() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor.send_message(request("s", "tool")).await;
    let record = next(&mut complete).await;

    let calls = record.tool_calls.expect("tool calls recorded");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "bash");
    assert_eq!(serde_json::Value::Object(calls[0].input.clone()), json!({"command": "ls"}));
    assert_eq!(calls[0].result.as_deref(), Some("a.txt"));
}

#[tokio::test]
async fn explicit_result_overrides_accumulated_text() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor.send_message(request("s", "result")).await;
    let record = next(&mut complete).await;

    assert_eq!(record.content, "final");
    assert_eq!(record.thinking.as_deref(), Some("checking"));
    let todos = record.todos.expect("todos recorded");
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].status, TodoStatus::Completed);
}

#[tokio::test]
async fn nonzero_exit_still_completes() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor.send_message(request("s", "exit-code")).await;
    let record = next(&mut complete).await;

    assert_eq!(record.content, "partial");
    assert_eq!(record.exit_code, Some(3));
}

#[tokio::test]
async fn stderr_error_is_reported_once() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut errors = supervisor.events().error.subscribe();
    let mut stream = supervisor.events().stream.subscribe();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor.send_message(request("s", "stderr-error")).await;
    let record = next(&mut complete).await;

    let errors = drain(&mut errors);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Stderr);
    assert!(errors[0].message.contains("Error: boom"));

    // The stream carries the error too and stdout keeps flowing.
    let notices = drain(&mut stream);
    assert!(notices
        .iter()
        .any(|n| matches!(&n.event, StreamEvent::Error { message } if message.contains("Error: boom"))));
    assert_eq!(record.content, "still going");
}

#[tokio::test]
async fn stderr_keyword_split_across_writes_is_caught() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut errors = supervisor.events().error.subscribe();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor.send_message(request("s", "stderr-split")).await;
    next(&mut complete).await;

    let errors = drain(&mut errors);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Stderr);
    assert_eq!(errors[0].message, "Error: boom");
}

#[tokio::test]
async fn stderr_info_is_ignored() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut errors = supervisor.events().error.subscribe();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor.send_message(request("s", "stderr-info")).await;
    next(&mut complete).await;

    assert!(drain(&mut errors).is_empty());
}

#[tokio::test]
async fn spawn_failure_reports_error_without_completion() {
    let supervisor =
        Supervisor::new(OrchestratorConfig::default().with_binary("/nonexistent/agent-bin")).unwrap();
    let mut errors = supervisor.events().error.subscribe();
    let mut complete = supervisor.events().complete.subscribe();

    let session = supervisor.send_message(request("s", "hello")).await;
    assert_eq!(session, "s");

    let error = next(&mut errors).await;
    assert_eq!(error.kind, ErrorKind::Spawn);
    assert_eq!(error.session_id, "s");
    assert!(error.message.contains("/nonexistent/agent-bin"));

    assert!(!supervisor.is_active());
    assert!(!supervisor.cancel_current());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut complete).is_empty());
}

#[tokio::test]
async fn cancel_current_is_true_once_then_false() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut stream = supervisor.events().stream.subscribe();
    let mut complete = supervisor.events().complete.subscribe();

    assert!(!supervisor.cancel_current());

    supervisor.send_message(request("s", "slow")).await;
    assert!(supervisor.is_active());
    assert_eq!(supervisor.active_session().as_deref(), Some("s"));
    assert!(supervisor.active_pid().is_some());
    next(&mut stream).await;

    assert!(supervisor.cancel_current());
    assert!(!supervisor.is_active());
    assert!(!supervisor.cancel_current());
    assert!(!supervisor.cancel_current());

    // The process exits from the signal; its exit must not complete anything.
    let deadline = tokio::time::Instant::now() + super::WAIT;
    while !agent.was_terminated() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(agent.was_terminated());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(drain(&mut complete).is_empty());
}

#[tokio::test]
async fn reaped_agent_is_inactive_while_descendant_holds_stdout() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut stream = supervisor.events().stream.subscribe();
    let mut complete = supervisor.events().complete.subscribe();

    let started = tokio::time::Instant::now();
    supervisor.send_message(request("s", "orphan")).await;
    next(&mut stream).await;

    // The backgrounded sleep keeps both pipes open for two seconds.
    while supervisor.is_active() && started.elapsed() < Duration::from_millis(1500) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!supervisor.is_active());
    assert_eq!(supervisor.active_pid(), None);
    assert!(!supervisor.cancel_current());
    assert!(drain(&mut complete).is_empty());

    let record = next(&mut complete).await;
    assert_eq!(record.session_id, "s");
    assert_eq!(record.content, "parent done");
    assert_eq!(record.exit_code, Some(0));
}

#[tokio::test]
async fn second_send_terminates_first_process() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut stream = supervisor.events().stream.subscribe();
    let mut complete = supervisor.events().complete.subscribe();

    supervisor.send_message(request("session-1", "slow")).await;
    let ready = next(&mut stream).await;
    assert_eq!(ready.session_id, "session-1");
    let first_pid = supervisor.active_pid();

    supervisor.send_message(request("session-2", "fast")).await;
    assert_ne!(supervisor.active_pid(), first_pid);

    let record = next(&mut complete).await;
    assert_eq!(record.session_id, "session-2");
    assert_eq!(record.content, "done");

    let deadline = tokio::time::Instant::now() + super::WAIT;
    while !agent.was_terminated() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(agent.was_terminated());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(drain(&mut complete).is_empty());
    assert!(drain(&mut stream).iter().all(|n| n.session_id == "session-2"));
}

#[tokio::test]
async fn cleanup_is_idempotent() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();

    supervisor.cleanup();

    let _stream = supervisor.events().stream.subscribe();
    let _complete = supervisor.events().complete.subscribe_once();
    let _error = supervisor.events().error.subscribe();
    supervisor.send_message(request("s", "slow")).await;

    for _ in 0..3 {
        supervisor.cleanup();
        assert_eq!(supervisor.events().listener_count(), 0);
        assert!(!supervisor.is_active());
    }
}

#[tokio::test]
async fn project_path_sets_working_directory() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor
        .send_message(request("s", "pwd").with_project_path(agent.dir()))
        .await;
    let record = next(&mut complete).await;

    assert_eq!(
        std::fs::canonicalize(&record.content).unwrap(),
        std::fs::canonicalize(agent.dir()).unwrap()
    );
}

#[tokio::test]
async fn environment_disables_color() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor.send_message(request("s", "env")).await;
    assert_eq!(next(&mut complete).await.content, "1:0:dumb");
}

#[tokio::test]
async fn message_is_a_single_argument() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let mut complete = supervisor.events().complete.subscribe_once();

    supervisor
        .send_message(request("s", "args").with_agent(AgentType::Security))
        .await;
    assert_eq!(next(&mut complete).await.content, "7");
}

#[tokio::test]
async fn clones_share_state() {
    let agent = FakeAgent::new();
    let supervisor = agent.supervisor();
    let handle = supervisor.clone();
    let mut stream = supervisor.events().stream.subscribe();

    handle.send_message(request("s", "slow")).await;
    next(&mut stream).await;

    assert!(supervisor.is_active());
    assert!(supervisor.cancel_current());
    assert!(!handle.cancel_current());
}
