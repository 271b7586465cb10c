//! Supervisor module tests.

mod runner_test;

use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_orchestrator::config::OrchestratorConfig;
use agent_orchestrator::supervisor::{Subscription, Supervisor};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(10);

/// A throwaway shell script standing in for the agent binary.
///
/// The script picks its behaviour from the last argument (the message).
pub struct FakeAgent {
    dir: tempfile::TempDir,
    path: PathBuf,
}

const SCRIPT: &str = r#"#!/bin/sh
[ -n "$FAKE_AGENT_WARMUP" ] && exit 0
for last; do :; done
case "$last" in
  hello)
    printf '%s\n' '{"type":"content","content":"Hi there"}'
    ;;
  split)
    printf '{"type":"content",'
    sleep 0.05
    printf '"content":"Hel"}\n{"type":"content","content":"lo"}\nplain text\n\n'
    ;;
  tool)
    printf '%s\n' '{"type":"tool_use","name":"bash","input":{"command":"ls"}}'
    printf '%s\n' '{"type":"tool_result","content":"a.txt"}'
    ;;
  result)
    printf '%s\n' '{"type":"content","content":"draft"}'
    printf '%s\n' '{"type":"thinking","thinking":"checking"}'
    printf '%s\n' '{"type":"todo","todos":[{"content":"Check","status":"completed","activeForm":"Checking"}]}'
    printf '%s\n' '{"type":"result","result":"final"}'
    ;;
  stderr-error)
    echo "Error: boom" >&2
    printf '%s\n' '{"type":"content","content":"still going"}'
    ;;
  stderr-split)
    printf 'Err' >&2
    sleep 0.05
    printf 'or: boom\n' >&2
    ;;
  stderr-info)
    echo "Info: ok" >&2
    ;;
  exit-code)
    printf '%s\n' '{"type":"content","content":"partial"}'
    exit 3
    ;;
  pwd)
    printf '{"type":"content","content":"%s"}\n' "$(pwd)"
    ;;
  env)
    printf '{"type":"content","content":"%s:%s:%s"}\n' "$NO_COLOR" "$FORCE_COLOR" "$TERM"
    ;;
  args)
    printf '{"type":"content","content":"%s"}\n' "$#"
    ;;
  orphan)
    sleep 2 &
    printf '%s\n' '{"type":"content","content":"parent done"}'
    ;;
  slow)
    trap 'echo terminated > "@MARKER@"; exit 143' TERM
    printf '%s\n' '{"type":"content","content":"ready"}'
    while :; do sleep 0.05; done
    ;;
  *)
    printf '%s\n' '{"type":"content","content":"done"}'
    ;;
esac
"#;

impl FakeAgent {
    pub fn new() -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent");
        let marker = dir.path().join("terminated");
        let script = SCRIPT.replace("@MARKER@", &marker.to_string_lossy());

        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        warm_up(&path);

        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Whether the `slow` mode caught a terminate signal.
    pub fn was_terminated(&self) -> bool {
        self.dir.path().join("terminated").exists()
    }

    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new(OrchestratorConfig::default().with_binary(&self.path)).unwrap()
    }
}

/// Run the script once so a concurrently forked child still holding the
/// write handle cannot make the real spawn fail with ETXTBSY.
fn warm_up(path: &Path) {
    for _ in 0..100 {
        match std::process::Command::new(path)
            .env("FAKE_AGENT_WARMUP", "1")
            .status()
        {
            Ok(_) => return,
            Err(e) if e.raw_os_error() == Some(26) => std::thread::sleep(Duration::from_millis(10)),
            Err(e) => panic!("Failed to run fake agent: {e}"),
        }
    }
    panic!("Fake agent stayed busy");
}

/// Receive the next value or fail the test after [`WAIT`].
pub async fn next<T>(sub: &mut Subscription<T>) -> T {
    tokio::time::timeout(WAIT, sub.recv())
        .await
        .expect("timed out waiting for event")
        .expect("subscription closed")
}

/// Drain everything already queued.
pub fn drain<T>(sub: &mut Subscription<T>) -> Vec<T> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}
