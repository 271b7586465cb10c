//! Process supervisor for agent invocations.
//!
//! The supervisor owns the single active-invocation slot. Each accepted
//! request spawns one agent process and three tasks:
//!
//! - a stdout reader that decodes lines,
//! - a stderr reader that decodes lines the same way,
//! - a waiter that owns the child, signals it on cancellation, frees the
//!   slot once it is reaped and reports the exit after both readers finish.
//!
//! All three feed one bounded channel, consumed in order by the pipeline
//! task that classifies lines, updates the accumulator and broadcasts.
//! Because the exit message is only sent after the readers finish, the
//! `complete` notice is always the last one for its invocation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::{
    send_terminate, AgentCommandBuilder, AgentProcess, ProcessOutput, StderrScreen, StreamError,
    StreamEvent, StreamParser,
};
use crate::config::OrchestratorConfig;
use crate::status::{StatusProbe, StatusRecord};
use crate::supervisor::{
    ActiveInvocation, ErrorKind, ErrorNotice, EventBus, InvocationRequest, ResponseAccumulator,
    StreamNotice,
};

/// Grace period between the terminate signal and a forced kill.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for supervisor construction.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// The configured stderr keywords do not form a usable pattern.
    #[error("Invalid stderr keywords: {0}")]
    InvalidKeywords(#[from] regex::Error),
}

struct Inner {
    config: OrchestratorConfig,
    screen: StderrScreen,
    bus: EventBus,
    slot: Mutex<Option<ActiveInvocation>>,
    next_invocation: AtomicU64,
}

/// Supervisor for agent invocations.
///
/// Cheap to clone; all clones share the same slot and channels.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    /// Create a supervisor for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::InvalidKeywords` if the stderr keywords
    /// cannot be compiled.
    pub fn new(config: OrchestratorConfig) -> Result<Self, SupervisorError> {
        let screen = StderrScreen::new(&config.stderr_keywords)?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                screen,
                bus: EventBus::new(),
                slot: Mutex::new(None),
                next_invocation: AtomicU64::new(1),
            }),
        })
    }

    /// The broadcast channels.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Whether an invocation is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.lock_slot().is_some()
    }

    /// Session id of the active invocation.
    #[must_use]
    pub fn active_session(&self) -> Option<String> {
        self.inner.lock_slot().as_ref().map(|a| a.session_id.clone())
    }

    /// Process id of the active invocation.
    #[must_use]
    pub fn active_pid(&self) -> Option<u32> {
        self.inner.lock_slot().as_ref().and_then(|a| a.pid)
    }

    /// Start an invocation, replacing any active one.
    ///
    /// Returns the session id as soon as the process has been spawned; all
    /// output arrives on the broadcast channels. A spawn failure is reported
    /// on the `error` channel with [`ErrorKind::Spawn`] and no completion
    /// follows.
    #[allow(clippy::unused_async)]
    pub async fn send_message(&self, request: InvocationRequest) -> String {
        let InvocationRequest {
            session_id,
            message,
            project_path,
            agent_type,
        } = request;

        let command = AgentCommandBuilder::new(agent_type, message)
            .project_path(project_path)
            .build(&self.inner.config.binary);

        // Held across cancel and spawn so no second process can start in between.
        let mut slot = self.inner.lock_slot();
        if let Some(previous) = slot.take() {
            tracing::info!(
                previous = %previous.session_id,
                next = %session_id,
                "Replacing active invocation"
            );
            previous.terminate();
        }

        tracing::debug!(
            session_id = %session_id,
            agent = %agent_type,
            command = %command.to_shell_string(),
            "Spawning agent"
        );

        let process = match AgentProcess::spawn(&command) {
            Ok(process) => process,
            Err(e) => {
                drop(slot);
                tracing::error!(session_id = %session_id, error = %e, "Failed to spawn agent");
                self.inner.bus.error.emit(&ErrorNotice {
                    session_id: session_id.clone(),
                    kind: ErrorKind::Spawn,
                    message: e.to_string(),
                });
                return session_id;
            }
        };

        let id = self.inner.next_invocation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *slot = Some(ActiveInvocation {
            id,
            session_id: session_id.clone(),
            pid: process.id(),
            cancel: cancel.clone(),
        });
        drop(slot);

        tracing::info!(
            session_id = %session_id,
            invocation = id,
            pid = ?process.id(),
            "Invocation started"
        );

        let rx = self.inner.attach(id, process, cancel.clone());
        tokio::spawn(Arc::clone(&self.inner).run_pipeline(id, session_id.clone(), cancel, rx));
        session_id
    }

    /// Cancel the active invocation.
    ///
    /// Returns `false` if nothing was active. An invocation stops being
    /// active once its process has been reaped, even while output from a
    /// lingering descendant is still draining. Otherwise the process is sent
    /// a terminate signal, the slot is cleared immediately and `true` is
    /// returned without waiting for the process to exit. No further events
    /// are broadcast for the cancelled invocation.
    pub fn cancel_current(&self) -> bool {
        let Some(active) = self.inner.lock_slot().take() else {
            return false;
        };
        active.terminate();
        true
    }

    /// Cancel any active invocation and remove every listener.
    ///
    /// Safe to call any number of times.
    pub fn cleanup(&self) {
        let _ = self.cancel_current();
        self.inner.bus.unsubscribe_all();
    }

    /// Probe the configured agent binary. Never fails.
    pub async fn check_status(&self) -> StatusRecord {
        StatusProbe::new(&self.inner.config).check().await
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Option<ActiveInvocation>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the slot if it still holds invocation `id`.
    fn release(&self, id: u64) -> bool {
        let mut slot = self.lock_slot();
        if slot.as_ref().is_some_and(|a| a.id == id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Start the reader and waiter tasks for `process`, which the waiter owns.
    fn attach(
        self: &Arc<Self>,
        id: u64,
        mut process: AgentProcess,
        cancel: CancellationToken,
    ) -> Receiver<ProcessOutput> {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer.max(1));
        let chunk = self.config.read_chunk_size;

        let stdout_task = process.take_stdout().map(|stdout| {
            spawn_reader(tx.clone(), |tx| StreamParser::read_lines(stdout, tx, chunk))
        });
        let stderr_task = process.take_stderr().map(|stderr| {
            spawn_reader(tx.clone(), |tx| StreamParser::read_stderr(stderr, tx, chunk))
        });

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = process.wait() => Some(status),
                () = cancel.cancelled() => None,
            };

            let Some(status) = exited else {
                for task in [stdout_task, stderr_task].into_iter().flatten() {
                    task.abort();
                }
                reap_cancelled(&mut process).await;
                return;
            };

            if inner.release(id) {
                tracing::debug!(invocation = id, "Agent process reaped");
            }

            for task in [stdout_task, stderr_task].into_iter().flatten() {
                let _ = task.await;
            }

            let message = match status {
                Ok(status) => ProcessOutput::Exited {
                    code: status.code(),
                },
                Err(e) => ProcessOutput::WaitFailed(e.to_string()),
            };
            let _ = tx.send(message).await;
        });

        rx
    }

    async fn run_pipeline(
        self: Arc<Self>,
        id: u64,
        session_id: String,
        cancel: CancellationToken,
        mut rx: Receiver<ProcessOutput>,
    ) {
        let mut accumulator = ResponseAccumulator::new();

        while let Some(output) = rx.recv().await {
            if cancel.is_cancelled() {
                tracing::debug!(session_id = %session_id, "Dropping output of cancelled invocation");
                break;
            }

            match output {
                ProcessOutput::Line(line) => {
                    let event = StreamParser::classify(&line);
                    accumulator.apply(&event);
                    self.publish(&session_id, event);
                }
                ProcessOutput::Stderr(line) => {
                    if let Some(message) = self.screen.screen(&line) {
                        tracing::warn!(session_id = %session_id, %message, "Agent reported an error");
                        self.publish(
                            &session_id,
                            StreamEvent::Error {
                                message: message.clone(),
                            },
                        );
                        self.report(&session_id, ErrorKind::Stderr, message);
                    } else {
                        tracing::trace!(session_id = %session_id, %line, "Agent stderr");
                    }
                }
                ProcessOutput::ReadFailed(message) => {
                    tracing::warn!(session_id = %session_id, %message, "Agent output read failed");
                    self.report(&session_id, ErrorKind::Io, message);
                }
                ProcessOutput::Exited { code } => {
                    tracing::info!(
                        session_id = %session_id,
                        invocation = id,
                        exit_code = ?code,
                        "Invocation complete"
                    );
                    let record = accumulator.finish(session_id.as_str(), code);
                    self.bus.complete.emit(&record);
                    return;
                }
                ProcessOutput::WaitFailed(message) => {
                    tracing::error!(session_id = %session_id, %message, "Waiting on agent failed");
                    self.report(&session_id, ErrorKind::Io, message);
                    return;
                }
            }
        }
    }

    fn publish(&self, session_id: &str, event: StreamEvent) {
        self.bus.stream.emit(&StreamNotice {
            session_id: session_id.to_string(),
            event,
        });
    }

    fn report(&self, session_id: &str, kind: ErrorKind, message: String) {
        self.bus.error.emit(&ErrorNotice {
            session_id: session_id.to_string(),
            kind,
            message,
        });
    }
}

fn spawn_reader<F, Fut>(tx: Sender<ProcessOutput>, read: F) -> JoinHandle<()>
where
    F: FnOnce(Sender<ProcessOutput>) -> Fut,
    Fut: std::future::Future<Output = Result<(), StreamError>> + Send + 'static,
{
    let fut = read(tx.clone());
    tokio::spawn(async move {
        match fut.await {
            Ok(()) | Err(StreamError::ChannelClosed) => {}
            Err(e) => {
                let _ = tx.send(ProcessOutput::ReadFailed(e.to_string())).await;
            }
        }
    })
}

/// Signal a cancelled process and wait for it, forcing a kill if it
/// outlives the grace period.
async fn reap_cancelled(process: &mut AgentProcess) {
    // `id()` is `None` once the child has been reaped.
    if let Some(pid) = process.id() {
        if let Err(e) = send_terminate(pid) {
            tracing::debug!(pid, error = %e, "Terminate signal not delivered");
        }
    }
    if cfg!(not(unix)) {
        let _ = process.start_kill();
    }
    if tokio::time::timeout(DEFAULT_TERMINATE_TIMEOUT, process.wait())
        .await
        .is_err()
    {
        tracing::warn!(pid = ?process.id(), "Agent ignored terminate signal, killing");
        let _ = process.start_kill();
        let _ = process.wait().await;
    }
}
