//! Broadcast channels for supervisor output.
//!
//! Each channel keeps an ordered list of listeners. Every emitted value is
//! cloned to all current listeners in subscription order; a listener sees
//! values in the order they were emitted. Unsubscribing takes effect before
//! the next emission.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::cli::StreamEvent;
use crate::supervisor::CompletionRecord;

/// Handle identifying one listener on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener<T> {
    id: ListenerId,
    tx: UnboundedSender<T>,
    once: bool,
}

/// A single broadcast channel.
pub struct Channel<T> {
    listeners: Mutex<Vec<Listener<T>>>,
    next_id: AtomicU64,
}

impl<T: Clone> Channel<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Listener<T>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, once: bool) -> Subscription<T> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(Listener { id, tx, once });
        Subscription { id, rx }
    }

    /// Receive every value emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        self.register(false)
    }

    /// Receive only the next emitted value.
    #[must_use]
    pub fn subscribe_once(&self) -> Subscription<T> {
        self.register(true)
    }

    /// Remove one listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Remove every listener, returning how many there were.
    pub fn unsubscribe_all(&self) -> usize {
        let mut listeners = self.lock();
        let count = listeners.len();
        listeners.clear();
        count
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `value` to all listeners, returning how many received it.
    ///
    /// Listeners whose subscription was dropped are pruned; one-shot
    /// listeners are removed after their delivery.
    pub fn emit(&self, value: &T) -> usize {
        let mut delivered = 0;
        self.lock().retain(|listener| {
            if listener.tx.send(value.clone()).is_ok() {
                delivered += 1;
                !listener.once
            } else {
                false
            }
        });
        delivered
    }
}

impl<T: Clone> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a listener registration.
#[derive(Debug)]
pub struct Subscription<T> {
    id: ListenerId,
    rx: UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// The handle to pass to [`Channel::unsubscribe`].
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next value. `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take a value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Convert into a stream of values.
    pub fn into_stream(self) -> impl futures_core::Stream<Item = T> + Unpin {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Payload of the `stream` channel: one classified event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamNotice {
    pub session_id: String,
    #[serde(flatten)]
    pub event: StreamEvent,
}

/// What kind of failure an [`ErrorNotice`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The agent process could not be started. No completion follows.
    Spawn,
    /// Failure text seen on stderr. The stream continues.
    Stderr,
    /// Reading a pipe or waiting on the process failed.
    Io,
}

/// Payload of the `error` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub session_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// The three broadcast channels a supervisor publishes on.
#[derive(Default)]
pub struct EventBus {
    /// One notice per classified stdout line or flagged stderr line.
    pub stream: Channel<StreamNotice>,
    /// Exactly one record per invocation that exits normally.
    pub complete: Channel<CompletionRecord>,
    /// Spawn, stderr and I/O failures.
    pub error: Channel<ErrorNotice>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every listener from every channel.
    pub fn unsubscribe_all(&self) {
        let removed = self.stream.unsubscribe_all()
            + self.complete.unsubscribe_all()
            + self.error.unsubscribe_all();
        tracing::debug!(removed, "Removed all listeners");
    }

    /// Total listeners across all channels.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.stream.listener_count() + self.complete.listener_count() + self.error.listener_count()
    }
}
