//! `MessagingClient`: offline queue + background session loop.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::LinkConfig;
use crate::transport::{Message, Transport, TransportError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("Err.Arg.Invalid: publish topic is empty")]
    EmptyTopic,
    #[error("Err.Link.Stopped: messaging client has been stopped")]
    Stopped,
}

struct Shared {
    queue: Mutex<VecDeque<Message>>,
    wake: Notify,
    state: watch::Sender<LinkState>,
}

impl Shared {
    fn pop_front(&self) -> Option<Message> {
        self.queue.lock().ok().and_then(|mut q| q.pop_front())
    }

    fn push_front(&self, msg: Message) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_front(msg);
        }
    }

    fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

pub struct MessagingClient {
    config: LinkConfig,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MessagingClient {
    pub fn new(config: LinkConfig) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            config,
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                wake: Notify::new(),
                state,
            }),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Spawn the session loop on the current tokio runtime. Returns at once;
    /// the first connection is not awaited. A second call is ignored.
    pub fn start<T: Transport>(&self, transport: T) {
        let Ok(mut task) = self.task.lock() else {
            tracing::error!("link.start: task lock poisoned");
            return;
        };
        if task.is_some() || self.cancel.is_cancelled() {
            tracing::warn!(client_id = %self.config.client_id, "link.start ignored (already started or stopped)");
            return;
        }

        let worker = LinkWorker {
            shared: self.shared.clone(),
            cancel: self.cancel.clone(),
            reconnect_delay: self.config.reconnect_delay,
            shutdown_timeout: self.config.shutdown_timeout,
        };
        tracing::info!(
            client_id = %self.config.client_id,
            host = %self.config.host,
            port = self.config.port,
            "link.start"
        );
        *task = Some(tokio::spawn(worker.run(transport)));
    }

    /// Queue a message. Never blocks on the network; the session loop sends
    /// it as soon as the link is up. Fails only on a blank topic or after
    /// `stop`.
    pub fn publish(&self, topic: &str, payload: impl Into<String>) -> Result<(), LinkError> {
        if topic.trim().is_empty() {
            return Err(LinkError::EmptyTopic);
        }
        if self.cancel.is_cancelled() {
            return Err(LinkError::Stopped);
        }

        let pending = {
            let mut q = self.shared.queue.lock().map_err(|_| LinkError::Stopped)?;
            q.push_back(Message::new(topic, payload));
            q.len()
        };
        self.shared.wake.notify_one();
        tracing::debug!(topic = %topic, pending = pending, state = %self.state(), "link.publish.queued");
        Ok(())
    }

    pub fn state(&self) -> LinkState {
        *self.shared.state.borrow()
    }

    /// Observe state transitions (connect/disconnect).
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.shared.state.subscribe()
    }

    /// Messages queued but not yet handed to the broker session.
    pub fn pending(&self) -> usize {
        self.shared.len()
    }

    /// Stop the loop and disconnect gracefully, bounded by
    /// `shutdown_timeout`. Failures are logged, not returned. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().ok().and_then(|mut t| t.take());
        let Some(handle) = handle else {
            return;
        };

        let abort = handle.abort_handle();
        let budget = self.config.shutdown_timeout + Duration::from_millis(250);
        match tokio::time::timeout(budget, handle).await {
            Ok(Ok(())) => tracing::info!(client_id = %self.config.client_id, "link.stopped"),
            Ok(Err(e)) => tracing::warn!(error = %e, "link.stop: session task failed"),
            Err(_) => {
                abort.abort();
                tracing::warn!(timeout_ms = budget.as_millis() as u64, "link.stop: timed out, task aborted");
            }
        }

        let undelivered = self.pending();
        if undelivered > 0 {
            tracing::warn!(undelivered = undelivered, "link.stop: messages left undelivered");
        }
    }
}

impl Drop for MessagingClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

enum SessionEnd {
    Stopped,
    Dropped(TransportError),
}

struct LinkWorker {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    reconnect_delay: Duration,
    shutdown_timeout: Duration,
}

impl LinkWorker {
    fn set_state(&self, state: LinkState) {
        let prev = self.shared.state.send_replace(state);
        if prev != state {
            tracing::debug!(from = %prev, to = %state, "link.state");
        }
    }

    async fn run<T: Transport>(self, mut transport: T) {
        let mut attempt: u64 = 0;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            attempt += 1;
            self.set_state(LinkState::Connecting);

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                r = transport.connect() => r,
            };

            match connected {
                Ok(()) => {
                    attempt = 0;
                    self.set_state(LinkState::Connected);
                    tracing::info!(pending = self.shared.len(), "link.connected");

                    match self.session(&mut transport).await {
                        SessionEnd::Stopped => {
                            self.shutdown(&mut transport).await;
                            break;
                        }
                        SessionEnd::Dropped(e) => {
                            self.set_state(LinkState::Connecting);
                            tracing::warn!(error = %e, pending = self.shared.len(), "link.disconnected");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        retry_in_ms = self.reconnect_delay.as_millis() as u64,
                        "link.connect_failed"
                    );
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
        self.set_state(LinkState::Disconnected);
    }

    async fn session<T: Transport>(&self, transport: &mut T) -> SessionEnd {
        loop {
            match self.flush(transport).await {
                Ok(_) | Err(TransportError::Busy) => {}
                Err(e) => return SessionEnd::Dropped(e),
            }

            // `poll` is cancel-safe, so a publish may interrupt it.
            tokio::select! {
                _ = self.cancel.cancelled() => return SessionEnd::Stopped,
                r = transport.poll() => {
                    if let Err(e) = r {
                        return SessionEnd::Dropped(e);
                    }
                }
                _ = self.shared.wake.notified() => {}
            }
        }
    }

    /// Hand queued messages to the session in FIFO order. A failed hand-off
    /// goes back to the front of the queue.
    async fn flush<T: Transport>(&self, transport: &mut T) -> Result<usize, TransportError> {
        let mut sent = 0;
        while let Some(msg) = self.shared.pop_front() {
            if let Err(e) = transport.publish(&msg).await {
                self.shared.push_front(msg);
                return Err(e);
            }
            sent += 1;
            tracing::debug!(topic = %msg.topic, "link.publish.sent");
        }
        Ok(sent)
    }

    async fn shutdown<T: Transport>(&self, transport: &mut T) {
        let graceful = async {
            if let Err(e) = self.flush(transport).await {
                tracing::warn!(error = %e, "link.shutdown: final flush failed");
            }
            transport.disconnect().await
        };
        match tokio::time::timeout(self.shutdown_timeout, graceful).await {
            Ok(Ok(())) => tracing::info!("link.disconnect"),
            Ok(Err(e)) => tracing::warn!(error = %e, "link.disconnect failed"),
            Err(_) => tracing::warn!(
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "link.disconnect timed out"
            ),
        }
    }
}
