//! Broker transport seam.

use async_trait::async_trait;

/// One outbound publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    /// The session is gone; the client must reconnect.
    #[error("Err.IO.Transport: link down: {0}")]
    Disconnected(String),
    /// The broker refused the session.
    #[error("Err.IO.Transport: connection refused: {0}")]
    Refused(String),
    /// Local hand-off buffer full; retry after driving the session.
    #[error("Err.IO.Transport: request buffer full")]
    Busy,
}

/// A broker session the client loop drives.
///
/// The loop calls `connect` until it succeeds, then alternates `poll` (which
/// must return `Err` when the session drops) with `publish` hand-offs.
///
/// `poll` and `connect` are raced against new publishes and shutdown, so
/// both must be cancel-safe: dropping an unfinished call loses no I/O and
/// leaves no half-written packet behind.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Establish a session; returns once the broker accepted it.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Wait for the next session event (acks, keep-alive). Cancel-safe.
    async fn poll(&mut self) -> Result<(), TransportError>;

    /// Hand a message to the session with at-least-once delivery.
    async fn publish(&mut self, msg: &Message) -> Result<(), TransportError>;

    /// Close the session politely.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
