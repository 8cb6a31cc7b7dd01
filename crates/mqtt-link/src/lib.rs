//! Resilient publish-side MQTT link.
//!
//! `MessagingClient` owns an outbound FIFO queue and a background task that
//! keeps a broker session alive: `Disconnected → Connecting → Connected`,
//! back to `Connecting` on any transport drop, forever, with a fixed delay
//! between attempts. `publish` never blocks and never fails because the link
//! is down; the message waits in the queue until the session is back.
//!
//! The broker side is behind the [`Transport`] trait:
//! - [`RumqttTransport`]: rumqttc session, QoS 1 (at-least-once).
//! - [`LoopbackTransport`]: in-memory, switchable online/offline.

pub mod client;
pub mod config;
pub mod loopback;
pub mod rumqtt;
pub mod transport;

pub use client::{LinkError, LinkState, MessagingClient};
pub use config::LinkConfig;
pub use loopback::{LoopbackHandle, LoopbackTransport};
pub use rumqtt::RumqttTransport;
pub use transport::{Message, Transport, TransportError};
