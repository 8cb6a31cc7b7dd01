//! rumqttc-backed transport.
//!
//! The `EventLoop` is owned by a driver task and is never dropped halfway
//! through a `poll`: rumqttc keeps a partially written packet in its write
//! buffer and would send those bytes again on the next flush. The session
//! loop only ever waits on the driver's event channel.
//!
//! After a connection error the driver parks until the next `connect`, so
//! the reconnect delay stays with the session loop. The session is
//! persistent (`clean_session = false`), so QoS 1 publishes that were in
//! flight when the link dropped are retransmitted by rumqttc itself.

use std::sync::Arc;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::config::LinkConfig;
use crate::transport::{Message, Transport, TransportError};

const EVENT_BUFFER: usize = 64;

type DriverEvent = Result<Event, String>;

pub struct RumqttTransport {
    client: AsyncClient,
    eventloop: Option<EventLoop>,
    events: mpsc::Receiver<DriverEvent>,
    events_tx: Option<mpsc::Sender<DriverEvent>>,
    resume: Arc<Notify>,
    driver: Option<JoinHandle<()>>,
}

impl RumqttTransport {
    pub fn new(config: &LinkConfig) -> Self {
        let mut opts = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        opts.set_keep_alive(config.keep_alive);
        opts.set_clean_session(false);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            opts.set_credentials(user.clone(), pass.clone());
        }
        let (client, eventloop) = AsyncClient::new(opts, config.request_capacity.max(1));
        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        Self {
            client,
            eventloop: Some(eventloop),
            events,
            events_tx: Some(events_tx),
            resume: Arc::new(Notify::new()),
            driver: None,
        }
    }

    /// Spawn the driver on first use; it needs a runtime, `new` does not.
    fn ensure_driver(&mut self) {
        if self.driver.is_some() {
            return;
        }
        if let (Some(eventloop), Some(tx)) = (self.eventloop.take(), self.events_tx.take()) {
            self.driver = Some(tokio::spawn(drive(eventloop, tx, self.resume.clone())));
        }
    }

    async fn next_event(&mut self) -> Result<Event, TransportError> {
        match self.events.recv().await {
            Some(Ok(event)) => Ok(event),
            Some(Err(e)) => Err(TransportError::Disconnected(e)),
            None => Err(TransportError::Disconnected("mqtt event loop task ended".into())),
        }
    }
}

/// Owns the event loop. Polls while a session is wanted, parks after an
/// error until `resume` is notified.
async fn drive(mut eventloop: EventLoop, events: mpsc::Sender<DriverEvent>, resume: Arc<Notify>) {
    loop {
        resume.notified().await;
        loop {
            match eventloop.poll().await {
                Ok(event) => {
                    if events.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    if events.send(Err(e.to_string())).await.is_err() {
                        return;
                    }
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for RumqttTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.ensure_driver();
        while self.events.try_recv().is_ok() {}
        self.resume.notify_one();

        loop {
            match self.next_event().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        tracing::debug!(session_present = ack.session_present, "mqtt.connack");
                        return Ok(());
                    }
                    return Err(TransportError::Refused(format!("{:?}", ack.code)));
                }
                Ok(_) => continue,
                Err(TransportError::Disconnected(e)) => return Err(TransportError::Refused(e)),
                Err(e) => return Err(e),
            }
        }
    }

    async fn poll(&mut self) -> Result<(), TransportError> {
        match self.next_event().await? {
            Event::Incoming(Packet::PubAck(ack)) => {
                tracing::trace!(pkid = ack.pkid, "mqtt.puback");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn publish(&mut self, msg: &Message) -> Result<(), TransportError> {
        self.client
            .try_publish(msg.topic.clone(), QoS::AtLeastOnce, false, msg.payload.clone().into_bytes())
            .map_err(|e| match e {
                rumqttc::ClientError::TryRequest(_) => TransportError::Busy,
                other => TransportError::Disconnected(other.to_string()),
            })
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.client
            .try_disconnect()
            .map_err(|e| TransportError::Disconnected(e.to_string()))?;
        // Wait until the DISCONNECT packet has been written.
        loop {
            if let Event::Outgoing(Outgoing::Disconnect) = self.next_event().await? {
                return Ok(());
            }
        }
    }
}

impl Drop for RumqttTransport {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}
