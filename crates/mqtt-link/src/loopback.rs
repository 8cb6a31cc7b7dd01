//! In-memory transport. Backs the simulated messaging binding and the tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::transport::{Message, Transport, TransportError};

pub struct LoopbackTransport {
    online: watch::Receiver<bool>,
    delivered: Arc<Mutex<Vec<Message>>>,
    connects: Arc<AtomicUsize>,
}

/// Test-side control of a [`LoopbackTransport`].
#[derive(Clone)]
pub struct LoopbackHandle {
    online: Arc<watch::Sender<bool>>,
    delivered: Arc<Mutex<Vec<Message>>>,
    connects: Arc<AtomicUsize>,
}

impl LoopbackTransport {
    pub fn new(online: bool) -> (Self, LoopbackHandle) {
        let (tx, rx) = watch::channel(online);
        let delivered = Arc::new(Mutex::new(vec![]));
        let connects = Arc::new(AtomicUsize::new(0));
        (
            Self {
                online: rx,
                delivered: delivered.clone(),
                connects: connects.clone(),
            },
            LoopbackHandle {
                online: Arc::new(tx),
                delivered,
                connects,
            },
        )
    }

    fn is_online(&self) -> bool {
        *self.online.borrow()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.is_online() {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(TransportError::Refused("loopback offline".into()))
        }
    }

    async fn poll(&mut self) -> Result<(), TransportError> {
        let went_offline = self.online.wait_for(|on| !*on).await.is_ok();
        if went_offline {
            return Err(TransportError::Disconnected("loopback dropped".into()));
        }
        // Handle gone: nobody can take the link down any more.
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn publish(&mut self, msg: &Message) -> Result<(), TransportError> {
        if !self.is_online() {
            return Err(TransportError::Disconnected("loopback offline".into()));
        }
        self.delivered
            .lock()
            .map_err(|_| TransportError::Disconnected("loopback poisoned".into()))?
            .push(msg.clone());
        tracing::debug!(topic = %msg.topic, payload = %msg.payload, "loopback.publish");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl LoopbackHandle {
    pub fn set_online(&self, online: bool) {
        self.online.send_replace(online);
    }

    /// Messages the "broker" has received, in arrival order.
    pub fn delivered(&self) -> Vec<Message> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Successful `connect` calls so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}
