use std::time::Duration;

/// Broker connection settings. Transport details live here, not in callers.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    /// Fixed pause between reconnect attempts. No backoff, no cap.
    pub reconnect_delay: Duration,
    /// Upper bound on the graceful disconnect during `stop`.
    pub shutdown_timeout: Duration,
    /// Capacity of the rumqttc request channel.
    pub request_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "control-panel".into(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
            request_capacity: 64,
        }
    }
}

impl LinkConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}
