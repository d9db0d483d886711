use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one [`crate::NotificationSocket`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketConfig {
    /// Interval between keepalive frames while the socket is open
    pub heartbeat_interval: Duration,

    /// Upper bound on one connection handshake; a timeout counts as a failed attempt
    pub connect_timeout: Duration,

    /// Fixed wait before each reconnect attempt
    pub reconnect_delay: Duration,

    /// Consecutive failed attempts before the socket gives up
    pub max_reconnect_attempts: u32,

    /// Literal text frame sent as keepalive
    pub keepalive_token: String,

    /// Notification type the server uses to acknowledge keepalives
    pub ack_kind: String,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
            keepalive_token: "ping".to_string(),
            ack_kind: ragchat_types::KEEPALIVE_ACK.to_string(),
        }
    }
}

impl SocketConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_keepalive_token(mut self, token: impl Into<String>) -> Self {
        self.keepalive_token = token.into();
        self
    }

    pub fn with_ack_kind(mut self, kind: impl Into<String>) -> Self {
        self.ack_kind = kind.into();
        self
    }
}
