//! Client configuration.

use std::time::Duration;

use amman_relay_protocol::RELAY_PORT;
use serde::{Deserialize, Serialize};

/// Deadline for ordinary requests.
pub const RELAY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Deadline for requests that restart or stop the validator.
pub const RELAY_LIFECYCLE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Deadline for acknowledgements of fire-and-forget requests.
pub const RELAY_ACK_TIMEOUT: Duration = Duration::from_millis(2000);

/// Configuration for a relay client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the relay.
    pub url: String,

    /// Wait for the relay to acknowledge fire-and-forget requests.
    /// When `false` they resolve as soon as the message is written.
    pub ack: bool,

    /// Deadline for ordinary requests.
    pub timeout: Duration,

    /// Deadline for restart, kill, load-snapshot and set-account.
    pub lifecycle_timeout: Duration,

    /// Deadline for acknowledgements.
    pub ack_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: format!("ws://127.0.0.1:{RELAY_PORT}"),
            ack: false,
            timeout: RELAY_TIMEOUT,
            lifecycle_timeout: RELAY_LIFECYCLE_TIMEOUT,
            ack_timeout: RELAY_ACK_TIMEOUT,
        }
    }
}
