//! Relay server configuration.

use std::time::Duration;

use amman_relay_protocol::RELAY_PORT;
use serde::{Deserialize, Serialize};

/// Configuration for a [`RelayServer`](crate::RelayServer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address both transports listen on.
    pub bind_addr: String,

    /// Largest request body the HTTP transport buffers.
    pub max_body_bytes: usize,

    /// How long open connections get to finish after shutdown starts.
    pub shutdown_grace: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{RELAY_PORT}"),
            max_body_bytes: 16 * 1024 * 1024,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}
