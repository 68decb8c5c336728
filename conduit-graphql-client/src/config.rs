//! Subscription connection configuration.

use std::time::Duration;

use crate::protocol::GRAPHQL_TRANSPORT_WS;

/// Settings for [`WebSocketConnector`](crate::WebSocketConnector).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for the websocket upgrade.
    pub connect_timeout: Duration,
    /// How long to wait for `connection_ack` after `connection_init`.
    pub ack_timeout: Duration,
    /// Sub-protocol requested during the upgrade.
    pub subprotocol: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            ack_timeout: Duration::from_secs(10),
            subprotocol: GRAPHQL_TRANSPORT_WS.to_string(),
        }
    }
}

impl ConnectionConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = subprotocol.into();
        self
    }
}
