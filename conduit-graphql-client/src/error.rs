//! GraphQL client error types.

use thiserror::Error;

/// Result type for GraphQL client operations.
pub type Result<T> = std::result::Result<T, GraphQLError>;

/// GraphQL client errors.
#[derive(Debug, Error)]
pub enum GraphQLError {
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The server did not complete the graphql-ws handshake.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Timeout while connecting or waiting for `connection_ack`.
    #[error("Connection timed out")]
    Timeout,

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The connection is closed.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl GraphQLError {
    /// Check if this is a network-level error.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::WebSocket(_) | Self::ConnectionClosed | Self::Timeout)
    }

    /// Check if the handshake was rejected or never finished.
    pub fn is_handshake_error(&self) -> bool {
        matches!(self, Self::Handshake(_) | Self::Timeout)
    }
}
