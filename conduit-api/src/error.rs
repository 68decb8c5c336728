//! Dispatch error types.

use conduit_config::ConfigError;
use conduit_graphql_client::{GraphQLError, GraphQLResponseError};
use conduit_http_client::HttpClientError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by the dispatcher and its operations.
///
/// Cloneable so one connection failure can be reported to every
/// subscription sharing the connection.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Missing or invalid configuration, including an unknown API name.
    #[error("{message}")]
    Configuration {
        message: String,
        recovery_suggestion: String,
    },

    /// The request cannot be built or is not valid for its method.
    #[error("{0}")]
    RequestShape(String),

    /// Network failure while executing a request.
    #[error("Transport error: {0}")]
    Transport(Arc<HttpClientError>),

    /// Non-2xx HTTP response.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Subscription connection could not be established or was lost.
    #[error("Subscription connection error: {0}")]
    Connection(String),

    /// Malformed payload or undecodable item.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation-level errors reported by the GraphQL service.
    #[error("GraphQL error: {}", format_errors(.0))]
    GraphQL(Vec<GraphQLResponseError>),
}

fn format_errors(errors: &[GraphQLResponseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    pub fn configuration(message: impl Into<String>, recovery_suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            recovery_suggestion: recovery_suggestion.into(),
        }
    }

    /// Error for an API name with no registered client.
    pub fn missing_api(name: &str) -> Self {
        Self::configuration(
            format!("No client information for API named {}", name),
            format!(
                "Check your API configuration to make sure there is a correctly configured section for {}",
                name
            ),
        )
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_request_shape(&self) -> bool {
        matches!(self, Self::RequestShape(_))
    }

    /// Transport-class failures: network, non-2xx status, lost connection.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http { .. } | Self::Connection(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// The request timed out before a response arrived.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// The API's host could not be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connection())
    }

    /// Suggestion for fixing a configuration error.
    pub fn recovery_suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration {
                recovery_suggestion,
                ..
            } => Some(recovery_suggestion),
            _ => None,
        }
    }

    /// HTTP status, for status errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status_code(),
            _ => None,
        }
    }
}

impl From<HttpClientError> for ApiError {
    fn from(err: HttpClientError) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(
            err.to_string(),
            "Fix the API configuration and try again",
        )
    }
}

impl From<GraphQLError> for ApiError {
    fn from(err: GraphQLError) -> Self {
        match err {
            GraphQLError::Json(e) => Self::Protocol(e.to_string()),
            other => Self::Connection(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
