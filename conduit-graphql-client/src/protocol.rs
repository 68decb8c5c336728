//! graphql-ws (`graphql-transport-ws`) protocol messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RequestDocument;

/// Websocket sub-protocol negotiated during the upgrade.
pub const GRAPHQL_TRANSPORT_WS: &str = "graphql-transport-ws";

/// Client to server message types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Initialize connection.
    #[serde(rename = "connection_init")]
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Start a subscription.
    #[serde(rename = "subscribe")]
    Subscribe {
        id: String,
        payload: RequestDocument,
    },
    /// Stop a subscription.
    #[serde(rename = "complete")]
    Complete { id: String },
    #[serde(rename = "ping")]
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    #[serde(rename = "pong")]
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

/// Server to client message types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connection_ack")]
    ConnectionAck {
        #[serde(default)]
        payload: Option<Value>,
    },
    /// One execution result for a subscription.
    #[serde(rename = "next")]
    Next { id: String, payload: Value },
    /// Operation-level errors; the subscription is over.
    #[serde(rename = "error")]
    Error { id: String, payload: Vec<Value> },
    /// The server finished the subscription.
    #[serde(rename = "complete")]
    Complete { id: String },
    #[serde(rename = "ping")]
    Ping {
        #[serde(default)]
        payload: Option<Value>,
    },
    #[serde(rename = "pong")]
    Pong {
        #[serde(default)]
        payload: Option<Value>,
    },
}

impl ServerMessage {
    /// Subscription id the message is addressed to, if any.
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            Self::Next { id, .. } | Self::Error { id, .. } | Self::Complete { id } => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_wire_format() {
        let message = ClientMessage::Subscribe {
            id: "1".into(),
            payload: RequestDocument::new("subscription { onCreatePost { id } }"),
        };

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "subscribe",
                "id": "1",
                "payload": { "query": "subscription { onCreatePost { id } }" }
            })
        );
    }

    #[test]
    fn test_server_message_parsing() {
        let message: ServerMessage = serde_json::from_str(
            r#"{"type":"next","id":"abc","payload":{"data":{"onCreatePost":{"id":"1"}}}}"#,
        )
        .unwrap();
        assert_eq!(message.subscription_id(), Some("abc"));

        let ack: ServerMessage = serde_json::from_str(r#"{"type":"connection_ack"}"#).unwrap();
        assert_eq!(ack, ServerMessage::ConnectionAck { payload: None });
        assert_eq!(ack.subscription_id(), None);
    }
}
