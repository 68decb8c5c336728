//! # Conduit GraphQL Client
//!
//! GraphQL wire types and graphql-ws subscription connections.
//!
//! ## Features
//!
//! - **Request documents**: query text, operation name and variables
//! - **Responses**: data with field-level errors kept side by side
//! - **Subscriptions**: `graphql-transport-ws` connections over tokio-tungstenite
//!
//! ## Subscriptions
//!
//! ```rust,ignore
//! use conduit_graphql_client::{ClientMessage, Connector, RequestDocument, WebSocketConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = WebSocketConnector::default();
//!     let mut connection = connector.connect("wss://api.example.com/graphql", None).await?;
//!
//!     connection.send(ClientMessage::Subscribe {
//!         id: "1".into(),
//!         payload: RequestDocument::new("subscription { onCreatePost { id title } }"),
//!     })?;
//!
//!     while let Some(message) = connection.recv().await {
//!         println!("Received: {:?}", message?);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod error;
mod protocol;
mod request;
mod response;

pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionReceiver, ConnectionSender, Connector, WebSocketConnector};
pub use error::{GraphQLError, Result};
pub use protocol::{ClientMessage, GRAPHQL_TRANSPORT_WS, ServerMessage};
pub use request::RequestDocument;
pub use response::{ErrorLocation, GraphQLResponse, GraphQLResponseError, PathSegment, format_path};

