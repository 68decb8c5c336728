//! # Conduit API
//!
//! Routes GraphQL and REST requests to independently configured APIs and
//! exposes each call as a controllable operation.
//!
//! ## Features
//!
//! - **Per-API clients**: one HTTP client and authorization scheme per API name
//! - **Operations**: start, pause, resume and cancel any in-flight call
//! - **Subscriptions**: many subscriptions share one graphql-ws connection per API
//! - **REST**: method-specific request validation before any I/O
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conduit_api::{ApiDispatcher, ApiEvent, GraphQLRequest, Listener};
//! use conduit_config::{ApiConfiguration, ApiPluginConfiguration};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiPluginConfiguration::new()
//!         .with_api(ApiConfiguration::new("blog", "https://api.example.com/graphql"))?;
//!     let dispatcher = ApiDispatcher::builder().build(&config)?;
//!
//!     let (listener, mut events) = Listener::channel();
//!     let _operation = dispatcher.query::<serde_json::Value>(
//!         "blog",
//!         GraphQLRequest::single("query { listPosts { items { id } } }"),
//!         listener,
//!     );
//!
//!     if let Some(ApiEvent::Response(response)) = events.recv().await {
//!         println!("{:?}", response.data);
//!     }
//!     Ok(())
//! }
//! ```

mod auth;
mod dispatcher;
mod error;
mod graphql;
mod listener;
mod model;
mod operation;
mod registry;
mod rest;
mod subscription;

pub use auth::ApiAuthProviders;
pub use dispatcher::{ApiDispatcher, ApiDispatcherBuilder, GraphQLListener};
pub use error::{ApiError, Result};
pub use graphql::{GraphQLRequest, ResponseShape};
pub use listener::{ApiEvent, Listener};
pub use model::{Comparison, Model, MutationType, QueryPredicate, RequestFactory, SubscriptionType};
pub use operation::{AsyncOperation, GraphQLOperation, OperationState, RestOperation};
pub use registry::{ClientDetails, ClientRegistry};
pub use rest::{HttpMethod, RestOptions, RestRequest, RestResponse};
pub use subscription::{ConnectionStatus, StreamMessage, StreamSink, SubscriptionEndpoint};

// Re-export the wire types callers see in events
pub use conduit_graphql_client::{GraphQLResponse, GraphQLResponseError, RequestDocument};
