// Conduit - client-side dispatch for GraphQL and REST APIs
//
// This library routes requests to independently configured APIs, exposes each
// call as an operation that can be paused, resumed and cancelled, and shares
// one realtime connection per API between all of its subscriptions.

// Re-export the dispatcher and its operation types
pub use conduit_api::*;

// Re-export configuration
pub use conduit_config::{
    ApiConfiguration, ApiPluginConfiguration, AuthorizationType, ConfigError, EndpointType,
};

pub use conduit_config;

// Re-export optional transport crates
#[cfg(feature = "http-client")]
pub use conduit_http_client;

#[cfg(feature = "graphql-client")]
pub use conduit_graphql_client;

/// Prelude for the common dispatch workflow.
pub mod prelude {
    pub use conduit_api::{
        ApiDispatcher, ApiEvent, AsyncOperation, GraphQLRequest, Listener, Model, MutationType,
        OperationState, QueryPredicate, RestOptions, SubscriptionType,
    };
    pub use conduit_config::{ApiConfiguration, ApiPluginConfiguration, AuthorizationType};
}
