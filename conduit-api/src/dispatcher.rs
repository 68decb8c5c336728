//! The public dispatch surface.

use conduit_config::ApiPluginConfiguration;
use conduit_graphql_client::{Connector, GraphQLResponse, WebSocketConnector};
use conduit_http_client::{HttpClient, HttpClientConfig};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::auth::ApiAuthProviders;
use crate::graphql::{GraphQLRequest, ResponseShape};
use crate::model::{Model, MutationType, QueryPredicate, RequestFactory, SubscriptionType};
use crate::operation::{AsyncOperation, GraphQLOperation, RestOperation};
use crate::registry::{ClientDetails, ClientRegistry};
use crate::rest::{HttpMethod, RestOptions, RestRequest, RestResponse};
use crate::subscription::SubscriptionEndpoint;
use crate::{ApiError, ApiEvent, Listener, Result};

/// Listener type for GraphQL operations returning `R`.
pub type GraphQLListener<R> = Listener<GraphQLResponse<R>>;

/// Builder for [`ApiDispatcher`].
#[derive(Default)]
pub struct ApiDispatcherBuilder {
    auth_providers: ApiAuthProviders,
    connector: Option<Arc<dyn Connector>>,
    http_config: Option<HttpClientConfig>,
    runtime: Option<Handle>,
}

impl ApiDispatcherBuilder {
    pub fn auth_providers(mut self, providers: ApiAuthProviders) -> Self {
        self.auth_providers = providers;
        self
    }

    /// Replace the graphql-ws connector used for subscriptions.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Settings shared by every API's HTTP client.
    pub fn http_config(mut self, config: HttpClientConfig) -> Self {
        self.http_config = Some(config);
        self
    }

    /// Runtime that operation workers are spawned on.
    ///
    /// Defaults to the runtime `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Create one client and one subscription endpoint per configured API.
    pub fn build(self, config: &ApiPluginConfiguration) -> Result<ApiDispatcher> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| {
                ApiError::configuration(
                    "No Tokio runtime available for operation workers",
                    "Build the dispatcher inside a Tokio runtime or pass one with runtime()",
                )
            })?,
        };
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::default()));
        let http_config = self.http_config.unwrap_or_default();

        let mut registry = ClientRegistry::new();
        for api in config.apis() {
            let mut client = HttpClient::new(http_config.clone()).map_err(|e| {
                ApiError::configuration(
                    format!("Failed to create HTTP client for API {}: {}", api.name, e),
                    "Check the HTTP client settings",
                )
            })?;
            if let Some(interceptor) = self.auth_providers.interceptor_for(api)? {
                client = client.with_interceptor(interceptor);
            }

            let endpoint = Arc::new(SubscriptionEndpoint::new(api, client.clone(), connector.clone()));
            registry.register(ClientDetails::new(api.clone(), client, endpoint))?;

            debug!(
                api = %api.name,
                endpoint = %api.endpoint,
                authorization = %api.authorization_type,
                "Registered API client"
            );
        }

        info!(apis = registry.len(), "API dispatcher configured");
        Ok(ApiDispatcher { registry, runtime })
    }
}

/// Routes requests to configured APIs and starts their operations.
///
/// GraphQL calls report setup problems through the listener and return
/// `None`; REST calls return them as `Err`.
#[derive(Debug)]
pub struct ApiDispatcher {
    registry: ClientRegistry,
    runtime: Handle,
}

impl ApiDispatcher {
    pub fn builder() -> ApiDispatcherBuilder {
        ApiDispatcherBuilder::default()
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Handles to every API's HTTP client, keyed by API name.
    pub fn escape_hatch(&self) -> HashMap<String, HttpClient> {
        self.registry
            .iter()
            .map(|(name, details)| (name.to_string(), details.client().clone()))
            .collect()
    }

    /// Fetch one model by id.
    pub fn query_model<M: Model>(
        &self,
        api: &str,
        id: &str,
        listener: GraphQLListener<M>,
    ) -> Option<GraphQLOperation<M>> {
        let details = self.resolve_or_notify(api, &listener)?;
        let request = notify_err(RequestFactory::build_query::<M>(id), &listener)?;
        Some(self.launch(details, request, listener))
    }

    /// Fetch the models matching `predicate`.
    pub fn list_models<M: Model>(
        &self,
        api: &str,
        predicate: Option<&QueryPredicate>,
        listener: GraphQLListener<Vec<M>>,
    ) -> Option<GraphQLOperation<Vec<M>>> {
        let details = self.resolve_or_notify(api, &listener)?;
        let request = notify_err(RequestFactory::build_list_query::<M>(predicate), &listener)?;
        Some(self.launch(details, request, listener))
    }

    /// Run a caller-built query returning a single item or a collection.
    pub fn query<R>(
        &self,
        api: &str,
        request: GraphQLRequest<R>,
        listener: GraphQLListener<R>,
    ) -> Option<GraphQLOperation<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let details = self.resolve_or_notify(api, &listener)?;
        notify_err(expect_shape(&request, &[ResponseShape::Single, ResponseShape::Array]), &listener)?;
        Some(self.launch(details, request, listener))
    }

    /// Create, update or delete a model.
    pub fn mutate_model<M: Model>(
        &self,
        api: &str,
        model: &M,
        predicate: Option<&QueryPredicate>,
        mutation: MutationType,
        listener: GraphQLListener<M>,
    ) -> Option<GraphQLOperation<M>> {
        let details = self.resolve_or_notify(api, &listener)?;
        let request = notify_err(
            RequestFactory::build_mutation(model, predicate, mutation),
            &listener,
        )?;
        Some(self.launch(details, request, listener))
    }

    /// Run a caller-built mutation.
    pub fn mutate<R>(
        &self,
        api: &str,
        request: GraphQLRequest<R>,
        listener: GraphQLListener<R>,
    ) -> Option<GraphQLOperation<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let details = self.resolve_or_notify(api, &listener)?;
        notify_err(expect_shape(&request, &[ResponseShape::Single, ResponseShape::Array]), &listener)?;
        Some(self.launch(details, request, listener))
    }

    /// Subscribe to model changes.
    pub fn subscribe_model<M: Model>(
        &self,
        api: &str,
        subscription: SubscriptionType,
        listener: GraphQLListener<M>,
    ) -> Option<GraphQLOperation<M>> {
        let details = self.resolve_or_notify(api, &listener)?;
        let request = notify_err(RequestFactory::build_subscription::<M>(subscription), &listener)?;
        Some(self.launch(details, request, listener))
    }

    /// Run a caller-built subscription.
    pub fn subscribe<R>(
        &self,
        api: &str,
        request: GraphQLRequest<R>,
        listener: GraphQLListener<R>,
    ) -> Option<GraphQLOperation<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let details = self.resolve_or_notify(api, &listener)?;
        notify_err(expect_shape(&request, &[ResponseShape::Stream]), &listener)?;
        Some(self.launch(details, request, listener))
    }

    pub fn get(&self, api: &str, options: RestOptions, listener: Listener<RestResponse>) -> Result<RestOperation> {
        self.rest(api, HttpMethod::Get, options, listener)
    }

    pub fn put(&self, api: &str, options: RestOptions, listener: Listener<RestResponse>) -> Result<RestOperation> {
        self.rest(api, HttpMethod::Put, options, listener)
    }

    pub fn post(&self, api: &str, options: RestOptions, listener: Listener<RestResponse>) -> Result<RestOperation> {
        self.rest(api, HttpMethod::Post, options, listener)
    }

    pub fn delete(&self, api: &str, options: RestOptions, listener: Listener<RestResponse>) -> Result<RestOperation> {
        self.rest(api, HttpMethod::Delete, options, listener)
    }

    pub fn head(&self, api: &str, options: RestOptions, listener: Listener<RestResponse>) -> Result<RestOperation> {
        self.rest(api, HttpMethod::Head, options, listener)
    }

    pub fn patch(&self, api: &str, options: RestOptions, listener: Listener<RestResponse>) -> Result<RestOperation> {
        self.rest(api, HttpMethod::Patch, options, listener)
    }

    /// Validate and start a REST call.
    ///
    /// Unknown APIs and invalid request shapes fail here, before any I/O.
    pub fn rest(
        &self,
        api: &str,
        method: HttpMethod,
        options: RestOptions,
        listener: Listener<RestResponse>,
    ) -> Result<RestOperation> {
        let details = self.registry.resolve(api)?.clone();
        let request = RestRequest::new(method, options)?;

        let operation = RestOperation::new(details, request, listener, self.runtime.clone());
        operation.start();
        Ok(operation)
    }

    fn resolve_or_notify<T>(&self, api: &str, listener: &Listener<T>) -> Option<Arc<ClientDetails>> {
        notify_err(self.registry.resolve(api).cloned(), listener)
    }

    fn launch<R>(
        &self,
        details: Arc<ClientDetails>,
        request: GraphQLRequest<R>,
        listener: GraphQLListener<R>,
    ) -> GraphQLOperation<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let runtime = self.runtime.clone();
        let operation = match request.shape() {
            ResponseShape::Stream => GraphQLOperation::stream(details, request, listener, runtime),
            ResponseShape::Single | ResponseShape::Array => {
                GraphQLOperation::single_response(details, request, listener, runtime)
            }
        };
        operation.start();
        operation
    }
}

/// Report `result`'s error to the listener.
fn notify_err<T, L>(result: Result<T>, listener: &Listener<L>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            listener.notify(ApiEvent::Failed(e));
            None
        }
    }
}

fn expect_shape<R>(request: &GraphQLRequest<R>, allowed: &[ResponseShape]) -> Result<()> {
    if allowed.contains(&request.shape()) {
        Ok(())
    } else {
        Err(ApiError::RequestShape(format!(
            "{:?} response shape is not valid for this operation",
            request.shape()
        )))
    }
}
