//! Per-API client registry.

use conduit_config::ApiConfiguration;
use conduit_http_client::HttpClient;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::subscription::SubscriptionEndpoint;
use crate::{ApiError, Result};

/// Everything needed to talk to one configured API.
#[derive(Debug)]
pub struct ClientDetails {
    configuration: Arc<ApiConfiguration>,
    client: HttpClient,
    subscription_endpoint: Arc<SubscriptionEndpoint>,
}

impl ClientDetails {
    pub fn new(
        configuration: ApiConfiguration,
        client: HttpClient,
        subscription_endpoint: Arc<SubscriptionEndpoint>,
    ) -> Self {
        Self {
            configuration: Arc::new(configuration),
            client,
            subscription_endpoint,
        }
    }

    pub fn configuration(&self) -> &ApiConfiguration {
        &self.configuration
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn subscription_endpoint(&self) -> &Arc<SubscriptionEndpoint> {
        &self.subscription_endpoint
    }
}

/// API name to client mapping.
///
/// Filled once while the dispatcher is built and only read afterwards.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<String, Arc<ClientDetails>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an API. Each name may be registered once.
    pub fn register(&mut self, details: ClientDetails) -> Result<()> {
        let name = details.configuration().name.clone();
        if self.clients.contains_key(&name) {
            return Err(ApiError::configuration(
                format!("API named {} is already registered", name),
                "Give every API section a unique name",
            ));
        }
        self.clients.insert(name, Arc::new(details));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Arc<ClientDetails>> {
        self.clients.get(name).ok_or_else(|| ApiError::missing_api(name))
    }

    /// Registered API names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ClientDetails>)> {
        self.clients.iter().map(|(name, details)| (name.as_str(), details))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
