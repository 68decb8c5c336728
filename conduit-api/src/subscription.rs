//! Subscription multiplexing.
//!
//! Each API owns one [`SubscriptionEndpoint`]. It opens a single
//! graphql-ws connection on the first registration, routes inbound
//! messages to registrations by subscription id, and closes the connection
//! when the last registration goes away. The registration table and the
//! connection lifecycle share one lock.

use conduit_config::ApiConfiguration;
use conduit_graphql_client::{
    ClientMessage, Connection, ConnectionReceiver, ConnectionSender, Connector, GraphQLResponseError,
    RequestDocument, ServerMessage,
};
use conduit_http_client::HttpClient;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::{ApiError, Result};

/// Connection lifecycle of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// A message routed to one registration.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// One execution result, still wrapped in its `{ data, errors }` envelope.
    Next(Value),
    /// The server ended the subscription with errors.
    Error(Vec<GraphQLResponseError>),
    /// The server ended the subscription.
    Complete,
    /// The shared connection failed.
    ConnectionLost(ApiError),
}

/// Where an endpoint delivers messages for one subscription.
pub type StreamSink = mpsc::UnboundedSender<StreamMessage>;

struct Live {
    sender: ConnectionSender,
    generation: u64,
    demux: JoinHandle<()>,
}

struct Registry {
    connection: Option<Live>,
    subscriptions: HashMap<String, StreamSink>,
    generation: u64,
}

struct Shared {
    api: String,
    registry: Mutex<Registry>,
    status: parking_lot::Mutex<ConnectionStatus>,
    connections: AtomicUsize,
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock() = status;
    }

    fn teardown(&self, registry: &mut Registry) {
        if let Some(live) = registry.connection.take() {
            live.demux.abort();
            info!(api = %self.api, "Closing subscription connection");
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    async fn route(&self, generation: u64, message: ServerMessage) {
        let mut registry = self.registry.lock().await;
        if registry.connection.as_ref().map(|live| live.generation) != Some(generation) {
            return;
        }

        match message {
            ServerMessage::Next { id, payload } => match registry.subscriptions.get(&id) {
                Some(sink) => {
                    trace!(api = %self.api, subscription_id = %id, "Routing subscription item");
                    let _ = sink.send(StreamMessage::Next(payload));
                }
                None => trace!(api = %self.api, subscription_id = %id, "Dropping item for unknown subscription"),
            },
            ServerMessage::Error { id, payload } => {
                if let Some(sink) = registry.subscriptions.remove(&id) {
                    let errors = payload.iter().map(parse_error).collect();
                    let _ = sink.send(StreamMessage::Error(errors));
                }
                if registry.subscriptions.is_empty() {
                    self.teardown(&mut registry);
                }
            }
            ServerMessage::Complete { id } => {
                if let Some(sink) = registry.subscriptions.remove(&id) {
                    debug!(api = %self.api, subscription_id = %id, "Subscription completed by server");
                    let _ = sink.send(StreamMessage::Complete);
                }
                if registry.subscriptions.is_empty() {
                    self.teardown(&mut registry);
                }
            }
            other => trace!(api = %self.api, message = ?other, "Ignoring connection message"),
        }
    }

    async fn connection_lost(&self, generation: u64, error: ApiError) {
        let mut registry = self.registry.lock().await;
        if registry.connection.as_ref().map(|live| live.generation) != Some(generation) {
            return;
        }

        warn!(
            api = %self.api,
            subscriptions = registry.subscriptions.len(),
            error = %error,
            "Subscription connection lost"
        );
        registry.connection = None;
        self.set_status(ConnectionStatus::Disconnected);
        for (_, sink) in registry.subscriptions.drain() {
            let _ = sink.send(StreamMessage::ConnectionLost(error.clone()));
        }
    }
}

fn parse_error(value: &Value) -> GraphQLResponseError {
    GraphQLResponseError::deserialize(value)
        .unwrap_or_else(|_| GraphQLResponseError::new(value.to_string()))
}

async fn demultiplex(shared: Arc<Shared>, generation: u64, mut inbound: ConnectionReceiver) {
    while let Some(message) = inbound.recv().await {
        match message {
            Ok(message) => shared.route(generation, message).await,
            Err(e) => {
                shared.connection_lost(generation, e.into()).await;
                return;
            }
        }
    }
    shared
        .connection_lost(generation, ApiError::Connection("connection closed".to_string()))
        .await;
}

/// Multiplexes one API's subscriptions over at most one live connection.
pub struct SubscriptionEndpoint {
    shared: Arc<Shared>,
    url: String,
    http_endpoint: String,
    client: HttpClient,
    connector: Arc<dyn Connector>,
}

impl SubscriptionEndpoint {
    /// The connection authorizes with `client`'s interceptors.
    pub fn new(configuration: &ApiConfiguration, client: HttpClient, connector: Arc<dyn Connector>) -> Self {
        Self {
            shared: Arc::new(Shared {
                api: configuration.name.clone(),
                registry: Mutex::new(Registry {
                    connection: None,
                    subscriptions: HashMap::new(),
                    generation: 0,
                }),
                status: parking_lot::Mutex::new(ConnectionStatus::Disconnected),
                connections: AtomicUsize::new(0),
            }),
            url: configuration.subscription_url(),
            http_endpoint: configuration.endpoint.clone(),
            client,
            connector,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.lock()
    }

    /// Number of connections opened so far.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    pub async fn subscription_count(&self) -> usize {
        self.shared.registry.lock().await.subscriptions.len()
    }

    /// Register a subscription, connecting first if needed.
    ///
    /// Returns the subscription id once the `subscribe` message is queued.
    pub async fn register(&self, document: RequestDocument, sink: StreamSink) -> Result<String> {
        let mut registry = self.shared.registry.lock().await;

        if registry.connection.is_none() {
            self.shared.set_status(ConnectionStatus::Connecting);
            let connection = match self.connect().await {
                Ok(connection) => connection,
                Err(e) => {
                    warn!(api = %self.shared.api, error = %e, "Subscription handshake failed");
                    self.shared.set_status(ConnectionStatus::Disconnected);
                    return Err(e);
                }
            };

            let (sender, inbound) = connection.split();
            registry.generation += 1;
            let generation = registry.generation;
            let demux = tokio::spawn(demultiplex(self.shared.clone(), generation, inbound));
            registry.connection = Some(Live {
                sender,
                generation,
                demux,
            });
            self.shared.connections.fetch_add(1, Ordering::SeqCst);
            self.shared.set_status(ConnectionStatus::Connected);
            info!(api = %self.shared.api, url = %self.url, "Subscription connection established");
        }

        let id = Uuid::new_v4().to_string();
        let sent = registry.connection.as_ref().map(|live| {
            live.sender.send(ClientMessage::Subscribe {
                id: id.clone(),
                payload: document,
            })
        });
        if !matches!(sent, Some(Ok(()))) {
            return Err(ApiError::Connection("connection closed".to_string()));
        }

        registry.subscriptions.insert(id.clone(), sink);
        debug!(api = %self.shared.api, subscription_id = %id, "Subscription registered");
        Ok(id)
    }

    /// Remove a registration; the last one closes the connection.
    ///
    /// Returns `false` if `id` was not registered.
    pub async fn unregister(&self, id: &str) -> bool {
        let mut registry = self.shared.registry.lock().await;
        if registry.subscriptions.remove(id).is_none() {
            return false;
        }

        if let Some(live) = &registry.connection {
            let _ = live.sender.send(ClientMessage::Complete { id: id.to_string() });
        }
        debug!(api = %self.shared.api, subscription_id = %id, "Subscription unregistered");

        if registry.subscriptions.is_empty() {
            self.shared.teardown(&mut registry);
        }
        true
    }

    async fn connect(&self) -> Result<Connection> {
        let payload = self.authorization_payload().await?;
        debug!(api = %self.shared.api, url = %self.url, "Opening subscription connection");
        Ok(self.connector.connect(&self.url, payload).await?)
    }

    /// Headers the API's interceptors add to a request, as the
    /// `connection_init` payload.
    async fn authorization_payload(&self) -> Result<Option<Value>> {
        if self.client.interceptor_count() == 0 {
            return Ok(None);
        }

        let request = self.client.post(self.http_endpoint.as_str()).build()?;
        let before = request.headers().clone();
        let request = self.client.intercept(request).await?;

        // only what the interceptors set, not the client's default headers
        let headers: Map<String, Value> = request
            .headers()
            .iter()
            .filter(|(name, value)| before.get(*name) != Some(*value))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), Value::String(value.to_string())))
            })
            .collect();
        Ok(Some(Value::Object(headers)))
    }
}

impl fmt::Debug for SubscriptionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionEndpoint")
            .field("api", &self.shared.api)
            .field("url", &self.url)
            .field("status", &self.status())
            .finish()
    }
}
