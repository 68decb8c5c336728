#![allow(dead_code)]

use async_trait::async_trait;
use conduit_api::{ApiEvent, Model};
use conduit_graphql_client::{
    ClientMessage, Connection, Connector, GraphQLError, RequestDocument, ServerMessage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
}

impl Model for Post {
    fn model_name() -> &'static str {
        "Post"
    }

    fn fields() -> &'static [&'static str] {
        &["id", "title"]
    }

    fn id(&self) -> &str {
        &self.id
    }
}

pub async fn next_event<T>(events: &mut mpsc::UnboundedReceiver<ApiEvent<T>>) -> ApiEvent<T> {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("listener dropped")
}

/// Wait until `condition` holds, polling.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

/// Server side of one in-memory connection.
pub struct FakeServer {
    pub url: String,
    pub init_payload: Option<Value>,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    inbound: mpsc::UnboundedSender<conduit_graphql_client::Result<ServerMessage>>,
}

impl FakeServer {
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .expect("timed out waiting for client message")
    }

    pub async fn next_subscribe(&mut self) -> (String, RequestDocument) {
        match self.recv().await {
            Some(ClientMessage::Subscribe { id, payload }) => (id, payload),
            other => panic!("expected subscribe, got {:?}", other),
        }
    }

    pub async fn expect_complete(&mut self) -> String {
        match self.recv().await {
            Some(ClientMessage::Complete { id }) => id,
            other => panic!("expected complete, got {:?}", other),
        }
    }

    /// Wait for the client to drop the connection.
    pub async fn closed(&mut self) {
        while self.recv().await.is_some() {}
    }

    pub fn next(&self, id: &str, data: Value) {
        let _ = self.inbound.send(Ok(ServerMessage::Next {
            id: id.to_string(),
            payload: json!({ "data": data }),
        }));
    }

    pub fn error(&self, id: &str, message: &str) {
        let _ = self.inbound.send(Ok(ServerMessage::Error {
            id: id.to_string(),
            payload: vec![json!({ "message": message })],
        }));
    }

    pub fn complete(&self, id: &str) {
        let _ = self.inbound.send(Ok(ServerMessage::Complete { id: id.to_string() }));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self
            .inbound
            .send(Err(GraphQLError::WebSocket(reason.to_string())));
    }
}

/// Connector handing the server side of each connection to the test.
pub struct FakeConnector {
    servers: mpsc::UnboundedSender<FakeServer>,
    reject: AtomicBool,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                servers,
                reject: AtomicBool::new(false),
            }),
            rx,
        )
    }

    /// Make handshakes fail until reset.
    pub fn reject_handshakes(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        url: &str,
        init_payload: Option<Value>,
    ) -> conduit_graphql_client::Result<Connection> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(GraphQLError::Handshake("connection_init rejected".to_string()));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let _ = self.servers.send(FakeServer {
            url: url.to_string(),
            init_payload,
            outbound: outbound_rx,
            inbound: inbound_tx,
        });
        Ok(Connection::new(outbound_tx, inbound_rx))
    }
}

pub async fn next_server(servers: &mut mpsc::UnboundedReceiver<FakeServer>) -> FakeServer {
    tokio::time::timeout(WAIT, servers.recv())
        .await
        .expect("timed out waiting for connection")
        .expect("connector dropped")
}
