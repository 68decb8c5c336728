//! Subscription connections.
//!
//! A [`Connection`] is a pair of channels: protocol messages go out through an
//! unbounded sender and server messages come back through a receiver. The
//! [`Connector`] trait produces connections that have already completed the
//! `connection_init`/`connection_ack` handshake, so callers only deal with
//! `subscribe`, `next`, `error` and `complete`.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{GraphQLError, Result};
use crate::protocol::{ClientMessage, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Sending half of a [`Connection`].
pub type ConnectionSender = mpsc::UnboundedSender<ClientMessage>;

/// Receiving half of a [`Connection`].
///
/// Yields `Err` once if the transport fails, then `None`.
pub type ConnectionReceiver = mpsc::UnboundedReceiver<Result<ServerMessage>>;

/// An acknowledged subscription connection.
#[derive(Debug)]
pub struct Connection {
    outbound: ConnectionSender,
    inbound: ConnectionReceiver,
}

impl Connection {
    pub fn new(outbound: ConnectionSender, inbound: ConnectionReceiver) -> Self {
        Self { outbound, inbound }
    }

    /// Queue a message for the server.
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| GraphQLError::ConnectionClosed)
    }

    /// Receive the next server message. `None` means the connection is gone.
    pub async fn recv(&mut self) -> Option<Result<ServerMessage>> {
        self.inbound.recv().await
    }

    /// Split into independently owned halves.
    ///
    /// Dropping every sender closes the underlying socket.
    pub fn split(self) -> (ConnectionSender, ConnectionReceiver) {
        (self.outbound, self.inbound)
    }
}

/// Opens subscription connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `url` and complete the handshake, sending `init_payload`
    /// with `connection_init`.
    async fn connect(&self, url: &str, init_payload: Option<Value>) -> Result<Connection>;
}

/// [`Connector`] speaking graphql-ws over tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: ConnectionConfig,
}

impl WebSocketConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str, init_payload: Option<Value>) -> Result<Connection> {
        let mut request = url
            .into_client_request()
            .map_err(|e| GraphQLError::InvalidUrl(e.to_string()))?;
        let subprotocol = HeaderValue::from_str(&self.config.subprotocol)
            .map_err(|e| GraphQLError::Handshake(e.to_string()))?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, subprotocol);

        debug!(url = %url, "Opening subscription connection");

        let (ws_stream, _response) =
            tokio::time::timeout(self.config.connect_timeout, connect_async(request))
                .await
                .map_err(|_| GraphQLError::Timeout)?
                .map_err(|e| GraphQLError::WebSocket(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        send_message(&mut write, &ClientMessage::ConnectionInit {
            payload: init_payload,
        })
        .await?;

        tokio::time::timeout(
            self.config.ack_timeout,
            await_ack(&mut write, &mut read),
        )
        .await
        .map_err(|_| GraphQLError::Timeout)??;

        debug!(url = %url, "Subscription connection acknowledged");

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        tokio::spawn(writer_task(write, outgoing_rx));
        tokio::spawn(reader_task(read, incoming_tx, outgoing_tx.downgrade()));

        Ok(Connection::new(outgoing_tx, incoming_rx))
    }
}

async fn send_message(write: &mut SplitSink<WsStream, Message>, message: &ClientMessage) -> Result<()> {
    let text = serde_json::to_string(message)?;
    write
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| GraphQLError::WebSocket(e.to_string()))
}

fn parse_frame(frame: &Message) -> Option<serde_json::Result<ServerMessage>> {
    match frame {
        Message::Text(text) => Some(serde_json::from_str(text.as_str())),
        Message::Binary(data) => Some(serde_json::from_slice(data)),
        _ => None,
    }
}

/// Wait for `connection_ack`, answering pings in the meantime.
async fn await_ack(
    write: &mut SplitSink<WsStream, Message>,
    read: &mut SplitStream<WsStream>,
) -> Result<()> {
    while let Some(frame) = read.next().await {
        let frame = frame.map_err(|e| GraphQLError::WebSocket(e.to_string()))?;
        if let Message::Close(close) = &frame {
            let reason = close
                .as_ref()
                .map(|c| c.reason.to_string())
                .unwrap_or_default();
            return Err(GraphQLError::Handshake(format!(
                "closed before connection_ack: {}",
                reason
            )));
        }
        match parse_frame(&frame) {
            Some(Ok(ServerMessage::ConnectionAck { .. })) => return Ok(()),
            Some(Ok(ServerMessage::Ping { payload })) => {
                send_message(write, &ClientMessage::Pong { payload }).await?;
            }
            Some(Ok(other)) => {
                return Err(GraphQLError::Handshake(format!(
                    "unexpected message before connection_ack: {:?}",
                    other
                )));
            }
            Some(Err(e)) => return Err(GraphQLError::Handshake(e.to_string())),
            None => {}
        }
    }
    Err(GraphQLError::ConnectionClosed)
}

async fn writer_task(
    mut write: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<ClientMessage>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = send_message(&mut write, &message).await {
            warn!(error = %e, "Subscription connection write failed");
            break;
        }
    }

    let _ = write.close().await;
}

async fn reader_task(
    mut read: SplitStream<WsStream>,
    tx: mpsc::UnboundedSender<Result<ServerMessage>>,
    pong: mpsc::WeakUnboundedSender<ClientMessage>,
) {
    while let Some(frame) = read.next().await {
        let frame = match frame {
            Ok(Message::Close(_)) => break,
            Ok(frame) => frame,
            Err(e) => {
                let _ = tx.send(Err(GraphQLError::WebSocket(e.to_string())));
                break;
            }
        };

        match parse_frame(&frame) {
            Some(Ok(ServerMessage::Ping { payload })) => {
                if let Some(out) = pong.upgrade() {
                    let _ = out.send(ClientMessage::Pong { payload });
                }
            }
            Some(Ok(ServerMessage::Pong { .. })) => {}
            Some(Ok(message)) => {
                trace!(?message, "Subscription message received");
                if tx.send(Ok(message)).is_err() {
                    break;
                }
            }
            Some(Err(e)) => warn!(error = %e, "Ignoring unparsable subscription frame"),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestDocument;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    async fn send_server_message(stream: &mut WebSocketStream<TcpStream>, message: Value) {
        stream
            .send(Message::Text(message.to_string().into()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_connection() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let mut connection = Connection::new(out_tx, in_rx);

        connection
            .send(ClientMessage::Complete { id: "1".into() })
            .unwrap();
        assert_eq!(
            out_rx.recv().await,
            Some(ClientMessage::Complete { id: "1".into() })
        );

        in_tx.send(Ok(ServerMessage::Complete { id: "1".into() })).unwrap();
        drop(in_tx);
        assert!(matches!(
            connection.recv().await,
            Some(Ok(ServerMessage::Complete { .. }))
        ));
        assert!(connection.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let connector = WebSocketConnector::default();
        let err = connector.connect("not a url", None).await.unwrap_err();
        assert!(matches!(err, GraphQLError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_handshake_and_subscribe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_hdr_async(socket, |req: &Request, mut resp: Response| -> std::result::Result<Response, ErrorResponse> {
                let proto = req.headers().get(SEC_WEBSOCKET_PROTOCOL).cloned().unwrap();
                resp.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, proto);
                Ok(resp)
            })
            .await
            .unwrap();

            let init = loop {
                if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                    break serde_json::from_str::<ClientMessage>(text.as_str()).unwrap();
                }
            };
            assert_eq!(
                init,
                ClientMessage::ConnectionInit {
                    payload: Some(json!({ "x-api-key": "secret" }))
                }
            );

            send_server_message(&mut ws, json!({ "type": "ping" })).await;
            send_server_message(&mut ws, json!({ "type": "connection_ack" })).await;

            let subscribe = loop {
                if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                    let message: ClientMessage = serde_json::from_str(text.as_str()).unwrap();
                    if !matches!(message, ClientMessage::Pong { .. }) {
                        break message;
                    }
                }
            };
            let ClientMessage::Subscribe { id, .. } = subscribe else {
                panic!("expected subscribe, got {:?}", subscribe);
            };

            send_server_message(&mut ws, json!("not a protocol message")).await;
            send_server_message(
                &mut ws,
                json!({ "type": "next", "id": id, "payload": { "data": { "n": 1 } } }),
            )
            .await;
            send_server_message(&mut ws, json!({ "type": "complete", "id": id })).await;
            ws.close(None).await.ok();
        });

        let connector = WebSocketConnector::default();
        let mut connection = connector
            .connect(
                &format!("ws://{}/graphql", addr),
                Some(json!({ "x-api-key": "secret" })),
            )
            .await
            .unwrap();

        connection
            .send(ClientMessage::Subscribe {
                id: "sub-1".into(),
                payload: RequestDocument::new("subscription { n }"),
            })
            .unwrap();

        let next = connection.recv().await.unwrap().unwrap();
        assert_eq!(
            next,
            ServerMessage::Next {
                id: "sub-1".into(),
                payload: json!({ "data": { "n": 1 } })
            }
        );
        let complete = connection.recv().await.unwrap().unwrap();
        assert_eq!(complete, ServerMessage::Complete { id: "sub-1".into() });
        assert!(connection.recv().await.is_none());

        server.await.unwrap();
    }
}
