//! WebSocket client transport.
//!
//! This module provides a WebSocket-based connector using tokio-tungstenite.
//! The token travels as a `Bearer` header on the upgrade request and again in
//! the `connect` frame sent right after the upgrade.

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use radar_protocol::{codec, Frame, PROTOCOL_VERSION};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Error as WsError, Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, warn};

use crate::endpoint::Endpoint;
use crate::traits::{Connection, ConnectionId, Connector, TransportError};

/// WebSocket connector configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 1024 * 1024, // 1 MiB
        }
    }
}

/// Opens WebSocket connections to the live endpoint.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: WebSocketConfig,
}

impl WebSocketConnector {
    /// Create a new connector.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }
}

fn handshake_error(e: WsError) -> TransportError {
    match e {
        WsError::Http(response) => TransportError::Rejected(response.status().as_u16()),
        WsError::Io(io) => TransportError::Io(io),
        other => TransportError::Refused(other.to_string()),
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        token: &str,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let mut request = endpoint
            .url()
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Other(format!("Invalid request: {}", e)))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| TransportError::Other("Token is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        debug!(endpoint = %endpoint, "Opening WebSocket");
        let (stream, response) = connect_async(request).await.map_err(handshake_error)?;
        debug!(endpoint = %endpoint, status = %response.status(), "WebSocket upgraded");

        let mut conn = WebSocketConnection::new(stream, self.config.max_message_size);
        conn.send(Frame::connect(PROTOCOL_VERSION.major, Some(token.to_string())))
            .await?;

        Ok(Box::new(conn))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// A client WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    is_open: bool,
    read_buffer: BytesMut,
    max_message_size: usize,
}

impl WebSocketConnection {
    fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>, max_message_size: usize) -> Self {
        Self {
            id: ConnectionId::generate(),
            stream,
            is_open: true,
            read_buffer: BytesMut::with_capacity(4096),
            max_message_size,
        }
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        // Binary messages may carry several length-prefixed frames.
        match codec::decode_from(&mut self.read_buffer) {
            Ok(Some(frame)) => return Ok(Some(frame)),
            Ok(None) => {}
            Err(e) => {
                warn!(connection = %self.id, error = %e, "Dropping undecodable binary data");
                self.read_buffer.clear();
            }
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > self.max_message_size {
                        warn!(connection = %self.id, size = text.len(), "Text message too large, skipping");
                        continue;
                    }
                    match codec::decode_text(&text) {
                        Ok(frame) => return Ok(Some(frame)),
                        Err(e) => {
                            warn!(connection = %self.id, error = %e, "Skipping malformed text message");
                        }
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    if data.len() > self.max_message_size {
                        warn!(connection = %self.id, size = data.len(), "Binary message too large, skipping");
                        continue;
                    }
                    self.read_buffer.extend_from_slice(&data);
                    match codec::decode_from(&mut self.read_buffer) {
                        Ok(Some(frame)) => return Ok(Some(frame)),
                        Ok(None) => {}
                        Err(e) => {
                            warn!(connection = %self.id, error = %e, "Dropping undecodable binary data");
                            self.read_buffer.clear();
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        warn!(connection = %self.id, "Failed to send pong: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(reason))) => {
                    debug!(connection = %self.id, ?reason, "Server closed connection");
                    self.is_open = false;
                    return Ok(None);
                }
                Some(Err(WsError::ConnectionClosed)) | None => {
                    debug!(connection = %self.id, "WebSocket stream ended");
                    self.is_open = false;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    error!(connection = %self.id, "WebSocket error: {}", e);
                    self.is_open = false;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }
        let text = codec::encode_text(&frame)?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.is_open {
            return Ok(()); // Already closed
        }
        self.is_open = false;
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::Other(format!("Failed to close: {}", e)))
    }

    fn is_open(&self) -> bool {
        self.is_open
    }
}
