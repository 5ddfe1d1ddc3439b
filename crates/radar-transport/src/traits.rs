//! Transport abstraction traits for the live client.
//!
//! A [`Connector`] opens authenticated connections to the live endpoint; a
//! [`Connection`] carries frames in both directions until one side closes.

use crate::endpoint::Endpoint;
use async_trait::async_trait;
use radar_protocol::Frame;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

static CONNECTION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a client connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a process-unique connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let seq = CONNECTION_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}_{}", timestamp, seq))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection attempt timed out.
    #[error("Connection timed out")]
    Timeout,

    /// The endpoint refused the connection.
    #[error("Connection refused: {0}")]
    Refused(String),

    /// The endpoint rejected the handshake, typically a bad token.
    #[error("Handshake rejected with status {0}")]
    Rejected(u16),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] radar_protocol::ProtocolError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Opens connections to the live endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection and perform the handshake with `token`.
    ///
    /// Resolves once the connection is open; the caller treats that as the
    /// transport "open" event.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        token: &str,
    ) -> Result<Box<dyn Connection>, TransportError>;

    /// Get the transport name (e.g., "websocket", "memory").
    fn name(&self) -> &'static str;
}

/// An open connection to the live endpoint.
#[async_trait]
pub trait Connection: Send {
    /// Get the connection's unique identifier.
    fn id(&self) -> &ConnectionId;

    /// Receive the next frame from the server.
    ///
    /// Returns `None` if the connection is closed cleanly. Malformed
    /// messages are skipped by implementations, not returned as errors.
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError>;

    /// Send a frame to the server.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if the connection is still open.
    fn is_open(&self) -> bool;
}
