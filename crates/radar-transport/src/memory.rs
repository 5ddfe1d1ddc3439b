//! In-process transport.
//!
//! [`MemoryConnector`] hands out connections backed by channels. The server
//! side of every accepted connection is a [`MemoryPeer`] that can push
//! frames, read what the client sent, and close the connection. Attempts
//! can be scripted to be refused or to hang, which makes reconnect behavior
//! observable without a network.

use async_trait::async_trait;
use radar_protocol::{Frame, PROTOCOL_VERSION};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::traits::{Connection, ConnectionId, Connector, TransportError};

/// What the connector does with a connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Open the connection.
    Accept,
    /// Fail with [`TransportError::Refused`].
    Refuse,
    /// Never complete.
    Hang,
}

/// Channel-backed connector.
pub struct MemoryConnector {
    script: Mutex<VecDeque<Behavior>>,
    default: Mutex<Behavior>,
    attempts: AtomicUsize,
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MemoryPeer>>,
}

impl MemoryConnector {
    /// A connector that accepts every attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default(Behavior::Accept)
    }

    /// A connector that refuses every attempt.
    #[must_use]
    pub fn refusing() -> Self {
        Self::with_default(Behavior::Refuse)
    }

    /// A connector with the given behavior for unscripted attempts.
    #[must_use]
    pub fn with_default(behavior: Behavior) -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(behavior),
            attempts: AtomicUsize::new(0),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        }
    }

    /// Queue behaviors for the next attempts, in order.
    pub fn script(&self, behaviors: impl IntoIterator<Item = Behavior>) {
        if let Ok(mut script) = self.script.lock() {
            script.extend(behaviors);
        }
    }

    /// Change the behavior for unscripted attempts.
    pub fn set_default(&self, behavior: Behavior) {
        if let Ok(mut default) = self.default.lock() {
            *default = behavior;
        }
    }

    /// Number of connect attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait for the server side of the next accepted connection.
    pub async fn next_peer(&self) -> Option<MemoryPeer> {
        self.peers_rx.lock().await.recv().await
    }

    /// Server side of an already accepted connection, if any.
    pub fn try_next_peer(&self) -> Option<MemoryPeer> {
        self.peers_rx.try_lock().ok()?.try_recv().ok()
    }

    fn next_behavior(&self) -> Behavior {
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        scripted.unwrap_or_else(|| {
            self.default
                .lock()
                .map(|d| *d)
                .unwrap_or(Behavior::Accept)
        })
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        token: &str,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        match self.next_behavior() {
            Behavior::Refuse => {
                debug!(endpoint = %endpoint, attempt, "Memory connect refused");
                return Err(TransportError::Refused(format!("{} refused", endpoint)));
            }
            Behavior::Hang => {
                debug!(endpoint = %endpoint, attempt, "Memory connect hanging");
                std::future::pending::<()>().await;
            }
            Behavior::Accept => {}
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();

        let mut conn = MemoryConnection {
            id: ConnectionId::generate(),
            inbound,
            outbound: Some(outbound),
        };
        conn.send(Frame::connect(PROTOCOL_VERSION.major, Some(token.to_string())))
            .await?;

        let peer = MemoryPeer {
            token: token.to_string(),
            to_client: Some(to_client),
            from_client,
        };
        self.peers_tx
            .send(peer)
            .map_err(|_| TransportError::Other("Memory connector dropped".into()))?;

        debug!(endpoint = %endpoint, attempt, connection = %conn.id, "Memory connection open");
        Ok(Box::new(conn))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Client side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        if self.outbound.is_none() {
            return Ok(None);
        }
        match self.inbound.recv().await {
            Some(frame) => Ok(Some(frame)),
            None => {
                self.outbound = None;
                Ok(None)
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::ConnectionClosed)?;
        outbound
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outbound = None;
        self.inbound.close();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.outbound.is_some()
    }
}

/// Server side of an in-memory connection.
pub struct MemoryPeer {
    token: String,
    to_client: Option<mpsc::UnboundedSender<Frame>>,
    from_client: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryPeer {
    /// Token the client connected with.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Push a frame to the client. Returns `false` if the client is gone.
    pub fn push(&self, frame: Frame) -> bool {
        self.to_client
            .as_ref()
            .map(|tx| tx.send(frame).is_ok())
            .unwrap_or(false)
    }

    /// Push an `event` frame.
    pub fn emit(&self, name: &str, data: serde_json::Value) -> bool {
        self.push(Frame::event(name, data))
    }

    /// Next frame sent by the client, or `None` once it closed.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_client.recv().await
    }

    /// Close the connection from the server side.
    pub fn close(&mut self) {
        self.to_client = None;
    }

    /// Whether the client side is still attached.
    #[must_use]
    pub fn is_client_attached(&self) -> bool {
        self.to_client
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint() -> Endpoint {
        Endpoint::parse("ws://memory/ws").unwrap()
    }

    #[tokio::test]
    async fn test_accept_and_exchange() {
        let connector = MemoryConnector::new();
        let mut conn = connector.connect(&endpoint(), "tok-1").await.unwrap();
        let mut peer = connector.next_peer().await.unwrap();

        assert_eq!(peer.token(), "tok-1");
        assert_eq!(
            peer.recv().await,
            Some(Frame::connect(PROTOCOL_VERSION.major, Some("tok-1".into())))
        );

        assert!(peer.emit("new_activity", json!({"id": "a1"})));
        assert_eq!(
            conn.recv().await.unwrap(),
            Some(Frame::event("new_activity", json!({"id": "a1"})))
        );

        conn.send(Frame::join("activities")).await.unwrap();
        assert_eq!(peer.recv().await, Some(Frame::join("activities")));
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream() {
        let connector = MemoryConnector::new();
        let mut conn = connector.connect(&endpoint(), "tok").await.unwrap();
        let mut peer = connector.next_peer().await.unwrap();

        peer.close();
        assert_eq!(conn.recv().await.unwrap(), None);
        assert!(!conn.is_open());
        assert!(conn.send(Frame::ping()).await.is_err());
    }

    #[tokio::test]
    async fn test_client_close_detaches() {
        let connector = MemoryConnector::new();
        let mut conn = connector.connect(&endpoint(), "tok").await.unwrap();
        let mut peer = connector.next_peer().await.unwrap();
        let _handshake = peer.recv().await;

        conn.close().await.unwrap();
        assert!(!peer.is_client_attached());
        assert!(!peer.emit("notification", json!({})));
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn test_scripted_behaviors() {
        let connector = MemoryConnector::new();
        connector.script([Behavior::Refuse, Behavior::Refuse]);

        assert!(connector.connect(&endpoint(), "t").await.is_err());
        assert!(connector.connect(&endpoint(), "t").await.is_err());
        assert!(connector.connect(&endpoint(), "t").await.is_ok());
        assert_eq!(connector.attempts(), 3);

        let refusing = MemoryConnector::refusing();
        assert!(matches!(
            refusing.connect(&endpoint(), "t").await,
            Err(TransportError::Refused(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_never_completes() {
        let connector = MemoryConnector::with_default(Behavior::Hang);
        let attempt = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            connector.connect(&endpoint(), "t"),
        )
        .await;
        assert!(attempt.is_err());
        assert_eq!(connector.attempts(), 1);
    }
}
