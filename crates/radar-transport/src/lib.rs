//! # radar-transport
//!
//! Client transports for the Radar live event stream.
//!
//! - **WebSocket** - The production transport (`wss://<api origin>/ws`)
//! - **Memory** - Channel-backed transport with scriptable failures
//!
//! ## Transport Abstraction
//!
//! Both implement [`Connector`] and [`Connection`], so the event channel is
//! transport-agnostic.
//!
//! ```rust,ignore
//! use radar_transport::{Connector, Endpoint, WebSocketConnector};
//!
//! let endpoint = Endpoint::from_api_base("https://shopradar.example.com/api", "/ws")?;
//! let mut conn = WebSocketConnector::default().connect(&endpoint, &token).await?;
//! while let Ok(Some(frame)) = conn.recv().await {
//!     // Process frame
//! }
//! ```

pub mod endpoint;
pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use endpoint::{Endpoint, EndpointError, DEFAULT_WEBSOCKET_PATH};
pub use memory::{Behavior, MemoryConnector, MemoryPeer};
pub use traits::{Connection, ConnectionId, Connector, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketConnector};
