//! # radar-client
//!
//! The live event channel of the Radar admin dashboard.
//!
//! One [`EventChannel`] per process holds the connection to the live
//! endpoint. Widgets subscribe to a topic, render the connection status, and
//! unsubscribe when they go away. The channel reconnects on its own after a
//! loss, up to the configured number of attempts.
//!
//! ## Example
//!
//! ```rust,no_run
//! use radar_client::{ChannelConfig, EventChannel};
//! use radar_transport::{Endpoint, WebSocketConnector};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let endpoint = Endpoint::from_api_base("https://admin.example.com/api", "/ws")?;
//! let channel = EventChannel::create(
//!     ChannelConfig::new(endpoint),
//!     Arc::new(WebSocketConnector::default()),
//! );
//!
//! let subscription = channel.subscribe_activities(|activity, name| {
//!     println!("{}: {}", name, activity.id);
//! });
//!
//! channel.connect("session-token");
//! // ...
//! subscription.unsubscribe();
//! channel.dispose();
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod feeds;
pub mod metrics;
pub mod reconnect;
mod session;

pub use channel::{ChannelConfig, EventChannel};
pub use config::Config;
pub use feeds::{ActivityFeed, LiveStats, NotificationBadge};
pub use reconnect::{Backoff, BackoffKind, ReconnectPolicy};

pub use radar_core::{
    Activity, ConnectionState, ConnectionStatus, Envelope, Notification, StatsKind, StatsUpdate,
    Subscription, SubscriptionGuard, Topic,
};
