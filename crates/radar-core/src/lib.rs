//! # radar-core
//!
//! Process-local fan-out of live dashboard events.
//!
//! This crate provides the pieces that sit between the transport and the
//! dashboard widgets:
//!
//! - **Topic** - Dispatch key (`activity`, `notification`, `stats`)
//! - **Envelope** - One inbound event, normalized
//! - **Registry** - Per-topic listener registrations with unsubscribe handles
//! - **Dispatcher** - Maps inbound message names to topics and invokes listeners
//! - **Status** - Connection state cell for polling and push observers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│ Dispatcher  │────▶│  Registry   │──▶ listeners
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ StatusCell  │──▶ connection_status() / watch()
//! └─────────────┘
//! ```

pub mod dispatcher;
pub mod envelope;
pub mod models;
pub mod registry;
pub mod status;
pub mod topic;

pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherStats};
pub use envelope::{Envelope, EnvelopeId, PayloadError};
pub use models::{Activity, ActivityStatus, Notification, NotificationKind, Severity, StatsKind, StatsUpdate};
pub use registry::{Listener, ListenerId, RegistryStats, Subscription, SubscriptionGuard, SubscriptionRegistry};
pub use status::{ConnectionState, ConnectionStatus, StatusCell};
pub use topic::{Topic, UnknownTopic};
