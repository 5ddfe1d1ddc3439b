//! Connection status observation.
//!
//! Widgets that render a "Live" indicator either poll [`StatusCell::status`]
//! or hold a [`watch::Receiver`] from [`StatusCell::watch`].

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// State of the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No session, or the session gave up.
    #[default]
    Disconnected,
    /// Opening a transport or waiting to retry.
    Connecting,
    /// Transport open.
    Connected,
}

impl ConnectionState {
    /// Whether the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Get the state name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Shorthand for `state == Connected`.
    pub connected: bool,
    /// Current state.
    pub state: ConnectionState,
    /// Retries scheduled since the last successful connect.
    pub reconnect_attempts: u32,
}

/// Shared connection state with change notification.
#[derive(Debug)]
pub struct StatusCell {
    state: watch::Sender<ConnectionState>,
    reconnect_attempts: AtomicU32,
}

impl StatusCell {
    /// Create a cell in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Current status. Never blocks on the connection.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        let state = self.state();
        ConnectionStatus {
            connected: state.is_connected(),
            state,
            reconnect_attempts: self.reconnect_attempts(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Set the state. Watchers are only woken on an actual change.
    ///
    /// Returns `true` if the state changed.
    pub fn set(&self, next: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "Connection state changed");
        }
        changed
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Reconnect attempts in the current session.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Acquire)
    }

    /// Record one more reconnect attempt and return the new count.
    pub fn record_attempt(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Reset the reconnect counter.
    pub fn reset_attempts(&self) {
        self.reconnect_attempts.store(0, Ordering::Release);
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
