//! Names of the server pushes carried in `event` frames.

/// A new activity record was created.
pub const NEW_ACTIVITY: &str = "new_activity";

/// An existing activity changed; data is `{type, data}`.
pub const ACTIVITY_UPDATE: &str = "activity_update";

/// A notification was broadcast to admins.
pub const NOTIFICATION: &str = "notification";

/// A dashboard counter changed; data is `{type, data}`.
pub const STATS_UPDATE: &str = "stats_update";

/// Server confirmation sent right after the handshake.
pub const CONNECTED: &str = "connected";
