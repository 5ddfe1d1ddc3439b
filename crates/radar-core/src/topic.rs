//! Dispatch topics.

use radar_protocol::events;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A category of live event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// New and changed activity records.
    Activity,
    /// Admin notifications.
    Notification,
    /// Dashboard counter changes.
    Stats,
}

/// Returned when parsing a topic name fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl Topic {
    /// Every topic, in declaration order.
    pub const ALL: [Topic; 3] = [Topic::Activity, Topic::Notification, Topic::Stats];

    /// Get the topic name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Activity => "activity",
            Topic::Notification => "notification",
            Topic::Stats => "stats",
        }
    }

    /// Topic an inbound message name is routed to, if any.
    #[must_use]
    pub fn for_message(name: &str) -> Option<Topic> {
        match name {
            events::NEW_ACTIVITY | events::ACTIVITY_UPDATE => Some(Topic::Activity),
            events::NOTIFICATION => Some(Topic::Notification),
            events::STATS_UPDATE => Some(Topic::Stats),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "activity" | "activities" => Ok(Topic::Activity),
            "notification" | "notifications" => Ok(Topic::Notification),
            "stats" => Ok(Topic::Stats),
            _ => Err(UnknownTopic(s.to_string())),
        }
    }
}
