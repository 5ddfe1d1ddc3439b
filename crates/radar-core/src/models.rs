//! Typed payloads for the live topics.
//!
//! The dispatcher treats payloads as opaque JSON. These models are what
//! consumers decode them into with [`Envelope::decode`].

use crate::envelope::Envelope;
use crate::topic::Topic;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
    #[serde(other)]
    Unknown,
}

/// Outcome recorded on an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[default]
    Success,
    Warning,
    Error,
    #[serde(other)]
    Unknown,
}

/// An activity record (shop registered, product flagged, user blocked, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub status: ActivityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ago: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Warning,
    Error,
    Success,
    #[serde(other)]
    Unknown,
}

/// An admin notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Which dashboard counter a stats update refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatsKind {
    ProductCount,
    OfferCount,
    ShopCount,
    UserCount,
    Other(String),
}

impl StatsKind {
    /// Parse the sub-type string sent by the server.
    #[must_use]
    pub fn parse(kind: &str) -> Self {
        match kind {
            "product_count" => StatsKind::ProductCount,
            "offer_count" => StatsKind::OfferCount,
            "shop_count" => StatsKind::ShopCount,
            "user_count" => StatsKind::UserCount,
            other => StatsKind::Other(other.to_string()),
        }
    }

    /// Get the sub-type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            StatsKind::ProductCount => "product_count",
            StatsKind::OfferCount => "offer_count",
            StatsKind::ShopCount => "shop_count",
            StatsKind::UserCount => "user_count",
            StatsKind::Other(s) => s,
        }
    }

    /// Field of the stats payload that holds this counter.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            StatsKind::ProductCount => Some("totalProducts"),
            StatsKind::OfferCount => Some("totalOffers"),
            StatsKind::ShopCount => Some("totalShops"),
            StatsKind::UserCount => Some("totalUsers"),
            StatsKind::Other(_) => None,
        }
    }
}

/// A counter change on the `stats` topic.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsUpdate {
    pub kind: StatsKind,
    pub data: Value,
}

impl StatsUpdate {
    /// Build from a stats envelope. Returns `None` for other topics or
    /// envelopes without a sub-type.
    #[must_use]
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        if envelope.topic != Topic::Stats {
            return None;
        }
        let kind = envelope.kind()?;
        Some(Self {
            kind: StatsKind::parse(kind),
            data: envelope.payload().clone(),
        })
    }

    /// The new counter value, if the payload carries one.
    ///
    /// Accepts either a bare number or an object keyed by the counter field.
    #[must_use]
    pub fn value(&self) -> Option<i64> {
        if let Some(n) = self.data.as_i64() {
            return Some(n);
        }
        self.kind
            .field()
            .and_then(|field| self.data.get(field))
            .and_then(Value::as_i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_activity_from_server_json() {
        let activity: Activity = serde_json::from_value(json!({
            "id": "a1",
            "type": "shop_registered",
            "description": "New shop registered",
            "severity": "high",
            "status": "warning",
            "createdAt": "2024-05-01T10:00:00Z",
            "timeAgo": "2m ago",
            "shop": {"name": "Corner Grocers"}
        }))
        .unwrap();

        assert_eq!(activity.activity_type, "shop_registered");
        assert_eq!(activity.severity, Severity::High);
        assert_eq!(activity.status, ActivityStatus::Warning);
        assert_eq!(activity.time_ago.as_deref(), Some("2m ago"));
        assert!(activity.user.is_none());
    }

    #[test]
    fn test_unknown_severity_is_tolerated() {
        let activity: Activity =
            serde_json::from_value(json!({"id": "a2", "type": "x", "severity": "apocalyptic"}))
                .unwrap();
        assert_eq!(activity.severity, Severity::Unknown);
    }

    #[test]
    fn test_notification_defaults() {
        let n: Notification =
            serde_json::from_value(json!({"id": "n1", "title": "Maintenance"})).unwrap();
        assert_eq!(n.kind, NotificationKind::Info);
        assert!(n.message.is_empty());
    }

    #[test]
    fn test_stats_value() {
        let env = Envelope::new(Topic::Stats, "stats_update", json!({"totalProducts": 42}))
            .with_kind("product_count");
        let update = StatsUpdate::from_envelope(&env).unwrap();
        assert_eq!(update.kind, StatsKind::ProductCount);
        assert_eq!(update.value(), Some(42));

        let bare = Envelope::new(Topic::Stats, "stats_update", json!(7)).with_kind("visits");
        let update = StatsUpdate::from_envelope(&bare).unwrap();
        assert_eq!(update.kind.as_str(), "visits");
        assert_eq!(update.value(), Some(7));
    }

    #[test]
    fn test_stats_requires_stats_topic() {
        let env = Envelope::new(Topic::Activity, "new_activity", json!({})).with_kind("x");
        assert!(StatsUpdate::from_envelope(&env).is_none());
    }
}
