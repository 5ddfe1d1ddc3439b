//! Normalized inbound events.
//!
//! An [`Envelope`] is built once per recognized server push and handed by
//! reference to every listener of its topic. Nothing keeps it afterwards.

use crate::topic::Topic;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Arrival-ordered envelope identifier.
pub type EnvelopeId = u64;

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Next envelope identifier, unique and increasing within the process.
#[must_use]
pub fn next_envelope_id() -> EnvelopeId {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Payload could not be read as the requested type.
#[derive(Debug, Error)]
#[error("Payload of {name} is not a valid {target}: {source}")]
pub struct PayloadError {
    /// Inbound message name.
    pub name: String,
    /// Requested type.
    pub target: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// One inbound live event.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Arrival-ordered identifier.
    pub id: EnvelopeId,
    /// Topic the event is dispatched on.
    pub topic: Topic,
    /// Inbound message name, e.g. `new_activity`.
    pub name: String,
    /// Sub-type carried by `activity_update` and `stats_update`.
    pub kind: Option<String>,
    /// Message body, shared between listeners.
    pub payload: Arc<Value>,
    /// Unix millis when the event was received.
    pub received_at: u64,
}

impl Envelope {
    /// Create a new envelope.
    #[must_use]
    pub fn new(topic: Topic, name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: next_envelope_id(),
            topic,
            name: name.into(),
            kind: None,
            payload: Arc::new(payload),
            received_at: now_millis(),
        }
    }

    /// Attach the sub-type.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Get the payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Get the sub-type, if any.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Deserialize the payload into a typed model.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        T::deserialize(self.payload.as_ref()).map_err(|source| PayloadError {
            name: self.name.clone(),
            target: std::any::type_name::<T>(),
            source,
        })
    }
}
