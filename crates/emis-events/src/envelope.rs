//! Event envelope for wrapping all events with metadata.

use crate::error::EventError;
use crate::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standard envelope wrapping all EMIS events.
///
/// Contains the metadata required for routing and partition-key selection.
/// Serialized camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope<T> {
    /// Unique identifier for this event instance.
    /// Default partition key, and the handle duplicate-delivery checks key on.
    pub event_id: Uuid,

    /// Fully qualified event type name, e.g. "emis.class.created".
    pub event_type: String,

    /// Timestamp when the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// The actual event payload.
    pub payload: T,
}

impl<T: Event> EventEnvelope<T> {
    /// Create a new event envelope.
    pub fn new(payload: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: T::EVENT_TYPE.to_string(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// Create an envelope with a specific event ID.
    /// Useful for testing or replaying events.
    pub fn with_id(event_id: Uuid, payload: T) -> Self {
        Self {
            event_id,
            event_type: T::EVENT_TYPE.to_string(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// Get the Kafka topic for this event.
    pub fn topic(&self) -> &'static str {
        T::TOPIC
    }

    /// Get the default partition key (event id as string).
    ///
    /// Callers that need per-entity ordering supply their own affinity key
    /// at publish time instead.
    pub fn partition_key(&self) -> String {
        self.event_id.to_string()
    }

    /// Serialize the envelope to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationFailed {
            event_type: T::EVENT_TYPE.to_string(),
            cause: e.to_string(),
        })
    }

    /// Deserialize an envelope from JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(bytes).map_err(|_| EventError::DeserializationFailed {
            event_type: T::EVENT_TYPE.to_string(),
            cause: String::from_utf8_lossy(bytes).to_string(),
        })
    }
}

/// Raw envelope for deserializing when the event type is unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl RawEnvelope {
    /// Parse from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(bytes).map_err(|e| EventError::InvalidEnvelope {
            reason: e.to_string(),
        })
    }

    /// Validate that required fields are present and valid.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.event_type.is_empty() {
            return Err(EventError::InvalidEnvelope {
                reason: "event_type is empty".to_string(),
            });
        }

        if !self.event_type.starts_with("emis.") {
            return Err(EventError::InvalidEnvelope {
                reason: format!(
                    "event_type '{}' does not follow naming convention",
                    self.event_type
                ),
            });
        }

        Ok(())
    }

    /// Try to deserialize the payload into a specific event type.
    pub fn into_typed<T: Event>(self) -> Result<EventEnvelope<T>, EventError> {
        let payload: T = serde_json::from_value(self.payload).map_err(|e| {
            EventError::DeserializationFailed {
                event_type: self.event_type.clone(),
                cause: e.to_string(),
            }
        })?;

        Ok(EventEnvelope {
            event_id: self.event_id,
            event_type: self.event_type,
            occurred_at: self.occurred_at,
            payload,
        })
    }
}
