//! Error types for the emis-events crate.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during event operations.
#[derive(Debug, Error)]
pub enum EventError {
    // Configuration errors (permanent, fail startup loudly)
    /// Required configuration variable is missing.
    #[error("Configuration missing: {var}")]
    ConfigMissing { var: String },

    /// Configuration value is invalid.
    #[error("Configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },

    // Connection errors (transient, retry with backoff)
    /// Failed to connect to Kafka broker.
    #[error("Connection to broker {broker} failed: {cause}")]
    ConnectionFailed { broker: String, cause: String },

    // Publishing errors
    /// Failed to publish event to topic after client-side retries.
    #[error("Failed to publish to topic {topic}: {cause}")]
    PublishFailed { topic: String, cause: String },

    /// Failed to serialize event.
    #[error("Failed to serialize event type {event_type}: {cause}")]
    SerializationFailed { event_type: String, cause: String },

    // Consuming errors
    /// Failed to consume from topic.
    #[error("Failed to consume from topic {topic}: {cause}")]
    ConsumeFailed { topic: String, cause: String },

    /// Failed to deserialize event.
    #[error("Failed to deserialize event type {event_type}: {cause}")]
    DeserializationFailed { event_type: String, cause: String },

    /// No registration exists for a received topic.
    #[error("No event type registered for topic {topic}")]
    UnroutableTopic { topic: String },

    /// One or more event handlers failed.
    #[error("Handler failed for event {event_id}: {cause}")]
    HandlerFailed { event_id: Uuid, cause: String },

    // Envelope errors
    /// Invalid event envelope.
    #[error("Invalid event envelope: {reason}")]
    InvalidEnvelope { reason: String },

    // Dead-letter errors
    /// Failed to route a poison record to the dead-letter topic.
    #[error("Failed to dead-letter record from topic {topic}: {cause}")]
    DeadLetterFailed { topic: String, cause: String },

    // Internal Kafka errors
    /// Internal Kafka client error.
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

impl EventError {
    /// Returns true if this error is transient and can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EventError::ConnectionFailed { .. }
                | EventError::PublishFailed { .. }
                | EventError::ConsumeFailed { .. }
                | EventError::HandlerFailed { .. }
                | EventError::DeadLetterFailed { .. }
        )
    }

    /// Returns true if this is a configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EventError::ConfigMissing { .. } | EventError::ConfigInvalid { .. }
        )
    }
}
