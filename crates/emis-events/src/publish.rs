//! Publisher seam decoupling event producers from the Kafka client.
//!
//! Application code and consumer-side components publish through
//! [`EventPublisher`], so derived events (and tests) do not need a broker
//! connection. The Kafka-backed implementation is [`crate::EventProducer`].

use async_trait::async_trait;

use crate::envelope::EventEnvelope;
use crate::error::EventError;
use crate::event::Event;

/// Header names attached to every published record, readable without
/// deserializing the payload.
pub mod headers {
    pub const EVENT_TYPE: &str = "EventType";
    pub const EVENT_ID: &str = "EventId";
    pub const TIMESTAMP: &str = "Timestamp";
}

/// Transport-level publish operation: a serialized record to a topic.
///
/// Object-safe so components can hold an `Arc<dyn EventPublisher>`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Send raw bytes to a topic under the given partition key.
    ///
    /// Headers are (name, value) pairs carried as UTF-8 strings.
    async fn publish_raw(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> Result<(), EventError>;
}

/// Typed publishing helpers layered over [`EventPublisher`].
#[async_trait]
pub trait EventPublisherExt: EventPublisher {
    /// Publish an envelope keyed by its event id.
    async fn publish<E: Event>(&self, envelope: &EventEnvelope<E>) -> Result<(), EventError> {
        let key = envelope.partition_key();
        self.publish_with_key(envelope, &key).await
    }

    /// Publish an envelope under a caller-supplied affinity key.
    ///
    /// Records with the same key land on the same partition, so this is the
    /// mechanism for per-entity ordering (e.g. key chat messages by
    /// conversation id).
    async fn publish_with_key<E: Event>(
        &self,
        envelope: &EventEnvelope<E>,
        key: &str,
    ) -> Result<(), EventError> {
        let payload = envelope.to_json_bytes()?;
        let record_headers = vec![
            (
                headers::EVENT_TYPE.to_string(),
                envelope.event_type.clone(),
            ),
            (headers::EVENT_ID.to_string(), envelope.event_id.to_string()),
            (
                headers::TIMESTAMP.to_string(),
                envelope.occurred_at.to_rfc3339(),
            ),
        ];

        self.publish_raw(E::TOPIC, key, payload, record_headers)
            .await
    }
}

impl<P: EventPublisher + ?Sized> EventPublisherExt for P {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TestEvent {
        message: String,
    }

    impl Event for TestEvent {
        const TOPIC: &'static str = "emis.test.event";
        const EVENT_TYPE: &'static str = "emis.test.event";
    }

    #[derive(Default)]
    struct RecordingPublisher {
        records: Mutex<Vec<(String, String, Vec<u8>, Vec<(String, String)>)>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish_raw(
            &self,
            topic: &str,
            key: &str,
            payload: Vec<u8>,
            headers: Vec<(String, String)>,
        ) -> Result<(), EventError> {
            self.records.lock().unwrap().push((
                topic.to_string(),
                key.to_string(),
                payload,
                headers,
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_keys_by_event_id() {
        let publisher = RecordingPublisher::default();
        let envelope = EventEnvelope::new(TestEvent {
            message: "hi".to_string(),
        });

        publisher.publish(&envelope).await.unwrap();

        let records = publisher.records.lock().unwrap();
        let (topic, key, _, headers) = &records[0];
        assert_eq!(topic, "emis.test.event");
        assert_eq!(key, &envelope.event_id.to_string());
        assert!(headers
            .iter()
            .any(|(name, value)| name == "EventType" && value == "emis.test.event"));
        assert!(headers
            .iter()
            .any(|(name, value)| name == "EventId" && value == &envelope.event_id.to_string()));
        assert!(headers.iter().any(|(name, _)| name == "Timestamp"));
    }

    #[tokio::test]
    async fn test_publish_with_affinity_key() {
        let publisher = RecordingPublisher::default();
        let envelope = EventEnvelope::new(TestEvent {
            message: "ordered".to_string(),
        });

        publisher
            .publish_with_key(&envelope, "conversation-42")
            .await
            .unwrap();

        let records = publisher.records.lock().unwrap();
        assert_eq!(records[0].1, "conversation-42");
    }

    #[tokio::test]
    async fn test_published_payload_is_the_envelope() {
        let publisher = RecordingPublisher::default();
        let envelope = EventEnvelope::new(TestEvent {
            message: "wire".to_string(),
        });

        publisher.publish(&envelope).await.unwrap();

        let records = publisher.records.lock().unwrap();
        let restored: EventEnvelope<TestEvent> =
            EventEnvelope::from_json_bytes(&records[0].2).unwrap();
        assert_eq!(restored.event_id, envelope.event_id);
        assert_eq!(restored.payload.message, "wire");
    }
}
