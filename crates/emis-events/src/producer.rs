//! Kafka event producer.

use crate::config::KafkaConfig;
use crate::error::EventError;
use crate::health::HealthStatus;
use crate::publish::EventPublisher;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::{debug, info};

/// Kafka event producer for publishing events.
///
/// Fire-and-forget per call: owns nothing persistent and never blocks on
/// consumers. Delivery waits for the configured acknowledgement level, so a
/// returned `Ok` means the broker has accepted the record durably.
pub struct EventProducer {
    producer: FutureProducer,
    config: KafkaConfig,
}

impl EventProducer {
    /// Create a new event producer with the given configuration.
    pub fn new(config: KafkaConfig) -> Result<Self, EventError> {
        let mut client_config = ClientConfig::new();

        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("security.protocol", config.security_protocol.as_str())
            .set("acks", config.acks.as_str())
            .set("retries", config.message_send_max_retries.to_string())
            .set(
                "enable.idempotence",
                config.enable_idempotence.to_string(),
            )
            .set("compression.type", config.compression.as_str())
            .set("request.timeout.ms", config.request_timeout_ms.to_string())
            .set("message.timeout.ms", config.message_timeout_ms.to_string());

        // Add SASL configuration if present
        if let Some(sasl) = &config.sasl {
            client_config
                .set("sasl.mechanism", sasl.mechanism.as_str())
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        let producer: FutureProducer =
            client_config
                .create()
                .map_err(|e| EventError::ConnectionFailed {
                    broker: config.bootstrap_servers.clone(),
                    cause: e.to_string(),
                })?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            client_id = %config.client_id,
            acks = config.acks.as_str(),
            idempotent = config.enable_idempotence,
            "Event producer created"
        );

        Ok(Self { producer, config })
    }

    /// Check the health of the Kafka connection.
    pub async fn health_check(&self) -> Result<HealthStatus, EventError> {
        let metadata = self
            .producer
            .client()
            .fetch_metadata(None, Duration::from_secs(5))
            .map_err(|e| EventError::ConnectionFailed {
                broker: self.config.bootstrap_servers.clone(),
                cause: e.to_string(),
            })?;

        Ok(HealthStatus {
            connected: true,
            brokers: metadata.brokers().len(),
            topics: metadata.topics().len(),
        })
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish_raw(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> Result<(), EventError> {
        let mut record_headers = OwnedHeaders::new_with_capacity(headers.len());
        for (name, value) in &headers {
            record_headers = record_headers.insert(Header {
                key: name.as_str(),
                value: Some(value.as_str()),
            });
        }

        debug!(
            topic = %topic,
            key = %key,
            payload_size = payload.len(),
            "Publishing event"
        );

        let record = FutureRecord::to(topic)
            .key(key)
            .payload(&payload)
            .headers(record_headers);

        // send() resolves once the broker acknowledges or the message
        // timeout (which bounds the client-side retries) expires.
        let delivery_status = self
            .producer
            .send(
                record,
                Duration::from_millis(u64::from(self.config.message_timeout_ms)),
            )
            .await
            .map_err(|(err, _)| EventError::PublishFailed {
                topic: topic.to_string(),
                cause: err.to_string(),
            })?;

        debug!(
            topic = %topic,
            partition = delivery_status.0,
            offset = delivery_status.1,
            "Event published successfully"
        );

        Ok(())
    }
}
