//! Kafka consumer runtime with at-least-once delivery.
//!
//! A single poll/process/commit loop per instance: records are processed
//! one at a time, and a record's offset is committed only once every
//! registered handler for it has succeeded. Horizontal scaling is more
//! instances in the same consumer group; the broker assigns each a
//! disjoint set of partitions.

use crate::config::KafkaConfig;
use crate::error::EventError;
use crate::publish::EventPublisher;
use crate::registry::{DispatchOutcome, TopicRegistry};

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::TopicPartitionList;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Suffix appended to a source topic to form its dead-letter topic.
const DEAD_LETTER_SUFFIX: &str = ".dlq";

/// Kafka event consumer runtime.
///
/// Owns the broker connection and the consumer group's commit state; both
/// are private to the runtime and never touched from handlers.
pub struct EventConsumer {
    consumer: StreamConsumer,
    registry: Arc<TopicRegistry>,
    dead_letter: Option<Arc<dyn EventPublisher>>,
    group_id: String,
    poll_timeout: Duration,
}

impl EventConsumer {
    /// Create a new consumer runtime over a registry built at startup.
    pub fn new(config: KafkaConfig, registry: Arc<TopicRegistry>) -> Result<Self, EventError> {
        if config.enable_auto_commit {
            warn!(
                "enable_auto_commit is set; the runtime manages commits explicitly and \
                 broker-side auto commit weakens the at-least-once guarantee"
            );
        }

        let mut client_config = ClientConfig::new();

        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("group.id", &config.group_id)
            .set("security.protocol", config.security_protocol.as_str())
            .set("auto.offset.reset", config.auto_offset_reset.as_str())
            .set("enable.auto.commit", config.enable_auto_commit.to_string())
            // Manual offset management
            .set("enable.auto.offset.store", "false")
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .set("socket.timeout.ms", config.socket_timeout_ms.to_string());

        // Add SASL configuration if present
        if let Some(sasl) = &config.sasl {
            client_config
                .set("sasl.mechanism", sasl.mechanism.as_str())
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        let consumer: StreamConsumer =
            client_config
                .create()
                .map_err(|e| EventError::ConnectionFailed {
                    broker: config.bootstrap_servers.clone(),
                    cause: e.to_string(),
                })?;

        info!(
            consumer_group = %config.group_id,
            bootstrap_servers = %config.bootstrap_servers,
            "Event consumer created"
        );

        Ok(Self {
            consumer,
            registry,
            dead_letter: None,
            group_id: config.group_id,
            poll_timeout: Duration::from_secs(1),
        })
    }

    /// Route poison records (unparseable payloads) to `<topic>.dlq` via
    /// the given publisher instead of skipping them silently.
    #[must_use]
    pub fn with_dead_letter(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.dead_letter = Some(publisher);
        self
    }

    /// Override the poll timeout (default: 1 second).
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Get the consumer group name.
    #[must_use]
    pub fn consumer_group(&self) -> &str {
        &self.group_id
    }

    /// Run the poll/process/commit loop until `shutdown` flips to true.
    ///
    /// Subscribes to the topics present in the registry at this moment;
    /// topics registered afterwards are not picked up. On shutdown the
    /// in-flight record is finished before the connection is released.
    #[instrument(skip(self, shutdown), fields(consumer_group = %self.group_id))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), EventError> {
        let topics = self.registry.topics();
        if topics.is_empty() {
            warn!("No topics registered. Consumer will not subscribe to anything.");
            return Ok(());
        }

        self.consumer
            .subscribe(&topics)
            .map_err(|e| EventError::ConsumeFailed {
                topic: topics.join(","),
                cause: e.to_string(),
            })?;

        info!(topics = ?topics, "Consumer subscribed, starting poll loop");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                polled = tokio::time::timeout(self.poll_timeout, self.consumer.recv()) => {
                    match polled {
                        // Poll timeout with no records is a no-op cycle
                        Err(_) => continue,
                        Ok(Err(e)) => {
                            error!(error = %e, "Error receiving message");
                        }
                        Ok(Ok(message)) => {
                            self.process_record(&message).await;
                        }
                    }
                }
            }
        }

        info!("Consumer stopped");
        Ok(())
    }

    /// Process one record and decide whether to advance past it.
    async fn process_record(&self, message: &BorrowedMessage<'_>) {
        let topic = message.topic();
        let payload = message.payload().unwrap_or_default();

        debug!(
            topic = %topic,
            partition = message.partition(),
            offset = message.offset(),
            "Record received"
        );

        match self.registry.dispatch(topic, payload).await {
            DispatchOutcome::Handled { handlers } => {
                debug!(topic = %topic, handlers, "Record processed");
                self.commit(message);
            }
            // Zero handlers and unknown topics are skipped, not retried:
            // an unroutable record would otherwise stall the partition.
            DispatchOutcome::NoHandlers | DispatchOutcome::NoRoute => {
                self.commit(message);
            }
            DispatchOutcome::Poison(e) => {
                self.handle_poison(message, &e).await;
            }
            DispatchOutcome::Failed { failed, total, error } => {
                error!(
                    topic = %topic,
                    partition = message.partition(),
                    offset = message.offset(),
                    failed,
                    total,
                    error = %error,
                    "Dispatch failed, record will be redelivered"
                );
                // No commit: the same record comes back on a later poll.
            }
        }
    }

    /// Deal with a record that can never deserialize. With a dead-letter
    /// publisher configured the record is preserved on `<topic>.dlq` and
    /// skipped; without one it is logged and skipped. If the dead-letter
    /// publish itself fails the offset is kept so the record retries
    /// rather than being lost.
    async fn handle_poison(&self, message: &BorrowedMessage<'_>, cause: &EventError) {
        let topic = message.topic();

        let Some(publisher) = &self.dead_letter else {
            warn!(
                topic = %topic,
                offset = message.offset(),
                error = %cause,
                "Poison record skipped (no dead-letter publisher configured)"
            );
            self.commit(message);
            return;
        };

        let dlq_topic = format!("{topic}{DEAD_LETTER_SUFFIX}");
        let key = message
            .key()
            .map(|k| String::from_utf8_lossy(k).to_string())
            .unwrap_or_default();
        let payload = message.payload().unwrap_or_default().to_vec();
        let headers = vec![
            ("OriginalTopic".to_string(), topic.to_string()),
            ("Error".to_string(), cause.to_string()),
        ];

        match publisher.publish_raw(&dlq_topic, &key, payload, headers).await {
            Ok(()) => {
                warn!(
                    topic = %topic,
                    dlq_topic = %dlq_topic,
                    offset = message.offset(),
                    "Poison record routed to dead-letter topic"
                );
                self.commit(message);
            }
            Err(e) => {
                error!(
                    topic = %topic,
                    dlq_topic = %dlq_topic,
                    error = %e,
                    "Dead-letter publish failed, record will be redelivered"
                );
            }
        }
    }

    /// Commit the offset for a processed message.
    fn commit(&self, message: &BorrowedMessage<'_>) {
        let mut tpl = TopicPartitionList::new();
        if let Err(e) = tpl.add_partition_offset(
            message.topic(),
            message.partition(),
            rdkafka::Offset::Offset(message.offset() + 1),
        ) {
            warn!(
                topic = message.topic(),
                partition = message.partition(),
                error = %e,
                "Failed to build offset commit list"
            );
            return;
        }

        if let Err(e) = self.consumer.commit(&tpl, CommitMode::Async) {
            // The commit retries implicitly: the next successful record on
            // this partition commits a later offset.
            warn!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                error = %e,
                "Offset commit failed"
            );
        }
    }
}
