//! # emis-events
//!
//! Kafka event bus library for the EMIS services.
//!
//! Provides type-safe producer/consumer abstractions for event-driven
//! communication between the EMIS services, with at-least-once delivery
//! and handler-level idempotence.
//!
//! ## Features
//!
//! - **Event Publishing**: Publish domain events to Kafka topics, keyed for
//!   partition affinity
//! - **Topic Registry**: Static topic-to-event-type mapping built at startup,
//!   with zero-or-more handlers per event type
//! - **At-Least-Once Consuming**: Offsets advance only after every handler
//!   for a record has succeeded; failed records are redelivered
//! - **Type Safety**: Compile-time topic/event type association via the
//!   `Event` trait
//!
//! ## Cargo Features
//!
//! - `kafka`: Enable Kafka producer/consumer (requires librdkafka)
//! - `kafka-static`: Build librdkafka from source (requires cmake)
//!
//! ## Example
//!
//! ```rust,ignore
//! use emis_events::{EventEnvelope, EventProducer, EventPublisherExt, KafkaConfig};
//! use emis_events::events::TeacherCreated;
//!
//! let config = KafkaConfig::from_env()?;
//! let producer = EventProducer::new(config)?;
//!
//! let event = TeacherCreated {
//!     teacher_id: uuid::Uuid::new_v4(),
//!     full_name: "Nguyen Van A".to_string(),
//!     email: "a.nguyen@school.example".to_string(),
//!     phone_number: None,
//!     subject: Some("Mathematics".to_string()),
//!     date_of_birth: None,
//!     default_password: "changeme".to_string(),
//!     school_id: None,
//! };
//!
//! producer.publish(&EventEnvelope::new(event)).await?;
//! ```

// Core modules (always available)
pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod events;
pub mod health;
pub mod publish;
pub mod registry;

// Kafka-dependent modules (require `kafka` feature)
#[cfg(feature = "kafka")]
pub mod consumer;
#[cfg(feature = "kafka")]
pub mod producer;

// Re-exports for convenience (core types)
pub use config::{KafkaConfig, KafkaConfigBuilder};
pub use envelope::{EventEnvelope, RawEnvelope};
pub use error::EventError;
pub use event::Event;
pub use health::HealthStatus;
pub use publish::{EventPublisher, EventPublisherExt};
pub use registry::{DispatchOutcome, EventHandler, HandlerError, TopicRegistry};

// Re-exports for Kafka types (when feature enabled)
#[cfg(feature = "kafka")]
pub use consumer::EventConsumer;
#[cfg(feature = "kafka")]
pub use producer::EventProducer;
