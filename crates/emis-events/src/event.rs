//! Event trait definition for type-safe event publishing/consuming.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for types that can be published and consumed as Kafka events.
///
/// Implementors must define the Kafka topic and event type name. For all
/// EMIS events the topic equals the event type: the discriminator doubles
/// as the broker topic name and the registry key, so renaming it is a
/// breaking change that needs a migration plan.
///
/// # Example
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use emis_events::Event;
/// use uuid::Uuid;
///
/// #[derive(Debug, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// pub struct GradePublished {
///     pub student_id: Uuid,
///     pub subject: String,
/// }
///
/// impl Event for GradePublished {
///     const TOPIC: &'static str = "emis.grade.published";
///     const EVENT_TYPE: &'static str = "emis.grade.published";
/// }
/// ```
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The Kafka topic for this event type.
    ///
    /// Events of this type are published to and consumed from this topic.
    const TOPIC: &'static str;

    /// The fully qualified event type name.
    ///
    /// Stored in the event envelope for routing and deserialization.
    /// Convention: `emis.<entity>.<action>`
    const EVENT_TYPE: &'static str;
}
