//! Topic registry and handler dispatch.
//!
//! Maps broker topics to their expected event type and the set of handlers
//! registered for it. The registry is built once at startup; the consumer
//! runtime snapshots its topic list when it subscribes, so topics added
//! later require a restart.
//!
//! Dispatch is broker-independent: the consumer runtime feeds it raw record
//! bytes and maps the [`DispatchOutcome`] onto its commit decision.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::envelope::{EventEnvelope, RawEnvelope};
use crate::error::EventError;
use crate::event::Event;

/// Error type handlers report; the dispatcher folds it into the delivery
/// outcome.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for handling events of a specific type.
///
/// Handlers run with their own unit-of-work scope and must tolerate
/// duplicate delivery: a failed sibling handler causes the whole record to
/// be redelivered, including to handlers that already succeeded.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    /// Handle an event.
    ///
    /// Return Ok(()) if processing succeeded, Err if it failed. A failure
    /// keeps the record's offset uncommitted so the broker redelivers it.
    /// Expected, benign conditions (a referenced entity that no longer
    /// exists) should be logged and swallowed here instead of returned,
    /// or they turn into a redelivery storm.
    async fn handle(&self, envelope: EventEnvelope<E>) -> Result<(), HandlerError>;
}

// Allows one shared handler instance to be registered for several event
// types (e.g. a replica synchronizer handling both create and update).
#[async_trait]
impl<E: Event, H: EventHandler<E>> EventHandler<E> for Arc<H> {
    async fn handle(&self, envelope: EventEnvelope<E>) -> Result<(), HandlerError> {
        (**self).handle(envelope).await
    }
}

/// Outcome of dispatching one broker record.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// No registration exists for the record's topic. Logged and skipped.
    NoRoute,
    /// The record could not be parsed into the registered event type.
    /// Logged and skipped; candidate for the dead-letter topic.
    Poison(EventError),
    /// The event was valid but no handlers are registered. Valid and
    /// silent: not-yet-implemented consumers ignore events.
    NoHandlers,
    /// Every registered handler ran and succeeded.
    Handled { handlers: usize },
    /// At least one handler failed. All handlers still ran; the record
    /// must be redelivered.
    Failed {
        failed: usize,
        total: usize,
        error: EventError,
    },
}

impl DispatchOutcome {
    /// Whether the consumer runtime should advance past this record.
    #[must_use]
    pub fn should_commit(&self) -> bool {
        !matches!(self, DispatchOutcome::Failed { .. })
    }
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle_raw(&self, raw: RawEnvelope) -> Result<(), HandlerError>;
}

/// Adapter binding a typed handler into the type-erased dispatch path.
struct TypedHandler<E: Event, H: EventHandler<E>> {
    handler: H,
    _marker: PhantomData<fn() -> E>,
}

#[async_trait]
impl<E: Event, H: EventHandler<E>> ErasedHandler for TypedHandler<E, H> {
    fn name(&self) -> &'static str {
        std::any::type_name::<H>()
    }

    async fn handle_raw(&self, raw: RawEnvelope) -> Result<(), HandlerError> {
        // The payload was probed against E before dispatch, so this
        // deserialization does not fail for shape reasons.
        let envelope = raw.into_typed::<E>()?;
        self.handler.handle(envelope).await
    }
}

/// Validates that a raw payload deserializes into `E` without invoking
/// any handler.
fn probe<E: Event>(payload: &serde_json::Value) -> Result<(), EventError> {
    serde_json::from_value::<E>(payload.clone())
        .map(|_| ())
        .map_err(|e| EventError::DeserializationFailed {
            event_type: E::EVENT_TYPE.to_string(),
            cause: e.to_string(),
        })
}

struct TopicEntry {
    event_type: &'static str,
    probe: fn(&serde_json::Value) -> Result<(), EventError>,
    handlers: Vec<Arc<dyn ErasedHandler>>,
}

/// Static mapping from topic name to event type and handlers.
#[derive(Default)]
pub struct TopicRegistry {
    topics: HashMap<&'static str, TopicEntry>,
}

impl TopicRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a topic for consumption without any handler.
    ///
    /// Re-registration is a no-op; the topic keeps its existing handlers.
    pub fn register<E: Event>(&mut self) -> &mut Self {
        self.topics.entry(E::TOPIC).or_insert_with(|| {
            debug!(topic = E::TOPIC, event_type = E::EVENT_TYPE, "Topic registered");
            TopicEntry {
                event_type: E::EVENT_TYPE,
                probe: probe::<E>,
                handlers: Vec::new(),
            }
        });
        self
    }

    /// Register a handler for an event type, registering the topic if
    /// needed. Multiple handlers per event type are supported; each runs
    /// on every delivery.
    pub fn add_handler<E: Event, H: EventHandler<E>>(&mut self, handler: H) -> &mut Self {
        let entry = self.topics.entry(E::TOPIC).or_insert_with(|| TopicEntry {
            event_type: E::EVENT_TYPE,
            probe: probe::<E>,
            handlers: Vec::new(),
        });
        entry.handlers.push(Arc::new(TypedHandler {
            handler,
            _marker: PhantomData,
        }));
        debug!(
            topic = E::TOPIC,
            handlers = entry.handlers.len(),
            "Handler registered"
        );
        self
    }

    /// The topics to subscribe to, snapshot at consumer start.
    #[must_use]
    pub fn topics(&self) -> Vec<&'static str> {
        let mut topics: Vec<_> = self.topics.keys().copied().collect();
        topics.sort_unstable();
        topics
    }

    /// Number of handlers registered for a topic.
    #[must_use]
    pub fn handler_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |e| e.handlers.len())
    }

    /// Dispatch one record's bytes to every handler registered for its
    /// topic.
    ///
    /// All handlers run even when an earlier one fails; any failure makes
    /// the overall outcome `Failed` so the consumer runtime redelivers the
    /// record.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let Some(entry) = self.topics.get(topic) else {
            warn!(topic = %topic, "No event type registered for topic, skipping record");
            return DispatchOutcome::NoRoute;
        };

        let raw = match RawEnvelope::from_bytes(payload) {
            Ok(raw) => raw,
            Err(e) => {
                error!(topic = %topic, error = %e, "Failed to parse event envelope");
                return DispatchOutcome::Poison(e);
            }
        };

        if let Err(e) = raw.validate() {
            error!(topic = %topic, error = %e, "Invalid event envelope");
            return DispatchOutcome::Poison(e);
        }

        if let Err(e) = (entry.probe)(&raw.payload) {
            error!(
                topic = %topic,
                event_id = %raw.event_id,
                event_type = entry.event_type,
                error = %e,
                "Failed to deserialize event payload"
            );
            return DispatchOutcome::Poison(e);
        }

        if entry.handlers.is_empty() {
            debug!(topic = %topic, event_id = %raw.event_id, "No handlers registered, ignoring event");
            return DispatchOutcome::NoHandlers;
        }

        let mut failed = 0;
        let mut first_error: Option<EventError> = None;

        for handler in &entry.handlers {
            match handler.handle_raw(raw.clone()).await {
                Ok(()) => {
                    debug!(
                        topic = %topic,
                        event_id = %raw.event_id,
                        handler = handler.name(),
                        "Event handled successfully"
                    );
                }
                Err(e) => {
                    error!(
                        topic = %topic,
                        event_id = %raw.event_id,
                        handler = handler.name(),
                        error = %e,
                        "Event handler failed"
                    );
                    failed += 1;
                    if first_error.is_none() {
                        first_error = Some(EventError::HandlerFailed {
                            event_id: raw.event_id,
                            cause: e.to_string(),
                        });
                    }
                }
            }
        }

        match first_error {
            None => DispatchOutcome::Handled {
                handlers: entry.handlers.len(),
            },
            Some(error) => DispatchOutcome::Failed {
                failed,
                total: entry.handlers.len(),
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TestEvent {
        message: String,
    }

    impl Event for TestEvent {
        const TOPIC: &'static str = "emis.test.event";
        const EVENT_TYPE: &'static str = "emis.test.event";
    }

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler<TestEvent> for CountingHandler {
        async fn handle(&self, _envelope: EventEnvelope<TestEvent>) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler<TestEvent> for FailingHandler {
        async fn handle(&self, _envelope: EventEnvelope<TestEvent>) -> Result<(), HandlerError> {
            Err("boom".into())
        }
    }

    fn event_bytes(message: &str) -> Vec<u8> {
        EventEnvelope::new(TestEvent {
            message: message.to_string(),
        })
        .to_json_bytes()
        .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_unregistered_topic() {
        let registry = TopicRegistry::new();
        let outcome = registry.dispatch("emis.unknown", &event_bytes("x")).await;
        assert!(matches!(outcome, DispatchOutcome::NoRoute));
        assert!(outcome.should_commit());
    }

    #[tokio::test]
    async fn test_dispatch_zero_handlers_is_valid() {
        let mut registry = TopicRegistry::new();
        registry.register::<TestEvent>();

        let outcome = registry.dispatch(TestEvent::TOPIC, &event_bytes("x")).await;
        assert!(matches!(outcome, DispatchOutcome::NoHandlers));
        assert!(outcome.should_commit());
    }

    #[tokio::test]
    async fn test_dispatch_invokes_all_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = TopicRegistry::new();
        registry.add_handler(CountingHandler {
            calls: calls.clone(),
        });
        registry.add_handler(CountingHandler {
            calls: calls.clone(),
        });

        let outcome = registry.dispatch(TestEvent::TOPIC, &event_bytes("x")).await;
        assert!(matches!(outcome, DispatchOutcome::Handled { handlers: 2 }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_starve_siblings() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = TopicRegistry::new();
        registry.add_handler::<TestEvent, _>(FailingHandler);
        registry.add_handler(CountingHandler {
            calls: calls.clone(),
        });

        let outcome = registry.dispatch(TestEvent::TOPIC, &event_bytes("x")).await;
        match outcome {
            DispatchOutcome::Failed { failed, total, .. } => {
                assert_eq!(failed, 1);
                assert_eq!(total, 2);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        // The succeeding sibling still ran
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registry
            .dispatch(TestEvent::TOPIC, &event_bytes("x"))
            .await
            .should_commit());
    }

    #[tokio::test]
    async fn test_dispatch_poison_payload() {
        let mut registry = TopicRegistry::new();
        registry.register::<TestEvent>();

        let outcome = registry.dispatch(TestEvent::TOPIC, b"not json").await;
        assert!(matches!(outcome, DispatchOutcome::Poison(_)));
        assert!(outcome.should_commit());
    }

    #[tokio::test]
    async fn test_dispatch_wrong_payload_shape_is_poison() {
        let mut registry = TopicRegistry::new();
        registry.register::<TestEvent>();

        let bytes = serde_json::to_vec(&serde_json::json!({
            "eventId": uuid::Uuid::new_v4(),
            "eventType": "emis.test.event",
            "occurredAt": chrono::Utc::now(),
            "payload": {"unexpected": 7}
        }))
        .unwrap();

        let outcome = registry.dispatch(TestEvent::TOPIC, &bytes).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Poison(EventError::DeserializationFailed { .. })
        ));
    }

    #[test]
    fn test_topics_snapshot() {
        let mut registry = TopicRegistry::new();
        registry.register::<TestEvent>();
        registry.register::<TestEvent>();

        assert_eq!(registry.topics(), vec!["emis.test.event"]);
        assert_eq!(registry.handler_count(TestEvent::TOPIC), 0);
    }
}
