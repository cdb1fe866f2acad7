//! Local replica of class information, kept fresh via events.
//!
//! Instead of synchronous cross-service calls, consumers of class
//! metadata hold a denormalized copy updated from `ClassCreated` /
//! `ClassUpdated` events. Upserts are idempotent and last-write-wins by
//! the event's timestamp, so replays and create/update arriving out of
//! order both converge on the newest state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use emis_events::events::{ClassCreated, ClassUpdated};
use emis_events::{EventEnvelope, EventHandler, HandlerError};

use crate::store::StoreError;

/// Source tag recorded on synced replicas.
const SYNC_SOURCE: &str = "class-service";

/// Denormalized copy of a class, keyed by the owning service's class id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct ClassReplica {
    /// Canonical class id from the owning service (unique).
    pub class_id: Uuid,
    pub class_name: String,
    pub grade: Option<String>,
    pub academic_year: Option<String>,
    pub total_students: Option<i32>,
    pub school_id: Option<Uuid>,
    /// Timestamp of the event this state was taken from.
    pub last_synced_at: DateTime<Utc>,
    /// Which service the state came from.
    pub sync_source: String,
}

impl ClassReplica {
    /// Build a replica from a creation event.
    #[must_use]
    pub fn from_created(envelope: &EventEnvelope<ClassCreated>) -> Self {
        let event = &envelope.payload;
        Self {
            class_id: event.class_id,
            class_name: event.class_name.clone(),
            grade: event.grade.clone(),
            academic_year: event.academic_year.clone(),
            total_students: event.total_students,
            school_id: event.school_id,
            last_synced_at: envelope.occurred_at,
            sync_source: SYNC_SOURCE.to_string(),
        }
    }

    /// Build a replica from an update event.
    #[must_use]
    pub fn from_updated(envelope: &EventEnvelope<ClassUpdated>) -> Self {
        let event = &envelope.payload;
        Self {
            class_id: event.class_id,
            class_name: event.class_name.clone(),
            grade: event.grade.clone(),
            academic_year: event.academic_year.clone(),
            total_students: event.total_students,
            school_id: event.school_id,
            last_synced_at: envelope.occurred_at,
            sync_source: SYNC_SOURCE.to_string(),
        }
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No replica existed; one was inserted.
    Inserted,
    /// An older replica was overwritten.
    Updated,
    /// The stored replica is newer than the event; nothing changed.
    StaleSkipped,
}

/// Replica persistence.
///
/// Implementations must apply the whole row atomically (no partial
/// writes) and enforce last-write-wins on `last_synced_at`: an upsert
/// whose timestamp is older than the stored row returns
/// [`UpsertOutcome::StaleSkipped`] and leaves the row untouched. Equal
/// timestamps apply, which makes replaying an event a no-op that still
/// converges.
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    /// Insert or overwrite the replica for `replica.class_id`.
    async fn upsert(&self, replica: ClassReplica) -> Result<UpsertOutcome, StoreError>;

    /// Fetch a replica by class id.
    async fn get(&self, class_id: Uuid) -> Result<Option<ClassReplica>, StoreError>;
}

/// Keeps the local class-info replica in sync with class events.
pub struct ClassReplicaSynchronizer<R> {
    store: Arc<R>,
}

impl<R: ReplicaStore> ClassReplicaSynchronizer<R> {
    /// Create a synchronizer over a replica store.
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    async fn sync(&self, replica: ClassReplica) -> Result<(), HandlerError> {
        let class_id = replica.class_id;
        let outcome = self.store.upsert(replica).await?;

        match outcome {
            UpsertOutcome::Inserted => {
                info!(class_id = %class_id, "Class replica created");
            }
            UpsertOutcome::Updated => {
                info!(class_id = %class_id, "Class replica updated");
            }
            UpsertOutcome::StaleSkipped => {
                debug!(class_id = %class_id, "Stale class event ignored");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<R: ReplicaStore + 'static> EventHandler<ClassCreated> for ClassReplicaSynchronizer<R> {
    async fn handle(&self, envelope: EventEnvelope<ClassCreated>) -> Result<(), HandlerError> {
        self.sync(ClassReplica::from_created(&envelope)).await
    }
}

#[async_trait]
impl<R: ReplicaStore + 'static> EventHandler<ClassUpdated> for ClassReplicaSynchronizer<R> {
    async fn handle(&self, envelope: EventEnvelope<ClassUpdated>) -> Result<(), HandlerError> {
        self.sync(ClassReplica::from_updated(&envelope)).await
    }
}
