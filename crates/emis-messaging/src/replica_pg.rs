//! Postgres-backed replica store.
//!
//! Expects the `class_info_replica` table:
//!
//! ```sql
//! CREATE TABLE class_info_replica (
//!     class_id        UUID PRIMARY KEY,
//!     class_name      TEXT NOT NULL,
//!     grade           TEXT,
//!     academic_year   TEXT,
//!     total_students  INT,
//!     school_id       UUID,
//!     last_synced_at  TIMESTAMPTZ NOT NULL,
//!     sync_source     TEXT NOT NULL
//! );
//! ```

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::replica::{ClassReplica, ReplicaStore, UpsertOutcome};
use crate::store::StoreError;

/// Replica store over a Postgres pool.
pub struct PgReplicaStore {
    pool: PgPool,
}

impl PgReplicaStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReplicaStore for PgReplicaStore {
    /// Whole-row upsert guarded by `last_synced_at`: a stale event leaves
    /// the stored row untouched. `xmax = 0` distinguishes a fresh insert
    /// from an overwrite.
    #[instrument(skip(self, replica), fields(class_id = %replica.class_id))]
    async fn upsert(&self, replica: ClassReplica) -> Result<UpsertOutcome, StoreError> {
        let row: Option<(bool,)> = sqlx::query_as(
            r"
            INSERT INTO class_info_replica
                (class_id, class_name, grade, academic_year, total_students,
                 school_id, last_synced_at, sync_source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (class_id) DO UPDATE SET
                class_name = excluded.class_name,
                grade = excluded.grade,
                academic_year = excluded.academic_year,
                total_students = excluded.total_students,
                school_id = excluded.school_id,
                last_synced_at = excluded.last_synced_at,
                sync_source = excluded.sync_source
            WHERE excluded.last_synced_at >= class_info_replica.last_synced_at
            RETURNING (xmax = 0) AS inserted
            ",
        )
        .bind(replica.class_id)
        .bind(&replica.class_name)
        .bind(&replica.grade)
        .bind(&replica.academic_year)
        .bind(replica.total_students)
        .bind(replica.school_id)
        .bind(replica.last_synced_at)
        .bind(&replica.sync_source)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable {
            cause: e.to_string(),
        })?;

        Ok(match row {
            None => UpsertOutcome::StaleSkipped,
            Some((true,)) => UpsertOutcome::Inserted,
            Some((false,)) => UpsertOutcome::Updated,
        })
    }

    async fn get(&self, class_id: Uuid) -> Result<Option<ClassReplica>, StoreError> {
        sqlx::query_as::<_, ClassReplica>(
            r"
            SELECT class_id, class_name, grade, academic_year, total_students,
                   school_id, last_synced_at, sync_source
            FROM class_info_replica
            WHERE class_id = $1
            ",
        )
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable {
            cause: e.to_string(),
        })
    }
}
