//! Postgres-backed replica storage.
//!
//! One `replicas` table holds every synced collection, partitioned by the
//! `collection` column with a natural key of
//! `(collection, original_id, source_clinic)`. Rows are never deleted;
//! tombstones keep pull semantics correct for stale cursors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medsync_engine::{IdentitySignals, Replica};
use sqlx::{PgPool, Row};

use super::{ReplicaStore, StoreError};

const REPLICA_COLUMNS: &str =
    "collection, original_id, source_clinic, payload, synced_at, deleted, deleted_at";

/// A replica row from the database.
#[derive(Debug)]
struct StoredReplica(Replica);

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredReplica {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredReplica(Replica {
            collection: row.try_get("collection")?,
            original_id: row.try_get("original_id")?,
            source_clinic: row.try_get("source_clinic")?,
            payload: row.try_get("payload")?,
            synced_at: row.try_get("synced_at")?,
            deleted: row.try_get("deleted")?,
            deleted_at: row.try_get("deleted_at")?,
        }))
    }
}

/// Replica shadow storage persisted in PostgreSQL.
#[derive(Clone)]
pub struct PgReplicaStore {
    pool: PgPool,
}

impl PgReplicaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReplicaStore for PgReplicaStore {
    async fn get(
        &self,
        collection: &str,
        original_id: &str,
        source_clinic: &str,
    ) -> Result<Option<Replica>, StoreError> {
        let row = sqlx::query_as::<_, StoredReplica>(&format!(
            "SELECT {REPLICA_COLUMNS} FROM replicas \
             WHERE collection = $1 AND original_id = $2 AND source_clinic = $3"
        ))
        .bind(collection)
        .bind(original_id)
        .bind(source_clinic)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }

    async fn find_identity_match(
        &self,
        collection: &str,
        signals: &IdentitySignals,
        exclude_clinic: &str,
    ) -> Result<Option<Replica>, StoreError> {
        if signals.is_empty() {
            return Ok(None);
        }

        let (first, last, dob) = match &signals.name_dob {
            Some(nd) => (
                Some(nd.first.clone()),
                Some(nd.last.clone()),
                Some(nd.dob.clone()),
            ),
            None => (None, None, None),
        };

        let row = sqlx::query_as::<_, StoredReplica>(&format!(
            r#"
            SELECT {REPLICA_COLUMNS} FROM replicas
            WHERE collection = $1
              AND source_clinic <> $2
              AND deleted = FALSE
              AND (
                    ($3::text IS NOT NULL AND btrim(payload->>'nationalId') = $3)
                 OR ($4::text IS NOT NULL
                     AND lower(btrim(payload->>'firstName')) = $4
                     AND lower(btrim(payload->>'lastName')) = $5
                     AND btrim(payload->>'dateOfBirth') = $6)
              )
            LIMIT 1
            "#
        ))
        .bind(collection)
        .bind(exclude_clinic)
        .bind(&signals.national_id)
        .bind(first)
        .bind(last)
        .bind(dob)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }

    async fn upsert(&self, replica: &Replica) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO replicas (
                collection, original_id, source_clinic, payload,
                synced_at, deleted, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (collection, original_id, source_clinic) DO UPDATE SET
                payload = EXCLUDED.payload,
                synced_at = EXCLUDED.synced_at,
                deleted = EXCLUDED.deleted,
                deleted_at = EXCLUDED.deleted_at
            "#,
        )
        .bind(&replica.collection)
        .bind(&replica.original_id)
        .bind(&replica.source_clinic)
        .bind(&replica.payload)
        .bind(replica.synced_at)
        .bind(replica.deleted)
        .bind(replica.deleted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn tombstone(
        &self,
        collection: &str,
        original_id: &str,
        source_clinic: &str,
        deleted_at: DateTime<Utc>,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // Deleting a missing or already-deleted replica is a successful no-op.
        sqlx::query(
            r#"
            UPDATE replicas
            SET deleted = TRUE, deleted_at = $4, synced_at = $5
            WHERE collection = $1 AND original_id = $2 AND source_clinic = $3
              AND deleted = FALSE
            "#,
        )
        .bind(collection)
        .bind(original_id)
        .bind(source_clinic)
        .bind(deleted_at)
        .bind(synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn changes_since(
        &self,
        collections: &[String],
        exclude_clinic: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Replica>, StoreError> {
        let rows = sqlx::query_as::<_, StoredReplica>(&format!(
            r#"
            SELECT {REPLICA_COLUMNS} FROM replicas
            WHERE collection = ANY($1)
              AND source_clinic <> $2
              AND synced_at > $3
            ORDER BY synced_at ASC, original_id ASC
            "#
        ))
        .bind(collections)
        .bind(exclude_clinic)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
