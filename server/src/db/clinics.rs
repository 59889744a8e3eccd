//! Postgres-backed clinic registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medsync_engine::{ClinicRegistration, ClinicStatus};
use sqlx::{PgPool, Row};

use super::{ClinicStore, StoreError, SyncCursor};

const CLINIC_COLUMNS: &str = "clinic_id, name, short_name, secret_hash, api_key, status, \
     sync_enabled, allowed_collections, sync_interval_minutes, \
     last_push_at, last_pull_at, last_sync_at, \
     last_seen_at, last_ip, last_agent, suspension_reason, approved_by, \
     created_at, updated_at";

/// A clinic registration row from the database.
#[derive(Debug)]
struct StoredClinic(ClinicRegistration);

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredClinic {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        let status_raw: String = row.try_get("status")?;
        let status = status_raw
            .parse::<ClinicStatus>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".into(),
                source: Box::new(e),
            })?;

        Ok(StoredClinic(ClinicRegistration {
            clinic_id: row.try_get("clinic_id")?,
            name: row.try_get("name")?,
            short_name: row.try_get("short_name")?,
            secret_hash: row.try_get("secret_hash")?,
            api_key: row.try_get("api_key")?,
            status,
            sync_enabled: row.try_get("sync_enabled")?,
            allowed_collections: row.try_get("allowed_collections")?,
            sync_interval_minutes: row.try_get("sync_interval_minutes")?,
            last_push_at: row.try_get("last_push_at")?,
            last_pull_at: row.try_get("last_pull_at")?,
            last_sync_at: row.try_get("last_sync_at")?,
            last_seen_at: row.try_get("last_seen_at")?,
            last_ip: row.try_get("last_ip")?,
            last_agent: row.try_get("last_agent")?,
            suspension_reason: row.try_get("suspension_reason")?,
            approved_by: row.try_get("approved_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

/// Clinic registry persisted in PostgreSQL.
#[derive(Clone)]
pub struct PgClinicStore {
    pool: PgPool,
}

impl PgClinicStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClinicStore for PgClinicStore {
    async fn insert(&self, registration: &ClinicRegistration) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO clinics (
                clinic_id, name, short_name, secret_hash, api_key, status,
                sync_enabled, allowed_collections, sync_interval_minutes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&registration.clinic_id)
        .bind(&registration.name)
        .bind(&registration.short_name)
        .bind(&registration.secret_hash)
        .bind(&registration.api_key)
        .bind(registration.status.as_str())
        .bind(registration.sync_enabled)
        .bind(&registration.allowed_collections)
        .bind(registration.sync_interval_minutes)
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    async fn find(&self, clinic_id: &str) -> Result<Option<ClinicRegistration>, StoreError> {
        let row = sqlx::query_as::<_, StoredClinic>(&format!(
            "SELECT {CLINIC_COLUMNS} FROM clinics WHERE clinic_id = $1"
        ))
        .bind(clinic_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|c| c.0))
    }

    async fn find_active(&self, clinic_id: &str) -> Result<Option<ClinicRegistration>, StoreError> {
        let row = sqlx::query_as::<_, StoredClinic>(&format!(
            "SELECT {CLINIC_COLUMNS} FROM clinics WHERE clinic_id = $1 AND status = 'active'"
        ))
        .bind(clinic_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|c| c.0))
    }

    async fn list(&self) -> Result<Vec<ClinicRegistration>, StoreError> {
        let rows = sqlx::query_as::<_, StoredClinic>(&format!(
            "SELECT {CLINIC_COLUMNS} FROM clinics ORDER BY clinic_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|c| c.0).collect())
    }

    async fn update_status(
        &self,
        clinic_id: &str,
        status: ClinicStatus,
        approved_by: Option<&str>,
        suspension_reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE clinics
            SET status = $2,
                approved_by = COALESCE($3, approved_by),
                suspension_reason = $4,
                updated_at = $5
            WHERE clinic_id = $1
            "#,
        )
        .bind(clinic_id)
        .bind(status.as_str())
        .bind(approved_by)
        .bind(suspension_reason)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_secret(
        &self,
        clinic_id: &str,
        secret_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE clinics SET secret_hash = $2, updated_at = $3 WHERE clinic_id = $1")
            .bind(clinic_id)
            .bind(secret_hash)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_heartbeat(
        &self,
        clinic_id: &str,
        now: DateTime<Utc>,
        ip: Option<String>,
        agent: Option<String>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE clinics
            SET last_seen_at = $2,
                last_ip = COALESCE($3, last_ip),
                last_agent = COALESCE($4, last_agent)
            WHERE clinic_id = $1
            "#,
        )
        .bind(clinic_id)
        .bind(now)
        .bind(ip)
        .bind(agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn advance_cursor(
        &self,
        clinic_id: &str,
        cursor: SyncCursor,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let sql = match cursor {
            SyncCursor::Push => {
                "UPDATE clinics SET last_push_at = $2, last_sync_at = $2 WHERE clinic_id = $1"
            }
            SyncCursor::Pull => {
                "UPDATE clinics SET last_pull_at = $2, last_sync_at = $2 WHERE clinic_id = $1"
            }
            SyncCursor::Full => "UPDATE clinics SET last_sync_at = $2 WHERE clinic_id = $1",
        };

        sqlx::query(sql)
            .bind(clinic_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Check if a SQL error is a unique constraint violation.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = e {
        // PostgreSQL unique violation code is "23505"
        db_err.code().map(|c| c == "23505").unwrap_or(false)
    } else {
        false
    }
}
