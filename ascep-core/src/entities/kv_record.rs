//! Postgres-backed key/flat-map records.
//!
//! One row per key in `kv_records`; fields are a JSONB object of strings.
//! Rows past `expires_at` are invisible to reads and removed by
//! [`PurgeExpiredKvRecords`].

use crate::entities::FlatRecord;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::types::Json;

/// Merge `fields` into the record at `key`, creating it if missing.
#[derive(Debug, Clone)]
pub struct UpsertKvFields {
    pub key: String,
    pub fields: FlatRecord,
}

impl Processor<UpsertKvFields> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertKvFields")]
    async fn process(&self, upsert: UpsertKvFields) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO kv_records (key, fields)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE
            SET fields = CASE
                    WHEN kv_records.expires_at IS NOT NULL AND kv_records.expires_at <= now()
                    THEN EXCLUDED.fields
                    ELSE kv_records.fields || EXCLUDED.fields
                END,
                expires_at = CASE
                    WHEN kv_records.expires_at IS NOT NULL AND kv_records.expires_at <= now()
                    THEN NULL
                    ELSE kv_records.expires_at
                END
            "#,
        )
        .bind(upsert.key)
        .bind(Json(upsert.fields))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ReadKvRecord {
    pub key: String,
}

impl Processor<ReadKvRecord> for DatabaseProcessor {
    type Output = Option<FlatRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ReadKvRecord")]
    async fn process(&self, query: ReadKvRecord) -> Result<Option<FlatRecord>, sqlx::Error> {
        let row: Option<(Json<FlatRecord>,)> = sqlx::query_as(
            r#"
            SELECT fields
            FROM kv_records
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(query.key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(fields),)| fields))
    }
}

/// Returns whether a live record was removed.
#[derive(Debug, Clone)]
pub struct DeleteKvRecord {
    pub key: String,
}

impl Processor<DeleteKvRecord> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteKvRecord")]
    async fn process(&self, delete: DeleteKvRecord) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM kv_records
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(delete.key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
pub struct ExpireKvRecord {
    pub key: String,
    pub ttl_secs: i64,
}

impl Processor<ExpireKvRecord> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ExpireKvRecord")]
    async fn process(&self, expire: ExpireKvRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE kv_records
            SET expires_at = now() + ($2::bigint * interval '1 second')
            WHERE key = $1
            "#,
        )
        .bind(expire.key)
        .bind(expire.ttl_secs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeleteKvField {
    pub key: String,
    pub field: String,
}

impl Processor<DeleteKvField> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteKvField")]
    async fn process(&self, delete: DeleteKvField) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE kv_records
            SET fields = fields - $2
            WHERE key = $1
            "#,
        )
        .bind(delete.key)
        .bind(delete.field)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Returns the number of rows removed.
#[derive(Debug, Clone, Copy)]
pub struct PurgeExpiredKvRecords;

impl Processor<PurgeExpiredKvRecords> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PurgeExpiredKvRecords")]
    async fn process(&self, _: PurgeExpiredKvRecords) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM kv_records
            WHERE expires_at IS NOT NULL AND expires_at <= now()
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
