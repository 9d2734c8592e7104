use std::time::Duration;

use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;

use super::{DurableStore, SinkError};
use crate::entities::FlatRecord;
use crate::entities::kv_record::{
    DeleteKvField, DeleteKvRecord, ExpireKvRecord, PurgeExpiredKvRecords, ReadKvRecord,
    UpsertKvFields,
};
use crate::framework::DatabaseProcessor;

/// Durable store on the `kv_records` table.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor { pool },
        }
    }
}

#[async_trait]
impl DurableStore for PgStore {
    async fn upsert(&self, key: &str, fields: FlatRecord) -> Result<(), SinkError> {
        self.db
            .process(UpsertKvFields {
                key: key.to_owned(),
                fields,
            })
            .await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<FlatRecord>, SinkError> {
        Ok(self
            .db
            .process(ReadKvRecord {
                key: key.to_owned(),
            })
            .await?)
    }

    async fn delete(&self, key: &str) -> Result<bool, SinkError> {
        Ok(self
            .db
            .process(DeleteKvRecord {
                key: key.to_owned(),
            })
            .await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), SinkError> {
        self.db
            .process(ExpireKvRecord {
                key: key.to_owned(),
                ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            })
            .await?;
        Ok(())
    }

    async fn delete_field(&self, key: &str, field: &str) -> Result<(), SinkError> {
        self.db
            .process(DeleteKvField {
                key: key.to_owned(),
                field: field.to_owned(),
            })
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SinkError> {
        Ok(self.db.process(PurgeExpiredKvRecords).await?)
    }
}
