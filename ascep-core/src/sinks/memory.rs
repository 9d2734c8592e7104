use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use time::OffsetDateTime;

use super::{DurableStore, SinkError};
use crate::entities::FlatRecord;

struct StoredRecord {
    fields: FlatRecord,
    expires_at: Option<OffsetDateTime>,
}

impl StoredRecord {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local store.
///
/// An expired record is removed when `read` or `delete` touches it. Keys
/// that are never touched again go on the next `purge_expired` pass.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, StoredRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time to live, if the key exists and has one.
    pub fn ttl(&self, key: &str) -> Option<time::Duration> {
        let now = OffsetDateTime::now_utc();
        let records = self.records.read();
        let record = records.get(key).filter(|r| r.is_live(now))?;
        record.expires_at.map(|at| at - now)
    }

    pub fn len(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        self.records.read().values().filter(|r| r.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn upsert(&self, key: &str, fields: FlatRecord) -> Result<(), SinkError> {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.write();
        match records.get_mut(key) {
            Some(record) if record.is_live(now) => record.fields.extend(fields),
            _ => {
                records.insert(
                    key.to_owned(),
                    StoredRecord {
                        fields,
                        expires_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<FlatRecord>, SinkError> {
        let now = OffsetDateTime::now_utc();
        {
            let records = self.records.read();
            match records.get(key) {
                None => return Ok(None),
                Some(record) if record.is_live(now) => return Ok(Some(record.fields.clone())),
                Some(_) => {}
            }
        }
        let mut records = self.records.write();
        if records.get(key).is_some_and(|r| !r.is_live(now)) {
            records.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<bool, SinkError> {
        let now = OffsetDateTime::now_utc();
        let removed = self.records.write().remove(key);
        Ok(removed.is_some_and(|r| r.is_live(now)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), SinkError> {
        let now = OffsetDateTime::now_utc();
        if let Some(record) = self.records.write().get_mut(key) {
            record.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    async fn delete_field(&self, key: &str, field: &str) -> Result<(), SinkError> {
        if let Some(record) = self.records.write().get_mut(key) {
            record.fields.remove(field);
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SinkError> {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| record.is_live(now));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> FlatRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_upsert_merges_fields() {
        let store = InMemoryStore::new();
        store.upsert("cep_rules", record(&[("1", "a")])).await.unwrap();
        store.upsert("cep_rules", record(&[("2", "b"), ("1", "c")])).await.unwrap();
        let fields = store.read("cep_rules").await.unwrap().unwrap();
        assert_eq!(fields, record(&[("1", "c"), ("2", "b")]));

        store.delete_field("cep_rules", "1").await.unwrap();
        let fields = store.read("cep_rules").await.unwrap().unwrap();
        assert_eq!(fields, record(&[("2", "b")]));
    }

    #[tokio::test]
    async fn test_expiry_hides_record() {
        let store = InMemoryStore::new();
        store.upsert("signal:1", record(&[("id", "1")])).await.unwrap();
        store.expire("signal:1", Duration::from_secs(86_400)).await.unwrap();
        let ttl = store.ttl("signal:1").unwrap();
        assert!(ttl > time::Duration::hours(23));

        store.expire("signal:1", Duration::ZERO).await.unwrap();
        assert_eq!(store.read("signal:1").await.unwrap(), None);
        assert!(!store.delete("signal:1").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_expired_records_are_evicted() {
        let store = InMemoryStore::new();
        for id in 0..1000 {
            let key = format!("signal:{id}");
            store.upsert(&key, record(&[("id", "x")])).await.unwrap();
            store.expire(&key, Duration::ZERO).await.unwrap();
        }
        store.upsert("cep_rules", record(&[("1", "a")])).await.unwrap();

        assert_eq!(store.read("signal:0").await.unwrap(), None);
        assert!(!store.delete("signal:1").await.unwrap());
        assert_eq!(store.records.read().len(), 999);

        assert_eq!(store.purge_expired().await.unwrap(), 998);
        assert_eq!(store.records.read().len(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = InMemoryStore::new();
        assert!(!store.delete("missing").await.unwrap());
        store.upsert("k", record(&[("a", "1")])).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert_eq!(store.read("k").await.unwrap(), None);
    }
}
