use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use ytintel_core::{CacheKey, ReportStore, StoreError};

#[derive(Debug)]
struct Record {
    stored_at: Instant,
    bytes: Vec<u8>,
}

/// Process-local [`ReportStore`], used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(key.digest())
            .map(|record| record.bytes.clone()))
    }

    async fn store(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<(), StoreError> {
        let record = Record {
            stored_at: Instant::now(),
            bytes,
        };
        self.records
            .write()
            .await
            .insert(key.digest().to_owned(), record);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.records.write().await.remove(key.digest());
        Ok(())
    }

    async fn purge_older_than(&self, age: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| now.duration_since(record.stored_at) <= age);
        Ok(u64::try_from(before - records.len()).unwrap_or(u64::MAX))
    }
}
