//! In-memory [`RecordStore`] implementation.
//!
//! Keeps flushed records in a `HashMap` behind a `tokio::sync::RwLock`.
//! Useful for tests and for sharing one "durable" copy between several
//! index instances in the same process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PersistedRecord, RecordStore};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, PersistedRecord>>,
}

impl MemoryRecordStore {
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
impl RecordStore for MemoryRecordStore {
    async fn load_all(&self) -> Result<Vec<PersistedRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<PersistedRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.seq);
        Ok(all)
    }

    async fn write_batch(&self, batch: &[PersistedRecord]) -> Result<()> {
        let mut records = self.records.write().await;
        for incoming in batch {
            let seq = records
                .get(&incoming.record.id)
                .map(|existing| existing.seq)
                .unwrap_or(incoming.seq);
            records.insert(
                incoming.record.id.clone(),
                PersistedRecord {
                    seq,
                    record: incoming.record.clone(),
                },
            );
        }
        Ok(())
    }
}
