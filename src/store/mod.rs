//! Durable storage behind the vector index.
//!
//! The [`RecordStore`] trait is the persistence collaborator of
//! [`VectorIndex`](crate::index::VectorIndex): it only has to reload
//! everything that was flushed before and write a batch of records
//! atomically. Searching never touches the store.
//!
//! | Implementation | Use |
//! |----------------|-----|
//! | [`SqliteRecordStore`] | On-disk storage (sqlx, WAL mode) |
//! | [`MemoryRecordStore`] | Process-lifetime storage for tests and embedding |

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::IndexedRecord;

/// A record together with its insertion sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    pub seq: u64,
    pub record: IndexedRecord,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load every stored record, ordered by ascending `seq`.
    async fn load_all(&self) -> Result<Vec<PersistedRecord>>;

    /// Insert or replace `records` by id, all or nothing.
    ///
    /// An existing id keeps the `seq` it was first written with.
    async fn write_batch(&self, records: &[PersistedRecord]) -> Result<()>;
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use docrag::store::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Trailing partial values are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
