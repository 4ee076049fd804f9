//! SQLite-backed [`RecordStore`] implementation.
//!
//! One row per indexed record in the `records` table (see
//! [`migrate`](crate::migrate)). Vectors are stored as little-endian f32
//! BLOBs alongside their dimensionality so that a truncated row is
//! detected on reload instead of silently producing a short vector.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use super::{blob_to_vec, vec_to_blob, PersistedRecord, RecordStore};
use crate::db;
use crate::error::{RagError, Result};
use crate::migrate;
use crate::models::{ChunkMetadata, IndexedRecord};

/// SQLite implementation of the [`RecordStore`] trait.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if missing) the database at `path` and ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Close the underlying pool, waiting for in-flight statements.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn load_all(&self) -> Result<Vec<PersistedRecord>> {
        let rows = sqlx::query(
            "SELECT id, seq, source_file, chunk_index, text, dims, embedding FROM records ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let dims: i64 = row.get("dims");
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                if vector.len() as i64 != dims || blob.len() % 4 != 0 {
                    return Err(RagError::Storage(format!(
                        "record '{}' is corrupt: {} bytes for {} dims",
                        id,
                        blob.len(),
                        dims
                    )));
                }
                let seq: i64 = row.get("seq");
                let chunk_index: i64 = row.get("chunk_index");
                Ok(PersistedRecord {
                    seq: seq as u64,
                    record: IndexedRecord {
                        id,
                        vector,
                        text: row.get("text"),
                        metadata: ChunkMetadata {
                            source_file: row.get("source_file"),
                            chunk_index: chunk_index as usize,
                        },
                    },
                })
            })
            .collect()
    }

    async fn write_batch(&self, records: &[PersistedRecord]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for persisted in records {
            let record = &persisted.record;
            sqlx::query(
                r#"
                INSERT INTO records (id, seq, source_file, chunk_index, text, dims, embedding, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source_file = excluded.source_file,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    dims = excluded.dims,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&record.id)
            .bind(persisted.seq as i64)
            .bind(&record.metadata.source_file)
            .bind(record.metadata.chunk_index as i64)
            .bind(&record.text)
            .bind(record.vector.len() as i64)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
