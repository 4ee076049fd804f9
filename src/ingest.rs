//! Ingestion pipeline orchestration.
//!
//! Coordinates chunking → embedding → indexing for one document:
//!
//! 1. Chunk the text ([`chunk_document`]); `chunk_index` is the position
//!    in the chunk sequence.
//! 2. Embed every chunk in a single provider call.
//! 3. Upsert all records in a single [`VectorIndex::upsert`] call.
//! 4. Flush the index (best-effort).
//!
//! Nothing reaches the index until every chunk has a vector, and the upsert
//! itself is all-or-nothing, so a provider failure, a dimension mismatch,
//! or a cancelled ingestion never leaves part of a document visible.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::chunk::{chunk_document, ChunkParams};
use crate::embedding::{embed_checked, EmbeddingProvider};
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::IndexedRecord;

pub struct IngestPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    timeout: Duration,
}

impl IngestPipeline {
    /// `timeout` bounds the embedding call for one document.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            index,
            timeout,
        }
    }

    /// Chunk, embed, and index `document_text` under `source_file`.
    ///
    /// Returns the number of chunks indexed; `0` for an empty or
    /// whitespace-only document.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`](crate::error::RagError::Config) if
    ///   `chunk_size == 0` or `overlap >= chunk_size` (checked before any work).
    /// - [`RagError::Provider`](crate::error::RagError::Provider) if embedding fails.
    /// - [`RagError::DimensionMismatch`](crate::error::RagError::DimensionMismatch)
    ///   if the vectors disagree with the index.
    pub async fn ingest(
        &self,
        document_text: &str,
        source_file: &str,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<usize> {
        let params = ChunkParams::new(chunk_size, overlap)?;
        self.ingest_with_params(document_text, source_file, &params)
            .await
    }

    /// Same as [`ingest`](Self::ingest) with pre-validated parameters.
    pub async fn ingest_with_params(
        &self,
        document_text: &str,
        source_file: &str,
        params: &ChunkParams,
    ) -> Result<usize> {
        let chunks = chunk_document(source_file, document_text, params);
        if chunks.is_empty() {
            info!(source_file, chunk_count = 0, "ingested document (empty)");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_checked(self.provider.as_ref(), &texts, self.timeout)
            .await
            .map_err(|e| {
                error!(source_file, error = %e, "embedding failed during ingestion");
                e
            })?;

        let records: Vec<IndexedRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedRecord::from_chunk(chunk, vector))
            .collect();

        let chunk_count = self.index.upsert(records).await.map_err(|e| {
            error!(source_file, error = %e, "upsert failed during ingestion");
            e
        })?;

        self.index.persist().await;

        info!(source_file, chunk_count, "ingested document");
        Ok(chunk_count)
    }
}
