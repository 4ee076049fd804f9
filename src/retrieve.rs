//! Retrieval pipeline: embed the query, search the index, rank results.
//!
//! Results keep the index ordering: ascending cosine distance, ties by
//! insertion order. An empty index is a successful empty result; a failed
//! query embedding is an error, never an empty result.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::models::RetrievalResult;

pub struct RetrievalPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    timeout: Duration,
}

impl RetrievalPipeline {
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

    /// Return up to `top_k` chunks most relevant to `query`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] if `top_k == 0`.
    /// - [`RagError::Provider`] if the query cannot be embedded.
    /// - [`RagError::DimensionMismatch`] if the provider's vectors do not
    ///   match the index.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Err(RagError::Config("top_k must be > 0".to_string()));
        }

        let query_vector = embed_query(self.provider.as_ref(), query, self.timeout)
            .await
            .map_err(|e| {
                error!(error = %e, "embedding failed during query");
                e
            })?;

        let hits = self.index.search(&query_vector, top_k).await.map_err(|e| {
            error!(error = %e, "vector index search failed");
            e
        })?;

        let results: Vec<RetrievalResult> = hits
            .into_iter()
            .map(|hit| RetrievalResult {
                text: hit.record.text,
                metadata: hit.record.metadata,
                score: hit.score,
            })
            .collect();

        info!(top_k, result_count = results.len(), "query completed");
        Ok(results)
    }
}
