//! Core data models that flow through ingestion and retrieval.
//!
//! A document is never stored as an object of its own: it exists only
//! through its [`Chunk`]s, each of which becomes exactly one
//! [`IndexedRecord`] keyed by [`record_id`].

use serde::Serialize;

/// A bounded, possibly overlapping slice of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source_file: String,
    /// Position of the chunk in its document, starting at 0.
    pub chunk_index: usize,
}

impl Chunk {
    /// Identity of the record this chunk is stored under.
    pub fn id(&self) -> String {
        record_id(&self.source_file, self.chunk_index)
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source_file: self.source_file.clone(),
            chunk_index: self.chunk_index,
        }
    }
}

/// Metadata attached to every indexed record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChunkMetadata {
    pub source_file: String,
    pub chunk_index: usize,
}

/// A vector plus the text and metadata it was computed from.
///
/// Owned by the [`VectorIndex`](crate::index::VectorIndex); re-upserting
/// the same `id` replaces vector, text, and metadata together.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl IndexedRecord {
    /// Pair a chunk with its embedding.
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id(),
            metadata: ChunkMetadata {
                source_file: chunk.source_file,
                chunk_index: chunk.chunk_index,
            },
            text: chunk.text,
            vector,
        }
    }
}

/// One ranked hit from [`RetrievalPipeline::retrieve`](crate::retrieve::RetrievalPipeline::retrieve).
///
/// `score` is the cosine distance to the query: lower is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// Derive the stable record id for a chunk of a source file.
///
/// ```rust
/// assert_eq!(docrag::models::record_id("notes.txt", 3), "notes.txt__chunk__3");
/// ```
pub fn record_id(source_file: &str, chunk_index: usize) -> String {
    format!("{}__chunk__{}", source_file, chunk_index)
}
