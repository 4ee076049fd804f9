//! Error types for `docrag`.
//!
//! Every fallible library operation returns [`Result`]. The variants map
//! one-to-one onto the failure classes callers need to tell apart:
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | [`RagError::Config`] | Chunk or query parameters are invalid (checked before any work) |
//! | [`RagError::Provider`] | The embedding provider timed out or returned unusable output |
//! | [`RagError::DimensionMismatch`] | A vector's length disagrees with the index |
//! | [`RagError::Storage`] | The persistence backend could not be opened or read |
//! | [`RagError::Extract`] | Raw document bytes could not be turned into text |
//!
//! A failed flush to durable storage is *not* an error: the index logs it
//! and keeps serving from memory (see [`VectorIndex::persist`](crate::index::VectorIndex::persist)).

use thiserror::Error;

/// Errors produced by chunking, embedding, indexing, and retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking or retrieval parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The embedding provider failed, timed out, or returned malformed output.
    #[error("Embedding provider error ({provider}): {message}")]
    Provider {
        /// Model or provider name that produced the failure.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector's dimensionality disagrees with the index's established one.
    #[error("Dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        /// Dimensionality established by the index.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// The persistence backend could not be opened, migrated, or read.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Document text extraction failed.
    #[error("Extraction error: {0}")]
    Extract(String),
}

impl RagError {
    pub(crate) fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for RagError {
    fn from(e: sqlx::Error) -> Self {
        RagError::Storage(e.to_string())
    }
}

/// A convenience result type for `docrag` operations.
pub type Result<T> = std::result::Result<T, RagError>;
