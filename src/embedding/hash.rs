//! Deterministic token-hashing embedder.
//!
//! Lowercases the text, splits it on non-alphanumeric characters, and adds
//! 1.0 to the bucket `sha256(token) mod dims` for every token. The result
//! is L2-normalized. Texts sharing many tokens get high cosine similarity,
//! which is enough for offline use and for reproducible tests; it has no
//! notion of synonyms.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Dimensionality used when the config does not set `embedding.dims`.
pub const DEFAULT_DIMS: usize = 384;

pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(RagError::Config("embedding.dims must be > 0".to_string()));
        }
        Ok(Self { dims })
    }

    /// Embed one text synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[self.bucket(&token.to_lowercase())] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(prefix) % self.dims as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
