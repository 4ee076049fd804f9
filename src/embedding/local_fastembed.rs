//! Local inference via fastembed (bundled ONNX Runtime).
//!
//! Models are downloaded from Hugging Face on first use and cached; after
//! that, embedding runs entirely offline. The default model is
//! `all-minilm-l6-v2` (384 dimensions).

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{local_model_dims, EmbeddingProvider, DEFAULT_LOCAL_MODEL};
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// Embedding provider running a sentence-transformer model in-process.
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<Mutex<fastembed::TextEmbedding>>,
}

impl LocalProvider {
    /// Load (downloading if needed) the configured model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] for unknown model names, for an
    /// `embedding.dims` that differs from the model's output size, or if the
    /// model cannot be initialized.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
        let fastembed_model = config_to_fastembed_model(&model_name)?;
        let dims = resolve_dims(&model_name, config.dims)?;

        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| {
            RagError::Config(format!("Failed to initialize local embedding model: {}", e))
        })?;

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: Arc::new(Mutex::new(model)),
        })
    }
}

/// Output size of `model_name`; a configured `dims` must agree with it.
fn resolve_dims(model_name: &str, configured: Option<usize>) -> Result<usize> {
    let native = local_model_dims(model_name).ok_or_else(|| {
        RagError::Config(format!("Unknown local embedding model: '{}'", model_name))
    })?;
    match configured {
        Some(dims) if dims != native => Err(RagError::Config(format!(
            "embedding.dims = {} but local model '{}' produces {}-dimensional vectors",
            dims, model_name, native
        ))),
        _ => Ok(native),
    }
}

fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => Err(RagError::Config(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ))),
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let model_name = self.model_name.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| RagError::provider(&model_name, "model mutex poisoned"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| RagError::provider(&model_name, format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| RagError::provider(&self.model_name, format!("embedding task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims_default_to_model_output() {
        assert_eq!(resolve_dims("all-minilm-l6-v2", None).unwrap(), 384);
        assert_eq!(resolve_dims("bge-base-en-v1.5", Some(768)).unwrap(), 768);
    }

    #[test]
    fn test_dims_mismatch_rejected() {
        let err = resolve_dims("all-minilm-l6-v2", Some(1536)).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
        assert!(resolve_dims("not-a-model", None).is_err());
    }
}
