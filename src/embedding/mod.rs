//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`HashProvider`]**: deterministic token hashing; offline, no model needed.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API with retry and backoff.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalProvider`**: runs sentence-transformer models locally via fastembed
//!   (feature `local-embeddings-fastembed`).
//!
//! Pipelines never call [`EmbeddingProvider::embed`] directly: they go
//! through [`embed_checked`], which bounds the call with a timeout and
//! rejects malformed output so that a misbehaving provider surfaces as
//! [`RagError::Provider`] instead of as bad vectors in the index.
//!
//! # Retry Strategy
//!
//! Retrying is the provider's business, not the pipeline's. The OpenAI and
//! Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

mod hash;
#[cfg(feature = "local-embeddings-fastembed")]
mod local_fastembed;

pub use hash::HashProvider;
#[cfg(feature = "local-embeddings-fastembed")]
pub use local_fastembed::LocalProvider;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// Trait for embedding providers.
///
/// `embed` returns one vector per input text, in input order, and every
/// vector produced by one provider instance has length [`dims`](Self::dims).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a batch through `provider`, enforcing the provider contract.
///
/// # Errors
///
/// Returns [`RagError::Provider`] if the call fails, does not finish within
/// `timeout`, returns a different number of vectors than texts, or returns
/// a vector whose length is not `provider.dims()`.
pub async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    timeout: Duration,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let model = provider.model_name();
    let vectors = match tokio::time::timeout(timeout, provider.embed(texts)).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(model, timeout_ms = timeout.as_millis() as u64, "embedding call timed out");
            return Err(RagError::provider(
                model,
                format!("timed out after {:?}", timeout),
            ));
        }
    };

    if vectors.len() != texts.len() {
        return Err(RagError::provider(
            model,
            format!(
                "returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            ),
        ));
    }

    let dims = provider.dims();
    if let Some(bad) = vectors.iter().find(|v| v.is_empty() || v.len() != dims) {
        return Err(RagError::provider(
            model,
            format!("returned a {}-dimensional vector, expected {}", bad.len(), dims),
        ));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(RagError::provider(model, "returned a non-finite value"));
    }

    debug!(model, count = vectors.len(), dims, "embedded batch");
    Ok(vectors)
}

/// Embed a single query text.
///
/// Convenience wrapper around [`embed_checked`] for search queries.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>> {
    let results = embed_checked(provider, &[text.to_string()], timeout).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| RagError::provider(provider.model_name(), "empty embedding response"))
}

/// Create the [`EmbeddingProvider`] named by the configuration.
///
/// # Supported Providers
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"hash"` | [`HashProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"local"` | `LocalProvider` (requires `local-embeddings-fastembed`) |
///
/// # Errors
///
/// Returns [`RagError::Config`] for unknown provider names or if the
/// provider cannot be initialized (missing config, API key, or feature flag).
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashProvider::new(
            config.dims.unwrap_or(hash::DEFAULT_DIMS),
        )?)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(RagError::Config(
            "Local embedding provider requires --features local-embeddings-fastembed".to_string(),
        )),
        other => Err(RagError::Config(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

fn required_model(config: &EmbeddingConfig, provider: &str) -> Result<String> {
    config.model.clone().ok_or_else(|| {
        RagError::Config(format!("embedding.model required for {} provider", provider))
    })
}

fn required_dims(config: &EmbeddingConfig, provider: &str) -> Result<usize> {
    config.dims.ok_or_else(|| {
        RagError::Config(format!("embedding.dims required for {} provider", provider))
    })
}

fn build_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| RagError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Delay before retry `attempt` (1-based): 1s, 2s, 4s, ... capped at 32s.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

/// Total time spent sleeping between attempts when every retry is used.
///
/// The whole retry loop runs inside one [`embed_checked`] timeout, so a
/// timeout shorter than this cuts off the last retries.
pub fn retry_backoff_total(max_retries: u32) -> Duration {
    (1..=max_retries).map(backoff).sum()
}

/// Model used by the `local` provider when `embedding.model` is unset.
pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

/// Native output dimensionality of the supported local models.
pub fn local_model_dims(model: &str) -> Option<usize> {
    match model {
        "all-minilm-l6-v2" | "bge-small-en-v1.5" | "multilingual-e5-small" => Some(384),
        "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => Some(768),
        "bge-large-en-v1.5" => Some(1024),
        _ => None,
    }
}

/// Send `request`, retrying 429/5xx and network errors with backoff.
async fn post_with_retry(
    request: &reqwest::RequestBuilder,
    model: &str,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tokio::time::sleep(backoff(attempt)).await;
        }

        let attempt_request = request
            .try_clone()
            .ok_or_else(|| RagError::provider(model, "request body is not cloneable"))?;

        match attempt_request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| RagError::provider(model, format!("invalid JSON: {}", e)));
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = RagError::provider(model, format!("API error {}: {}", status, body_text));

                // Rate limited or server error, retry
                if status.as_u16() == 429 || status.is_server_error() {
                    warn!(model, attempt, %status, "embedding request failed, retrying");
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                warn!(model, attempt, error = %e, "embedding request failed, retrying");
                last_err = Some(RagError::provider(model, e.to_string()));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| RagError::provider(model, "embedding failed after retries")))
}

fn json_to_vector(value: &serde_json::Value, model: &str) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| RagError::provider(model, "embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| RagError::provider(model, "embedding contains a non-number"))
        })
        .collect()
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls the `POST /v1/embeddings` endpoint with the configured model.
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = required_model(config, "OpenAI")?;
        let dims = required_dims(config, "OpenAI")?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        Ok(Self {
            client: build_client(config)?,
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }));
        let json = post_with_retry(&request, &self.model, self.max_retries).await?;
        parse_openai_response(&json, &self.model)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays and orders them by `data[].index`.
fn parse_openai_response(json: &serde_json::Value, model: &str) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RagError::provider(model, "invalid response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| RagError::provider(model, "invalid response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, json_to_vector(embedding, model)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured Ollama URL (default: `http://localhost:11434`).
/// Requires Ollama to be running with an embedding model pulled (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = required_model(config, "Ollama")?;
        let dims = required_dims(config, "Ollama")?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: build_client(config)?,
            model,
            dims,
            url,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = self
            .client
            .post(format!("{}/api/embed", self.url.trim_end_matches('/')))
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }));
        let json = post_with_retry(&request, &self.model, self.max_retries).await?;
        parse_ollama_response(&json, &self.model)
    }
}

fn parse_ollama_response(json: &serde_json::Value, model: &str) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| RagError::provider(model, "invalid response: missing embeddings array"))?
        .iter()
        .map(|embedding| json_to_vector(embedding, model))
        .collect()
}
