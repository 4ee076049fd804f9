//! TOML configuration.
//!
//! Resolved once at startup by [`load_config`]; every invalid combination is
//! a fatal error with a message naming the offending key. Every section is
//! optional and falls back to the defaults below.
//!
//! ```toml
//! [db]
//! path = "./data/docrag.sqlite"
//!
//! [chunking]
//! chunk_size = 1200
//! overlap = 200
//!
//! [retrieval]
//! top_k = 4
//!
//! [embedding]
//! provider = "hash"
//! dims = 384
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunk::ChunkParams;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Durable storage for the vector index. Without it the index lives in memory only.
    #[serde(default)]
    pub db: Option<DbConfig>,
    #[serde(default)]
    pub chunking: ChunkParams,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    4
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    /// Upper bound on a single embedding call, retries included.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde defaults cannot express.
///
/// Chunking parameters are already validated during deserialization.
pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    let embedding = &config.embedding;
    if embedding.timeout_secs == 0 {
        anyhow::bail!("embedding.timeout_secs must be > 0");
    }
    if embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match embedding.provider.as_str() {
        "hash" => {}
        "local" => {
            let model = embedding
                .model
                .as_deref()
                .unwrap_or(crate::embedding::DEFAULT_LOCAL_MODEL);
            let Some(native) = crate::embedding::local_model_dims(model) else {
                anyhow::bail!("Unknown local embedding model: '{}'", model);
            };
            if let Some(dims) = embedding.dims {
                if dims != native {
                    anyhow::bail!(
                        "embedding.dims = {} but local model '{}' produces {}-dimensional vectors",
                        dims,
                        model,
                        native
                    );
                }
            }
        }
        "openai" | "ollama" => {
            let backoff = crate::embedding::retry_backoff_total(embedding.max_retries);
            if embedding.timeout() <= backoff {
                anyhow::bail!(
                    "embedding.timeout_secs ({}) must exceed the {}s of retry backoff \
                     for max_retries = {}; raise timeout_secs or lower max_retries",
                    embedding.timeout_secs,
                    backoff.as_secs(),
                    embedding.max_retries
                );
            }
            if embedding.dims.is_none() {
                anyhow::bail!(
                    "embedding.dims must be specified when provider is '{}'",
                    embedding.provider
                );
            }
            if embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert!(config.db.is_none());
        assert_eq!(config.chunking.size(), 1200);
        assert_eq!(config.chunking.overlap(), 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.embedding.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            [db]
            path = "/tmp/docrag.sqlite"

            [chunking]
            chunk_size = 500
            overlap = 50

            [retrieval]
            top_k = 8

            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            dims = 768
            url = "http://gpu-box:11434"
            "#,
        )
        .unwrap();
        assert_eq!(config.db.unwrap().path, PathBuf::from("/tmp/docrag.sqlite"));
        assert_eq!(config.chunking.size(), 500);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.embedding.dims, Some(768));
    }

    #[test]
    fn test_overlap_must_be_less_than_chunk_size() {
        let err = parse("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(format!("{:#}", err).contains("overlap"));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        assert!(parse("[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn test_remote_provider_requires_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"openai\"\ndims = 1536\n").is_err());
        assert!(parse("[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n").is_err());
    }

    #[test]
    fn test_timeout_must_cover_retry_backoff() {
        let base = "[embedding]\nprovider = \"openai\"\nmodel = \"m\"\ndims = 1536\n";
        assert!(parse(base).is_ok());

        let err = parse(&format!("{}max_retries = 5\ntimeout_secs = 30\n", base)).unwrap_err();
        assert!(err.to_string().contains("retry backoff"));

        assert!(parse(&format!("{}max_retries = 5\ntimeout_secs = 60\n", base)).is_ok());
    }

    #[test]
    fn test_local_dims_must_match_model() {
        assert!(parse("[embedding]\nprovider = \"local\"\n").is_ok());
        assert!(parse("[embedding]\nprovider = \"local\"\ndims = 384\n").is_ok());
        assert!(parse("[embedding]\nprovider = \"local\"\ndims = 1536\n").is_err());
        assert!(parse("[embedding]\nprovider = \"local\"\nmodel = \"gpt-2\"\n").is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[embedding]\nprovider = \"carrier-pigeon\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }
}
