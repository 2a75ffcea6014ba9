// Deterministic, dependency-free embedding provider used as a fallback
// when no ONNX model is bundled (spec §4.1: "may be offline-bundled"; this
// is the always-available baseline that keeps `Embed` total). Unlike a
// random or index-based stub, the vector is derived from the text itself
// via SHA-256-seeded pseudo-random projection, so identical text always
// yields an identical vector and near-duplicate text yields nearby ones
// only by coincidence — it is not a semantic model, just a deterministic
// placeholder satisfying the contract.

use super::EmbeddingProvider;
use crate::types::Embedding;
use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

pub struct DeterministicHashProvider {
    model_name: String,
    dimension: usize,
}

impl DeterministicHashProvider {
    pub fn new(model_name: String, dimension: usize) -> Self {
        Self { model_name, dimension }
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut out = vec![0.0f32; self.dimension];
        let mut counter: u32 = 0;
        let mut filled = 0;
        while filled < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks(4) {
                if filled >= self.dimension {
                    break;
                }
                let mut buf = [0u8; 4];
                buf[..chunk.len()].copy_from_slice(chunk);
                let raw = u32::from_le_bytes(buf);
                out[filled] = (raw as f64 / u32::MAX as f64) as f32 * 2.0 - 1.0;
                filled += 1;
            }
            counter += 1;
        }
        let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicHashProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_produces_same_vector() {
        let provider = DeterministicHashProvider::new("test".into(), 16);
        let a = provider.embed_batch(&["hello".to_string()]).await.unwrap();
        let b = provider.embed_batch(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_produces_different_vector() {
        let provider = DeterministicHashProvider::new("test".into(), 16);
        let a = provider.embed_batch(&["hello".to_string()]).await.unwrap();
        let b = provider.embed_batch(&["world".to_string()]).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let provider = DeterministicHashProvider::new("test".into(), 384);
        let v = provider.embed_batch(&["some text".to_string()]).await.unwrap().remove(0);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
