//! Deterministic hash-based embedder: no model, no network, stable across
//! runs. The default embedder and the one used throughout the test suite.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{EmbedError, Result};
use crate::{Embedder, EmbedderInfo};

#[derive(Debug, Clone)]
pub struct DeterministicEmbedder {
    info: EmbedderInfo,
    seed: u64,
}

impl DeterministicEmbedder {
    pub fn new(dimension: usize, seed: u64) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::Provider("dimension must be greater than zero".into()));
        }
        Ok(Self {
            info: EmbedderInfo {
                provider: "deterministic-hash".into(),
                dimension,
            },
            seed,
        })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        (0..self.info.dimension)
            .map(|index| {
                let mut hasher = DefaultHasher::new();
                self.seed.hash(&mut hasher);
                index.hash(&mut hasher);
                text.hash(&mut hasher);
                normalize_hash(hasher.finish())
            })
            .collect()
    }
}

impl Embedder for DeterministicEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_one(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}

fn normalize_hash(value: u64) -> f32 {
    let normalized = (value as f64) / (u64::MAX as f64);
    (normalized * 2.0 - 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_seed_is_deterministic() {
        let embedder = DeterministicEmbedder::new(8, 42).unwrap();
        let a = embedder.embed("hello world").unwrap();
        let b = embedder.embed("hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_yields_different_vector() {
        let embedder = DeterministicEmbedder::new(8, 42).unwrap();
        let a = embedder.embed("hello").unwrap();
        let b = embedder.embed("goodbye").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn respects_configured_dimension() {
        let embedder = DeterministicEmbedder::new(16, 1).unwrap();
        let v = embedder.embed("x").unwrap();
        assert_eq!(v.len(), 16);
        assert_eq!(embedder.info().dimension, 16);
    }

    #[test]
    fn batch_matches_sequential_calls() {
        let embedder = DeterministicEmbedder::new(4, 7).unwrap();
        let batch = embedder.embed_batch(&["a", "b"]).unwrap();
        assert_eq!(batch[0], embedder.embed("a").unwrap());
        assert_eq!(batch[1], embedder.embed("b").unwrap());
    }

    #[test]
    fn rejects_zero_dimension() {
        assert!(DeterministicEmbedder::new(0, 1).is_err());
    }
}
