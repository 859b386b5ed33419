//! docrag-embed
//!
//! Offline embedding backends. The real model is an external collaborator;
//! this crate ships a deterministic feature-hashing embedder that needs no
//! weights, which the CLI and the test suites use for both corpus and queries.

use anyhow::{anyhow, Result};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use docrag_core::traits::Embedder;

pub const DEFAULT_DIM: usize = 768;

/// Hashes each lower-cased word into one of `dim` buckets and L2-normalizes
/// the result. Same text, same vector, on every platform.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(anyhow!("embedding dimension must be at least 1"));
        }
        Ok(Self { dim, id: format!("hashing:xxh64:d{dim}") })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            #[allow(clippy::cast_precision_loss)]
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            #[allow(clippy::cast_precision_loss)]
            let position_jitter = (i % 3) as f32 * 0.01;
            v[idx] += val + position_jitter;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// The embedder used when nothing else is configured.
pub fn get_default_embedder(dim: usize) -> Result<Box<dyn Embedder>> {
    let embedder = HashingEmbedder::new(dim)?;
    tracing::info!(embedder = embedder.embedder_id(), "using hashing embedder");
    Ok(Box::new(embedder))
}
