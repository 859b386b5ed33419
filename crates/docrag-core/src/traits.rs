use crate::error::Result;
use crate::types::ChunkId;

/// Read-only access to persisted chunk text.
pub trait ChunkStore: Send + Sync {
    /// Every known chunk id, sorted ascending.
    fn chunk_ids(&self) -> Result<Vec<ChunkId>>;
    fn read_chunk(&self, id: &str) -> Result<String>;
}

/// Persisted chunk embeddings, keyed by chunk id.
pub trait EmbeddingSource: Send + Sync {
    /// Every chunk id that has a stored embedding, sorted ascending.
    fn embedding_ids(&self) -> Result<Vec<ChunkId>>;
    fn load_embedding(&self, id: &str) -> Result<Vec<f32>>;
}

/// The text embedding function. Corpus chunks and queries must go through the
/// same implementation or distances are meaningless.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `hashing:xxh64:d768`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}
