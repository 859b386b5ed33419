//! docrag-hybrid
//!
//! Query-time half of retrieval: rank chunks by fusing vector hits with
//! chunk-name keywords, then pack the best texts into a bounded context.

pub mod assembler;
pub mod ranker;

use docrag_core::error::{Error, Result};
use docrag_core::traits::{ChunkStore, Embedder};
use docrag_core::types::{Candidate, RetrievalConfig};
use docrag_vector::IndexHandle;

pub use assembler::{ContextAssembler, SEPARATOR};
pub use ranker::{HybridRanker, LexicalSignal, VectorHit};

/// Rank then assemble for an already embedded query. An empty string means
/// nothing relevant was found.
pub fn retrieve(
    index: &IndexHandle,
    store: &dyn ChunkStore,
    query_text: &str,
    query_embedding: &[f32],
    config: &RetrievalConfig,
) -> Result<String> {
    let candidates = HybridRanker::new(index, store).rank(query_text, query_embedding, config)?;
    Ok(ContextAssembler::new(store).assemble(&candidates, config))
}

/// A loaded index, its chunk store and the embedder that produced the index.
pub struct Retriever {
    index: IndexHandle,
    store: Box<dyn ChunkStore>,
    embedder: Box<dyn Embedder>,
}

impl Retriever {
    pub fn new(
        index: IndexHandle,
        store: Box<dyn ChunkStore>,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self> {
        if embedder.dim() != index.dim() {
            return Err(Error::dimension_mismatch("embedder", index.dim(), embedder.dim()));
        }
        if index.is_empty() {
            tracing::warn!("index is empty; only keyword matches can be retrieved");
        }
        Ok(Self { index, store, embedder })
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    pub fn candidates(&self, query_text: &str, config: &RetrievalConfig) -> Result<Vec<Candidate>> {
        let embedding = self.embed_query(query_text)?;
        HybridRanker::new(&self.index, self.store.as_ref()).rank(query_text, &embedding, config)
    }

    pub fn query(&self, query_text: &str, config: &RetrievalConfig) -> Result<String> {
        let embedding = self.embed_query(query_text)?;
        retrieve(&self.index, self.store.as_ref(), query_text, &embedding, config)
    }

    fn embed_query(&self, query_text: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed(query_text)
            .map_err(|e| Error::Embedding(format!("query embedding failed: {e:#}")))
    }
}
