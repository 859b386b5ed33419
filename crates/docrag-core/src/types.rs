//! Domain types shared by the index builder, ranker and assembler.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type ChunkId = String;

/// Word excluded from chunk-name tokens; every chunk file carries it.
pub const CHUNK_MARKER: &str = "chunk";

/// An immutable unit of corpus text.
///
/// - `id`: stable identifier derived from the chunk file name
///   (e.g. `install_chunk_3` for `install_chunk_3.txt`)
/// - `text`: the UTF-8 payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }

    /// Keyword view of the chunk, see [`name_words`].
    pub fn tokens(&self) -> Vec<String> {
        name_words(&self.id)
    }
}

/// Lower-cased words of a chunk name, split on whitespace and `_`, without
/// the `chunk` marker. Duplicates are removed, first occurrence wins.
pub fn name_words(name: &str) -> Vec<String> {
    let lowered = name.to_lowercase();
    let mut words: Vec<String> = Vec::new();
    for word in lowered.split(|c: char| c == '_' || c.is_whitespace()) {
        if word.is_empty() || word == CHUNK_MARKER {
            continue;
        }
        if !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }
    words
}

/// Lower-cased, whitespace-delimited, de-duplicated query words.
pub fn query_words(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut words: Vec<String> = Vec::new();
    for word in lowered.split_whitespace() {
        if !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }
    words
}

/// Per-call retrieval knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest vectors to consult.
    pub k: usize,
    /// Minimum fused relevance for a candidate to be kept.
    pub relevance_threshold: f32,
    /// Upper bound on the assembled context, in characters.
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: 8, relevance_threshold: 0.15, max_context_chars: 20_000 }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".to_string()));
        }
        if !self.relevance_threshold.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "relevance_threshold must be finite, got {}",
                self.relevance_threshold
            )));
        }
        if self.max_context_chars == 0 {
            return Err(Error::InvalidConfig("max_context_chars must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// A chunk scored for one query. Never outlives the query.
///
/// `vector_rank` is the 0-based rank among the nearest vectors when the chunk
/// was a vector hit. `vector_similarity` is either that hit's similarity or
/// the imputed default for keyword-only matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: ChunkId,
    pub relevance: f32,
    pub vector_rank: Option<usize>,
    pub vector_similarity: f32,
    pub keyword_ratio: f32,
}
