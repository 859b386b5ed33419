//! Fusion of nearest-vector hits with keyword overlap on chunk names.
//!
//! Chunk names are derived from section titles, so a query word that appears
//! in a name is a strong topical hint even when the chunk's embedding is not
//! among the nearest vectors.

use std::collections::{HashMap, HashSet};

use docrag_core::error::Result;
use docrag_core::traits::ChunkStore;
use docrag_core::types::{name_words, query_words, Candidate, ChunkId, RetrievalConfig};
use docrag_vector::IndexHandle;

/// Added when a query word occurs anywhere in the lower-cased chunk name.
pub const EXACT_MATCH_BONUS: f32 = 0.3;
/// Weight of the name/query word overlap ratio.
pub const KEYWORD_WEIGHT: f32 = 0.2;
/// Similarity assumed for keyword matches that were not vector hits.
pub const IMPUTED_SIMILARITY: f32 = 0.5;

/// One of the `k` nearest vectors, with its per-query similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: ChunkId,
    pub rank: usize,
    pub distance: f32,
    pub similarity: f32,
}

/// Keyword evidence for one chunk name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalSignal {
    pub keyword_ratio: f32,
    pub exact_bonus: f32,
}

impl LexicalSignal {
    pub fn score(chunk_name: &str, query_words: &[String]) -> Self {
        let file_words = name_words(chunk_name);
        let keyword_ratio = if file_words.is_empty() {
            0.0
        } else {
            let shared = file_words.iter().filter(|w| query_words.contains(w)).count();
            shared as f32 / file_words.len() as f32
        };
        let lowered = chunk_name.to_lowercase();
        let exact_bonus = if query_words.iter().any(|w| lowered.contains(w.as_str())) {
            EXACT_MATCH_BONUS
        } else {
            0.0
        };
        Self { keyword_ratio, exact_bonus }
    }

    pub fn matched(&self) -> bool {
        self.keyword_ratio > 0.0 || self.exact_bonus > 0.0
    }
}

/// Map squared distances to `1 - |d| / max|d|`. The farthest hit scores 0 and
/// equal distances score equally. Relative to this result set only.
pub fn normalize_distances(distances: &[f32]) -> Vec<f32> {
    let max_abs = distances.iter().map(|d| d.abs()).fold(0.0f32, f32::max);
    let max_abs = if max_abs > 0.0 { max_abs } else { 1.0 };
    distances.iter().map(|d| 1.0 - d.abs() / max_abs).collect()
}

pub struct HybridRanker<'a> {
    index: &'a IndexHandle,
    store: &'a dyn ChunkStore,
}

impl<'a> HybridRanker<'a> {
    pub fn new(index: &'a IndexHandle, store: &'a dyn ChunkStore) -> Self {
        Self { index, store }
    }

    /// Nearest vectors for the query, nearest first.
    pub fn vector_hits(&self, query_embedding: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let hits = self.index.search(query_embedding, k)?;
        let distances: Vec<f32> = hits.iter().map(|(_, _, d)| *d).collect();
        let similarities = normalize_distances(&distances);
        Ok(hits
            .into_iter()
            .zip(similarities)
            .enumerate()
            .map(|(rank, ((_, id, distance), similarity))| VectorHit {
                chunk_id: id.to_string(),
                rank,
                distance,
                similarity,
            })
            .collect())
    }

    /// Every scored candidate, best first, before thresholding. Each of the
    /// `k` nearest vectors is present, even at zero relevance.
    pub fn score_all(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Candidate>> {
        let hits = self.vector_hits(query_embedding, k)?;
        let by_id: HashMap<&str, &VectorHit> =
            hits.iter().map(|h| (h.chunk_id.as_str(), h)).collect();
        let words = query_words(query_text);

        // Lexical pass over every chunk; a vector hit's similarity wins over the imputed default.
        let mut candidates = Vec::new();
        let mut represented: HashSet<String> = HashSet::new();
        for chunk_id in self.store.chunk_ids()? {
            let signal = LexicalSignal::score(&chunk_id, &words);
            let hit = by_id.get(chunk_id.as_str()).copied();
            let vector_similarity = match hit {
                Some(h) => h.similarity,
                None if signal.matched() => IMPUTED_SIMILARITY,
                None => 0.0,
            };
            let relevance =
                vector_similarity + signal.keyword_ratio * KEYWORD_WEIGHT + signal.exact_bonus;
            if relevance <= 0.0 {
                continue;
            }
            if hit.is_some() {
                represented.insert(chunk_id.clone());
            }
            candidates.push(Candidate {
                chunk_id,
                relevance,
                vector_rank: hit.map(|h| h.rank),
                vector_similarity,
                keyword_ratio: signal.keyword_ratio,
            });
        }

        // Vector pass: hits the lexical pass did not keep enter with their raw
        // similarity, so the nearest vector is never lost to the fallback.
        for hit in &hits {
            if represented.contains(&hit.chunk_id) {
                continue;
            }
            candidates.push(Candidate {
                chunk_id: hit.chunk_id.clone(),
                relevance: hit.similarity,
                vector_rank: Some(hit.rank),
                vector_similarity: hit.similarity,
                keyword_ratio: 0.0,
            });
        }

        // stable: equal relevance keeps enumeration order
        candidates.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        Ok(candidates)
    }

    /// Ranked candidates at or above the threshold. When none qualify, the
    /// single best candidate is returned instead, if there is one.
    pub fn rank(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        config: &RetrievalConfig,
    ) -> Result<Vec<Candidate>> {
        config.validate()?;
        let mut candidates = self.score_all(query_text, query_embedding, config.k)?;
        tracing::debug!(candidates = candidates.len(), "scored chunks");
        for c in candidates.iter().take(5) {
            tracing::debug!(
                chunk = %c.chunk_id,
                relevance = c.relevance,
                keyword_ratio = c.keyword_ratio,
                vector_rank = ?c.vector_rank,
                "candidate"
            );
        }

        let threshold = config.relevance_threshold;
        let passing = candidates.iter().filter(|c| c.relevance >= threshold).count();
        if passing == 0 {
            if !candidates.is_empty() {
                tracing::info!(threshold, "no candidate above threshold, using only the top match");
            }
            candidates.truncate(1);
            return Ok(candidates);
        }
        candidates.retain(|c| c.relevance >= threshold);
        tracing::info!(kept = candidates.len(), threshold, "candidates above threshold");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(q: &str) -> Vec<String> {
        query_words(q)
    }

    #[test]
    fn normalization_is_relative_to_the_farthest_hit() {
        assert_eq!(normalize_distances(&[1.0, 2.0, 4.0]), vec![0.75, 0.5, 0.0]);
        assert_eq!(normalize_distances(&[0.0, 0.0]), vec![1.0, 1.0]);
        assert!(normalize_distances(&[]).is_empty());
        assert_eq!(normalize_distances(&[3.0, 3.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn lexical_signal_on_chunk_names() {
        let s = LexicalSignal::score("gpu_setup_chunk_0", &words("GPU setup guide"));
        assert!((s.keyword_ratio - 2.0 / 3.0).abs() < 1e-6, "gpu, setup of gpu/setup/0");
        assert_eq!(s.exact_bonus, EXACT_MATCH_BONUS);

        // substring only: "install" inside "installation"
        let s = LexicalSignal::score("installation_chunk_2", &words("install"));
        assert_eq!(s.keyword_ratio, 0.0);
        assert_eq!(s.exact_bonus, EXACT_MATCH_BONUS);
        assert!(s.matched());

        let s = LexicalSignal::score("faq_chunk_0", &words("docker networking"));
        assert!(!s.matched());

        assert!(!LexicalSignal::score("faq_chunk_0", &[]).matched());
    }
}
