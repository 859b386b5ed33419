use docrag_core::traits::ChunkStore;
use docrag_core::types::{Candidate, RetrievalConfig};

/// Placed between accepted chunks; counts toward the budget.
pub const SEPARATOR: &str = "\n\n---\n\n";

/// Greedy packer of ranked chunk texts under a character budget.
///
/// Lengths are counted in `char`s. The separator is charged to the budget, so
/// the returned context never exceeds `max_context_chars`.
pub struct ContextAssembler<'a> {
    store: &'a dyn ChunkStore,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(store: &'a dyn ChunkStore) -> Self {
        Self { store }
    }

    /// Join accepted chunk texts in ranked order. Empty means nothing relevant
    /// was found (or nothing was readable), which is not an error.
    pub fn assemble(&self, candidates: &[Candidate], config: &RetrievalConfig) -> String {
        let budget = config.max_context_chars;
        let separator_len = SEPARATOR.chars().count();
        let mut accepted: Vec<String> = Vec::new();
        let mut total_chars = 0usize;

        for candidate in candidates {
            if total_chars >= budget {
                tracing::debug!(budget, "reached maximum context size");
                break;
            }
            let text = match self.store.read_chunk(&candidate.chunk_id) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        chunk = %candidate.chunk_id,
                        error = %e,
                        "skipping unreadable chunk"
                    );
                    continue;
                }
            };
            let joint = if accepted.is_empty() { 0 } else { separator_len };
            let len = text.chars().count();
            if total_chars + joint + len > budget {
                if accepted.is_empty() {
                    let remaining = budget - total_chars;
                    tracing::debug!(
                        chunk = %candidate.chunk_id,
                        from = len,
                        to = remaining,
                        "truncated first chunk"
                    );
                    let truncated = truncate_chars(&text, remaining);
                    accepted.push(truncated);
                    break;
                }
                tracing::debug!(
                    chunk = %candidate.chunk_id,
                    len,
                    "skipping chunk to stay within context limit"
                );
                continue;
            }
            total_chars += joint + len;
            tracing::debug!(
                chunk = %candidate.chunk_id,
                relevance = candidate.relevance,
                len,
                "added chunk"
            );
            accepted.push(text);
        }

        let context = accepted.join(SEPARATOR);
        tracing::info!(
            chunks = accepted.len(),
            chars = context.chars().count(),
            "assembled context"
        );
        context
    }
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
