//! Offline index build.
//!
//! Typical flow:
//! 1) Intersect the embedding ids with the chunk ids, counting what is missing
//! 2) Append vectors in chunk file name order, recording each position
//! 3) Write the id map, then the index (which records the id map digest)
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use docrag_core::chunk_store::chunk_file_name;
use docrag_core::error::{Error, Result};
use docrag_core::traits::{ChunkStore, EmbeddingSource};

use crate::flat::FlatL2Index;
use crate::id_map::IdMap;
use crate::{write_atomic, IndexHandle, IndexPaths};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    /// Embeddings with no chunk text.
    pub skipped_missing_chunk: usize,
    /// Chunks with no embedding.
    pub skipped_missing_embedding: usize,
}

#[derive(Debug)]
pub struct BuiltIndex {
    pub handle: IndexHandle,
    pub report: BuildReport,
}

/// Build the index from scratch and persist it under `index_dir`, replacing
/// any previous build.
pub fn build_index(
    store: &dyn ChunkStore,
    source: &dyn EmbeddingSource,
    dim: usize,
    index_dir: &Path,
) -> Result<BuiltIndex> {
    let (handle, report) = build_in_memory(store, source, dim)?;
    persist(&handle, index_dir)?;
    tracing::info!(
        indexed = report.indexed,
        skipped_missing_chunk = report.skipped_missing_chunk,
        skipped_missing_embedding = report.skipped_missing_embedding,
        dir = %index_dir.display(),
        "index built"
    );
    Ok(BuiltIndex { handle, report })
}

/// The build without the write step.
pub fn build_in_memory(
    store: &dyn ChunkStore,
    source: &dyn EmbeddingSource,
    dim: usize,
) -> Result<(IndexHandle, BuildReport)> {
    let chunk_ids: BTreeSet<String> = store.chunk_ids()?.into_iter().collect();
    let embedding_ids: BTreeSet<String> = source.embedding_ids()?.into_iter().collect();
    let mut report = BuildReport::default();

    for id in embedding_ids.difference(&chunk_ids) {
        tracing::warn!(chunk = %id, "skipping embedding with no corresponding chunk");
        report.skipped_missing_chunk += 1;
    }
    for id in chunk_ids.difference(&embedding_ids) {
        tracing::warn!(chunk = %id, "skipping chunk with no embedding");
        report.skipped_missing_embedding += 1;
    }

    // positions follow `<id>.txt` order, which differs from bare id order
    // when an id is a prefix of another (`a-b.txt` < `a.txt`)
    let mut retained: Vec<&String> = embedding_ids.intersection(&chunk_ids).collect();
    retained.sort_by_cached_key(|id| chunk_file_name(id));
    let mut index = FlatL2Index::new(dim)?;
    let mut id_map = IdMap::new();
    let pb = ProgressBar::new(retained.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} vectors ({percent}%) {msg}",
        )
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    for id in retained {
        let vector = source.load_embedding(id)?;
        if vector.len() != dim {
            return Err(Error::dimension_mismatch(id, dim, vector.len()));
        }
        let position = index.add(&vector)?;
        id_map.push(position, id.clone())?;
        pb.inc(1);
    }
    pb.finish_with_message("vectors added");
    report.indexed = index.len();
    if index.is_empty() {
        tracing::warn!("index is empty; every query will rely on keyword matches only");
    }
    Ok((IndexHandle::new(index, id_map)?, report))
}

/// Write both artifacts. Each lands via rename, and the index records the
/// id map digest, so a reader sees either a consistent pair or a load error.
pub fn persist(handle: &IndexHandle, index_dir: &Path) -> Result<IndexPaths> {
    fs::create_dir_all(index_dir).map_err(|e| Error::io(index_dir, e))?;
    let paths = IndexPaths::in_dir(index_dir);
    let id_map_text = handle.id_map().to_tsv();
    write_atomic(&paths.id_map_file, id_map_text.as_bytes())?;
    let bytes = handle.index().to_bytes(&handle.id_map().digest());
    write_atomic(&paths.index_file, &bytes)?;
    Ok(paths)
}
