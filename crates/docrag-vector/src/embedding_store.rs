//! Persisted chunk embeddings, one JSON record per chunk, plus the pass that
//! fills them from a chunk store.
//!
//! `embed_corpus` skips chunks whose stored record already carries the same
//! content hash and embedder id, so re-running it after adding a few chunks
//! only embeds the new ones.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use docrag_core::error::{Error, Result};
use docrag_core::traits::{ChunkStore, Embedder, EmbeddingSource};
use docrag_core::types::ChunkId;

use crate::write_atomic;

pub const EMBEDDING_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub chunk_id: ChunkId,
    pub embedder_id: String,
    pub content_hash: String,
    pub vector: Vec<f32>,
}

pub fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

/// Embedding records stored as `<chunk_id>.json` directly under `root`.
#[derive(Debug, Clone)]
pub struct DirEmbeddingSource {
    root: PathBuf,
}

impl DirEmbeddingSource {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::NotFound(format!("embeddings directory {}", root.display())));
        }
        Ok(Self { root })
    }

    /// Like [`DirEmbeddingSource::open`], creating the directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.{EMBEDDING_EXTENSION}"))
    }

    pub fn read_record(&self, id: &str) -> Result<EmbeddingRecord> {
        let path = self.record_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("embedding for chunk '{id}'")))
            }
            Err(e) => return Err(Error::io(path, e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn write_record(&self, record: &EmbeddingRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        write_atomic(&self.record_path(&record.chunk_id), &bytes)
    }
}

impl EmbeddingSource for DirEmbeddingSource {
    fn embedding_ids(&self) -> Result<Vec<ChunkId>> {
        let mut ids = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                Error::io(path, e.into())
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|s| s.to_str()) != Some(EMBEDDING_EXTENSION)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn load_embedding(&self, id: &str) -> Result<Vec<f32>> {
        Ok(self.read_record(id)?.vector)
    }
}

/// In-memory embeddings for tests and callers that embed on the fly.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmbeddings {
    vectors: BTreeMap<ChunkId, Vec<f32>>,
}

impl MemoryEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<ChunkId>, vector: Vec<f32>) {
        self.vectors.insert(id.into(), vector);
    }
}

impl EmbeddingSource for MemoryEmbeddings {
    fn embedding_ids(&self) -> Result<Vec<ChunkId>> {
        Ok(self.vectors.keys().cloned().collect())
    }

    fn load_embedding(&self, id: &str) -> Result<Vec<f32>> {
        self.vectors
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("embedding for chunk '{id}'")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedReport {
    pub embedded: usize,
    pub unchanged: usize,
    pub unreadable: usize,
}

/// Embed every chunk of `store` into `out`, batch by batch.
pub fn embed_corpus(
    store: &dyn ChunkStore,
    embedder: &dyn Embedder,
    out: &DirEmbeddingSource,
    batch_size: usize,
) -> Result<EmbedReport> {
    if batch_size == 0 {
        return Err(Error::InvalidConfig("batch_size must be at least 1".to_string()));
    }
    let ids = store.chunk_ids()?;
    let mut report = EmbedReport::default();
    let mut pending: Vec<(ChunkId, String, String)> = Vec::new();
    for id in ids {
        let text = match store.read_chunk(&id) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(chunk = %id, error = %e, "skipping unreadable chunk");
                report.unreadable += 1;
                continue;
            }
        };
        let content_hash = hash_content(&text);
        let fresh = match out.read_record(&id) {
            Ok(record) => {
                record.content_hash == content_hash
                    && record.embedder_id == embedder.embedder_id()
                    && record.vector.len() == embedder.dim()
            }
            Err(_) => false,
        };
        if fresh {
            report.unchanged += 1;
        } else {
            pending.push((id, text, content_hash));
        }
    }
    if pending.is_empty() {
        tracing::info!(unchanged = report.unchanged, "all embeddings up to date");
        return Ok(report);
    }

    let pb = ProgressBar::new(pending.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}",
        )
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    for batch in pending.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|(_, text, _)| text.clone()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .map_err(|e| Error::Embedding(format!("{}: {e}", embedder.embedder_id())))?;
        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        for ((id, _, content_hash), vector) in batch.iter().zip(vectors) {
            if vector.len() != embedder.dim() {
                return Err(Error::dimension_mismatch(id, embedder.dim(), vector.len()));
            }
            out.write_record(&EmbeddingRecord {
                chunk_id: id.clone(),
                embedder_id: embedder.embedder_id().to_string(),
                content_hash: content_hash.clone(),
                vector,
            })?;
            report.embedded += 1;
            pb.inc(1);
        }
    }
    pb.finish_with_message("embeddings written");
    tracing::info!(
        embedded = report.embedded,
        unchanged = report.unchanged,
        unreadable = report.unreadable,
        dir = %out.root().display(),
        "embedding pass complete"
    );
    Ok(report)
}
