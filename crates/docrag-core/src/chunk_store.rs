//! Chunk stores: a flat directory of `<chunk_id>.txt` files, and an in-memory
//! map for tests and embedding callers that already hold the corpus.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::traits::ChunkStore;
use crate::types::{Chunk, ChunkId};

pub const CHUNK_EXTENSION: &str = "txt";

/// File name a chunk is persisted under, `<id>.txt`.
pub fn chunk_file_name(id: &str) -> String {
    format!("{id}.{CHUNK_EXTENSION}")
}

/// Chunks persisted as `<chunk_id>.txt` directly under `root`.
///
/// The directory is re-scanned on every `chunk_ids` call, so chunks written by
/// the chunker after construction are picked up.
#[derive(Debug, Clone)]
pub struct DirChunkStore {
    root: PathBuf,
}

impl DirChunkStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::NotFound(format!("chunk directory {}", root.display())));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_path(&self, id: &str) -> PathBuf {
        self.root.join(chunk_file_name(id))
    }
}

/// File stem of a `.txt` entry, or `None` for anything else.
fn chunk_id_of(path: &Path) -> Option<ChunkId> {
    if path.extension().and_then(|s| s.to_str()) != Some(CHUNK_EXTENSION) {
        return None;
    }
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

fn is_plain_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && id != "." && id != ".."
}

impl ChunkStore for DirChunkStore {
    fn chunk_ids(&self) -> Result<Vec<ChunkId>> {
        let mut ids = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                Error::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(id) = chunk_id_of(entry.path()) {
                ids.push(id);
            }
        }
        ids.sort();
        tracing::debug!(root = %self.root.display(), chunks = ids.len(), "scanned chunk directory");
        Ok(ids)
    }

    fn read_chunk(&self, id: &str) -> Result<String> {
        if !is_plain_id(id) {
            return Err(Error::NotFound(format!("chunk '{id}'")));
        }
        let path = self.chunk_path(id);
        fs::read_to_string(&path).map_err(|e| Error::io(path, e))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryChunkStore {
    chunks: BTreeMap<ChunkId, String>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.id, chunk.text);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl FromIterator<Chunk> for MemoryChunkStore {
    fn from_iter<I: IntoIterator<Item = Chunk>>(iter: I) -> Self {
        let mut store = Self::new();
        for chunk in iter {
            store.insert(chunk);
        }
        store
    }
}

impl ChunkStore for MemoryChunkStore {
    fn chunk_ids(&self) -> Result<Vec<ChunkId>> {
        Ok(self.chunks.keys().cloned().collect())
    }

    fn read_chunk(&self, id: &str) -> Result<String> {
        self.chunks.get(id).cloned().ok_or_else(|| Error::NotFound(format!("chunk '{id}'")))
    }
}
