//! docrag-vector
//!
//! Exact L2 vector index over chunk embeddings, its position <-> chunk id
//! table, the on-disk embedding records it is built from, and the build/load
//! entry points.

pub mod embedding_store;
pub mod flat;
pub mod id_map;
pub mod index_build;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use docrag_core::error::{Error, Result};

pub use embedding_store::{embed_corpus, DirEmbeddingSource, EmbeddingRecord, MemoryEmbeddings};
pub use flat::FlatL2Index;
pub use id_map::IdMap;
pub use index_build::{build_index, BuildReport, BuiltIndex};

pub const INDEX_FILE_NAME: &str = "retriever.index";
pub const ID_MAP_FILE_NAME: &str = "retriever.ids.tsv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub index_file: PathBuf,
    pub id_map_file: PathBuf,
}

impl IndexPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self { index_file: dir.join(INDEX_FILE_NAME), id_map_file: dir.join(ID_MAP_FILE_NAME) }
    }
}

/// A loaded, read-only index together with its id map.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    index: FlatL2Index,
    id_map: IdMap,
}

impl IndexHandle {
    pub fn new(index: FlatL2Index, id_map: IdMap) -> Result<Self> {
        if index.len() != id_map.len() {
            return Err(Error::CorruptIndex(format!(
                "index holds {} vectors but id map has {} entries",
                index.len(),
                id_map.len()
            )));
        }
        Ok(Self { index, id_map })
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Nearest chunks as `(position, chunk id, squared L2 distance)`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, &str, f32)>> {
        self.index
            .search(query, k)?
            .into_iter()
            .map(|(position, distance)| {
                let id = self.id_map.chunk_id(position).ok_or_else(|| {
                    Error::CorruptIndex(format!("no id map entry for position {position}"))
                })?;
                Ok((position, id, distance))
            })
            .collect()
    }
}

/// Load a previously built index from `index_dir`.
pub fn load_index(index_dir: &Path) -> Result<IndexHandle> {
    let paths = IndexPaths::in_dir(index_dir);
    let index_bytes = read_artifact(&paths.index_file)?;
    let id_map_text = read_artifact(&paths.id_map_file)?;
    let id_map_text = String::from_utf8(id_map_text)
        .map_err(|_| Error::CorruptIndex(format!("{} is not UTF-8", paths.id_map_file.display())))?;

    let (index, recorded_digest) = FlatL2Index::from_bytes(&index_bytes)?;
    let id_map = IdMap::from_tsv(&id_map_text, index.len())?;
    if id_map.digest() != recorded_digest {
        return Err(Error::CorruptIndex(format!(
            "{} does not belong to {}; rebuild the index",
            paths.id_map_file.display(),
            paths.index_file.display()
        )));
    }
    tracing::info!(
        vectors = index.len(),
        dim = index.dim(),
        dir = %index_dir.display(),
        "index loaded"
    );
    IndexHandle::new(index, id_map)
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
            "{} is missing; run the index build first",
            path.display()
        ))),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Write `bytes` to a temp file next to `path`, then rename it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}
