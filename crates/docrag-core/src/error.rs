use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn dimension_mismatch(what: &str, expected: usize, actual: usize) -> Self {
        Self::InvalidConfig(format!(
            "{what}: embedding dimension mismatch (expected {expected}, got {actual})"
        ))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
