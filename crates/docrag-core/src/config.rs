//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_RETRIEVAL__K=12`). Provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::RetrievalConfig;

/// Where the corpus, its embeddings and the index live.
///
/// Relative entries are resolved against `root` by [`Settings::resolved_paths`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub root: String,
    pub chunks_dir: String,
    pub embeddings_dir: String,
    pub index_dir: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            root: "~/RAG/Docs".to_string(),
            chunks_dir: "Chunked".to_string(),
            embeddings_dir: "Embeddings".to_string(),
            index_dir: "Embeddings/Indexes".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dimension: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { dimension: 768, batch_size: 32 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingSettings,
}

/// Absolute locations derived from [`PathSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub chunks_dir: PathBuf,
    pub embeddings_dir: PathBuf,
    pub index_dir: PathBuf,
}

impl Settings {
    pub fn resolved_paths(&self) -> ResolvedPaths {
        let root = expand_path(&self.paths.root);
        ResolvedPaths {
            chunks_dir: resolve_with_base(&root, &self.paths.chunks_dir),
            embeddings_dir: resolve_with_base(&root, &self.paths.embeddings_dir),
            index_dir: resolve_with_base(&root, &self.paths.index_dir),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be at least 1".to_string()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Defaults overlaid with an inline TOML document. No files or env vars.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let figment =
            Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to extract settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
