use std::fs;
use tempfile::TempDir;

use docrag_core::chunk_store::{DirChunkStore, MemoryChunkStore};
use docrag_core::config::{resolve_with_base, Config};
use docrag_core::error::Error;
use docrag_core::traits::ChunkStore;
use docrag_core::types::{name_words, query_words, Chunk, RetrievalConfig};

#[test]
fn dir_store_lists_txt_chunks_sorted() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("setup_chunk_0.txt"), "install steps").unwrap();
    fs::write(dir.join("api_chunk_1.txt"), "endpoints").unwrap();
    fs::write(dir.join("api_chunk_0.txt"), "overview").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();
    fs::create_dir(dir.join("nested")).unwrap();
    fs::write(dir.join("nested").join("deep_chunk_0.txt"), "ignored").unwrap();

    let store = DirChunkStore::open(dir).expect("open");
    let ids = store.chunk_ids().expect("ids");
    assert_eq!(ids, vec!["api_chunk_0", "api_chunk_1", "setup_chunk_0"]);
    assert_eq!(store.read_chunk("api_chunk_1").unwrap(), "endpoints");
}

#[test]
fn dir_store_reports_missing_chunks() {
    let tmp = TempDir::new().unwrap();
    let store = DirChunkStore::open(tmp.path()).expect("open");
    assert!(matches!(store.read_chunk("absent_chunk_0"), Err(Error::Io { .. })));
    assert!(matches!(store.read_chunk("../escape"), Err(Error::NotFound(_))));
    assert!(matches!(DirChunkStore::open(tmp.path().join("nope")), Err(Error::NotFound(_))));
}

#[test]
fn memory_store_round_trips_text() {
    let store: MemoryChunkStore =
        vec![Chunk::new("b_chunk_0", "bee"), Chunk::new("a_chunk_0", "ay")].into_iter().collect();
    assert_eq!(store.chunk_ids().unwrap(), vec!["a_chunk_0", "b_chunk_0"]);
    assert_eq!(store.read_chunk("b_chunk_0").unwrap(), "bee");
    assert!(matches!(store.read_chunk("c_chunk_0"), Err(Error::NotFound(_))));
}

#[test]
fn name_words_drop_chunk_marker_and_case() {
    assert_eq!(name_words("Linux_Install_chunk_2"), vec!["linux", "install", "2"]);
    assert_eq!(name_words("faq_faq_chunk_0"), vec!["faq", "0"]);
    assert!(name_words("chunk").is_empty());
    assert_eq!(Chunk::new("gpu_chunk_1", "").tokens(), vec!["gpu", "1"]);
}

#[test]
fn query_words_are_lowercased_whitespace_split() {
    assert_eq!(
        query_words("  How to INSTALL  on linux\tlinux"),
        vec!["how", "to", "install", "on", "linux"]
    );
    assert!(query_words("   ").is_empty());
}

#[test]
fn retrieval_config_validation() {
    assert!(RetrievalConfig::default().validate().is_ok());
    let zero_k = RetrievalConfig { k: 0, ..RetrievalConfig::default() };
    assert!(matches!(zero_k.validate(), Err(Error::InvalidConfig(_))));
    let nan = RetrievalConfig { relevance_threshold: f32::NAN, ..RetrievalConfig::default() };
    assert!(matches!(nan.validate(), Err(Error::InvalidConfig(_))));
    let no_budget = RetrievalConfig { max_context_chars: 0, ..RetrievalConfig::default() };
    assert!(matches!(no_budget.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn config_defaults_and_overrides() {
    let settings = Config::from_toml_str("").unwrap().settings().unwrap();
    assert_eq!(settings.retrieval, RetrievalConfig::default());
    assert_eq!(settings.embedding.dimension, 768);

    let config = Config::from_toml_str(
        r#"
        [paths]
        root = "/srv/rag"
        index_dir = "/var/lib/rag/index"

        [retrieval]
        k = 4
        relevance_threshold = 0.5
        "#,
    )
    .unwrap();
    let settings = config.settings().unwrap();
    assert_eq!(settings.retrieval.k, 4);
    assert_eq!(settings.retrieval.max_context_chars, 20_000);
    let paths = settings.resolved_paths();
    assert_eq!(paths.chunks_dir, std::path::PathBuf::from("/srv/rag/Chunked"));
    assert_eq!(paths.index_dir, std::path::PathBuf::from("/var/lib/rag/index"));
    assert_eq!(config.get::<usize>("retrieval.k").unwrap(), 4);
}

#[test]
fn config_rejects_invalid_retrieval_values() {
    let err = Config::from_toml_str("[retrieval]\nk = 0\n").err().expect("k = 0 is rejected");
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn resolve_keeps_absolute_paths() {
    let base = std::path::Path::new("/base");
    assert_eq!(resolve_with_base(base, "rel/dir"), std::path::PathBuf::from("/base/rel/dir"));
    assert_eq!(resolve_with_base(base, "/abs"), std::path::PathBuf::from("/abs"));
}
