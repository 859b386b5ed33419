use std::fs;

use docrag_core::chunk_store::{DirChunkStore, MemoryChunkStore};
use docrag_core::error::Error;
use docrag_core::types::{Candidate, Chunk, RetrievalConfig};
use docrag_embed::HashingEmbedder;
use docrag_hybrid::{retrieve, ContextAssembler, HybridRanker, Retriever, SEPARATOR};
use docrag_vector::{
    build_index, embed_corpus, load_index, DirEmbeddingSource, FlatL2Index, IdMap, IndexHandle,
};

fn handle(entries: &[(&str, [f32; 2])]) -> IndexHandle {
    let mut index = FlatL2Index::new(2).unwrap();
    let mut id_map = IdMap::new();
    for (id, v) in entries {
        let pos = index.add(v).unwrap();
        id_map.push(pos, id.to_string()).unwrap();
    }
    IndexHandle::new(index, id_map).unwrap()
}

fn candidate(id: &str, relevance: f32) -> Candidate {
    Candidate {
        chunk_id: id.to_string(),
        relevance,
        vector_rank: None,
        vector_similarity: 0.0,
        keyword_ratio: 0.0,
    }
}

fn budget(max_context_chars: usize) -> RetrievalConfig {
    RetrievalConfig { max_context_chars, ..RetrievalConfig::default() }
}

fn store_of(chunks: &[(&str, String)]) -> MemoryChunkStore {
    chunks.iter().map(|(id, text)| Chunk::new(*id, text.clone())).collect()
}

fn ranked_in_order(ids: &[&str]) -> Vec<Candidate> {
    ids.iter().enumerate().map(|(i, id)| candidate(id, 0.9 - i as f32 * 0.1)).collect()
}

#[test]
fn keyword_only_match_gets_imputed_similarity_plus_bonuses() -> anyhow::Result<()> {
    let store: MemoryChunkStore = [
        Chunk::new("gpu_setup_chunk_0", "Install the driver first."),
        Chunk::new("other_chunk_0", "Unrelated notes."),
    ]
    .into_iter()
    .collect();
    let index = handle(&[("other_chunk_0", [1.0, 0.0])]);

    let ranked = HybridRanker::new(&index, &store).rank(
        "GPU setup guide",
        &[1.0, 0.0],
        &RetrievalConfig::default(),
    )?;
    assert_eq!(ranked.len(), 2);

    assert_eq!(ranked[0].chunk_id, "other_chunk_0");
    assert_eq!(ranked[0].relevance, 1.0, "lone hit at distance zero");
    assert_eq!(ranked[0].vector_rank, Some(0));

    let gpu = &ranked[1];
    assert_eq!(gpu.chunk_id, "gpu_setup_chunk_0");
    assert_eq!(gpu.vector_rank, None);
    assert_eq!(gpu.vector_similarity, 0.5);
    let expected = 0.5 + (2.0 / 3.0) * 0.2 + 0.3;
    assert!((gpu.relevance - expected).abs() < 1e-6, "{} vs {expected}", gpu.relevance);
    Ok(())
}

#[test]
fn vector_hit_similarity_replaces_imputed_default() -> anyhow::Result<()> {
    let store = store_of(&[("backup_chunk_0", "b".into()), ("restore_chunk_0", "r".into())]);
    let index = handle(&[("backup_chunk_0", [0.0, 0.0]), ("restore_chunk_0", [2.0, 0.0])]);

    let ranked = HybridRanker::new(&index, &store).score_all("restore", &[0.0, 0.0], 2)?;
    let restore = ranked.iter().find(|c| c.chunk_id == "restore_chunk_0").unwrap();
    // farthest hit has similarity 0, not the 0.5 given to keyword-only matches
    assert_eq!(restore.vector_similarity, 0.0);
    assert!((restore.relevance - (0.5 * 0.2 + 0.3)).abs() < 1e-6, "restore of restore/0");
    assert_eq!(ranked[0].chunk_id, "backup_chunk_0");
    Ok(())
}

#[test]
fn nothing_above_threshold_falls_back_to_the_single_best() -> anyhow::Result<()> {
    let store = store_of(&[("a_chunk_0", "alpha text".into()), ("b_chunk_0", "beta text".into())]);
    let index = handle(&[("a_chunk_0", [0.0, 0.0]), ("b_chunk_0", [3.0, 0.0])]);
    let config = RetrievalConfig { relevance_threshold: 5.0, ..RetrievalConfig::default() };

    let ranked = HybridRanker::new(&index, &store).rank("zzz", &[0.0, 0.0], &config)?;
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].chunk_id, "a_chunk_0");

    assert_eq!(retrieve(&index, &store, "zzz", &[0.0, 0.0], &config)?, "alpha text");
    Ok(())
}

#[test]
fn vector_hit_unknown_to_the_store_is_ranked_but_not_assembled() -> anyhow::Result<()> {
    let store: MemoryChunkStore = [Chunk::new("real_chunk_0", "still here")].into_iter().collect();
    let index = handle(&[("ghost_chunk_0", [0.0, 0.0]), ("real_chunk_0", [4.0, 0.0])]);

    let ranker = HybridRanker::new(&index, &store);
    let scored = ranker.score_all("nothing", &[0.0, 0.0], 8)?;
    let ids: Vec<&str> = scored.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["ghost_chunk_0", "real_chunk_0"]);
    assert_eq!(scored[0].relevance, 1.0);
    assert_eq!((scored[1].relevance, scored[1].vector_rank), (0.0, Some(1)));

    let ranked = ranker.rank("nothing", &[0.0, 0.0], &RetrievalConfig::default())?;
    assert_eq!(ranked.len(), 1, "farthest hit falls below the threshold");
    assert_eq!(ranked[0].chunk_id, "ghost_chunk_0");

    let context = ContextAssembler::new(&store).assemble(&ranked, &RetrievalConfig::default());
    assert_eq!(context, "");
    Ok(())
}

#[test]
fn lone_nearest_vector_is_kept_when_k_is_one() -> anyhow::Result<()> {
    let store = store_of(&[("alpha_chunk_0", "alpha text".into()), ("beta_chunk_0", "b".into())]);
    let index = handle(&[("alpha_chunk_0", [1.0, 0.0]), ("beta_chunk_0", [5.0, 0.0])]);
    let config = RetrievalConfig { k: 1, ..RetrievalConfig::default() };

    // the only hit is also the farthest, so its relative similarity is 0
    let ranked = HybridRanker::new(&index, &store).rank("zzz", &[0.9, 0.0], &config)?;
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].chunk_id, "alpha_chunk_0");
    assert_eq!(ranked[0].vector_rank, Some(0));
    assert_eq!(ranked[0].relevance, 0.0);

    assert_eq!(retrieve(&index, &store, "zzz", &[0.9, 0.0], &config)?, "alpha text");
    Ok(())
}

#[test]
fn equidistant_hits_fall_back_to_the_first_ranked() -> anyhow::Result<()> {
    let store = store_of(&[("alpha_chunk_0", "alpha text".into()), ("beta_chunk_0", "b".into())]);
    let index = handle(&[("alpha_chunk_0", [1.0, 0.0]), ("beta_chunk_0", [-1.0, 0.0])]);
    let context = retrieve(&index, &store, "zzz", &[0.0, 0.0], &RetrievalConfig::default())?;
    assert_eq!(context, "alpha text");
    Ok(())
}

#[test]
fn ties_keep_store_enumeration_order() -> anyhow::Result<()> {
    let store: MemoryChunkStore = [
        Chunk::new("zeta_docker_chunk_0", "z"),
        Chunk::new("alpha_docker_chunk_0", "a"),
    ]
    .into_iter()
    .collect();
    let index = handle(&[]);
    let ranked =
        HybridRanker::new(&index, &store).rank("docker", &[0.0, 0.0], &RetrievalConfig::default())?;
    let ids: Vec<&str> = ranked.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["alpha_docker_chunk_0", "zeta_docker_chunk_0"]);
    Ok(())
}

#[test]
fn oversized_first_chunk_is_truncated_to_the_budget() {
    let store = store_of(&[("big_chunk_0", "x".repeat(50)), ("small_chunk_0", "tiny".into())]);
    let ranked = ranked_in_order(&["big_chunk_0", "small_chunk_0"]);
    let context = ContextAssembler::new(&store).assemble(&ranked, &budget(20));
    assert_eq!(context, "x".repeat(20));
}

#[test]
fn separator_and_chunks_can_fill_the_budget_exactly() {
    assert_eq!(SEPARATOR.chars().count(), 7);
    let store = store_of(&[
        ("a_chunk_0", "a".repeat(100)),
        ("b_chunk_0", "b".repeat(19_893)),
        ("c_chunk_0", "c".repeat(100)),
    ]);
    let ranked = ranked_in_order(&["a_chunk_0", "b_chunk_0", "c_chunk_0"]);
    let context = ContextAssembler::new(&store).assemble(&ranked, &budget(20_000));
    assert_eq!(context, format!("{}{SEPARATOR}{}", "a".repeat(100), "b".repeat(19_893)));
    assert_eq!(context.chars().count(), 20_000);
}

#[test]
fn separator_alone_can_push_a_chunk_over_budget() {
    // 100 + 19_894 fits, but not once the separator is charged
    let store = store_of(&[
        ("a_chunk_0", "a".repeat(100)),
        ("b_chunk_0", "b".repeat(19_894)),
        ("c_chunk_0", "c".repeat(100)),
    ]);
    let ranked = ranked_in_order(&["a_chunk_0", "b_chunk_0", "c_chunk_0"]);
    let context = ContextAssembler::new(&store).assemble(&ranked, &budget(20_000));
    assert_eq!(context, format!("{}{SEPARATOR}{}", "a".repeat(100), "c".repeat(100)));
    assert_eq!(context.chars().count(), 207);
}

#[test]
fn chunk_that_does_not_fit_is_skipped_and_later_ones_still_considered() {
    let store = store_of(&[
        ("a_chunk_0", "a".repeat(100)),
        ("b_chunk_0", "b".repeat(150)),
        ("c_chunk_0", "c".repeat(50)),
    ]);
    let ranked = ranked_in_order(&["a_chunk_0", "b_chunk_0", "c_chunk_0"]);
    let context = ContextAssembler::new(&store).assemble(&ranked, &budget(200));
    assert_eq!(context, format!("{}{SEPARATOR}{}", "a".repeat(100), "c".repeat(50)));
}

#[test]
fn unreadable_chunk_is_skipped() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("broken_chunk_0.txt"), [0xff, 0xfe, 0x00, 0xc3])?;
    fs::write(tmp.path().join("fine_chunk_0.txt"), "readable text")?;
    let store = DirChunkStore::open(tmp.path())?;

    let ranked = [candidate("broken_chunk_0", 0.9), candidate("fine_chunk_0", 0.8)];
    let context = ContextAssembler::new(&store).assemble(&ranked, &RetrievalConfig::default());
    assert_eq!(context, "readable text");
    Ok(())
}

#[test]
fn empty_corpus_yields_empty_context() -> anyhow::Result<()> {
    let store = MemoryChunkStore::new();
    let index = handle(&[]);
    assert_eq!(retrieve(&index, &store, "anything", &[0.0, 0.0], &RetrievalConfig::default())?, "");
    assert_eq!(ContextAssembler::new(&store).assemble(&[], &RetrievalConfig::default()), "");
    Ok(())
}

#[test]
fn invalid_config_is_rejected() {
    let store = MemoryChunkStore::new();
    let index = handle(&[]);
    for config in [
        RetrievalConfig { k: 0, ..RetrievalConfig::default() },
        RetrievalConfig { max_context_chars: 0, ..RetrievalConfig::default() },
        RetrievalConfig { relevance_threshold: f32::NAN, ..RetrievalConfig::default() },
    ] {
        let err = retrieve(&index, &store, "q", &[0.0, 0.0], &config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{config:?} gave {err:?}");
    }
}

#[test]
fn query_of_wrong_dimension_is_rejected() {
    let store = MemoryChunkStore::new();
    let index = handle(&[("a_chunk_0", [0.0, 0.0])]);
    let err =
        retrieve(&index, &store, "q", &[0.0, 0.0, 0.0], &RetrievalConfig::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn retriever_end_to_end_over_directories() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let chunks_dir = tmp.path().join("Chunked");
    fs::create_dir_all(&chunks_dir)?;
    for (name, text) in [
        ("gpu_setup_chunk_0.txt", "install the cuda driver before anything else"),
        ("network_chunk_0.txt", "configure firewall ports"),
        ("backup_chunk_0.txt", "snapshots run nightly to the external disk"),
    ] {
        fs::write(chunks_dir.join(name), text)?;
    }

    let store = DirChunkStore::open(&chunks_dir)?;
    let embedder = HashingEmbedder::new(64)?;
    let embeddings = DirEmbeddingSource::create(tmp.path().join("Embeddings"))?;
    embed_corpus(&store, &embedder, &embeddings, 8)?;
    let index_dir = tmp.path().join("Embeddings").join("Indexes");
    build_index(&store, &embeddings, 64, &index_dir)?;

    let retriever = Retriever::new(load_index(&index_dir)?, Box::new(store), Box::new(embedder))?;
    let config = RetrievalConfig::default();
    let first = retriever.query("configure firewall ports", &config)?;
    assert!(first.starts_with("configure firewall ports"), "{first}");
    assert_eq!(retriever.query("configure firewall ports", &config)?, first, "repeatable");

    let top = &retriever.candidates("configure firewall ports", &config)?[0];
    assert_eq!(top.chunk_id, "network_chunk_0");
    assert_eq!(top.vector_rank, Some(0));
    Ok(())
}

#[test]
fn retriever_rejects_embedder_of_another_dimension() -> anyhow::Result<()> {
    let index = handle(&[("a_chunk_0", [0.0, 0.0])]);
    let embedder = Box::new(HashingEmbedder::new(8)?);
    let err = Retriever::new(index, Box::new(MemoryChunkStore::new()), embedder).err().unwrap();
    assert!(matches!(err, Error::InvalidConfig(_)));
    Ok(())
}
