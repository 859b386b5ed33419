use std::env;

use anyhow::{bail, Context};
use docrag_core::chunk_store::DirChunkStore;
use docrag_core::config::{Config, Settings};
use docrag_core::types::RetrievalConfig;
use docrag_embed::get_default_embedder;
use docrag_hybrid::Retriever;
use docrag_vector::{build_index, embed_corpus, load_index, DirEmbeddingSource};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: docrag <embed|build|query> [args...]\n  \
    embed                     embed new or changed chunks\n  \
    build                     rebuild the vector index from stored embeddings\n  \
    query \"<text>\" [--k N] [--threshold X] [--max-chars N] [--candidates]";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

struct QueryArgs {
    text: String,
    retrieval: RetrievalConfig,
    show_candidates: bool,
}

fn parse_query_args(args: &[String], defaults: RetrievalConfig) -> anyhow::Result<QueryArgs> {
    let mut text = None;
    let mut retrieval = defaults;
    let mut show_candidates = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--k" => retrieval.k = flag_value(args, &mut i)?,
            "--threshold" => retrieval.relevance_threshold = flag_value(args, &mut i)?,
            "--max-chars" => retrieval.max_context_chars = flag_value(args, &mut i)?,
            "--candidates" => show_candidates = true,
            s if s.starts_with("--") => bail!("unknown flag {s}\n{USAGE}"),
            s => text = Some(s.to_string()),
        }
        i += 1;
    }
    let text = text.with_context(|| format!("query text is required\n{USAGE}"))?;
    Ok(QueryArgs { text, retrieval, show_candidates })
}

fn flag_value<T: std::str::FromStr>(args: &[String], i: &mut usize) -> anyhow::Result<T> {
    let flag = &args[*i];
    *i += 1;
    let raw = args.get(*i).with_context(|| format!("{flag} requires a value"))?;
    raw.parse().map_err(|_| anyhow::anyhow!("invalid value for {flag}: {raw}"))
}

fn embed(settings: &Settings) -> anyhow::Result<()> {
    let paths = settings.resolved_paths();
    let store = DirChunkStore::open(&paths.chunks_dir)?;
    let out = DirEmbeddingSource::create(&paths.embeddings_dir)?;
    let embedder = get_default_embedder(settings.embedding.dimension)?;
    let report = embed_corpus(&store, embedder.as_ref(), &out, settings.embedding.batch_size)?;
    println!(
        "Embedded {} chunks ({} unchanged, {} unreadable) into {}",
        report.embedded,
        report.unchanged,
        report.unreadable,
        paths.embeddings_dir.display()
    );
    Ok(())
}

fn build(settings: &Settings) -> anyhow::Result<()> {
    let paths = settings.resolved_paths();
    let store = DirChunkStore::open(&paths.chunks_dir)?;
    let source = DirEmbeddingSource::open(&paths.embeddings_dir)?;
    let built = build_index(&store, &source, settings.embedding.dimension, &paths.index_dir)?;
    println!("Indexed {} chunks into {}", built.report.indexed, paths.index_dir.display());
    if built.report.skipped_missing_chunk + built.report.skipped_missing_embedding > 0 {
        println!(
            "Skipped {} embeddings without chunk text and {} chunks without embeddings",
            built.report.skipped_missing_chunk, built.report.skipped_missing_embedding
        );
    }
    Ok(())
}

fn query(settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let request = parse_query_args(args, settings.retrieval)?;
    let paths = settings.resolved_paths();
    let index = load_index(&paths.index_dir)?;
    let store = DirChunkStore::open(&paths.chunks_dir)?;
    let embedder = get_default_embedder(settings.embedding.dimension)?;
    let retriever = Retriever::new(index, Box::new(store), embedder)?;

    if request.show_candidates {
        for c in retriever.candidates(&request.text, &request.retrieval)? {
            eprintln!(
                "{:.3}  {}  (vector rank {}, keyword ratio {:.2})",
                c.relevance,
                c.chunk_id,
                c.vector_rank.map_or_else(|| "-".to_string(), |r| r.to_string()),
                c.keyword_ratio
            );
        }
    }

    let context = retriever.query(&request.text, &request.retrieval)?;
    if context.is_empty() {
        println!("No relevant information found in the documents.");
    } else {
        println!("{context}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    tracing::debug!(command = %cmd, ?settings, "starting");
    match cmd.as_str() {
        "embed" => embed(&settings),
        "build" => build(&settings),
        "query" => query(&settings, &args),
        _ => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
    }
}
