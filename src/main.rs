//! # docrag CLI
//!
//! Thin command-line front end over the `docrag` library: initialize the
//! database, ingest PDF/TXT documents, run retrieval queries, and inspect
//! what is indexed.
//!
//! ## Usage
//!
//! ```bash
//! docrag --config ./config/docrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docrag init` | Create the SQLite database and schema |
//! | `docrag ingest <PATH>...` | Chunk, embed, and index files or directories |
//! | `docrag query "<text>"` | Retrieve the most relevant chunks |
//! | `docrag stats` | Show index size and per-file record counts |
//!
//! Logs go to stderr; set `RUST_LOG` to change verbosity (default `docrag=info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use docrag::chunk::ChunkParams;
use docrag::config::{self, Config};
use docrag::context::build_context;
use docrag::embedding::create_provider;
use docrag::extract::{extract_text, DocumentKind};
use docrag::index::VectorIndex;
use docrag::ingest::IngestPipeline;
use docrag::retrieve::RetrievalPipeline;
use docrag::store::SqliteRecordStore;

/// docrag: chunk, embed, and retrieve document passages.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docrag",
    about = "Chunk, embed, and retrieve document passages for question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `records` table. Safe to
    /// run more than once.
    Init,

    /// Ingest PDF or TXT documents.
    ///
    /// Each path may be a file or a directory; directories are walked
    /// recursively and only `.pdf` / `.txt` files are picked up.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Override `[chunking].chunk_size` (characters).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override `[chunking].overlap` (characters).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Retrieve the chunks most relevant to a question.
    Query {
        /// The question or search text.
        text: String,

        /// Number of chunks to return (default from `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the assembled context and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show what is indexed.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&cfg).await?,
        Commands::Ingest {
            paths,
            chunk_size,
            overlap,
        } => run_ingest(&cfg, &paths, chunk_size, overlap).await?,
        Commands::Query { text, top_k, json } => run_query(&cfg, &text, top_k, json).await?,
        Commands::Stats => run_stats(&cfg).await?,
    }

    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docrag=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the configured index. Without `[db]` the index lives only for this process.
async fn open_index(cfg: &Config) -> Result<(Arc<VectorIndex>, Option<Arc<SqliteRecordStore>>)> {
    match &cfg.db {
        Some(db) => {
            let store = Arc::new(
                SqliteRecordStore::open(&db.path)
                    .await
                    .with_context(|| format!("Failed to open database: {}", db.path.display()))?,
            );
            let index = VectorIndex::open(store.clone()).await?;
            Ok((Arc::new(index), Some(store)))
        }
        None => {
            warn!("no [db] configured; index is in-memory and will not persist");
            Ok((Arc::new(VectorIndex::in_memory()), None))
        }
    }
}

async fn run_init(cfg: &Config) -> Result<()> {
    let Some(db) = &cfg.db else {
        bail!("No [db] section in config; nothing to initialize");
    };
    let store = SqliteRecordStore::open(&db.path)
        .await
        .with_context(|| format!("Failed to create database: {}", db.path.display()))?;
    store.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

/// Expand directories into their `.pdf` / `.txt` files, sorted for stable output.
fn collect_documents(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let candidate = entry.path();
                if entry.file_type().is_file()
                    && DocumentKind::from_filename(&candidate.to_string_lossy()).is_some()
                {
                    files.push(candidate.to_path_buf());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

async fn ingest_file(pipeline: &IngestPipeline, path: &Path, params: &ChunkParams) -> Result<usize> {
    let source_file = path.to_string_lossy().to_string();
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = extract_text(&source_file, &bytes)?;
    Ok(pipeline
        .ingest_with_params(&text, &source_file, params)
        .await?)
}

async fn run_ingest(
    cfg: &Config,
    paths: &[PathBuf],
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let params = ChunkParams::new(
        chunk_size.unwrap_or(cfg.chunking.size()),
        overlap.unwrap_or(cfg.chunking.overlap()),
    )?;
    let provider = create_provider(&cfg.embedding)?;
    let (index, store) = open_index(cfg).await?;
    let pipeline = IngestPipeline::new(provider, index.clone(), cfg.embedding.timeout());

    let files = collect_documents(paths);
    let mut ingested = 0usize;
    let mut failed = 0usize;
    let mut total_chunks = 0usize;

    println!("ingest");
    for path in &files {
        match ingest_file(&pipeline, path, &params).await {
            Ok(chunks) => {
                println!("  {}: {} chunks indexed", path.display(), chunks);
                ingested += 1;
                total_chunks += chunks;
            }
            Err(e) => {
                eprintln!("Warning: skipped {}: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }
    println!("  documents: {}", ingested);
    println!("  chunks: {}", total_chunks);
    println!("  failed: {}", failed);

    index.persist().await;
    if index.pending_flush().await > 0 {
        eprintln!("Warning: some records could not be written to the database");
    }
    if let Some(store) = store {
        store.close().await;
    }
    Ok(())
}

async fn run_query(cfg: &Config, text: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let provider = create_provider(&cfg.embedding)?;
    let (index, store) = open_index(cfg).await?;
    let pipeline = RetrievalPipeline::new(provider, index, cfg.embedding.timeout());

    let results = pipeline
        .retrieve(text, top_k.unwrap_or(cfg.retrieval.top_k))
        .await?;
    if let Some(store) = store {
        store.close().await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&build_context(&results))?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} | chunk:{}",
            i + 1,
            result.score,
            result.metadata.source_file,
            result.metadata.chunk_index
        );
        println!("    excerpt: \"{}\"", excerpt(&result.text, 200));
        println!();
    }
    Ok(())
}

async fn run_stats(cfg: &Config) -> Result<()> {
    let (index, store) = open_index(cfg).await?;
    let stats = index.stats().await;

    println!("docrag index stats");
    println!("==================");
    println!();
    if let Some(db) = &cfg.db {
        let db_size = std::fs::metadata(&db.path).map(|m| m.len()).unwrap_or(0);
        println!("  Database:    {}", db.path.display());
        println!("  Size:        {}", format_bytes(db_size));
    } else {
        println!("  Database:    (in-memory)");
    }
    println!("  Records:     {}", stats.records);
    match stats.dims {
        Some(d) => println!("  Dimensions:  {}", d),
        None => println!("  Dimensions:  (not established)"),
    }

    if !stats.sources.is_empty() {
        println!();
        println!("  By file:");
        println!("  {:<48} {:>8}", "FILE", "CHUNKS");
        println!("  {}", "-".repeat(57));
        for (file, count) in &stats.sources {
            println!("  {:<48} {:>8}", file, count);
        }
    }
    println!();

    if let Some(store) = store {
        store.close().await;
    }
    Ok(())
}

/// Single-line excerpt of at most `max_chars` characters.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
