//! Emits one JSON chunk document per selected source file: every symbol's
//! code slice, qualified name, and outgoing references.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use symgraph::chunk::{chunk_file, join_path, map_db_path_to_local, normalize_path};
use symgraph::config::ChunkerConfig;
use symgraph::graph::SymbolGraph;
use symgraph::reader::Reader;
use symgraph::types::File;

#[derive(Debug, Parser)]
#[command(name = "code_chunker")]
#[command(about = "Emit per-file JSON chunk bundles from a code-knowledge database")]
#[command(version)]
struct Args {
    /// Code-knowledge database to chunk
    database: PathBuf,

    /// JSON config naming the project roots and paths to chunk
    config_json: PathBuf,

    /// Directory the chunk documents are written to
    #[arg(long, default_value = "chunks")]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ChunkerConfig::load(&args.config_json)?;
    info!(project = %config.project_name, "chunking project");

    let reader = Reader::open(&args.database)?;
    let files = reader.all_files()?;
    info!(files = files.len(), "loaded files from database");

    let selected = select_files(&files, &config);
    info!(selected = selected.len(), "files selected for chunking");

    let symbols = reader.all_symbols()?;
    let edges = reader.all_edges_brief()?;
    info!(symbols = symbols.len(), edges = edges.len(), "loaded graph data");
    let graph = SymbolGraph::build(symbols, &edges);

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory {}", args.out.display()))?;

    let mut written = 0usize;
    for file in &selected {
        let Some(text) = load_file_text(&reader, file, &config)? else {
            warn!(file = %file.path, "no file content available; skipping");
            continue;
        };
        let doc = chunk_file(&reader, &graph, file, &text)?;
        if doc.chunks.is_empty() {
            continue;
        }
        let out_path = args.out.join(output_name(&file.path));
        let json = serde_json::to_string_pretty(&doc)?;
        std::fs::write(&out_path, json)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        written += 1;
    }
    info!(written, "chunk documents written");

    Ok(())
}

/// Keep the files lying under any configured path prefix; everything when no
/// prefixes are configured. Prefixes are given relative to the project and
/// translated into database space through `indexed_root`.
fn select_files(files: &[File], config: &ChunkerConfig) -> Vec<File> {
    if config.paths_to_chunk.is_empty() {
        return files.to_vec();
    }

    let prefixes: Vec<String> = config
        .paths_to_chunk
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| {
            let entry = normalize_path(p);
            let base = if config.indexed_root.is_empty() {
                &config.root_dir
            } else {
                &config.indexed_root
            };
            normalize_path(&join_path(base, &entry))
        })
        .collect();

    files
        .iter()
        .filter(|f| {
            let path = normalize_path(&f.path);
            prefixes
                .iter()
                .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
        })
        .cloned()
        .collect()
}

/// Stored file content when the indexer captured it, otherwise the local
/// file mapped through the configured roots.
fn load_file_text(reader: &Reader, file: &File, config: &ChunkerConfig) -> Result<Option<String>> {
    if let Some(content) = reader.file_content(file.id)? {
        return Ok(Some(content));
    }
    let local = map_db_path_to_local(&file.path, &config.indexed_root, &config.root_dir);
    match std::fs::read_to_string(&local) {
        Ok(text) => Ok(Some(text)),
        Err(e) => {
            warn!(file = %file.path, local = %local, error = %e, "could not read source file");
            Ok(None)
        }
    }
}

fn output_name(db_path: &str) -> String {
    let mut name: String = normalize_path(db_path)
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    name.push_str(".json");
    name.trim_start_matches('_').to_string()
}
