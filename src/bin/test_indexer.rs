//! Walks every test method under a namespace and records which
//! implementation symbols it transitively exercises.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use symgraph::graph::SymbolGraph;
use symgraph::reader::Reader;
use symgraph::storage::Storage;
use symgraph::traversal::{collect_test_mappings, discover_test_classes, discover_test_methods};

#[derive(Debug, Parser)]
#[command(name = "test_indexer")]
#[command(about = "Record (implementation, test) mappings from a code-knowledge database")]
#[command(version)]
struct Args {
    /// Database to read symbols and references from
    source_db: PathBuf,

    /// Database receiving the test mapping table
    target_db: PathBuf,

    /// Namespace containing the test classes (e.g. UnitTests)
    test_namespace: String,

    /// Worker threads for the mapping collection (default: all cores)
    #[arg(long)]
    threads: Option<usize>,
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

    let reader = Reader::open(&args.source_db)?;
    info!(db = %args.source_db.display(), "opened source database");

    let namespace_symbols =
        reader.find_symbols_by_qualified_name(&args.test_namespace, true)?;
    if namespace_symbols.is_empty() {
        bail!("test namespace not found: {}", args.test_namespace);
    }
    info!(
        namespace = %args.test_namespace,
        matches = namespace_symbols.len(),
        "resolved test namespace"
    );
    let namespace_ids: Vec<i64> = namespace_symbols.iter().map(|s| s.id).collect();

    let symbols = reader.all_symbols()?;
    let edges = reader.all_edges_brief()?;
    info!(symbols = symbols.len(), edges = edges.len(), "loaded graph data");
    let graph = SymbolGraph::build(symbols, &edges);

    let test_classes = discover_test_classes(&graph, &namespace_ids);
    let test_methods = discover_test_methods(&graph, &test_classes);
    info!(
        classes = test_classes.len(),
        methods = test_methods.len(),
        "discovered test classes and methods"
    );
    if test_methods.is_empty() {
        warn!("no test methods found; nothing to record");
        return Ok(());
    }

    // All remaining work runs against the in-memory graph.
    drop(reader);

    let workers = args.threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    let cancel = std::sync::atomic::AtomicBool::new(false);
    let collection = collect_test_mappings(&graph, &test_methods, workers, &cancel);
    info!(
        mappings = collection.pairs.len(),
        nodes_visited = collection.stats.nodes_visited,
        "collected mappings; writing to target database"
    );

    let target = Storage::open(&args.target_db)
        .with_context(|| format!("Failed to open target db {}", args.target_db.display()))?;
    target.setup()?;
    target.begin_transaction()?;
    let mut recorded = 0usize;
    for &(implementation_id, test_id) in &collection.pairs {
        match target.add_test_mapping(implementation_id, test_id) {
            Ok(()) => recorded += 1,
            Err(e) => warn!(implementation_id, test_id, error = %e, "failed to record mapping"),
        }
    }
    target.commit_transaction()?;
    info!(recorded, "test mappings written");

    Ok(())
}
