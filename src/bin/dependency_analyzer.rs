//! Finds the test classes that transitively depend on a set of
//! implementation symbols, per a config file of start specs and exclusions.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use symgraph::config::AnalyzerConfig;
use symgraph::graph::SymbolGraph;
use symgraph::reader::Reader;
use symgraph::traversal::{find_tests, resolve_start_symbols, TraversalOptions};

#[derive(Debug, Parser)]
#[command(name = "dependency_analyzer")]
#[command(about = "Find the tests affected by a set of implementation symbols")]
#[command(version)]
struct Args {
    /// Code-knowledge database to analyze
    source_db: PathBuf,

    /// Section-based config file with start symbols and exclusions
    config_file: PathBuf,

    /// Print results as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = AnalyzerConfig::load(&args.config_file)?;

    let reader = Reader::open(&args.source_db)?;
    let starts = resolve_start_symbols(&reader, &config.start_symbols)?;

    info!(count = starts.len(), "resolved start symbols");
    if !args.json {
        println!("Resolved start symbols ({}):", starts.len());
        for (symbol, _) in &starts {
            println!("  {}  (id {}, {})", symbol.fqn(), symbol.id, symbol.kind);
        }
    }

    let symbols = reader.all_symbols()?;
    let edges = reader.all_edges_brief()?;
    let graph = SymbolGraph::build(symbols, &edges);

    let mut options = TraversalOptions::new(config.test_namespace.clone());
    options.exclude = config.exclude_symbols.clone();
    let start_ids: Vec<(i64, _)> = starts.iter().map(|(s, k)| (s.id, *k)).collect();
    let cancel = AtomicBool::new(false);
    let result = find_tests(&graph, &start_ids, &options, &cancel);

    if result.limit_hit {
        warn!("traversal queue limit reached; results may be incomplete");
    }

    if args.json {
        let tests: Vec<_> = result
            .tests
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "fqn": t.fqn,
                    "path": t.path,
                })
            })
            .collect();
        let doc = serde_json::json!({
            "test_namespace": config.test_namespace,
            "visited": result.visited,
            "incomplete": result.limit_hit,
            "tests": tests,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "Traversal explored {} symbols. Found {} test classes.",
        result.visited,
        result.tests.len()
    );
    for test in &result.tests {
        println!("  Test: {}  (id {})", test.fqn, test.id);
        let names: Vec<String> = test
            .path
            .iter()
            .map(|&id| {
                let fqn = graph.fqn(id);
                if fqn.is_empty() {
                    format!("#{id}")
                } else {
                    fqn.to_string()
                }
            })
            .collect();
        println!("    via: {}", names.join(" <- "));
    }

    Ok(())
}
