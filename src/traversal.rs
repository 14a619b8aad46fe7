//! Test-impact traversal over the in-memory symbol graph.
//!
//! Two engines live here. [`find_tests`] walks *incoming* references from a
//! set of implementation symbols and reports the test classes that
//! transitively depend on them. [`collect_test_mappings`] goes the other way:
//! from every test method it walks *outgoing* references and collects
//! `(implementation, test)` pairs, fanned out across worker threads over the
//! shared read-only graph.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::info;

use crate::graph::SymbolGraph;
use crate::reader::Reader;
use crate::types::{EdgeKind, Symbol, SymbolKind};

/// Safety cap on the BFS queue. Hitting it returns partial results flagged
/// with `limit_hit`.
pub const BFS_LIMIT: usize = 100_000;

/// Pairs a worker accumulates locally before taking the shared lock.
const MAPPING_BATCH: usize = 256;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Kind constraint of a start spec, propagated to every node the spec's
/// traversal reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindFilter {
    Any,
    Only(SymbolKind),
}

impl KindFilter {
    pub fn keeps(&self, kind: SymbolKind) -> bool {
        match self {
            Self::Any => true,
            Self::Only(k) => *k == kind,
        }
    }
}

/// One traversal seed: a name pattern plus an optional kind constraint.
#[derive(Debug, Clone)]
pub struct StartSpec {
    pub pattern: String,
    pub kind: KindFilter,
}

#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Namespace element that marks test code; symbols qualify only when it
    /// appears as a non-last element of their hierarchy.
    pub test_namespace: String,
    /// Symbols pruned from the walk, matched against FQNs and element names.
    pub exclude: HashSet<String>,
    pub bfs_limit: usize,
}

impl TraversalOptions {
    pub fn new(test_namespace: impl Into<String>) -> Self {
        Self {
            test_namespace: test_namespace.into(),
            exclude: HashSet::new(),
            bfs_limit: BFS_LIMIT,
        }
    }
}

/// A discovered test class with the chain of symbol ids that reached it.
#[derive(Debug, Clone, PartialEq)]
pub struct TestHit {
    pub id: i64,
    pub fqn: String,
    /// Advisory: start id first, then every hop up to the symbol that
    /// triggered registration (plus the promoted class for method hits).
    pub path: Vec<i64>,
}

#[derive(Debug)]
pub struct TestSearch {
    pub tests: Vec<TestHit>,
    /// Distinct `(symbol, mode)` states reached.
    pub visited: usize,
    pub limit_hit: bool,
    pub cancelled: bool,
}

/// `true` for the `Test`/`Tests` class-name convention.
pub fn has_test_suffix(name: &str) -> bool {
    name.ends_with("Test") || name.ends_with("Tests")
}

/// Resolve start specs to concrete symbols.
///
/// Qualified patterns go through the qualified lookup with a simple-name
/// fallback on the tail; plain patterns match by simple name. Resolution
/// de-duplicates within each start spec; the same symbol may still appear
/// under two specs with different kind filters.
pub fn resolve_start_symbols(
    reader: &Reader,
    specs: &[StartSpec],
) -> Result<Vec<(Symbol, KindFilter)>> {
    let mut resolved = Vec::new();
    for spec in specs {
        let qualified = spec.pattern.contains("::") || spec.pattern.contains('.');
        let mut symbols = if qualified {
            let mut hits = reader.find_symbols_by_qualified_name(&spec.pattern, false)?;
            if hits.is_empty() {
                let delimiter = if spec.pattern.contains("::") { "::" } else { "." };
                if let Some(tail) = spec.pattern.rsplit(delimiter).next() {
                    if !tail.is_empty() {
                        hits = reader.find_symbols_by_name(tail, true)?;
                    }
                }
            }
            hits
        } else {
            reader.find_symbols_by_name(&spec.pattern, false)?
        };
        symbols.retain(|s| spec.kind.keeps(s.kind));

        let mut seen = HashSet::new();
        for symbol in symbols {
            if seen.insert(symbol.id) {
                resolved.push((symbol, spec.kind));
            }
        }
    }
    if resolved.is_empty() {
        bail!("no start symbols resolved from the given patterns");
    }
    Ok(resolved)
}

struct QueueItem {
    id: i64,
    depth: u32,
    parent: Option<usize>,
    mode: KindFilter,
}

/// Find the test classes that transitively depend on the start symbols.
///
/// The walk follows incoming references (who uses the current symbol) and
/// additionally outgoing `Override` edges, so tests written against an
/// overridden base method count for the override as well. The cancel flag is
/// checked once per popped node.
pub fn find_tests(
    graph: &SymbolGraph,
    starts: &[(i64, KindFilter)],
    options: &TraversalOptions,
    cancel: &AtomicBool,
) -> TestSearch {
    let mut items: Vec<QueueItem> = Vec::new();
    let mut visited: HashSet<(i64, KindFilter)> = HashSet::new();
    for &(id, mode) in starts {
        if visited.insert((id, mode)) {
            items.push(QueueItem {
                id,
                depth: 0,
                parent: None,
                mode,
            });
        }
    }

    let mut tests: Vec<TestHit> = Vec::new();
    let mut seen_ids: HashSet<i64> = HashSet::new();
    let mut seen_fqns: HashSet<String> = HashSet::new();
    let mut head = 0usize;
    let mut cancelled = false;

    while head < items.len() && items.len() < options.bfs_limit {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        let index = head;
        head += 1;
        let (id, depth, mode) = {
            let item = &items[index];
            (item.id, item.depth, item.mode)
        };
        let Some(symbol) = graph.symbol(id) else {
            continue;
        };

        // An excluded symbol is neither recorded nor expanded.
        if is_excluded(symbol, &options.exclude) {
            continue;
        }

        if in_test_namespace(symbol, &options.test_namespace) {
            match symbol.kind {
                SymbolKind::Class | SymbolKind::Struct
                    if has_test_suffix(symbol.name.simple_name()) =>
                {
                    register(
                        &mut tests,
                        &mut seen_ids,
                        &mut seen_fqns,
                        id,
                        graph.fqn(id).to_string(),
                        chain(&items, index, None),
                    );
                }
                SymbolKind::Method if symbol.name.elements.len() >= 2 => {
                    let parent_name =
                        &symbol.name.elements[symbol.name.elements.len() - 2].name;
                    if has_test_suffix(parent_name) {
                        if let Some(parent_fqn) = symbol.name.parent_fqn() {
                            for &class_id in graph.ids_for_fqn(&parent_fqn) {
                                let Some(class) = graph.symbol(class_id) else {
                                    continue;
                                };
                                if matches!(class.kind, SymbolKind::Class | SymbolKind::Struct) {
                                    register(
                                        &mut tests,
                                        &mut seen_ids,
                                        &mut seen_fqns,
                                        class_id,
                                        parent_fqn.clone(),
                                        chain(&items, index, Some(class_id)),
                                    );
                                }
                            }
                        }
                        // A test method's callers are other tests; stop here.
                        continue;
                    }
                }
                _ => {}
            }
        }

        let skip_structural = mode == KindFilter::Only(SymbolKind::Method);
        let override_out = graph
            .outgoing(id)
            .iter()
            .filter(|&&(_, kind)| kind == EdgeKind::Override);
        for &(next, kind) in graph.incoming(id).iter().chain(override_out) {
            if skip_structural && matches!(kind, EdgeKind::Member | EdgeKind::TypeUsage) {
                continue;
            }
            if visited.insert((next, mode)) {
                items.push(QueueItem {
                    id: next,
                    depth: depth + 1,
                    parent: Some(index),
                    mode,
                });
            }
        }
    }

    TestSearch {
        tests,
        visited: visited.len(),
        limit_hit: items.len() >= options.bfs_limit,
        cancelled,
    }
}

fn is_excluded(symbol: &Symbol, exclude: &HashSet<String>) -> bool {
    if exclude.is_empty() {
        return false;
    }
    if exclude.contains(&symbol.fqn()) {
        return true;
    }
    symbol
        .name
        .elements
        .iter()
        .any(|element| exclude.contains(&element.name))
}

fn in_test_namespace(symbol: &Symbol, namespace: &str) -> bool {
    let elements = &symbol.name.elements;
    elements.len() > 1
        && elements[..elements.len() - 1]
            .iter()
            .any(|element| element.name == namespace)
}

fn register(
    tests: &mut Vec<TestHit>,
    seen_ids: &mut HashSet<i64>,
    seen_fqns: &mut HashSet<String>,
    id: i64,
    fqn: String,
    path: Vec<i64>,
) {
    if seen_ids.contains(&id) || seen_fqns.contains(&fqn) {
        return;
    }
    seen_ids.insert(id);
    seen_fqns.insert(fqn.clone());
    tests.push(TestHit { id, fqn, path });
}

fn chain(items: &[QueueItem], index: usize, promoted: Option<i64>) -> Vec<i64> {
    let mut path = Vec::new();
    let mut cursor = Some(index);
    while let Some(i) = cursor {
        path.push(items[i].id);
        cursor = items[i].parent;
    }
    path.reverse();
    if let Some(class_id) = promoted {
        path.push(class_id);
    }
    path
}

// ── Test-method discovery and mapping collection ──

/// Immediate `Member` children of the given namespace symbols that look like
/// test classes.
pub fn discover_test_classes(graph: &SymbolGraph, namespace_ids: &[i64]) -> Vec<i64> {
    let mut out = Vec::new();
    for &ns in namespace_ids {
        for &(child, kind) in graph.outgoing(ns) {
            if kind != EdgeKind::Member {
                continue;
            }
            let Some(symbol) = graph.symbol(child) else {
                continue;
            };
            if matches!(symbol.kind, SymbolKind::Class | SymbolKind::Struct)
                && has_test_suffix(symbol.name.simple_name())
            {
                out.push(child);
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Method members of the given test classes.
pub fn discover_test_methods(graph: &SymbolGraph, class_ids: &[i64]) -> Vec<i64> {
    let mut out = Vec::new();
    for &class_id in class_ids {
        for &(child, kind) in graph.outgoing(class_id) {
            if kind != EdgeKind::Member {
                continue;
            }
            if graph.symbol(child).map(|s| s.kind) == Some(SymbolKind::Method) {
                out.push(child);
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MappingStats {
    pub methods_processed: usize,
    pub nodes_visited: usize,
    pub pairs_discovered: usize,
}

#[derive(Debug)]
pub struct MappingCollection {
    /// `(implementation_id, test_method_id)` pairs.
    pub pairs: HashSet<(i64, i64)>,
    pub stats: MappingStats,
}

/// Collect `(implementation, test method)` pairs by walking outgoing
/// references from each test method, `Member` edges excluded.
///
/// Methods are distributed over `workers` threads; each worker batches pairs
/// locally and flushes into one shared set, so the result is identical for
/// any worker count. On cancel, workers drain their batches and exit; the
/// collection reflects progress so far.
pub fn collect_test_mappings(
    graph: &SymbolGraph,
    test_methods: &[i64],
    workers: usize,
    cancel: &AtomicBool,
) -> MappingCollection {
    let workers = workers.max(1);
    let pairs: Mutex<HashSet<(i64, i64)>> = Mutex::new(HashSet::new());
    let next = AtomicUsize::new(0);
    let methods_processed = AtomicUsize::new(0);
    let nodes_visited = AtomicUsize::new(0);
    let pairs_discovered = AtomicUsize::new(0);
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        let reporter = scope.spawn(|| {
            let mut last = Instant::now();
            while !done.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(100));
                if last.elapsed() >= PROGRESS_INTERVAL {
                    info!(
                        methods = methods_processed.load(Ordering::Relaxed),
                        total = test_methods.len(),
                        nodes_visited = nodes_visited.load(Ordering::Relaxed),
                        pairs_discovered = pairs_discovered.load(Ordering::Relaxed),
                        "mapping collection progress"
                    );
                    last = Instant::now();
                }
            }
        });

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(scope.spawn(|| {
                let mut batch: Vec<(i64, i64)> = Vec::with_capacity(MAPPING_BATCH);
                loop {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    if i >= test_methods.len() {
                        break;
                    }
                    let method = test_methods[i];

                    let mut visited: HashSet<i64> = HashSet::new();
                    let mut queue: VecDeque<i64> = VecDeque::new();
                    visited.insert(method);
                    queue.push_back(method);
                    while let Some(current) = queue.pop_front() {
                        if cancel.load(Ordering::Relaxed) {
                            break;
                        }
                        nodes_visited.fetch_add(1, Ordering::Relaxed);
                        for &(target, kind) in graph.outgoing(current) {
                            if kind == EdgeKind::Member {
                                continue;
                            }
                            if target <= 0 {
                                continue;
                            }
                            if visited.insert(target) {
                                queue.push_back(target);
                                batch.push((target, method));
                                pairs_discovered.fetch_add(1, Ordering::Relaxed);
                                if batch.len() >= MAPPING_BATCH {
                                    flush(&pairs, &mut batch);
                                }
                            }
                        }
                    }

                    flush(&pairs, &mut batch);
                    methods_processed.fetch_add(1, Ordering::Relaxed);
                }
                flush(&pairs, &mut batch);
            }));
        }
        for handle in handles {
            let _ = handle.join();
        }
        done.store(true, Ordering::Relaxed);
        let _ = reporter.join();
    });

    MappingCollection {
        pairs: pairs.into_inner().unwrap_or_default(),
        stats: MappingStats {
            methods_processed: methods_processed.into_inner(),
            nodes_visited: nodes_visited.into_inner(),
            pairs_discovered: pairs_discovered.into_inner(),
        },
    }
}

fn flush(pairs: &Mutex<HashSet<(i64, i64)>>, batch: &mut Vec<(i64, i64)>) {
    if batch.is_empty() {
        return;
    }
    let mut set = pairs.lock().expect("mapping set lock poisoned");
    set.extend(batch.drain(..));
}
