//! In-memory symbol graph.
//!
//! Built once per analysis from a full symbol dump and the brief edge list,
//! then shared read-only across any number of worker threads. Arrays are
//! indexed directly by symbol id; ids are dense enough in practice that the
//! sparse slots cost less than a hash map would.

use std::collections::HashMap;

use crate::types::{EdgeBrief, EdgeKind, Symbol};

pub struct SymbolGraph {
    max_id: i64,
    symbol_by_id: Vec<Option<Symbol>>,
    fqn_by_id: Vec<String>,
    fqn_to_ids: HashMap<String, Vec<i64>>,
    outgoing: Vec<Vec<(i64, EdgeKind)>>,
    incoming: Vec<Vec<(i64, EdgeKind)>>,
}

impl SymbolGraph {
    /// Build the graph from symbols and edges.
    ///
    /// Every edge contributes exactly one entry to `outgoing[source]` and one
    /// to `incoming[target]`; self-loops and duplicate edges are preserved.
    /// Adjacency lists are sorted by `(neighbor, kind)` so iteration order,
    /// and with it reconstructed paths, is reproducible.
    pub fn build(symbols: Vec<Symbol>, edges: &[EdgeBrief]) -> Self {
        let mut max_id = 0;
        for symbol in &symbols {
            max_id = max_id.max(symbol.id);
        }
        for edge in edges {
            max_id = max_id.max(edge.source_id).max(edge.target_id);
        }

        let slots = (max_id + 1) as usize;
        let mut symbol_by_id: Vec<Option<Symbol>> = vec![None; slots];
        let mut fqn_by_id = vec![String::new(); slots];
        let mut fqn_to_ids: HashMap<String, Vec<i64>> = HashMap::new();
        for symbol in symbols {
            if symbol.id <= 0 {
                continue;
            }
            let fqn = symbol.fqn();
            let id = symbol.id;
            fqn_to_ids.entry(fqn.clone()).or_default().push(id);
            fqn_by_id[id as usize] = fqn;
            symbol_by_id[id as usize] = Some(symbol);
        }

        let mut outgoing: Vec<Vec<(i64, EdgeKind)>> = vec![Vec::new(); slots];
        let mut incoming: Vec<Vec<(i64, EdgeKind)>> = vec![Vec::new(); slots];
        for edge in edges {
            if edge.source_id < 0 || edge.target_id < 0 {
                continue;
            }
            outgoing[edge.source_id as usize].push((edge.target_id, edge.kind));
            incoming[edge.target_id as usize].push((edge.source_id, edge.kind));
        }
        for list in outgoing.iter_mut().chain(incoming.iter_mut()) {
            list.sort_unstable_by_key(|&(id, kind)| (id, kind.code()));
        }

        Self {
            max_id,
            symbol_by_id,
            fqn_by_id,
            fqn_to_ids,
            outgoing,
            incoming,
        }
    }

    pub fn max_id(&self) -> i64 {
        self.max_id
    }

    pub fn symbol(&self, id: i64) -> Option<&Symbol> {
        if id < 0 || id > self.max_id {
            return None;
        }
        self.symbol_by_id[id as usize].as_ref()
    }

    pub fn fqn(&self, id: i64) -> &str {
        if id < 0 || id > self.max_id {
            return "";
        }
        &self.fqn_by_id[id as usize]
    }

    pub fn ids_for_fqn(&self, fqn: &str) -> &[i64] {
        self.fqn_to_ids.get(fqn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edges originating from `id`, as `(target, kind)`.
    pub fn outgoing(&self, id: i64) -> &[(i64, EdgeKind)] {
        if id < 0 || id > self.max_id {
            return &[];
        }
        &self.outgoing[id as usize]
    }

    /// Edges pointing at `id`, as `(source, kind)`.
    pub fn incoming(&self, id: i64) -> &[(i64, EdgeKind)] {
        if id < 0 || id > self.max_id {
            return &[];
        }
        &self.incoming[id as usize]
    }

    pub fn symbol_count(&self) -> usize {
        self.symbol_by_id.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::{NameElement, NameHierarchy};
    use crate::types::{DefinitionKind, SymbolKind};

    fn symbol(id: i64, names: &[&str], kind: SymbolKind) -> Symbol {
        let elements = names.iter().map(|n| NameElement::new(*n)).collect();
        Symbol {
            id,
            name: NameHierarchy::new("::", elements),
            kind,
            definition_kind: DefinitionKind::Explicit,
            locations: Vec::new(),
        }
    }

    fn edge(source_id: i64, target_id: i64, kind: EdgeKind) -> EdgeBrief {
        EdgeBrief {
            source_id,
            target_id,
            kind,
        }
    }

    #[test]
    fn test_adjacency_invariant() {
        let symbols = vec![
            symbol(1, &["a"], SymbolKind::Function),
            symbol(2, &["b"], SymbolKind::Function),
            symbol(3, &["C"], SymbolKind::Class),
        ];
        let edges = vec![
            edge(1, 2, EdgeKind::Call),
            edge(3, 2, EdgeKind::Member),
            edge(1, 3, EdgeKind::TypeUsage),
        ];
        let graph = SymbolGraph::build(symbols, &edges);

        for e in &edges {
            assert!(graph.outgoing(e.source_id).contains(&(e.target_id, e.kind)));
            assert!(graph.incoming(e.target_id).contains(&(e.source_id, e.kind)));
        }
        assert_eq!(graph.outgoing(1).len(), 2);
        assert_eq!(graph.incoming(2).len(), 2);
        assert_eq!(graph.outgoing(2).len(), 0);
    }

    #[test]
    fn test_self_loops_and_duplicates_preserved() {
        let symbols = vec![symbol(1, &["rec"], SymbolKind::Function)];
        let edges = vec![
            edge(1, 1, EdgeKind::Call),
            edge(1, 1, EdgeKind::Call),
        ];
        let graph = SymbolGraph::build(symbols, &edges);
        assert_eq!(graph.outgoing(1).len(), 2);
        assert_eq!(graph.incoming(1).len(), 2);
    }

    #[test]
    fn test_fqn_index() {
        let symbols = vec![
            symbol(1, &["App", "Engine"], SymbolKind::Class),
            symbol(2, &["App", "Engine"], SymbolKind::Struct),
            symbol(3, &["App", "run"], SymbolKind::Function),
        ];
        let graph = SymbolGraph::build(symbols, &[]);

        assert_eq!(graph.fqn(1), "App::Engine");
        let mut ids = graph.ids_for_fqn("App::Engine").to_vec();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(graph.ids_for_fqn("App::run"), &[3]);
        assert!(graph.ids_for_fqn("nope").is_empty());
    }

    #[test]
    fn test_max_id_covers_edge_endpoints() {
        // An edge can reference ids with no symbol row.
        let symbols = vec![symbol(1, &["a"], SymbolKind::Function)];
        let edges = vec![edge(1, 9, EdgeKind::Call)];
        let graph = SymbolGraph::build(symbols, &edges);

        assert_eq!(graph.max_id(), 9);
        assert!(graph.symbol(9).is_none());
        assert_eq!(graph.incoming(9), &[(1, EdgeKind::Call)]);
        assert_eq!(graph.fqn(9), "");
    }

    #[test]
    fn test_out_of_range_lookups_are_empty() {
        let graph = SymbolGraph::build(vec![symbol(1, &["a"], SymbolKind::Function)], &[]);
        assert!(graph.symbol(-1).is_none());
        assert!(graph.symbol(100).is_none());
        assert!(graph.outgoing(100).is_empty());
        assert!(graph.incoming(-5).is_empty());
        assert_eq!(graph.symbol_count(), 1);
    }
}
