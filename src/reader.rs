//! High-level typed view over an open store.
//!
//! The reader decodes serialized names, maps stored kind codes onto the
//! closed enums, and keeps the miss/fault distinction explicit: a lookup that
//! resolves to nothing returns an empty value (or `None`), a storage fault
//! returns `Err`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::name::{encode_minimal, NameHierarchy};
use crate::storage::{Storage, SymbolNodeRow, SUPPORTED_VERSION};
use crate::types::{
    DefinitionKind, EdgeBrief, EdgeKind, File, LocationKind, Reference, SourceLocation, Symbol,
    SymbolBrief, SymbolKind,
};

/// Aggregate counts over a store.
#[derive(Debug, Clone, Serialize)]
pub struct ReaderStats {
    pub symbols: usize,
    pub references: usize,
    pub files: usize,
    pub database_version: i64,
}

pub struct Reader {
    storage: Storage,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader").finish_non_exhaustive()
    }
}

impl Reader {
    /// Open a database file for reading. Fails when the file cannot be
    /// opened or its version does not match [`SUPPORTED_VERSION`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("database file not found: {}", path.display());
        }
        let storage = Storage::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        let loaded = storage.loaded_version()?;
        if loaded != SUPPORTED_VERSION {
            bail!(
                "database version {loaded} is not compatible (supported: {SUPPORTED_VERSION})"
            );
        }
        Ok(Self { storage })
    }

    /// Wrap an already-open store. Used by tests and callers that set up the
    /// store themselves; no version check is performed.
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    // ── Symbols ──

    /// All symbols in the store: nodes joined with the symbol table, names
    /// decoded, kinds mapped. Locations are not loaded here; fetch them per
    /// symbol when needed.
    pub fn all_symbols(&self) -> Result<Vec<Symbol>> {
        let rows = self.storage.all_symbol_nodes()?;
        Ok(rows.iter().map(symbol_from_row).collect())
    }

    /// Compact id/kind view of all symbols, for graph construction.
    pub fn all_symbols_brief(&self) -> Result<Vec<SymbolBrief>> {
        let rows = self.storage.all_symbol_nodes()?;
        Ok(rows
            .iter()
            .map(|row| SymbolBrief {
                id: row.id,
                kind: SymbolKind::from_node_kind(row.node_kind),
                definition_kind: DefinitionKind::from_code(row.definition_kind),
            })
            .collect())
    }

    /// A single symbol by id. `None` when the id does not exist, and also
    /// when it names a node that has no symbol row (files, for instance).
    pub fn symbol_by_id(&self, id: i64) -> Result<Option<Symbol>> {
        let Some(node) = self.storage.node_by_id(id)? else {
            return Ok(None);
        };
        let Some(definition_kind) = self.storage.definition_kind_for_symbol(id)? else {
            return Ok(None);
        };
        Ok(Some(symbol_from_row(&SymbolNodeRow {
            id: node.id,
            serialized_name: node.serialized_name,
            node_kind: node.node_kind,
            definition_kind,
        })))
    }

    /// Find symbols by (simple) name.
    ///
    /// A delimiter in `name` routes to [`Reader::find_symbols_by_qualified_name`].
    /// Exact lookups first try the serialized-name index directly, then fall
    /// back to a containment scan post-filtered on the last element.
    pub fn find_symbols_by_name(&self, name: &str, exact: bool) -> Result<Vec<Symbol>> {
        if name.contains("::") || name.contains('.') {
            return self.find_symbols_by_qualified_name(name, exact);
        }

        if exact {
            let mut hits = Vec::new();
            for node in self.storage.nodes_by_serialized_name(name)? {
                let Some(definition_kind) = self.storage.definition_kind_for_symbol(node.id)?
                else {
                    continue;
                };
                let symbol = symbol_from_row(&SymbolNodeRow {
                    id: node.id,
                    serialized_name: node.serialized_name,
                    node_kind: node.node_kind,
                    definition_kind,
                });
                if symbol.fqn() == name {
                    hits.push(symbol);
                }
            }
            if !hits.is_empty() {
                return Ok(hits);
            }
        }

        let pattern = format!("%{}%", escape_like(name));
        let mut out = Vec::new();
        for row in self.storage.symbol_nodes_by_name_like(&pattern)? {
            let symbol = symbol_from_row(&row);
            let simple = symbol.name.simple_name();
            let matches = if exact {
                simple == name
            } else {
                simple.contains(name)
            };
            if matches {
                out.push(symbol);
            }
        }
        Ok(out)
    }

    /// Find symbols by qualified name pattern, e.g. `App::Io::Writer::flush`.
    ///
    /// When `exact` is false, a symbol also matches if its FQN ends with the
    /// pattern on a delimiter boundary, so partial tails resolve.
    pub fn find_symbols_by_qualified_name(&self, pattern: &str, exact: bool) -> Result<Vec<Symbol>> {
        let delimiter = if pattern.contains("::") { "::" } else { "." };
        let parts: Vec<&str> = pattern.split(delimiter).collect();

        if exact {
            let minimal = encode_minimal(delimiter, &parts);
            let mut hits = Vec::new();
            for node in self.storage.nodes_by_serialized_name(&minimal)? {
                let Some(definition_kind) = self.storage.definition_kind_for_symbol(node.id)?
                else {
                    continue;
                };
                let symbol = symbol_from_row(&SymbolNodeRow {
                    id: node.id,
                    serialized_name: node.serialized_name,
                    node_kind: node.node_kind,
                    definition_kind,
                });
                if symbol.fqn() == pattern {
                    hits.push(symbol);
                }
            }
            if !hits.is_empty() {
                return Ok(hits);
            }
        }

        let tail = parts.last().copied().unwrap_or(pattern);
        let like = format!("%{}%", escape_like(tail));
        let mut out = Vec::new();
        for row in self.storage.symbol_nodes_by_name_like(&like)? {
            let symbol = symbol_from_row(&row);
            let fqn = symbol.fqn();
            let accepted = if exact {
                fqn == pattern
            } else {
                fqn == pattern || ends_on_boundary(&fqn, pattern, &symbol.name.delimiter)
            };
            if accepted {
                out.push(symbol);
            }
        }
        Ok(out)
    }

    // ── References ──

    pub fn all_references(&self) -> Result<Vec<Reference>> {
        let rows = self.storage.all_edges()?;
        Ok(rows.iter().map(|row| reference_from_codes(row.id, row.source_node_id, row.target_node_id, row.edge_kind)).collect())
    }

    /// Compact edges for adjacency building: endpoints and kind only.
    pub fn all_edges_brief(&self) -> Result<Vec<EdgeBrief>> {
        let rows = self.storage.all_edges()?;
        Ok(rows
            .iter()
            .map(|row| EdgeBrief {
                source_id: row.source_node_id,
                target_id: row.target_node_id,
                kind: EdgeKind::from_code(row.edge_kind),
            })
            .collect())
    }

    /// References pointing to a symbol.
    pub fn refs_to(&self, symbol_id: i64) -> Result<Vec<Reference>> {
        let rows = self.storage.edges_to(symbol_id)?;
        Ok(rows.iter().map(|row| reference_from_codes(row.id, row.source_node_id, row.target_node_id, row.edge_kind)).collect())
    }

    /// References originating from a symbol.
    pub fn refs_from(&self, symbol_id: i64) -> Result<Vec<Reference>> {
        let rows = self.storage.edges_from(symbol_id)?;
        Ok(rows.iter().map(|row| reference_from_codes(row.id, row.source_node_id, row.target_node_id, row.edge_kind)).collect())
    }

    pub fn refs_from_with_kind(&self, symbol_id: i64, kind: EdgeKind) -> Result<Vec<Reference>> {
        let rows = self.storage.edges_from_of_kinds(symbol_id, &[kind.code()])?;
        Ok(rows.iter().map(|row| reference_from_codes(row.id, row.source_node_id, row.target_node_id, row.edge_kind)).collect())
    }

    pub fn refs_by_kind(&self, kind: EdgeKind) -> Result<Vec<Reference>> {
        let rows = self.storage.edges_by_kind(kind.code())?;
        Ok(rows.iter().map(|row| reference_from_codes(row.id, row.source_node_id, row.target_node_id, row.edge_kind)).collect())
    }

    // ── Files ──

    pub fn all_files(&self) -> Result<Vec<File>> {
        let rows = self.storage.all_files()?;
        Ok(rows.into_iter().map(file_from_row).collect())
    }

    pub fn file_by_id(&self, id: i64) -> Result<Option<File>> {
        Ok(self.storage.file_by_id(id)?.map(file_from_row))
    }

    pub fn find_files_by_path(&self, path: &str, exact: bool) -> Result<Vec<File>> {
        let rows = self.storage.all_files()?;
        Ok(rows
            .into_iter()
            .map(file_from_row)
            .filter(|f| {
                if exact {
                    f.path == path
                } else {
                    f.path.contains(path)
                }
            })
            .collect())
    }

    /// Stored text of a file, when the indexer captured it.
    pub fn file_content(&self, file_id: i64) -> Result<Option<String>> {
        self.storage.file_content(file_id)
    }

    // ── Source locations ──

    pub fn source_locations_for_symbol(&self, symbol_id: i64) -> Result<Vec<SourceLocation>> {
        let rows = self.storage.source_locations_for_element(symbol_id)?;
        Ok(rows.iter().map(location_from_row).collect())
    }

    pub fn source_locations_in_file(&self, file_id: i64) -> Result<Vec<SourceLocation>> {
        let rows = self.storage.source_locations_in_file(file_id)?;
        Ok(rows.iter().map(location_from_row).collect())
    }

    pub fn source_locations_for_symbol_in_file(
        &self,
        symbol_id: i64,
        file_id: i64,
    ) -> Result<Vec<SourceLocation>> {
        let rows = self
            .storage
            .source_locations_for_element_in_file(symbol_id, file_id)?;
        Ok(rows.iter().map(location_from_row).collect())
    }

    /// Symbols with at least one occurrence in any of the given files.
    pub fn symbols_in_files(&self, file_ids: &[i64]) -> Result<Vec<Symbol>> {
        let rows = self.storage.symbol_nodes_in_files(file_ids)?;
        Ok(rows.iter().map(symbol_from_row).collect())
    }

    pub fn stats(&self) -> Result<ReaderStats> {
        Ok(ReaderStats {
            symbols: self.storage.all_symbol_nodes()?.len(),
            references: self.storage.all_edges()?.len(),
            files: self.storage.all_files()?.len(),
            database_version: self.storage.loaded_version()?,
        })
    }
}

fn symbol_from_row(row: &SymbolNodeRow) -> Symbol {
    Symbol {
        id: row.id,
        name: NameHierarchy::decode(&row.serialized_name),
        kind: SymbolKind::from_node_kind(row.node_kind),
        definition_kind: DefinitionKind::from_code(row.definition_kind),
        locations: Vec::new(),
    }
}

fn reference_from_codes(id: i64, source_id: i64, target_id: i64, kind: i64) -> Reference {
    Reference {
        id,
        source_id,
        target_id,
        kind: EdgeKind::from_code(kind),
        locations: Vec::new(),
    }
}

fn file_from_row(row: crate::storage::FileRow) -> File {
    File {
        id: row.id,
        path: row.file_path,
        language: row.language.unwrap_or_default(),
        indexed: row.indexed,
        complete: row.complete,
    }
}

fn location_from_row(row: &crate::storage::SourceLocationRow) -> SourceLocation {
    SourceLocation {
        id: row.id,
        file_id: row.file_id,
        start_line: row.start_line,
        start_column: row.start_column,
        end_line: row.end_line,
        end_column: row.end_column,
        kind: LocationKind::from_code(row.kind),
    }
}

/// Escape LIKE special characters so the argument matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn ends_on_boundary(fqn: &str, pattern: &str, delimiter: &str) -> bool {
    fqn.len() > pattern.len()
        && fqn.ends_with(pattern)
        && fqn[..fqn.len() - pattern.len()].ends_with(delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_reader() -> Reader {
        let storage = Storage::open_memory().unwrap();
        storage.setup().unwrap();
        Reader::new(storage)
    }

    fn add_symbol(reader: &Reader, names: &[&str], kind: SymbolKind) -> i64 {
        let serialized = encode_minimal("::", names);
        let id = reader
            .storage()
            .add_node(&serialized, kind.node_kind())
            .unwrap();
        reader
            .storage()
            .add_symbol(id, DefinitionKind::Explicit.code())
            .unwrap();
        id
    }

    #[test]
    fn test_all_symbols_excludes_plain_nodes() {
        let reader = open_reader();
        let sym = add_symbol(&reader, &["App", "Engine"], SymbolKind::Class);
        // A node without a symbol row must never surface.
        reader.storage().add_node("stray", 2).unwrap();

        let symbols = reader.all_symbols().unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].id, sym);
        assert_eq!(symbols[0].fqn(), "App::Engine");
        assert_eq!(symbols[0].kind, SymbolKind::Class);

        let brief = reader.all_symbols_brief().unwrap();
        assert_eq!(brief.len(), 1);
        assert_eq!(brief[0].id, sym);
    }

    #[test]
    fn test_symbol_by_id_distinguishes_node_from_symbol() {
        let reader = open_reader();
        let sym = add_symbol(&reader, &["App", "run"], SymbolKind::Function);
        let plain = reader.storage().add_node("plain", 2).unwrap();

        assert_eq!(reader.symbol_by_id(sym).unwrap().unwrap().fqn(), "App::run");
        assert!(reader.symbol_by_id(plain).unwrap().is_none());
        assert!(reader.symbol_by_id(99_999).unwrap().is_none());
    }

    #[test]
    fn test_qualified_exact_vs_suffix() {
        let reader = open_reader();
        let abc = add_symbol(&reader, &["A", "B", "C"], SymbolKind::Class);
        let xabc = add_symbol(&reader, &["X", "A", "B", "C"], SymbolKind::Class);

        let exact = reader
            .find_symbols_by_qualified_name("A::B::C", true)
            .unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].id, abc);

        let suffix = reader
            .find_symbols_by_qualified_name("A::B::C", false)
            .unwrap();
        let mut ids: Vec<i64> = suffix.iter().map(|s| s.id).collect();
        ids.sort();
        assert_eq!(ids, vec![abc, xabc]);
    }

    #[test]
    fn test_suffix_match_requires_delimiter_boundary() {
        let reader = open_reader();
        add_symbol(&reader, &["XB", "C"], SymbolKind::Class);

        // "XB::C" ends with "B::C" textually but not on a boundary.
        let hits = reader.find_symbols_by_qualified_name("B::C", false).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_exact_name_agrees_with_qualified_lookup() {
        let reader = open_reader();
        add_symbol(&reader, &["Foo", "Bar"], SymbolKind::Class);
        add_symbol(&reader, &["Other", "Bar"], SymbolKind::Class);

        let by_name = reader.find_symbols_by_name("Foo::Bar", true).unwrap();
        let by_qualified = reader
            .find_symbols_by_qualified_name("Foo::Bar", true)
            .unwrap();
        let name_ids: Vec<i64> = by_name.iter().map(|s| s.id).collect();
        let qual_ids: Vec<i64> = by_qualified.iter().map(|s| s.id).collect();
        assert_eq!(name_ids, qual_ids);
        assert_eq!(name_ids.len(), 1);
    }

    #[test]
    fn test_find_by_simple_name() {
        let reader = open_reader();
        let flush = add_symbol(&reader, &["Io", "Writer", "flush"], SymbolKind::Method);
        add_symbol(&reader, &["Io", "Writer", "flush_all"], SymbolKind::Method);

        let exact = reader.find_symbols_by_name("flush", true).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].id, flush);

        let fuzzy = reader.find_symbols_by_name("flush", false).unwrap();
        assert_eq!(fuzzy.len(), 2);
    }

    #[test]
    fn test_find_by_name_ignores_like_wildcards() {
        let reader = open_reader();
        add_symbol(&reader, &["do_work"], SymbolKind::Function);
        add_symbol(&reader, &["doXwork"], SymbolKind::Function);

        let hits = reader.find_symbols_by_name("do_work", true).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fqn(), "do_work");
    }

    #[test]
    fn test_reference_queries() {
        let reader = open_reader();
        let a = add_symbol(&reader, &["a"], SymbolKind::Function);
        let b = add_symbol(&reader, &["b"], SymbolKind::Function);
        let c = add_symbol(&reader, &["C"], SymbolKind::Class);
        reader
            .storage()
            .add_edge(a, b, EdgeKind::Call.code())
            .unwrap();
        reader
            .storage()
            .add_edge(c, b, EdgeKind::Member.code())
            .unwrap();

        assert_eq!(reader.all_references().unwrap().len(), 2);
        assert_eq!(reader.all_edges_brief().unwrap().len(), 2);
        assert_eq!(reader.refs_to(b).unwrap().len(), 2);
        assert_eq!(reader.refs_from(a).unwrap().len(), 1);
        assert_eq!(
            reader
                .refs_from_with_kind(a, EdgeKind::Call)
                .unwrap()
                .len(),
            1
        );
        assert!(reader
            .refs_from_with_kind(a, EdgeKind::Member)
            .unwrap()
            .is_empty());
        assert_eq!(reader.refs_by_kind(EdgeKind::Member).unwrap().len(), 1);
    }

    #[test]
    fn test_files_and_locations() {
        let reader = open_reader();
        let file_node = reader.storage().add_node("file", 1 << 18).unwrap();
        reader
            .storage()
            .add_file(&crate::storage::FileRow {
                id: file_node,
                file_path: "/proj/src/engine.cpp".into(),
                language: Some("cpp".into()),
                indexed: true,
                complete: true,
            })
            .unwrap();

        let sym = add_symbol(&reader, &["Engine", "start"], SymbolKind::Method);
        let loc = reader
            .storage()
            .add_source_location(file_node, 10, 1, 20, 1, LocationKind::Scope.code())
            .unwrap();
        reader.storage().add_occurrence(sym, loc).unwrap();

        let files = reader.all_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].language, "cpp");

        assert!(reader.file_by_id(file_node).unwrap().is_some());
        assert!(reader.file_by_id(12345).unwrap().is_none());

        let by_path = reader.find_files_by_path("engine", false).unwrap();
        assert_eq!(by_path.len(), 1);
        assert!(reader
            .find_files_by_path("engine", true)
            .unwrap()
            .is_empty());

        let locs = reader.source_locations_for_symbol(sym).unwrap();
        assert_eq!(locs.len(), 1);
        assert_eq!(locs[0].kind, LocationKind::Scope);

        let in_file = reader
            .source_locations_for_symbol_in_file(sym, file_node)
            .unwrap();
        assert_eq!(in_file.len(), 1);

        let syms = reader.symbols_in_files(&[file_node]).unwrap();
        assert_eq!(syms.len(), 1);
        assert_eq!(syms[0].id, sym);
    }

    #[test]
    fn test_stats_counts() {
        let reader = open_reader();
        let a = add_symbol(&reader, &["a"], SymbolKind::Function);
        let b = add_symbol(&reader, &["b"], SymbolKind::Function);
        reader
            .storage()
            .add_edge(a, b, EdgeKind::Call.code())
            .unwrap();

        let stats = reader.stats().unwrap();
        assert_eq!(stats.symbols, 2);
        assert_eq!(stats.references, 1);
        assert_eq!(stats.files, 0);
        assert_eq!(stats.database_version, SUPPORTED_VERSION);
    }

    #[test]
    fn test_decodes_legacy_serialized_names() {
        let reader = open_reader();
        let id = reader.storage().add_node("plain_old_name", 1 << 12).unwrap();
        reader
            .storage()
            .add_symbol(id, DefinitionKind::Explicit.code())
            .unwrap();

        let symbols = reader.all_symbols().unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].fqn(), "plain_old_name");

        // The legacy row is still findable through the exact fast path.
        let hits = reader.find_symbols_by_name("plain_old_name", true).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
