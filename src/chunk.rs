//! Per-file chunk extraction.
//!
//! A chunk is one symbol's slice of source text plus its qualified name and
//! outgoing references, bundled per file for downstream embedding pipelines.
//! Spans come from the store as 1-based line/column pairs with inclusive end
//! columns; a column of `0` widens the endpoint to the whole line.

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::graph::SymbolGraph;
use crate::reader::Reader;
use crate::types::{File, LocationKind, SourceLocation};

/// Byte offsets of line starts, with a sentinel at the end of text.
pub fn line_offsets(text: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    for (i, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            offsets.push(i + 1);
        }
    }
    if *offsets.last().unwrap() != text.len() {
        offsets.push(text.len());
    }
    offsets
}

/// Slice the text covered by a 1-based inclusive span.
///
/// `start_column == 0` means the beginning of the start line and
/// `end_column == 0` the end of the end line (including its newline).
/// Out-of-range lines and columns clamp to the text bounds.
pub fn slice_range<'a>(
    text: &'a str,
    offsets: &[usize],
    start_line: i64,
    start_column: i64,
    end_line: i64,
    end_column: i64,
) -> &'a str {
    let len = text.len();
    let line_start = |line: i64| -> usize {
        if line <= 1 {
            return 0;
        }
        offsets.get(line as usize - 1).copied().unwrap_or(len)
    };

    let mut start = line_start(start_line);
    if start_column > 0 {
        start += start_column as usize - 1;
    }
    let mut end = if end_column > 0 {
        line_start(end_line) + end_column as usize
    } else {
        // Whole line: run to the start of the next one.
        offsets.get(end_line.max(0) as usize).copied().unwrap_or(len)
    };

    start = start.min(len);
    end = end.min(len);
    if start > end {
        end = start;
    }
    // Column counts are bytes; widen to character boundaries so multi-byte
    // text never panics the slice.
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    while end < len && !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub fully_qualified_name: String,
    pub name: String,
    pub en_chunk: String,
    pub outgoing_references: Vec<ChunkRef>,
    pub start_line: i64,
    pub start_column: i64,
    pub end_line: i64,
    pub end_column: i64,
    pub code_chunk: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileChunks {
    pub file_path: String,
    pub chunks: Vec<Chunk>,
}

fn pick_location(locations: &[SourceLocation]) -> Option<&SourceLocation> {
    locations
        .iter()
        .find(|l| l.kind == LocationKind::Scope)
        .or_else(|| locations.iter().find(|l| l.kind == LocationKind::Token))
}

/// Build the chunk document for one file.
///
/// Each symbol occurring in the file contributes one chunk, sliced from its
/// scope location (or its token location when no scope exists). Symbols with
/// neither are skipped with a warning.
pub fn chunk_file(
    reader: &Reader,
    graph: &SymbolGraph,
    file: &File,
    text: &str,
) -> Result<FileChunks> {
    let offsets = line_offsets(text);
    let symbols = reader.symbols_in_files(&[file.id])?;

    let mut chunks = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let locations = reader.source_locations_for_symbol_in_file(symbol.id, file.id)?;
        let Some(location) = pick_location(&locations) else {
            warn!(
                symbol = %symbol.fqn(),
                file = %file.path,
                "symbol has no scope or token location; skipping"
            );
            continue;
        };

        let code = slice_range(
            text,
            &offsets,
            location.start_line,
            location.start_column,
            location.end_line,
            location.end_column,
        );
        let outgoing_references = graph
            .outgoing(symbol.id)
            .iter()
            .map(|&(target, kind)| ChunkRef {
                kind: kind.as_str().to_string(),
                id: target,
            })
            .collect();

        chunks.push(Chunk {
            id: symbol.id,
            kind: symbol.kind.as_str().to_string(),
            fully_qualified_name: symbol.name.display_name(),
            name: symbol.name.simple_name().to_string(),
            en_chunk: String::new(),
            outgoing_references,
            start_line: location.start_line,
            start_column: location.start_column,
            end_line: location.end_line,
            end_column: location.end_column,
            code_chunk: code.to_string(),
        });
    }
    chunks.sort_by_key(|c| (c.start_line, c.start_column, c.id));

    Ok(FileChunks {
        file_path: file.path.clone(),
        chunks,
    })
}

// ── Path remapping ──
// Databases carry the absolute paths of the machine that ran the indexer;
// these helpers translate them into paths under a local checkout.

/// Forward slashes only, no trailing separator.
pub fn normalize_path(path: &str) -> String {
    let mut p = path.replace('\\', "/");
    while p.len() > 1 && p.ends_with('/') {
        p.pop();
    }
    p
}

pub fn is_absolute_path(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() > 1 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

pub fn join_path(base: &str, rel: &str) -> String {
    if base.is_empty() {
        return rel.to_string();
    }
    if rel.is_empty() {
        return base.to_string();
    }
    let rel = normalize_path(rel);
    if is_absolute_path(&rel) {
        return rel;
    }
    let mut out = normalize_path(base);
    if !out.ends_with('/') {
        out.push('/');
    }
    out.push_str(&rel);
    out
}

/// Map a database file path (indexed under `indexed_root`) to the equivalent
/// path under `local_root`. Paths outside `indexed_root` pass through
/// normalized but otherwise unchanged.
pub fn map_db_path_to_local(db_path: &str, indexed_root: &str, local_root: &str) -> String {
    let db = normalize_path(db_path);
    let indexed = normalize_path(indexed_root);
    let local = normalize_path(local_root);
    if indexed.is_empty() {
        return db;
    }
    if db == indexed {
        return local;
    }
    let prefix = format!("{indexed}/");
    if let Some(rel) = db.strip_prefix(&prefix) {
        return join_path(&local, rel);
    }
    db
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::encode_minimal;
    use crate::storage::{FileRow, Storage};
    use crate::types::{DefinitionKind, EdgeKind, SymbolKind};

    const TEXT: &str = "aaa\nbbb\nccc\n";

    #[test]
    fn test_slice_exact_columns() {
        let offsets = line_offsets(TEXT);
        assert_eq!(slice_range(TEXT, &offsets, 2, 1, 2, 3), "bbb");
    }

    #[test]
    fn test_slice_whole_line() {
        let offsets = line_offsets(TEXT);
        assert_eq!(slice_range(TEXT, &offsets, 2, 0, 2, 0), "bbb\n");
    }

    #[test]
    fn test_slice_multi_line_to_end() {
        let offsets = line_offsets(TEXT);
        assert_eq!(slice_range(TEXT, &offsets, 1, 1, 3, 0), "aaa\nbbb\nccc\n");
    }

    #[test]
    fn test_slice_clamps_out_of_range() {
        let offsets = line_offsets(TEXT);
        assert_eq!(slice_range(TEXT, &offsets, 3, 1, 99, 0), "ccc\n");
        assert_eq!(slice_range(TEXT, &offsets, 99, 1, 99, 5), "");
        assert_eq!(slice_range(TEXT, &offsets, 1, 1, 1, 500), TEXT);
        // Inverted spans collapse to empty.
        assert_eq!(slice_range(TEXT, &offsets, 2, 3, 2, 1), "");
        assert_eq!(slice_range(TEXT, &offsets, 3, 1, 1, 3), "");
    }

    #[test]
    fn test_line_offsets_without_trailing_newline() {
        let text = "ab\ncd";
        assert_eq!(line_offsets(text), vec![0, 3, 5]);
        let offsets = line_offsets(text);
        assert_eq!(slice_range(text, &offsets, 2, 0, 2, 0), "cd");
    }

    #[test]
    fn test_normalize_and_join() {
        assert_eq!(normalize_path("C:\\work\\proj\\"), "C:/work/proj");
        assert_eq!(normalize_path("/a/b/"), "/a/b");
        assert_eq!(join_path("/a", "b/c"), "/a/b/c");
        assert_eq!(join_path("/a/", "/abs"), "/abs");
        assert_eq!(join_path("", "rel"), "rel");
        assert!(is_absolute_path("/x"));
        assert!(is_absolute_path("Z:/mcb"));
        assert!(!is_absolute_path("src/main.cpp"));
    }

    #[test]
    fn test_map_db_path_to_local() {
        assert_eq!(
            map_db_path_to_local("Z:/mcb/src/a.cpp", "Z:/mcb", "/home/dev/mcb"),
            "/home/dev/mcb/src/a.cpp"
        );
        assert_eq!(map_db_path_to_local("Z:/mcb", "Z:/mcb", "/home/dev/mcb"), "/home/dev/mcb");
        // Outside the indexed root: pass through.
        assert_eq!(
            map_db_path_to_local("Z:/other/a.cpp", "Z:/mcb", "/home/dev/mcb"),
            "Z:/other/a.cpp"
        );
        assert_eq!(map_db_path_to_local("/a/b.cpp", "", "/local"), "/a/b.cpp");
    }

    fn chunk_fixture() -> (Reader, i64) {
        let storage = Storage::open_memory().unwrap();
        storage.setup().unwrap();
        let reader = Reader::new(storage);

        let file_node = reader.storage().add_node("file", 1 << 18).unwrap();
        reader
            .storage()
            .add_file(&FileRow {
                id: file_node,
                file_path: "/proj/src/lib.cpp".into(),
                language: Some("cpp".into()),
                indexed: true,
                complete: true,
            })
            .unwrap();
        (reader, file_node)
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
    fn test_chunk_file_prefers_scope_over_token() {
        let (reader, file_id) = chunk_fixture();
        let text = "void f() {\n  g();\n}\nint x;\n";

        let f = add_symbol(&reader, &["f"], SymbolKind::Function);
        let g = add_symbol(&reader, &["g"], SymbolKind::Function);
        let x = add_symbol(&reader, &["x"], SymbolKind::GlobalVariable);

        // f: token on line 1, scope lines 1-3.
        let token = reader
            .storage()
            .add_source_location(file_id, 1, 6, 1, 6, LocationKind::Token.code())
            .unwrap();
        let scope = reader
            .storage()
            .add_source_location(file_id, 1, 0, 3, 0, LocationKind::Scope.code())
            .unwrap();
        reader.storage().add_occurrence(f, token).unwrap();
        reader.storage().add_occurrence(f, scope).unwrap();

        // x: token only.
        let x_token = reader
            .storage()
            .add_source_location(file_id, 4, 5, 4, 5, LocationKind::Token.code())
            .unwrap();
        reader.storage().add_occurrence(x, x_token).unwrap();

        reader
            .storage()
            .add_edge(f, g, EdgeKind::Call.code())
            .unwrap();

        let file = reader.file_by_id(file_id).unwrap().unwrap();
        let symbols = reader.all_symbols().unwrap();
        let edges = reader.all_edges_brief().unwrap();
        let graph = SymbolGraph::build(symbols, &edges);

        let doc = chunk_file(&reader, &graph, &file, text).unwrap();
        assert_eq!(doc.file_path, "/proj/src/lib.cpp");
        // g has no location in this file and is skipped.
        assert_eq!(doc.chunks.len(), 2);

        let f_chunk = &doc.chunks[0];
        assert_eq!(f_chunk.id, f);
        assert_eq!(f_chunk.kind, "function");
        assert_eq!(f_chunk.code_chunk, "void f() {\n  g();\n}\n");
        assert_eq!(f_chunk.name, "f");
        assert_eq!(f_chunk.fully_qualified_name, "f");
        assert_eq!(f_chunk.en_chunk, "");
        assert_eq!(f_chunk.outgoing_references.len(), 1);
        assert_eq!(f_chunk.outgoing_references[0].id, g);
        assert_eq!(f_chunk.outgoing_references[0].kind, "call");

        let x_chunk = &doc.chunks[1];
        assert_eq!(x_chunk.id, x);
        assert_eq!(x_chunk.code_chunk, "x");
    }

    #[test]
    fn test_chunk_json_shape() {
        let chunk = Chunk {
            id: 7,
            kind: "method".into(),
            fully_qualified_name: "void App::run()".into(),
            name: "run".into(),
            en_chunk: String::new(),
            outgoing_references: vec![ChunkRef {
                kind: "call".into(),
                id: 9,
            }],
            start_line: 1,
            start_column: 0,
            end_line: 3,
            end_column: 0,
            code_chunk: "void run() {}\n".into(),
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["type"], "method");
        assert_eq!(value["en_chunk"], "");
        assert_eq!(value["outgoing_references"][0]["type"], "call");
        assert_eq!(value["outgoing_references"][0]["id"], 9);
    }
}
