use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Database version this crate understands. Stored in the `meta` table by the
/// indexer; a mismatch makes the store unreadable through this API.
pub const SUPPORTED_VERSION: i64 = 25;

const SQL_INSERT_NODE: &str =
    "INSERT INTO node (serialized_name, node_kind) VALUES (?1, ?2)";

const SQL_INSERT_EDGE: &str =
    "INSERT INTO edge (source_node_id, target_node_id, edge_kind) VALUES (?1, ?2, ?3)";

const SQL_INSERT_TEST_MAPPING: &str =
    "INSERT OR IGNORE INTO tests (implementation_id, test_id) VALUES (?1, ?2)";

const SQL_SELECT_NODE: &str = "SELECT id, serialized_name, node_kind FROM node";

const SQL_SELECT_EDGE: &str =
    "SELECT id, source_node_id, target_node_id, edge_kind FROM edge";

const SQL_SELECT_SYMBOL_NODE: &str =
    "SELECT n.id, n.serialized_name, n.node_kind, s.definition_kind
     FROM node n INNER JOIN symbol s ON s.id = n.id";

const SQL_SELECT_SOURCE_LOCATION: &str =
    "SELECT id, file_id, start_line, start_column, end_line, end_column, kind
     FROM source_location";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT
);

CREATE TABLE IF NOT EXISTS node (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    serialized_name TEXT NOT NULL,
    node_kind INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS symbol (
    id INTEGER PRIMARY KEY,
    definition_kind INTEGER NOT NULL,
    FOREIGN KEY (id) REFERENCES node(id)
);

CREATE TABLE IF NOT EXISTS edge (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_node_id INTEGER NOT NULL,
    target_node_id INTEGER NOT NULL,
    edge_kind INTEGER NOT NULL,
    FOREIGN KEY (source_node_id) REFERENCES node(id),
    FOREIGN KEY (target_node_id) REFERENCES node(id)
);

CREATE TABLE IF NOT EXISTS file (
    id INTEGER PRIMARY KEY,
    file_path TEXT NOT NULL,
    language TEXT,
    indexed INTEGER NOT NULL DEFAULT 1,
    complete INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (id) REFERENCES node(id)
);

CREATE TABLE IF NOT EXISTS filecontent (
    id INTEGER PRIMARY KEY,
    content TEXT,
    FOREIGN KEY (id) REFERENCES file(id)
);

CREATE TABLE IF NOT EXISTS local_symbol (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS source_location (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL,
    start_line INTEGER NOT NULL,
    start_column INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_column INTEGER NOT NULL,
    kind INTEGER NOT NULL,
    FOREIGN KEY (file_id) REFERENCES file(id)
);

CREATE TABLE IF NOT EXISTS occurrence (
    element_id INTEGER NOT NULL,
    source_location_id INTEGER NOT NULL,
    PRIMARY KEY (element_id, source_location_id),
    FOREIGN KEY (source_location_id) REFERENCES source_location(id)
);

CREATE TABLE IF NOT EXISTS error (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message TEXT NOT NULL,
    fatal INTEGER NOT NULL DEFAULT 0,
    indexed INTEGER NOT NULL DEFAULT 1,
    translation_unit TEXT,
    source_location_id INTEGER
);

CREATE TABLE IF NOT EXISTS element_component (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    element_id INTEGER NOT NULL,
    kind INTEGER NOT NULL,
    data TEXT
);

CREATE TABLE IF NOT EXISTS tests (
    implementation_id INTEGER NOT NULL,
    test_id INTEGER NOT NULL,
    UNIQUE (implementation_id, test_id)
);

CREATE INDEX IF NOT EXISTS idx_node_serialized_name ON node(serialized_name);
CREATE INDEX IF NOT EXISTS idx_edge_source ON edge(source_node_id);
CREATE INDEX IF NOT EXISTS idx_edge_target ON edge(target_node_id);
CREATE INDEX IF NOT EXISTS idx_edge_kind ON edge(edge_kind);
CREATE INDEX IF NOT EXISTS idx_source_location_file ON source_location(file_id);
CREATE INDEX IF NOT EXISTS idx_occurrence_element ON occurrence(element_id);
CREATE INDEX IF NOT EXISTS idx_occurrence_location ON occurrence(source_location_id);
"#;

// ── Raw row types ──
// One struct per table, mirroring the stored columns. Enum decoding and name
// parsing happen one layer up, in the reader.

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub id: i64,
    pub serialized_name: String,
    pub node_kind: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolNodeRow {
    pub id: i64,
    pub serialized_name: String,
    pub node_kind: i64,
    pub definition_kind: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolRow {
    pub id: i64,
    pub definition_kind: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRow {
    pub id: i64,
    pub source_node_id: i64,
    pub target_node_id: i64,
    pub edge_kind: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub id: i64,
    pub file_path: String,
    pub language: Option<String>,
    pub indexed: bool,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalSymbolRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceLocationRow {
    pub id: i64,
    pub file_id: i64,
    pub start_line: i64,
    pub start_column: i64,
    pub end_line: i64,
    pub end_column: i64,
    pub kind: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccurrenceRow {
    pub element_id: i64,
    pub source_location_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRow {
    pub id: i64,
    pub message: String,
    pub fatal: bool,
    pub indexed: bool,
    pub translation_unit: Option<String>,
    pub source_location_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementComponentRow {
    pub id: i64,
    pub element_id: i64,
    pub kind: i64,
    pub data: Option<String>,
}

/// Typed gateway over the relational store.
///
/// Every read maps rows into owned values; cursors never leak to callers.
/// Statements go through `prepare_cached`, so each is compiled once per open
/// connection and reused.
pub struct Storage {
    conn: Connection,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Open the database file at the given path.
    ///
    /// Does not create any schema; call [`Storage::setup`] for that.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open database")?;
        conn.execute_batch(
            "PRAGMA foreign_keys=ON;
             PRAGMA synchronous=NORMAL;
             PRAGMA cache_size=-65536;
             PRAGMA temp_store=MEMORY;",
        )
        .context("Failed to set pragmas")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    #[doc(hidden)]
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    // ── Lifecycle ──

    /// Create tables, indices, and the version stamp. Idempotent: running it
    /// against a populated store changes nothing.
    pub fn setup(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to create schema")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('database_version', ?1)",
            params![SUPPORTED_VERSION.to_string()],
        )?;
        Ok(())
    }

    /// Drop all stored data, keeping the schema and version stamp.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM tests;
             DELETE FROM element_component;
             DELETE FROM error;
             DELETE FROM occurrence;
             DELETE FROM source_location;
             DELETE FROM local_symbol;
             DELETE FROM filecontent;
             DELETE FROM file;
             DELETE FROM edge;
             DELETE FROM symbol;
             DELETE FROM node;",
        )?;
        Ok(())
    }

    /// `true` when no nodes have been stored (also when the schema itself is
    /// missing).
    pub fn is_empty(&self) -> Result<bool> {
        if !self.has_table("node")? {
            return Ok(true);
        }
        let any: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM node LIMIT 1", [], |row| row.get(0))
            .optional()?;
        Ok(any.is_none())
    }

    /// Version stamp read from the meta table; `0` when absent.
    pub fn loaded_version(&self) -> Result<i64> {
        if !self.has_table("meta")? {
            return Ok(0);
        }
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'database_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    pub fn is_compatible(&self) -> Result<bool> {
        Ok(self.loaded_version()? == SUPPORTED_VERSION)
    }

    /// Release page cache memory back to the allocator.
    pub fn optimize_memory(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA shrink_memory;")?;
        Ok(())
    }

    // ── Transactions ──
    // Non-nested. Writes outside a transaction commit individually; batch
    // writers bracket with begin/commit.

    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    pub fn commit_transaction(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub fn rollback_transaction(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    // ── Writes ──

    /// Insert a node, returning its id.
    pub fn add_node(&self, serialized_name: &str, node_kind: i64) -> Result<i64> {
        self.conn
            .prepare_cached(SQL_INSERT_NODE)?
            .execute(params![serialized_name, node_kind])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Mark an existing node as a symbol.
    pub fn add_symbol(&self, id: i64, definition_kind: i64) -> Result<()> {
        self.conn
            .prepare_cached("INSERT INTO symbol (id, definition_kind) VALUES (?1, ?2)")?
            .execute(params![id, definition_kind])?;
        Ok(())
    }

    /// Insert an edge, returning its id.
    pub fn add_edge(&self, source: i64, target: i64, edge_kind: i64) -> Result<i64> {
        self.conn
            .prepare_cached(SQL_INSERT_EDGE)?
            .execute(params![source, target, edge_kind])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a file row for an existing node id.
    pub fn add_file(&self, file: &FileRow) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO file (id, file_path, language, indexed, complete)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![
                file.id,
                file.file_path,
                file.language,
                file.indexed,
                file.complete,
            ])?;
        Ok(())
    }

    pub fn add_file_content(&self, file_id: i64, content: &str) -> Result<()> {
        self.conn
            .prepare_cached("INSERT INTO filecontent (id, content) VALUES (?1, ?2)")?
            .execute(params![file_id, content])?;
        Ok(())
    }

    pub fn add_local_symbol(&self, name: &str) -> Result<i64> {
        self.conn
            .prepare_cached("INSERT INTO local_symbol (name) VALUES (?1)")?
            .execute(params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_source_location(
        &self,
        file_id: i64,
        start_line: i64,
        start_column: i64,
        end_line: i64,
        end_column: i64,
        kind: i64,
    ) -> Result<i64> {
        self.conn
            .prepare_cached(
                "INSERT INTO source_location
                 (file_id, start_line, start_column, end_line, end_column, kind)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?
            .execute(params![
                file_id,
                start_line,
                start_column,
                end_line,
                end_column,
                kind
            ])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_occurrence(&self, element_id: i64, source_location_id: i64) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT OR IGNORE INTO occurrence (element_id, source_location_id)
                 VALUES (?1, ?2)",
            )?
            .execute(params![element_id, source_location_id])?;
        Ok(())
    }

    pub fn add_error(
        &self,
        message: &str,
        fatal: bool,
        indexed: bool,
        translation_unit: Option<&str>,
        source_location_id: Option<i64>,
    ) -> Result<i64> {
        self.conn
            .prepare_cached(
                "INSERT INTO error (message, fatal, indexed, translation_unit, source_location_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![
                message,
                fatal,
                indexed,
                translation_unit,
                source_location_id
            ])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_element_component(&self, element_id: i64, kind: i64, data: Option<&str>) -> Result<i64> {
        self.conn
            .prepare_cached(
                "INSERT INTO element_component (element_id, kind, data) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![element_id, kind, data])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record one `(implementation, test)` pair. The table has set semantics:
    /// inserting an existing pair is a no-op.
    pub fn add_test_mapping(&self, implementation_id: i64, test_id: i64) -> Result<()> {
        self.conn
            .prepare_cached(SQL_INSERT_TEST_MAPPING)?
            .execute(params![implementation_id, test_id])?;
        Ok(())
    }

    pub fn set_node_kind(&self, node_id: i64, node_kind: i64) -> Result<()> {
        self.conn
            .prepare_cached("UPDATE node SET node_kind = ?1 WHERE id = ?2")?
            .execute(params![node_kind, node_id])?;
        Ok(())
    }

    pub fn set_file_language(&self, file_id: i64, language: &str) -> Result<()> {
        self.conn
            .prepare_cached("UPDATE file SET language = ?1 WHERE id = ?2")?
            .execute(params![language, file_id])?;
        Ok(())
    }

    pub fn set_project_settings_text(&self, text: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('project_settings', ?1)",
            params![text],
        )?;
        Ok(())
    }

    // ── Bulk reads ──

    pub fn all_nodes(&self) -> Result<Vec<NodeRow>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_NODE)?;
        let rows = stmt
            .query_map([], row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_edges(&self) -> Result<Vec<EdgeRow>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_EDGE)?;
        let rows = stmt
            .query_map([], row_to_edge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_symbols(&self) -> Result<Vec<SymbolRow>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, definition_kind FROM symbol")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SymbolRow {
                    id: row.get(0)?,
                    definition_kind: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_files(&self) -> Result<Vec<FileRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, file_path, language, indexed, complete FROM file",
        )?;
        let rows = stmt
            .query_map([], row_to_file)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_local_symbols(&self) -> Result<Vec<LocalSymbolRow>> {
        let mut stmt = self.conn.prepare_cached("SELECT id, name FROM local_symbol")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LocalSymbolRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_source_locations(&self) -> Result<Vec<SourceLocationRow>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_SOURCE_LOCATION)?;
        let rows = stmt
            .query_map([], row_to_source_location)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_occurrences(&self) -> Result<Vec<OccurrenceRow>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT element_id, source_location_id FROM occurrence")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(OccurrenceRow {
                    element_id: row.get(0)?,
                    source_location_id: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_errors(&self) -> Result<Vec<ErrorRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, message, fatal, indexed, translation_unit, source_location_id FROM error",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ErrorRow {
                    id: row.get(0)?,
                    message: row.get(1)?,
                    fatal: row.get(2)?,
                    indexed: row.get(3)?,
                    translation_unit: row.get(4)?,
                    source_location_id: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Targeted reads ──

    pub fn node_by_id(&self, id: i64) -> Result<Option<NodeRow>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, serialized_name, node_kind FROM node WHERE id = ?1")?;
        let row = stmt.query_row(params![id], row_to_node).optional()?;
        Ok(row)
    }

    pub fn nodes_by_serialized_name(&self, serialized_name: &str) -> Result<Vec<NodeRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, serialized_name, node_kind FROM node WHERE serialized_name = ?1",
        )?;
        let rows = stmt
            .query_map(params![serialized_name], row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `pattern` is a raw SQL LIKE pattern with `\` as the escape character.
    pub fn nodes_by_serialized_name_like(&self, pattern: &str) -> Result<Vec<NodeRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, serialized_name, node_kind FROM node
             WHERE serialized_name LIKE ?1 ESCAPE '\\'",
        )?;
        let rows = stmt
            .query_map(params![pattern], row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Definition kind for a node id, or `None` when the node is not a symbol.
    pub fn definition_kind_for_symbol(&self, id: i64) -> Result<Option<i64>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT definition_kind FROM symbol WHERE id = ?1")?;
        let kind = stmt.query_row(params![id], |row| row.get(0)).optional()?;
        Ok(kind)
    }

    pub fn edges_from(&self, source: i64) -> Result<Vec<EdgeRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, source_node_id, target_node_id, edge_kind FROM edge
             WHERE source_node_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![source], row_to_edge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn edges_to(&self, target: i64) -> Result<Vec<EdgeRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, source_node_id, target_node_id, edge_kind FROM edge
             WHERE target_node_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![target], row_to_edge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn edges_by_kind(&self, edge_kind: i64) -> Result<Vec<EdgeRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, source_node_id, target_node_id, edge_kind FROM edge
             WHERE edge_kind = ?1",
        )?;
        let rows = stmt
            .query_map(params![edge_kind], row_to_edge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn edges_from_of_kinds(&self, source: i64, kinds: &[i64]) -> Result<Vec<EdgeRow>> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        // Kind codes are integers; inline them rather than binding a variable
        // number of parameters.
        let list = kinds
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT id, source_node_id, target_node_id, edge_kind FROM edge
             WHERE source_node_id = ?1 AND edge_kind IN ({list})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![source], row_to_edge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All nodes that join the symbol table, with their definition kinds.
    pub fn all_symbol_nodes(&self) -> Result<Vec<SymbolNodeRow>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_SYMBOL_NODE)?;
        let rows = stmt
            .query_map([], row_to_symbol_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Symbol nodes whose serialized name matches a LIKE pattern.
    pub fn symbol_nodes_by_name_like(&self, pattern: &str) -> Result<Vec<SymbolNodeRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT n.id, n.serialized_name, n.node_kind, s.definition_kind
             FROM node n INNER JOIN symbol s ON s.id = n.id
             WHERE n.serialized_name LIKE ?1 ESCAPE '\\'",
        )?;
        let rows = stmt
            .query_map(params![pattern], row_to_symbol_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Symbol nodes with at least one occurrence in any of the given files.
    pub fn symbol_nodes_in_files(&self, file_ids: &[i64]) -> Result<Vec<SymbolNodeRow>> {
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = file_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT DISTINCT n.id, n.serialized_name, n.node_kind, s.definition_kind
             FROM node n
             INNER JOIN symbol s ON s.id = n.id
             INNER JOIN occurrence o ON o.element_id = n.id
             INNER JOIN source_location l ON l.id = o.source_location_id
             WHERE l.file_id IN ({list})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_symbol_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn source_locations_for_element(&self, element_id: i64) -> Result<Vec<SourceLocationRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT l.id, l.file_id, l.start_line, l.start_column, l.end_line, l.end_column, l.kind
             FROM source_location l
             INNER JOIN occurrence o ON o.source_location_id = l.id
             WHERE o.element_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![element_id], row_to_source_location)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn source_locations_in_file(&self, file_id: i64) -> Result<Vec<SourceLocationRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, file_id, start_line, start_column, end_line, end_column, kind
             FROM source_location WHERE file_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![file_id], row_to_source_location)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn source_locations_for_element_in_file(
        &self,
        element_id: i64,
        file_id: i64,
    ) -> Result<Vec<SourceLocationRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT l.id, l.file_id, l.start_line, l.start_column, l.end_line, l.end_column, l.kind
             FROM source_location l
             INNER JOIN occurrence o ON o.source_location_id = l.id
             WHERE o.element_id = ?1 AND l.file_id = ?2",
        )?;
        let rows = stmt
            .query_map(params![element_id, file_id], row_to_source_location)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn file_by_id(&self, id: i64) -> Result<Option<FileRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, file_path, language, indexed, complete FROM file WHERE id = ?1",
        )?;
        let row = stmt.query_row(params![id], row_to_file).optional()?;
        Ok(row)
    }

    pub fn file_content(&self, file_id: i64) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT content FROM filecontent WHERE id = ?1")?;
        let content = stmt
            .query_row(params![file_id], |row| row.get(0))
            .optional()?;
        Ok(content)
    }

    pub fn test_mappings(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT implementation_id, test_id FROM tests")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn has_table(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

// ── Row Mapping Helpers ──

fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok(NodeRow {
        id: row.get(0)?,
        serialized_name: row.get(1)?,
        node_kind: row.get(2)?,
    })
}

fn row_to_symbol_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolNodeRow> {
    Ok(SymbolNodeRow {
        id: row.get(0)?,
        serialized_name: row.get(1)?,
        node_kind: row.get(2)?,
        definition_kind: row.get(3)?,
    })
}

fn row_to_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<EdgeRow> {
    Ok(EdgeRow {
        id: row.get(0)?,
        source_node_id: row.get(1)?,
        target_node_id: row.get(2)?,
        edge_kind: row.get(3)?,
    })
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        file_path: row.get(1)?,
        language: row.get(2)?,
        indexed: row.get(3)?,
        complete: row.get(4)?,
    })
}

fn row_to_source_location(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceLocationRow> {
    Ok(SourceLocationRow {
        id: row.get(0)?,
        file_id: row.get(1)?,
        start_line: row.get(2)?,
        start_column: row.get(3)?,
        end_line: row.get(4)?,
        end_column: row.get(5)?,
        kind: row.get(6)?,
    })
}
