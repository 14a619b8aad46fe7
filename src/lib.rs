//! Query and test-impact analysis over a code-knowledge database.
//!
//! The database is a SQLite file produced by a source-code indexer: nodes
//! and typed edges describing symbols and the references between them, plus
//! files and positional source locations. This crate reads that store
//! through a typed API, materializes the symbol graph in memory, and runs
//! the analyses behind the `test_indexer`, `dependency_analyzer`, and
//! `code_chunker` tools.

pub mod chunk;
pub mod config;
pub mod graph;
pub mod name;
pub mod reader;
pub mod storage;
pub mod traversal;
pub mod types;

pub use graph::SymbolGraph;
pub use name::{NameElement, NameHierarchy};
pub use reader::Reader;
pub use storage::{Storage, SUPPORTED_VERSION};
pub use types::{
    DefinitionKind, EdgeBrief, EdgeKind, File, LocationKind, Reference, SourceLocation, Symbol,
    SymbolBrief, SymbolKind,
};
