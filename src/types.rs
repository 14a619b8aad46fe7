use serde::Serialize;

use crate::name::NameHierarchy;

/// Kind of an indexed symbol.
///
/// Stored as a node-kind bitmask in the database; [`SymbolKind::from_node_kind`]
/// maps any stored value onto this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Type,
    BuiltinType,
    Module,
    Namespace,
    Package,
    Struct,
    Class,
    Interface,
    Annotation,
    GlobalVariable,
    Field,
    Function,
    Method,
    Enum,
    EnumConstant,
    Typedef,
    TypeParameter,
    Macro,
    Union,
}

impl SymbolKind {
    /// Bitmask code as the indexer writes it into `node.node_kind`.
    pub fn node_kind(&self) -> i64 {
        match self {
            Self::Type => 1 << 1,
            Self::BuiltinType => 1 << 2,
            Self::Module => 1 << 3,
            Self::Namespace => 1 << 4,
            Self::Package => 1 << 5,
            Self::Struct => 1 << 6,
            Self::Class => 1 << 7,
            Self::Interface => 1 << 8,
            Self::Annotation => 1 << 9,
            Self::GlobalVariable => 1 << 10,
            Self::Field => 1 << 11,
            Self::Function => 1 << 12,
            Self::Method => 1 << 13,
            Self::Enum => 1 << 14,
            Self::EnumConstant => 1 << 15,
            Self::Typedef => 1 << 16,
            Self::TypeParameter => 1 << 17,
            Self::Macro => 1 << 19,
            Self::Union => 1 << 20,
        }
    }

    /// Total mapping from a stored node-kind value.
    ///
    /// Unknown bit patterns (including the file bit, which never joins the
    /// symbol table) map to `Type`.
    pub fn from_node_kind(code: i64) -> Self {
        match code {
            c if c == 1 << 1 => Self::Type,
            c if c == 1 << 2 => Self::BuiltinType,
            c if c == 1 << 3 => Self::Module,
            c if c == 1 << 4 => Self::Namespace,
            c if c == 1 << 5 => Self::Package,
            c if c == 1 << 6 => Self::Struct,
            c if c == 1 << 7 => Self::Class,
            c if c == 1 << 8 => Self::Interface,
            c if c == 1 << 9 => Self::Annotation,
            c if c == 1 << 10 => Self::GlobalVariable,
            c if c == 1 << 11 => Self::Field,
            c if c == 1 << 12 => Self::Function,
            c if c == 1 << 13 => Self::Method,
            c if c == 1 << 14 => Self::Enum,
            c if c == 1 << 15 => Self::EnumConstant,
            c if c == 1 << 16 => Self::Typedef,
            c if c == 1 << 17 => Self::TypeParameter,
            c if c == 1 << 19 => Self::Macro,
            c if c == 1 << 20 => Self::Union,
            _ => Self::Type,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::BuiltinType => "builtin_type",
            Self::Module => "module",
            Self::Namespace => "namespace",
            Self::Package => "package",
            Self::Struct => "struct",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Annotation => "annotation",
            Self::GlobalVariable => "global_variable",
            Self::Field => "field",
            Self::Function => "function",
            Self::Method => "method",
            Self::Enum => "enum",
            Self::EnumConstant => "enum_constant",
            Self::Typedef => "typedef",
            Self::TypeParameter => "type_parameter",
            Self::Macro => "macro",
            Self::Union => "union",
        }
    }
}

impl std::str::FromStr for SymbolKind {
    type Err = anyhow::Error;

    /// Case-insensitive; accepts the identifiers used in analyzer config files.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "type" => Ok(Self::Type),
            "builtin_type" => Ok(Self::BuiltinType),
            "module" => Ok(Self::Module),
            "namespace" => Ok(Self::Namespace),
            "package" => Ok(Self::Package),
            "struct" => Ok(Self::Struct),
            "class" => Ok(Self::Class),
            "interface" => Ok(Self::Interface),
            "annotation" => Ok(Self::Annotation),
            "global_variable" => Ok(Self::GlobalVariable),
            "field" => Ok(Self::Field),
            "function" => Ok(Self::Function),
            "method" => Ok(Self::Method),
            "enum" => Ok(Self::Enum),
            "enum_constant" => Ok(Self::EnumConstant),
            "typedef" => Ok(Self::Typedef),
            "type_parameter" => Ok(Self::TypeParameter),
            "macro" => Ok(Self::Macro),
            "union" => Ok(Self::Union),
            _ => Err(anyhow::anyhow!("unknown symbol kind: '{s}'")),
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a symbol was defined in indexed source or only implied by usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Implicit,
    Explicit,
}

impl DefinitionKind {
    pub fn code(&self) -> i64 {
        match self {
            Self::Implicit => 1,
            Self::Explicit => 2,
        }
    }

    /// Unknown codes fall back to `Explicit`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Implicit,
            _ => Self::Explicit,
        }
    }
}

/// Semantic category of a directed reference between symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Member,
    TypeUsage,
    Usage,
    Call,
    Inheritance,
    Override,
    TypeArgument,
    TemplateSpecialization,
    Include,
    Import,
    MacroUsage,
    AnnotationUsage,
}

impl EdgeKind {
    pub fn code(&self) -> i64 {
        match self {
            Self::Member => 1 << 0,
            Self::TypeUsage => 1 << 1,
            Self::Usage => 1 << 2,
            Self::Call => 1 << 3,
            Self::Inheritance => 1 << 4,
            Self::Override => 1 << 5,
            Self::TypeArgument => 1 << 6,
            Self::TemplateSpecialization => 1 << 7,
            Self::Include => 1 << 8,
            Self::Import => 1 << 9,
            Self::MacroUsage => 1 << 10,
            Self::AnnotationUsage => 1 << 11,
        }
    }

    /// Unknown codes fall back to `Usage`.
    pub fn from_code(code: i64) -> Self {
        match code {
            c if c == 1 << 0 => Self::Member,
            c if c == 1 << 1 => Self::TypeUsage,
            c if c == 1 << 2 => Self::Usage,
            c if c == 1 << 3 => Self::Call,
            c if c == 1 << 4 => Self::Inheritance,
            c if c == 1 << 5 => Self::Override,
            c if c == 1 << 6 => Self::TypeArgument,
            c if c == 1 << 7 => Self::TemplateSpecialization,
            c if c == 1 << 8 => Self::Include,
            c if c == 1 << 9 => Self::Import,
            c if c == 1 << 10 => Self::MacroUsage,
            c if c == 1 << 11 => Self::AnnotationUsage,
            _ => Self::Usage,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::TypeUsage => "type_usage",
            Self::Usage => "usage",
            Self::Call => "call",
            Self::Inheritance => "inheritance",
            Self::Override => "override",
            Self::TypeArgument => "type_argument",
            Self::TemplateSpecialization => "template_specialization",
            Self::Include => "include",
            Self::Import => "import",
            Self::MacroUsage => "macro_usage",
            Self::AnnotationUsage => "annotation_usage",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a source location marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// Covers just the defining identifier.
    Token,
    /// Encloses the entire definition body.
    Scope,
    Qualifier,
    LocalSymbol,
    Signature,
    Comment,
    Error,
    FulltextSearch,
    ScreenSearch,
    Unsolved,
}

impl LocationKind {
    pub fn code(&self) -> i64 {
        match self {
            Self::Token => 0,
            Self::Scope => 1,
            Self::Qualifier => 2,
            Self::LocalSymbol => 3,
            Self::Signature => 4,
            Self::Comment => 5,
            Self::Error => 6,
            Self::FulltextSearch => 7,
            Self::ScreenSearch => 8,
            Self::Unsolved => 9,
        }
    }

    /// Unknown codes fall back to `Token`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Scope,
            2 => Self::Qualifier,
            3 => Self::LocalSymbol,
            4 => Self::Signature,
            5 => Self::Comment,
            6 => Self::Error,
            7 => Self::FulltextSearch,
            8 => Self::ScreenSearch,
            9 => Self::Unsolved,
            _ => Self::Token,
        }
    }
}

/// A positional span in a source file. Lines and columns are 1-based with an
/// inclusive end column; a column of `0` means "whole line" at that endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub id: i64,
    pub file_id: i64,
    pub start_line: i64,
    pub start_column: i64,
    pub end_line: i64,
    pub end_column: i64,
    pub kind: LocationKind,
}

/// An indexed symbol with its decoded qualified name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    pub id: i64,
    pub name: NameHierarchy,
    pub kind: SymbolKind,
    pub definition_kind: DefinitionKind,
    pub locations: Vec<SourceLocation>,
}

impl Symbol {
    pub fn fqn(&self) -> String {
        self.name.fqn()
    }
}

/// A directed typed edge between two symbols.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub kind: EdgeKind,
    pub locations: Vec<SourceLocation>,
}

/// An indexed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct File {
    pub id: i64,
    pub path: String,
    pub language: String,
    pub indexed: bool,
    pub complete: bool,
}

/// Compact symbol view for bulk graph loads: ids and kinds only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SymbolBrief {
    pub id: i64,
    pub kind: SymbolKind,
    pub definition_kind: DefinitionKind,
}

/// Compact edge view for building adjacency in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeBrief {
    pub source_id: i64,
    pub target_id: i64,
    pub kind: EdgeKind,
}
