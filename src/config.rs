//! Configuration files for the analysis tools.
//!
//! The dependency analyzer reads a simple section-based text format:
//!
//! ```text
//! [test_namespace]
//! UnitTests
//! [start_symbols]
//! kind=METHOD, App::Engine::start
//! kind=*, Renderer
//! Logger
//! [exclude_symbols]
//! Log
//! App::Util::Clock
//! ```
//!
//! Lines starting with `#` or `;` are comments, blank lines are ignored, and
//! `kind=*` (or omitting the prefix entirely) means "any kind". The chunker
//! reads a small JSON config instead.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::traversal::{KindFilter, StartSpec};
use crate::types::SymbolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    TestNamespace,
    StartSymbols,
    ExcludeSymbols,
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub test_namespace: String,
    pub start_symbols: Vec<StartSpec>,
    pub exclude_symbols: HashSet<String>,
}

impl AnalyzerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut section = Section::None;
        let mut test_namespace = String::new();
        let mut start_symbols = Vec::new();
        let mut exclude_symbols = HashSet::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = match name.trim() {
                    "test_namespace" => Section::TestNamespace,
                    "start_symbols" => Section::StartSymbols,
                    "exclude_symbols" => Section::ExcludeSymbols,
                    other => bail!("line {}: unknown section '[{other}]'", index + 1),
                };
                continue;
            }
            match section {
                Section::None => {
                    bail!("line {}: content before any section header", index + 1)
                }
                Section::TestNamespace => {
                    if !test_namespace.is_empty() {
                        bail!("line {}: test_namespace given more than once", index + 1);
                    }
                    test_namespace = line.to_string();
                }
                Section::StartSymbols => {
                    start_symbols.push(parse_start_symbol(line, index + 1)?);
                }
                Section::ExcludeSymbols => {
                    exclude_symbols.insert(line.to_string());
                }
            }
        }

        if test_namespace.is_empty() {
            bail!("config is missing a [test_namespace] entry");
        }
        if start_symbols.is_empty() {
            bail!("config is missing [start_symbols] entries");
        }
        Ok(Self {
            test_namespace,
            start_symbols,
            exclude_symbols,
        })
    }
}

fn parse_start_symbol(line: &str, line_number: usize) -> Result<StartSpec> {
    let (kind, pattern) = match line.strip_prefix("kind=") {
        Some(rest) => {
            let Some((kind_token, pattern)) = rest.split_once(',') else {
                bail!("line {line_number}: expected 'kind=<KIND|*>, <pattern>'");
            };
            let kind_token = kind_token.trim();
            let kind = if kind_token == "*" {
                KindFilter::Any
            } else {
                let parsed: SymbolKind = kind_token
                    .parse()
                    .with_context(|| format!("line {line_number}: bad kind '{kind_token}'"))?;
                KindFilter::Only(parsed)
            };
            (kind, pattern.trim())
        }
        None => (KindFilter::Any, line),
    };
    if pattern.is_empty() {
        bail!("line {line_number}: empty start symbol pattern");
    }
    Ok(StartSpec {
        pattern: pattern.to_string(),
        kind,
    })
}

/// JSON configuration of the code chunker.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkerConfig {
    pub project_name: String,
    #[serde(default)]
    pub project_description: String,
    /// Local checkout root the chunked files live under.
    #[serde(default)]
    pub root_dir: String,
    /// Root path the database was indexed under (often another machine).
    #[serde(default)]
    pub indexed_root: String,
    /// Path prefixes to chunk; empty means every indexed file.
    #[serde(default)]
    pub paths_to_chunk: Vec<String>,
}

impl ChunkerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        if config.project_name.is_empty() {
            bail!("config is missing 'project_name'");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let text = "\
# impact analysis setup
[test_namespace]
UnitTests

[start_symbols]
kind=METHOD, App::Engine::start
kind=*, Renderer
Logger

[exclude_symbols]
Log
; legacy hub
App::Util::Clock
";
        let config = AnalyzerConfig::parse(text).unwrap();
        assert_eq!(config.test_namespace, "UnitTests");
        assert_eq!(config.start_symbols.len(), 3);
        assert_eq!(config.start_symbols[0].pattern, "App::Engine::start");
        assert_eq!(
            config.start_symbols[0].kind,
            KindFilter::Only(SymbolKind::Method)
        );
        assert_eq!(config.start_symbols[1].kind, KindFilter::Any);
        assert_eq!(config.start_symbols[2].pattern, "Logger");
        assert_eq!(config.start_symbols[2].kind, KindFilter::Any);
        assert!(config.exclude_symbols.contains("Log"));
        assert!(config.exclude_symbols.contains("App::Util::Clock"));
        assert_eq!(config.exclude_symbols.len(), 2);
    }

    #[test]
    fn test_kind_is_case_insensitive() {
        let text = "[test_namespace]\nUnitTests\n[start_symbols]\nkind=class, Engine\n";
        let config = AnalyzerConfig::parse(text).unwrap();
        assert_eq!(
            config.start_symbols[0].kind,
            KindFilter::Only(SymbolKind::Class)
        );
    }

    #[test]
    fn test_missing_namespace_is_an_error() {
        let text = "[start_symbols]\nEngine\n";
        assert!(AnalyzerConfig::parse(text).is_err());
    }

    #[test]
    fn test_missing_start_symbols_is_an_error() {
        let text = "[test_namespace]\nUnitTests\n";
        assert!(AnalyzerConfig::parse(text).is_err());
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let text = "[test_namespace]\nUnitTests\n[start_symbols]\nkind=widget, Engine\n";
        let err = AnalyzerConfig::parse(text).unwrap_err();
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn test_content_before_section_is_an_error() {
        let text = "UnitTests\n[test_namespace]\nUnitTests\n";
        assert!(AnalyzerConfig::parse(text).is_err());
    }

    #[test]
    fn test_unknown_section_is_an_error() {
        let text = "[test_namespace]\nUnitTests\n[nonsense]\nx\n";
        assert!(AnalyzerConfig::parse(text).is_err());
    }

    #[test]
    fn test_chunker_config_parses() {
        let json = r#"{
            "project_name": "mcb",
            "root_dir": "/home/dev/mcb",
            "indexed_root": "Z:/mcb",
            "paths_to_chunk": ["src", "include"]
        }"#;
        let config: ChunkerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.project_name, "mcb");
        assert_eq!(config.project_description, "");
        assert_eq!(config.paths_to_chunk, vec!["src", "include"]);
    }
}
