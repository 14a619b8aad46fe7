//! Serialized-name codec for qualified name hierarchies.
//!
//! The indexer stores every qualified name as a single string column so that
//! substring (`LIKE`) queries on element names stay cheap. The format keeps
//! the delimiter up front and separates elements with two-byte control
//! markers that never occur in ordinary identifiers:
//!
//! ```text
//! <delimiter> \tm <name> \ts <prefix> \tp <postfix> ( \tn <name> \ts ... )*
//! ```
//!
//! Decoding is fail-soft: legacy rows without markers come back as a
//! single-element hierarchy instead of an error.

use serde::Serialize;

/// End of the delimiter, start of the first element.
const META: &str = "\tm";
/// End of an element, start of the next one.
const NAME: &str = "\tn";
/// End of the element name, start of its prefix.
const PART: &str = "\ts";
/// End of the prefix, start of the postfix.
const SIGNATURE: &str = "\tp";

/// Delimiter used for hierarchies that could not be decoded.
const FALLBACK_DELIMITER: &str = "::";

/// One component of a qualified name.
///
/// `prefix` typically holds a return type and `postfix` a call signature;
/// both are empty for anything that is not a function or method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameElement {
    pub name: String,
    pub prefix: String,
    pub postfix: String,
}

impl NameElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            postfix: String::new(),
        }
    }

    pub fn with_signature(
        name: impl Into<String>,
        prefix: impl Into<String>,
        postfix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            postfix: postfix.into(),
        }
    }
}

/// An ordered qualified name, e.g. `my_app::io::Writer::flush`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameHierarchy {
    pub delimiter: String,
    pub elements: Vec<NameElement>,
}

impl NameHierarchy {
    pub fn new(delimiter: impl Into<String>, elements: Vec<NameElement>) -> Self {
        Self {
            delimiter: delimiter.into(),
            elements,
        }
    }

    /// Fully qualified name: element names joined on the delimiter.
    pub fn fqn(&self) -> String {
        let names: Vec<&str> = self.elements.iter().map(|e| e.name.as_str()).collect();
        names.join(&self.delimiter)
    }

    /// FQN of the enclosing scope (all elements but the last), or `None` for
    /// a top-level name.
    pub fn parent_fqn(&self) -> Option<String> {
        if self.elements.len() < 2 {
            return None;
        }
        let names: Vec<&str> = self.elements[..self.elements.len() - 1]
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        Some(names.join(&self.delimiter))
    }

    /// Bare name of the last element.
    pub fn simple_name(&self) -> &str {
        self.elements.last().map(|e| e.name.as_str()).unwrap_or("")
    }

    /// Presentation form: the FQN with the last element's prefix prepended
    /// (space-separated when non-empty) and its postfix appended.
    pub fn display_name(&self) -> String {
        let fqn = self.fqn();
        match self.elements.last() {
            Some(last) => {
                let mut out = String::new();
                if !last.prefix.is_empty() {
                    out.push_str(&last.prefix);
                    out.push(' ');
                }
                out.push_str(&fqn);
                out.push_str(&last.postfix);
                out
            }
            None => fqn,
        }
    }

    /// Serialize to the on-disk string form.
    ///
    /// Element text is taken verbatim; inputs are assumed not to contain the
    /// control markers.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.delimiter.len() + self.elements.len() * 16);
        out.push_str(&self.delimiter);
        out.push_str(META);
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                out.push_str(NAME);
            }
            out.push_str(&element.name);
            out.push_str(PART);
            out.push_str(&element.prefix);
            out.push_str(SIGNATURE);
            out.push_str(&element.postfix);
        }
        out
    }

    /// Parse the on-disk string form.
    ///
    /// Rows written before the marker format (or corrupted rows) lack the
    /// META marker; those decode to a single-element hierarchy carrying the
    /// whole input as the name. A missing inner marker terminates the element
    /// loop at the last complete element.
    pub fn decode(serialized: &str) -> Self {
        let Some(meta) = serialized.find(META) else {
            return Self::fallback(serialized);
        };
        let delimiter = &serialized[..meta];
        let mut rest = &serialized[meta + META.len()..];

        let mut elements = Vec::new();
        loop {
            let Some(part) = rest.find(PART) else {
                break;
            };
            let name = &rest[..part];
            rest = &rest[part + PART.len()..];

            let Some(sig) = rest.find(SIGNATURE) else {
                break;
            };
            let prefix = &rest[..sig];
            rest = &rest[sig + SIGNATURE.len()..];

            match rest.find(NAME) {
                Some(next) => {
                    elements.push(NameElement::with_signature(name, prefix, &rest[..next]));
                    rest = &rest[next + NAME.len()..];
                }
                None => {
                    elements.push(NameElement::with_signature(name, prefix, rest));
                    break;
                }
            }
        }

        if elements.is_empty() {
            return Self::fallback(serialized);
        }
        Self::new(delimiter, elements)
    }

    fn fallback(serialized: &str) -> Self {
        Self::new(FALLBACK_DELIMITER, vec![NameElement::new(serialized)])
    }
}

/// Serialized form of a hierarchy with empty prefixes and postfixes.
///
/// Names split from a plain qualified string encode this way, which makes
/// exact index lookups possible without knowing signatures.
pub fn encode_minimal(delimiter: &str, names: &[&str]) -> String {
    let elements = names
        .iter()
        .map(|n| NameElement::new(*n))
        .collect::<Vec<_>>();
    NameHierarchy::new(delimiter, elements).encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_method_hierarchy() {
        let h = NameHierarchy::new(
            "::",
            vec![
                NameElement::new("N"),
                NameElement::new("C"),
                NameElement::with_signature("m", "void", "() const"),
            ],
        );
        let expected = "::\tmN\ts\tp\tnC\ts\tp\tnm\tsvoid\tp() const";
        assert_eq!(h.encode(), expected);
    }

    #[test]
    fn test_roundtrip() {
        let h = NameHierarchy::new(
            "::",
            vec![
                NameElement::new("N"),
                NameElement::new("C"),
                NameElement::with_signature("m", "void", "() const"),
            ],
        );
        assert_eq!(NameHierarchy::decode(&h.encode()), h);
    }

    #[test]
    fn test_roundtrip_dot_delimiter() {
        let h = NameHierarchy::new(
            ".",
            vec![
                NameElement::new("com"),
                NameElement::new("app"),
                NameElement::with_signature("Service", "", ""),
            ],
        );
        assert_eq!(NameHierarchy::decode(&h.encode()), h);
    }

    #[test]
    fn test_roundtrip_single_element() {
        let h = NameHierarchy::new("::", vec![NameElement::new("main")]);
        assert_eq!(NameHierarchy::decode(&h.encode()), h);
    }

    #[test]
    fn test_decode_without_meta_falls_back() {
        let decoded = NameHierarchy::decode("::some random text");
        assert_eq!(decoded.delimiter, "::");
        assert_eq!(decoded.elements.len(), 1);
        assert_eq!(decoded.elements[0].name, "::some random text");
        assert_eq!(decoded.elements[0].prefix, "");
        assert_eq!(decoded.elements[0].postfix, "");
    }

    #[test]
    fn test_decode_missing_inner_marker_keeps_complete_elements() {
        // Second element lacks its PART marker; only the first survives.
        let input = "::\tmFoo\ts\tp\tnBar";
        let decoded = NameHierarchy::decode(input);
        assert_eq!(decoded.elements.len(), 1);
        assert_eq!(decoded.elements[0].name, "Foo");
    }

    #[test]
    fn test_decode_meta_with_no_elements_falls_back() {
        let input = "::\tm";
        let decoded = NameHierarchy::decode(input);
        assert_eq!(decoded.elements.len(), 1);
        assert_eq!(decoded.elements[0].name, input);
    }

    #[test]
    fn test_fqn_and_display_name() {
        let h = NameHierarchy::new(
            "::",
            vec![
                NameElement::new("N"),
                NameElement::new("C"),
                NameElement::with_signature("m", "void", "() const"),
            ],
        );
        assert_eq!(h.fqn(), "N::C::m");
        assert_eq!(h.display_name(), "void N::C::m() const");
        assert_eq!(h.parent_fqn().as_deref(), Some("N::C"));
        assert_eq!(h.simple_name(), "m");
    }

    #[test]
    fn test_display_name_without_signature() {
        let h = NameHierarchy::new("::", vec![NameElement::new("N"), NameElement::new("C")]);
        assert_eq!(h.display_name(), "N::C");
    }

    #[test]
    fn test_encode_minimal_matches_plain_encode() {
        let minimal = encode_minimal("::", &["A", "B", "C"]);
        let h = NameHierarchy::new(
            "::",
            vec![
                NameElement::new("A"),
                NameElement::new("B"),
                NameElement::new("C"),
            ],
        );
        assert_eq!(minimal, h.encode());
        assert_eq!(NameHierarchy::decode(&minimal).fqn(), "A::B::C");
    }
}
