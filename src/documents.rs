//! XML document handling
//!
//! This module is the seam to the document engine (`roxmltree`): building a
//! tree from raw text under a [`ParserConfig`], introspecting the root's
//! namespace declarations, and reading node text and raw markup.

use crate::error::{ParseError, Result};
use crate::namespaces::DEFAULT_NAMESPACE_PREFIX;
use roxmltree::{Document, Node, ParsingOptions};

/// Prefix the engine always binds implicitly; never reported as a declaration
const XML_PREFIX: &str = "xml";

/// Configuration handed to the document engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Whether documents carrying a DTD are accepted
    allow_dtd: bool,
    /// Maximum number of nodes the engine may allocate
    nodes_limit: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl ParserConfig {
    /// Create the default (strict) configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Strictest mode: any DTD is rejected as malformed input
    pub fn strict() -> Self {
        Self {
            allow_dtd: false,
            nodes_limit: u32::MAX,
        }
    }

    /// Lenient mode: DTDs and internal entities are accepted
    pub fn lenient() -> Self {
        Self {
            allow_dtd: true,
            nodes_limit: u32::MAX,
        }
    }

    /// Whether DTDs are accepted
    pub fn allow_dtd(&self) -> bool {
        self.allow_dtd
    }

    /// Get the node limit
    pub fn nodes_limit(&self) -> u32 {
        self.nodes_limit
    }

    /// Set whether DTDs are accepted
    pub fn with_allow_dtd(mut self, allow: bool) -> Self {
        self.allow_dtd = allow;
        self
    }

    /// Set the node limit
    pub fn with_nodes_limit(mut self, limit: u32) -> Self {
        self.nodes_limit = limit;
        self
    }

    /// Switch to lenient mode in place
    pub fn set_lenient(&mut self) {
        self.allow_dtd = true;
    }

    /// Set the node limit in place
    pub fn set_nodes_limit(&mut self, limit: u32) {
        self.nodes_limit = limit;
    }
}

/// Parse raw text into a document tree
pub fn parse_document<'input>(
    text: &'input str,
    config: &ParserConfig,
) -> Result<Document<'input>> {
    let options = ParsingOptions {
        allow_dtd: config.allow_dtd,
        nodes_limit: config.nodes_limit,
        ..ParsingOptions::default()
    };

    Document::parse_with_options(text, options).map_err(|e| {
        let pos = e.pos();
        ParseError::new(e.to_string())
            .with_location(format!("{}:{}", pos.row, pos.col))
            .into()
    })
}

/// Namespace declarations made on the root element, as `(prefix, uri)`.
///
/// The default namespace is reported under [`DEFAULT_NAMESPACE_PREFIX`].
pub fn root_namespace_declarations(doc: &Document<'_>) -> Vec<(String, String)> {
    namespaces_in_scope(doc.root_element())
}

/// Namespaces in scope on an element, as `(prefix, uri)`, with the default
/// namespace under [`DEFAULT_NAMESPACE_PREFIX`]
pub fn namespaces_in_scope(node: Node<'_, '_>) -> Vec<(String, String)> {
    node.namespaces()
        .filter(|ns| ns.name() != Some(XML_PREFIX))
        .map(|ns| {
            let prefix = ns.name().unwrap_or(DEFAULT_NAMESPACE_PREFIX);
            (prefix.to_string(), ns.uri().to_string())
        })
        .collect()
}

/// Prefix bound to `uri` on an element; the default namespace is reported
/// as [`DEFAULT_NAMESPACE_PREFIX`]
pub fn prefix_for(node: Node<'_, '_>, uri: &str) -> Option<String> {
    let mut in_scope = node.namespaces().filter(|ns| ns.uri() == uri);
    let first = in_scope.next()?;
    Some(first.name().unwrap_or(DEFAULT_NAMESPACE_PREFIX).to_string())
}

/// Concatenated text of a node and all its descendants
pub fn node_text(node: Node<'_, '_>) -> String {
    if node.is_text() {
        return node.text().unwrap_or_default().to_string();
    }
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Literal markup of a node, exactly as it appears in the source
pub fn outer_xml<'input>(node: Node<'_, 'input>) -> &'input str {
    let input = node.document().input_text();
    input.get(node.range()).unwrap_or_default()
}

/// Literal markup of a node's children, exactly as it appears in the source
pub fn inner_xml<'input>(node: Node<'_, 'input>) -> &'input str {
    let input = node.document().input_text();
    match (node.first_child(), node.last_child()) {
        (Some(first), Some(last)) => input
            .get(first.range().start..last.range().end)
            .unwrap_or_default(),
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_xml() {
        let doc =
            parse_document("<root><child>text</child></root>", &ParserConfig::default()).unwrap();
        let root = doc.root_element();
        assert_eq!(root.tag_name().name(), "root");
        assert_eq!(node_text(root), "text");
    }

    #[test]
    fn test_parse_malformed_reports_location() {
        let err = parse_document("<root><child></root>", &ParserConfig::default()).unwrap_err();
        match err {
            crate::Error::Parse(e) => assert!(e.location.is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_strict_rejects_dtd() {
        let xml = r#"<?xml version="1.0"?><!DOCTYPE note [<!ENTITY w "world">]><note>&w;</note>"#;
        assert!(parse_document(xml, &ParserConfig::strict()).is_err());

        let doc = parse_document(xml, &ParserConfig::lenient()).unwrap();
        assert_eq!(node_text(doc.root_element()), "world");
    }

    #[test]
    fn test_root_namespace_declarations() {
        let xml = r#"<root xmlns="http://example.com" xmlns:p="urn:p"/>"#;
        let doc = parse_document(xml, &ParserConfig::default()).unwrap();
        let mut decls = root_namespace_declarations(&doc);
        decls.sort();
        assert_eq!(
            decls,
            vec![
                ("p".to_string(), "urn:p".to_string()),
                ("xmlns".to_string(), "http://example.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_prefix_lookup() {
        let xml = r#"<root xmlns="urn:default" xmlns:p="urn:p"><p:child/></root>"#;
        let doc = parse_document(xml, &ParserConfig::default()).unwrap();
        let child = doc.root_element().first_element_child().unwrap();
        assert_eq!(prefix_for(child, "urn:p").as_deref(), Some("p"));
        assert_eq!(prefix_for(child, "urn:default").as_deref(), Some("xmlns"));
        assert_eq!(prefix_for(child, "urn:missing"), None);
        assert_eq!(namespaces_in_scope(child).len(), 2);
    }

    #[test]
    fn test_raw_markup_is_not_reformatted() {
        let xml = "<address><street>Milchstrasse</street><housenumber>23</housenumber></address>";
        let doc = parse_document(xml, &ParserConfig::default()).unwrap();
        let root = doc.root_element();
        assert_eq!(outer_xml(root), xml);
        assert_eq!(
            inner_xml(root),
            "<street>Milchstrasse</street><housenumber>23</housenumber>"
        );
    }
}
