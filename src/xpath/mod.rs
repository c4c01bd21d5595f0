//! XPath Support
//!
//! This module evaluates the location paths the mapper builds (and the
//! paths users supply through `xpath` options) against a document tree.
//!
//! ## Limitations
//!
//! This is a location-path subset, which is what mapping needs:
//! - absolute and relative paths, `.`, `..`, `//`
//! - name tests with optional prefix, `*`, `text()`, `node()`, `@name`, `@*`
//! - predicates `[n]`, `[@name]`, `[@name='value']`
//!
//! Functions, operators and other axes are rejected with [`Error::XPath`].

mod selectors;

pub use selectors::{
    is_ncname, is_ncname_char, split_path, LocationPath, PathStep, PathStepKind, Predicate,
};

use crate::documents::node_text;
use crate::error::{Error, Result};
use crate::namespaces::NamespaceBindings;
use roxmltree::Node;

/// One item selected by a path: a tree node or an attribute of an element
#[derive(Debug, Clone)]
pub enum XPathMatch<'a, 'input> {
    /// An element, text or document node
    Node(Node<'a, 'input>),
    /// An attribute of `owner`
    Attribute {
        /// Element carrying the attribute
        owner: Node<'a, 'input>,
        /// Local name of the attribute
        name: String,
        /// Attribute value
        value: String,
    },
}

impl<'a, 'input> XPathMatch<'a, 'input> {
    /// The node, when the match is a tree node
    pub fn node(&self) -> Option<Node<'a, 'input>> {
        match self {
            XPathMatch::Node(node) => Some(*node),
            XPathMatch::Attribute { .. } => None,
        }
    }

    /// String value of the match
    pub fn text(&self) -> String {
        match self {
            XPathMatch::Node(node) => node_text(*node),
            XPathMatch::Attribute { value, .. } => value.clone(),
        }
    }
}

/// Evaluate an XPath expression with `context` as the context node.
///
/// Matches are returned in document order without duplicates. A name test
/// using a prefix that is not bound matches nothing.
pub fn evaluate_xpath<'a, 'input>(
    context: Node<'a, 'input>,
    expression: &str,
    bindings: &NamespaceBindings,
) -> Result<Vec<XPathMatch<'a, 'input>>> {
    let path = LocationPath::compile(expression)?;
    evaluate_path(context, &path, bindings)
}

/// Whether `node` is an element passing the name test of `step`
pub fn matches_step(node: Node<'_, '_>, step: &PathStep, bindings: &NamespaceBindings) -> bool {
    node.is_element()
        && NameTest::new(step, bindings)
            .is_some_and(|test| test.matches(node.tag_name().namespace(), node.tag_name().name()))
}

/// Evaluate a compiled path
pub fn evaluate_path<'a, 'input>(
    context: Node<'a, 'input>,
    path: &LocationPath,
    bindings: &NamespaceBindings,
) -> Result<Vec<XPathMatch<'a, 'input>>> {
    let start = if path.absolute {
        context.document().root()
    } else {
        context
    };
    let mut current = vec![start];

    for step in path.steps() {
        if step.kind == PathStepKind::Attribute {
            return Ok(select_attributes(&current, step, bindings));
        }

        let mut next = Vec::new();
        for node in &current {
            let selected = select_nodes(*node, step, bindings)?;
            next.extend(apply_predicates(selected, &step.predicates, bindings));
        }
        current = in_document_order(next);
    }

    Ok(current.into_iter().map(XPathMatch::Node).collect())
}

fn select_nodes<'a, 'input>(
    node: Node<'a, 'input>,
    step: &PathStep,
    bindings: &NamespaceBindings,
) -> Result<Vec<Node<'a, 'input>>> {
    let selected = match step.kind {
        PathStepKind::Self_ => vec![node],
        PathStepKind::Parent => node.parent().into_iter().collect(),
        PathStepKind::DescendantOrSelf => node.descendants().collect(),
        PathStepKind::Text => node.children().filter(|n| n.is_text()).collect(),
        PathStepKind::AnyNode => node.children().collect(),
        PathStepKind::Child => {
            let test = match NameTest::new(step, bindings) {
                Some(test) => test,
                None => return Ok(Vec::new()),
            };
            node.children()
                .filter(|n| n.is_element())
                .filter(|n| test.matches(n.tag_name().namespace(), n.tag_name().name()))
                .collect()
        }
        PathStepKind::Attribute => {
            return Err(Error::XPath("attribute step outside final position".to_string()))
        }
    };
    Ok(selected)
}

fn select_attributes<'a, 'input>(
    nodes: &[Node<'a, 'input>],
    step: &PathStep,
    bindings: &NamespaceBindings,
) -> Vec<XPathMatch<'a, 'input>> {
    let Some(test) = NameTest::new(step, bindings) else {
        return Vec::new();
    };
    let mut matches = Vec::new();
    for node in nodes.iter().filter(|n| n.is_element()) {
        let selected: Vec<_> = node
            .attributes()
            .filter(|a| test.matches(a.namespace(), a.name()))
            .collect();
        for (index, attr) in selected.iter().enumerate() {
            let keep = step.predicates.iter().all(|p| match p {
                Predicate::Position(pos) => index + 1 == *pos,
                _ => false,
            });
            if keep {
                matches.push(XPathMatch::Attribute {
                    owner: *node,
                    name: attr.name().to_string(),
                    value: attr.value().to_string(),
                });
            }
        }
    }
    matches
}

fn apply_predicates<'a, 'input>(
    mut nodes: Vec<Node<'a, 'input>>,
    predicates: &[Predicate],
    bindings: &NamespaceBindings,
) -> Vec<Node<'a, 'input>> {
    for predicate in predicates {
        nodes = match predicate {
            Predicate::Position(pos) => nodes.into_iter().nth(pos - 1).into_iter().collect(),
            Predicate::HasAttribute(name) => nodes
                .into_iter()
                .filter(|n| attribute_value(*n, name, bindings).is_some())
                .collect(),
            Predicate::AttributeEquals(name, value) => nodes
                .into_iter()
                .filter(|n| attribute_value(*n, name, bindings) == Some(value.as_str()))
                .collect(),
        };
    }
    nodes
}

fn attribute_value<'a>(
    node: Node<'a, '_>,
    qname: &str,
    bindings: &NamespaceBindings,
) -> Option<&'a str> {
    match crate::names::split_qname(qname) {
        (Some(prefix), local) => {
            let uri = bindings.resolve(prefix)?;
            node.attribute((uri, local))
        }
        (None, local) => node.attribute(local),
    }
}

fn in_document_order<'a, 'input>(mut nodes: Vec<Node<'a, 'input>>) -> Vec<Node<'a, 'input>> {
    nodes.sort_by_key(|n| (n.range().start, std::cmp::Reverse(n.range().end)));
    nodes.dedup();
    nodes
}

/// Resolved name test of a step
struct NameTest<'s> {
    namespace: Option<&'s str>,
    local: &'s str,
    any_namespace: bool,
}

impl<'s> NameTest<'s> {
    /// `None` when the step's prefix is not bound
    fn new(step: &'s PathStep, bindings: &'s NamespaceBindings) -> Option<Self> {
        match &step.prefix {
            Some(prefix) => match bindings.resolve(prefix) {
                Some(uri) => Some(Self {
                    namespace: Some(uri),
                    local: &step.name,
                    any_namespace: false,
                }),
                None => {
                    tracing::debug!(
                        prefix = %prefix,
                        "namespace prefix not bound; step matches nothing"
                    );
                    None
                }
            },
            None => Some(Self {
                namespace: None,
                local: &step.name,
                any_namespace: step.is_wildcard(),
            }),
        }
    }

    fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        let name_ok = self.local == "*" || self.local == local;
        let namespace_ok = self.any_namespace || self.namespace == namespace;
        name_ok && namespace_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{parse_document, ParserConfig};

    const BOOK: &str = r#"<book xmlns="urn:loc.gov:books" xmlns:isbn="urn:ISBN:0-395-36341-6">
  <title>Cheaper by the Dozen</title>
  <isbn:number>1568491379</isbn:number>
  <note lang="en">one</note>
  <note lang="fr">deux</note>
</book>"#;

    fn bindings() -> NamespaceBindings {
        let mut b = NamespaceBindings::new();
        b.bind("bk", "urn:loc.gov:books");
        b.bind("isbn", "urn:ISBN:0-395-36341-6");
        b
    }

    #[test]
    fn test_prefixed_child_steps() {
        let doc = parse_document(BOOK, &ParserConfig::default()).unwrap();
        let root = doc.root_element();

        let titles = evaluate_xpath(root, "./bk:title", &bindings()).unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].text(), "Cheaper by the Dozen");

        let numbers = evaluate_xpath(root, "isbn:number", &bindings()).unwrap();
        assert_eq!(numbers[0].text(), "1568491379");
    }

    #[test]
    fn test_unprefixed_does_not_match_namespaced_elements() {
        let doc = parse_document(BOOK, &ParserConfig::default()).unwrap();
        let matches = evaluate_xpath(doc.root_element(), "./title", &bindings()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_unbound_prefix_matches_nothing() {
        let doc = parse_document(BOOK, &ParserConfig::default()).unwrap();
        let matches = evaluate_xpath(doc.root_element(), "./video:Video", &bindings()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_matches_step_checks_the_node_itself() {
        let doc = parse_document(BOOK, &ParserConfig::default()).unwrap();
        let title = doc.root_element().first_element_child().unwrap();

        let qualified = PathStep::child("title").with_prefix("bk");
        assert!(matches_step(title, &qualified, &bindings()));
        assert!(!matches_step(title, &PathStep::child("title"), &bindings()));
        assert!(!matches_step(title, &PathStep::child("note").with_prefix("bk"), &bindings()));
        assert!(!matches_step(title, &PathStep::child("title").with_prefix("video"), &bindings()));
    }

    #[test]
    fn test_absolute_and_descendant_paths() {
        let xml = "<a><b><c>1</c></b><c>2</c></a>";
        let doc = parse_document(xml, &ParserConfig::default()).unwrap();
        let b = doc.root_element().first_element_child().unwrap();
        let b_bindings = NamespaceBindings::new();

        let all: Vec<_> = evaluate_xpath(b, "//c", &b_bindings)
            .unwrap()
            .iter()
            .map(|m| m.text())
            .collect();
        assert_eq!(all, vec!["1", "2"]);

        let within: Vec<_> = evaluate_xpath(b, ".//c", &b_bindings)
            .unwrap()
            .iter()
            .map(|m| m.text())
            .collect();
        assert_eq!(within, vec!["1"]);

        let root = evaluate_xpath(b, "/a", &b_bindings).unwrap();
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn test_predicates_and_attributes() {
        let doc = parse_document(BOOK, &ParserConfig::default()).unwrap();
        let root = doc.root_element();

        let fr = evaluate_xpath(root, "bk:note[@lang='fr']", &bindings()).unwrap();
        assert_eq!(fr[0].text(), "deux");

        let second = evaluate_xpath(root, "bk:note[2]/@lang", &bindings()).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].text(), "fr");
        assert!(second[0].node().is_none());
    }

    #[test]
    fn test_text_nodes() {
        let xml = "<feature>This is <b>feature</b> text</feature>";
        let doc = parse_document(xml, &ParserConfig::default()).unwrap();
        let texts =
            evaluate_xpath(doc.root_element(), ".//text()", &NamespaceBindings::new()).unwrap();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0].text(), "This is ");
    }
}
