//! Anonymous schemas
//!
//! [`define`] builds a one-off schema from a block of declarations.
//! [`parse`] goes further and infers the schema from the document itself:
//!
//! - attributes become string attributes
//! - leaf child elements become string elements
//! - repeated child elements become collections
//! - child elements with attributes or children become nested schemas
//! - non-blank text becomes the `content` item
//!
//! Item names are the XML names in snake case (`dataSource` and
//! `data-source` both become `data_source`); tags keep the XML names.

use crate::documents::{parse_document, prefix_for, ParserConfig};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::items::{AttributeSpec, ContentSpec, ElementSpec};
use crate::namespaces::{ItemNamespace, DEFAULT_NAMESPACE_PREFIX};
use crate::parser::{self, ParseOptions, Parsed};
use crate::schema::Schema;
use crate::types::{ItemType, ScalarType};
use indexmap::IndexMap;
use roxmltree::Node;
use std::sync::Arc;

/// Build an anonymous schema tagged `tag`
pub fn define<F>(tag: &str, declare: F) -> Result<Arc<Schema>>
where
    F: FnOnce(&mut Schema) -> Result<()>,
{
    let mut schema = Schema::anonymous();
    schema.tag(tag)?;
    declare(&mut schema)?;
    Ok(schema.build())
}

/// Parse a document into an instance of a schema inferred from it
pub fn parse(xml: &str) -> Result<Instance> {
    let doc = parse_document(xml, &ParserConfig::lenient())?;
    let schema = infer_schema(doc.root_element())?.build();
    match parser::parse(&schema, &doc, &ParseOptions::new().single())? {
        Parsed::One(instance) => Ok(instance),
        _ => Err(Error::Xml(format!(
            "document root <{}> could not be mapped",
            doc.root_element().tag_name().name()
        ))),
    }
}

/// Infer a schema from an element and its subtree
pub fn infer_schema(node: Node<'_, '_>) -> Result<Schema> {
    let mut schema = Schema::anonymous();
    schema.tag(node.tag_name().name())?;

    if let Some(prefix) = node_prefix(node) {
        schema.namespace(prefix);
    }
    for ns in node.namespaces().filter(|ns| ns.name() != Some("xml")) {
        schema.register_namespace(ns.name().unwrap_or(DEFAULT_NAMESPACE_PREFIX), ns.uri());
    }

    for attribute in node.attributes() {
        let mut spec = AttributeSpec::new(underscore(attribute.name()), ScalarType::String)
            .with_tag(attribute.name());
        if let Some(uri) = attribute.namespace() {
            if let Some(prefix) = prefix_for(node, uri) {
                spec = spec.with_namespace(prefix);
            }
        }
        schema.attribute(spec)?;
    }

    let has_text = node
        .children()
        .any(|child| child.is_text() && child.text().is_some_and(|t| !t.trim().is_empty()));
    if has_text {
        schema.content(ContentSpec::new("content", ScalarType::String));
    }

    let mut elements: IndexMap<String, ElementSpec> = IndexMap::new();
    for child in node.children().filter(|n| n.is_element()) {
        let name = underscore(child.tag_name().name());
        if let Some(existing) = elements.get_mut(&name) {
            *existing = existing.clone().many();
            continue;
        }

        let is_complex =
            child.children().any(|c| c.is_element()) || child.attributes().next().is_some();
        let item_type: ItemType = if is_complex {
            Arc::new(infer_schema(child)?).into()
        } else {
            ScalarType::String.into()
        };
        let namespace = match node_prefix(child) {
            Some(prefix) => ItemNamespace::Prefixed(prefix),
            None => ItemNamespace::Unqualified,
        };
        let spec = ElementSpec::new(name.clone(), item_type)
            .with_tag(child.tag_name().name())
            .with_namespace(namespace);
        elements.insert(name, spec);
    }
    for spec in elements.into_values() {
        schema.element(spec)?;
    }

    Ok(schema)
}

fn node_prefix(node: Node<'_, '_>) -> Option<String> {
    let uri = node.tag_name().namespace()?;
    prefix_for(node, uri)
}

/// `dataSource` and `data-source` become `data_source`
fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    for c in name.chars() {
        if c == '-' || c == '.' {
            out.push('_');
            previous_lower = false;
        } else if c.is_uppercase() {
            if previous_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            previous_lower = false;
        } else {
            out.push(c);
            previous_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_underscore() {
        assert_eq!(underscore("dataSource"), "data_source");
        assert_eq!(underscore("data-source"), "data_source");
        assert_eq!(underscore("title"), "title");
    }

    #[test]
    fn test_define() {
        let schema = define("mywraptag", |s| {
            s.element(ElementSpec::new("description", ScalarType::String))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(schema.tag_name(), Some("mywraptag"));
        assert!(schema.name().is_none());
        assert!(define("bad:tag", |_| Ok(())).is_err());
    }

    #[test]
    fn test_infer_and_parse() {
        let xml = r#"<post id="1"><title>Hello</title><tag>a</tag><tag>b</tag><author name="Jo"><email>jo@example.com</email></author></post>"#;
        let post = parse(xml).unwrap();

        assert_eq!(post.get("id"), Some(&Value::from("1")));
        assert_eq!(post.get("title"), Some(&Value::from("Hello")));
        assert_eq!(
            post.get("tag").and_then(Value::as_list).map(|l| l.len()),
            Some(2)
        );
        let author = post.get("author").and_then(Value::as_object).unwrap();
        assert_eq!(author.get("name"), Some(&Value::from("Jo")));
        assert_eq!(author.get("email"), Some(&Value::from("jo@example.com")));
    }

    #[test]
    fn test_infer_default_namespace_and_content() {
        let xml = r#"<feed xmlns="urn:feed"><entry lang="en">Text</entry></feed>"#;
        let feed = parse(xml).unwrap();
        let entry = feed.get("entry").and_then(Value::as_object).unwrap();
        assert_eq!(entry.get("lang"), Some(&Value::from("en")));
        assert_eq!(entry.get("content"), Some(&Value::from("Text")));
    }
}
