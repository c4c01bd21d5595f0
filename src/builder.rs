//! XML output builder
//!
//! Nested mapped objects all write into one [`XmlBuilder`], so they compose
//! into a single document. Opening an element returns an [`ElementScope`]
//! that closes the element when dropped, on every exit path.

use crate::error::{Error, Result};
use crate::namespaces::DEFAULT_NAMESPACE_PREFIX;
use indexmap::IndexMap;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::ops::{Deref, DerefMut};

const XML_DECLARATION: &str = "<?xml version=\"1.0\"?>\n";

#[derive(Debug, Clone)]
enum Child {
    Element(usize),
    Text(String),
}

#[derive(Debug, Clone)]
struct BuiltElement {
    name: String,
    prefix: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<Child>,
}

impl BuiltElement {
    fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }
}

/// Document builder
#[derive(Debug, Default)]
pub struct XmlBuilder {
    elements: Vec<BuiltElement>,
    open: Vec<usize>,
    root: Option<usize>,
    /// Root declarations; `None` is the default namespace
    root_namespaces: IndexMap<Option<String>, String>,
}

impl XmlBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an element under the currently open one (or as the root)
    pub fn open_element(&mut self, name: impl Into<String>) -> ElementScope<'_> {
        let index = self.elements.len();
        self.elements.push(BuiltElement {
            name: name.into(),
            prefix: None,
            attributes: Vec::new(),
            children: Vec::new(),
        });

        match self.open.last() {
            Some(&parent) => self.elements[parent].children.push(Child::Element(index)),
            None => {
                if self.root.is_none() {
                    self.root = Some(index);
                }
            }
        }
        self.open.push(index);
        ElementScope { builder: self }
    }

    /// Depth of currently open elements
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Set attributes on the currently open element
    pub fn set_attributes<I, K, V>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if let Some(&current) = self.open.last() {
            self.elements[current]
                .attributes
                .extend(attributes.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
    }

    /// Append text to the currently open element
    pub fn write_text(&mut self, text: impl Into<String>) {
        if let Some(&current) = self.open.last() {
            let text = text.into();
            if !text.is_empty() {
                self.elements[current].children.push(Child::Text(text));
            }
        }
    }

    /// Put the currently open element in the namespace declared on the
    /// root under `prefix`.
    ///
    /// A prefix that is not declared on the root, or `None`, leaves the
    /// element unqualified. [`DEFAULT_NAMESPACE_PREFIX`] selects the
    /// default namespace, which is written without a prefix.
    pub fn set_namespace(&mut self, prefix: Option<&str>) {
        let Some(&current) = self.open.last() else {
            return;
        };
        self.elements[current].prefix = match prefix {
            Some(DEFAULT_NAMESPACE_PREFIX) | None => None,
            Some(p) if self.root_namespaces.contains_key(&Some(p.to_string())) => {
                Some(p.to_string())
            }
            Some(p) => {
                tracing::debug!(
                    prefix = p,
                    "namespace not declared on root; element left unqualified"
                );
                None
            }
        };
    }

    /// Declare a namespace on the root element.
    ///
    /// Each prefix is declared once; later declarations of the same prefix
    /// are ignored. [`DEFAULT_NAMESPACE_PREFIX`] declares the default
    /// namespace.
    pub fn add_root_namespace_declaration(&mut self, prefix: &str, uri: impl Into<String>) {
        let key = if prefix == DEFAULT_NAMESPACE_PREFIX {
            None
        } else {
            Some(prefix.to_string())
        };
        self.root_namespaces.entry(key).or_insert_with(|| uri.into());
    }

    /// Whether a prefix is declared on the root
    pub fn has_root_namespace(&self, prefix: &str) -> bool {
        let key = if prefix == DEFAULT_NAMESPACE_PREFIX {
            None
        } else {
            Some(prefix.to_string())
        };
        self.root_namespaces.contains_key(&key)
    }

    /// Serialize the built document
    pub fn serialize_to_text(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        if let Some(root) = self.root {
            self.write_element(&mut writer, root, true)?;
        }

        let body = String::from_utf8(writer.into_inner())
            .map_err(|e| Error::Xml(format!("output is not valid UTF-8: {}", e)))?;
        let mut out = String::with_capacity(XML_DECLARATION.len() + body.len() + 1);
        out.push_str(XML_DECLARATION);
        out.push_str(&body);
        out.push('\n');
        Ok(out)
    }

    fn write_element(
        &self,
        writer: &mut Writer<Vec<u8>>,
        index: usize,
        is_root: bool,
    ) -> Result<()> {
        let element = &self.elements[index];
        let name = element.qualified_name();
        let mut start = BytesStart::new(name.as_str());

        if is_root {
            for (prefix, uri) in &self.root_namespaces {
                let key = match prefix {
                    Some(prefix) => format!("xmlns:{}", prefix),
                    None => "xmlns".to_string(),
                };
                start.push_attribute((key.as_str(), uri.as_str()));
            }
        }
        for (key, value) in &element.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if element.children.is_empty() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        for child in &element.children {
            match child {
                Child::Element(child) => self.write_element(writer, *child, false)?,
                Child::Text(text) => write_event(writer, Event::Text(BytesText::new(text)))?,
            }
        }
        write_event(writer, Event::End(BytesEnd::new(name.as_str())))
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Xml(format!("failed to write event: {}", e)))
}

/// Handle on an open element; the element is closed when the handle drops.
#[derive(Debug)]
pub struct ElementScope<'b> {
    builder: &'b mut XmlBuilder,
}

impl Deref for ElementScope<'_> {
    type Target = XmlBuilder;

    fn deref(&self) -> &XmlBuilder {
        self.builder
    }
}

impl DerefMut for ElementScope<'_> {
    fn deref_mut(&mut self) -> &mut XmlBuilder {
        self.builder
    }
}

impl Drop for ElementScope<'_> {
    fn drop(&mut self) {
        self.builder.open.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root() {
        let mut builder = XmlBuilder::new();
        builder.open_element("meal");
        assert_eq!(
            builder.serialize_to_text().unwrap(),
            "<?xml version=\"1.0\"?>\n<meal/>\n"
        );
    }

    #[test]
    fn test_attributes_and_text_are_escaped() {
        let mut builder = XmlBuilder::new();
        {
            let mut meal = builder.open_element("meal");
            meal.set_attributes([("type", "fish & chips")]);
            meal.write_text("1 < 2");
        }
        let xml = builder.serialize_to_text().unwrap();
        assert!(xml.contains(r#"<meal type="fish &amp; chips">1 &lt; 2</meal>"#));
    }

    #[test]
    fn test_scopes_close_on_drop() {
        let mut builder = XmlBuilder::new();
        {
            let mut root = builder.open_element("root");
            {
                let mut child = root.open_element("child");
                child.write_text("a");
                assert_eq!(child.depth(), 2);
            }
            assert_eq!(root.depth(), 1);
            root.open_element("sibling");
        }
        assert_eq!(builder.depth(), 0);

        let xml = builder.serialize_to_text().unwrap();
        assert!(xml.contains("<child>a</child>"));
        assert!(xml.contains("<sibling/>"));
    }

    #[test]
    fn test_scope_closes_on_early_error_return() {
        fn fails(builder: &mut XmlBuilder) -> Result<()> {
            let _scope = builder.open_element("broken");
            Err(Error::Xml("boom".to_string()))
        }

        let mut builder = XmlBuilder::new();
        let mut root = builder.open_element("root");
        assert!(fails(&mut root).is_err());
        assert_eq!(root.depth(), 1);
    }

    #[test]
    fn test_namespaces() {
        let mut builder = XmlBuilder::new();
        {
            let mut root = builder.open_element("address");
            root.add_root_namespace_declaration("prefix", "http://www.unicornland.com/prefix");
            root.add_root_namespace_declaration("prefix", "urn:ignored");
            root.set_namespace(Some("prefix"));
            let mut city = root.open_element("city");
            city.set_namespace(Some("undeclared"));
        }
        let xml = builder.serialize_to_text().unwrap();
        assert!(xml.contains(r#"<prefix:address xmlns:prefix="http://www.unicornland.com/prefix">"#));
        assert!(xml.contains("<city/>"));
        assert!(!xml.contains("urn:ignored"));
    }

    #[test]
    fn test_default_namespace_is_unprefixed() {
        let mut builder = XmlBuilder::new();
        {
            let mut root = builder.open_element("address");
            root.add_root_namespace_declaration(DEFAULT_NAMESPACE_PREFIX, "urn:default");
            root.set_namespace(Some(DEFAULT_NAMESPACE_PREFIX));
        }
        assert!(builder.has_root_namespace(DEFAULT_NAMESPACE_PREFIX));
        let xml = builder.serialize_to_text().unwrap();
        assert!(xml.contains(r#"<address xmlns="urn:default"/>"#));
    }
}
