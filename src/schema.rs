//! Schema registry
//!
//! A [`Schema`] is the per-type mapping declaration: ordered attribute and
//! element specs, an optional content spec, the type's tag and namespace,
//! the namespaces it registers, and its lifecycle hooks.
//!
//! Schemas are built with `&mut self` declaration calls and then frozen in
//! an [`Arc`]; parsing and serialization only ever read them.
//!
//! ```
//! use xmlmapper::{AttributeSpec, ElementSpec, ScalarType, Schema};
//!
//! let mut address = Schema::new("Address");
//! address
//!     .attribute(AttributeSpec::new("location", ScalarType::String))?
//!     .element(ElementSpec::new("street", ScalarType::String))?
//!     .element(ElementSpec::new("postcode", ScalarType::String))?;
//! assert_eq!(address.tag_name(), Some("address"));
//! # Ok::<(), xmlmapper::Error>(())
//! ```

use crate::documents::ParserConfig;
use crate::error::Result;
use crate::instance::Instance;
use crate::items::{AttributeSpec, Cardinality, ContentSpec, ElementSpec};
use crate::names::{default_tag, validate_tag};
use crate::namespaces::NamespaceRegistry;
use crate::types::{ItemType, ParseFn, SaveFn, Value};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Callback run on every materialized instance
pub type AfterParseFn = Arc<dyn Fn(&mut Instance) + Send + Sync>;

/// Hook adjusting the document engine configuration
pub type ParserConfigFn = Arc<dyn Fn(&mut ParserConfig) + Send + Sync>;

const ANONYMOUS_NAME: &str = "anonymous";

/// Mapping declaration for one type
#[derive(Clone)]
pub struct Schema {
    name: Option<String>,
    tag: Option<String>,
    namespace: Option<String>,
    namespaces: NamespaceRegistry,
    attributes: Vec<AttributeSpec>,
    elements: Vec<ElementSpec>,
    content: Option<ContentSpec>,
    after_parse: Vec<AfterParseFn>,
    parser_config: Option<ParserConfigFn>,
    parsers: IndexMap<String, ParseFn>,
    save_hooks: IndexMap<String, SaveFn>,
    wrappers: IndexMap<String, Arc<Schema>>,
    keep_xml: bool,
}

impl Schema {
    /// Create a schema for a named type.
    ///
    /// The default tag is the last `::` segment of the name, lower-cased.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            tag: default_tag(&name),
            name: Some(name),
            ..Self::anonymous()
        }
    }

    /// Create a schema with no type name and no tag
    pub fn anonymous() -> Self {
        Self {
            name: None,
            tag: None,
            namespace: None,
            namespaces: NamespaceRegistry::new(),
            attributes: Vec::new(),
            elements: Vec::new(),
            content: None,
            after_parse: Vec::new(),
            parser_config: None,
            parsers: IndexMap::new(),
            save_hooks: IndexMap::new(),
            wrappers: IndexMap::new(),
            keep_xml: false,
        }
    }

    /// Derive a schema for a subtype of `parent`.
    ///
    /// Attributes, elements, registered namespaces and wrapper schemas are
    /// copied; later declarations on either schema do not show up on the
    /// other. Named parsers and save hooks are copied too, the way methods
    /// carry over to a subtype. Tag, namespace, content, `keep_xml`,
    /// after-parse callbacks and the parser configuration hook belong to the
    /// declaring type and are not copied.
    pub fn derive_from(parent: &Schema, name: impl Into<String>) -> Self {
        let mut child = Self::new(name);
        child.namespaces = parent.namespaces.clone();
        child.attributes = parent.attributes.clone();
        child.elements = parent.elements.clone();
        child.parsers = parent.parsers.clone();
        child.save_hooks = parent.save_hooks.clone();
        child.wrappers = parent.wrappers.clone();
        child
    }

    /// Type name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Type name, or `"anonymous"`
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS_NAME)
    }

    /// Declare the tag.
    ///
    /// Fails with a syntax error when the tag contains a namespace separator.
    pub fn tag(&mut self, tag: impl Into<String>) -> Result<&mut Self> {
        let tag = tag.into();
        validate_tag(&tag)?;
        self.tag = Some(tag);
        Ok(self)
    }

    /// Declared tag
    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Declare the namespace prefix of the mapped node
    pub fn namespace(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.namespace = Some(prefix.into());
        self
    }

    /// Declared namespace prefix
    pub fn namespace_prefix(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Register a namespace prefix; additive
    pub fn register_namespace(
        &mut self,
        prefix: impl Into<String>,
        uri: impl Into<String>,
    ) -> &mut Self {
        self.namespaces.register(prefix, uri);
        self
    }

    /// Registered namespaces
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Declare an attribute
    pub fn attribute(&mut self, spec: AttributeSpec) -> Result<&mut Self> {
        validate_tag(spec.tag())?;
        self.attributes.push(spec);
        Ok(self)
    }

    /// Declare an element
    pub fn element(&mut self, spec: ElementSpec) -> Result<&mut Self> {
        validate_tag(spec.tag())?;
        self.elements.push(spec);
        Ok(self)
    }

    /// Declare a single nested element
    pub fn has_one(&mut self, spec: ElementSpec) -> Result<&mut Self> {
        self.element(spec.with_cardinality(Cardinality::Single))
    }

    /// Declare a collection element
    pub fn has_many(&mut self, spec: ElementSpec) -> Result<&mut Self> {
        self.element(spec.with_cardinality(Cardinality::Many))
    }

    /// Declare the text content; replaces any earlier content declaration
    pub fn content(&mut self, spec: ContentSpec) -> &mut Self {
        self.content = Some(spec);
        self
    }

    /// Map the node's inner markup, unparsed, to `xml_content`
    pub fn has_xml_content(&mut self) -> &mut Self {
        self.content(ContentSpec::new("xml_content", ItemType::XmlContent))
    }

    /// Keep the matched node's outer and inner markup on every instance
    pub fn keep_xml(&mut self) -> &mut Self {
        self.keep_xml = true;
        self
    }

    /// Whether instances carry their source markup
    pub fn keeps_xml(&self) -> bool {
        self.keep_xml
    }

    /// Group items under a wrapper element that has no type of its own.
    ///
    /// `declare` receives an anonymous schema tagged `tag`; it is mapped as a
    /// single nested element, and its items read and write through the
    /// owning instance (see [`Instance::get`]).
    pub fn wrap<F>(&mut self, tag: &str, declare: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Schema) -> Result<()>,
    {
        let mut wrapper = Schema::anonymous();
        wrapper.tag(tag)?;
        declare(&mut wrapper)?;
        let wrapper = Arc::new(wrapper);
        self.wrappers.insert(tag.to_string(), Arc::clone(&wrapper));
        self.has_one(ElementSpec::new(tag, wrapper))
    }

    /// Wrapper schemas, keyed by the element that holds them
    pub fn wrappers(&self) -> &IndexMap<String, Arc<Schema>> {
        &self.wrappers
    }

    /// Register a callback run on every instance this schema materializes
    pub fn after_parse<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&mut Instance) + Send + Sync + 'static,
    {
        self.after_parse.push(Arc::new(callback));
        self
    }

    /// After-parse callbacks, in registration order
    pub fn after_parse_callbacks(&self) -> &[AfterParseFn] {
        &self.after_parse
    }

    /// Install the hook adjusting the document engine configuration
    pub fn with_parser_config<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut ParserConfig) + Send + Sync + 'static,
    {
        self.parser_config = Some(Arc::new(hook));
        self
    }

    /// Remove the configuration hook, restoring strict parsing
    pub fn clear_parser_config(&mut self) -> &mut Self {
        self.parser_config = None;
        self
    }

    /// Configuration used when this schema parses raw text
    pub fn parser_config(&self) -> ParserConfig {
        let mut config = ParserConfig::strict();
        if let Some(hook) = &self.parser_config {
            hook(&mut config);
        }
        config
    }

    /// Define a named parser method for parser hooks
    pub fn define_parser<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.parsers.insert(name.into(), Arc::new(f));
        self
    }

    /// Look up a named parser method
    pub fn parser(&self, name: &str) -> Option<&ParseFn> {
        self.parsers.get(name)
    }

    /// Define a named on-save method
    pub fn define_save_hook<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.save_hooks.insert(name.into(), Arc::new(f));
        self
    }

    /// Look up a named on-save method
    pub fn save_hook(&self, name: &str) -> Option<&SaveFn> {
        self.save_hooks.get(name)
    }

    /// Declared attributes, in declaration order
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    /// Declared elements, in declaration order
    pub fn elements(&self) -> &[ElementSpec] {
        &self.elements
    }

    /// Declared content
    pub fn content_spec(&self) -> Option<&ContentSpec> {
        self.content.as_ref()
    }

    /// Find an attribute by name
    pub fn find_attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Find an element by name
    pub fn find_element(&self, name: &str) -> Option<&ElementSpec> {
        self.elements.iter().find(|e| e.name() == name)
    }

    /// Freeze the schema for parsing and serialization
    pub fn build(self) -> Arc<Schema> {
        Arc::new(self)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("namespace", &self.namespace)
            .field("namespaces", &self.namespaces)
            .field("attributes", &self.attributes)
            .field("elements", &self.elements)
            .field("content", &self.content)
            .field("after_parse", &self.after_parse.len())
            .field("keep_xml", &self.keep_xml)
            .finish()
    }
}
