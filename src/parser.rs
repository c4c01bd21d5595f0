//! Parsing XML into instances
//!
//! A parse run resolves its root, matches candidate nodes, splits on
//! cardinality, then materializes each node: attributes (with defaults),
//! content, and elements (recursing into nested schemas). After-parse
//! callbacks run once per materialized instance.
//!
//! ```
//! use xmlmapper::{ElementSpec, Parsed, ScalarType, Schema};
//!
//! let mut address = Schema::new("Address");
//! address.element(ElementSpec::new("street", ScalarType::String))?;
//! let address = address.build();
//!
//! let parsed = address.parse("<address><street>Milchstrasse</street></address>")?;
//! let instance = parsed.into_one().unwrap();
//! assert_eq!(instance.get("street").and_then(|v| v.as_str()), Some("Milchstrasse"));
//! # Ok::<(), xmlmapper::Error>(())
//! ```

use crate::coercion::{coerce_attribute_value, Coercer};
use crate::documents::{
    inner_xml, namespaces_in_scope, node_text, outer_xml, parse_document,
    root_namespace_declarations,
};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::items::{ElementSpec, ItemSpec};
use crate::limits::Limits;
use crate::names::accessor_name;
use crate::namespaces::{NamespaceBindings, DEFAULT_NAMESPACE_PREFIX};
use crate::registry::Registry;
use crate::resolver::{
    resolve_attribute_path, resolve_nested, resolve_path, resolve_root, ResolutionContext,
};
use crate::schema::Schema;
use crate::types::{Annotated, ItemType, Value};
use crate::xpath::{evaluate_xpath, matches_step, PathStep, XPathMatch};
use indexmap::IndexMap;
use roxmltree::{Document, Node};
use std::sync::Arc;

/// Where the XML comes from
#[derive(Debug, Clone, Copy)]
pub enum Source<'a, 'input> {
    /// Raw text, parsed under the schema's parser configuration
    Text(&'a str),
    /// An already-parsed document
    Document(&'a Document<'input>),
    /// A node within an already-parsed document
    Node(Node<'a, 'input>),
}

impl<'a, 'input> From<&'a str> for Source<'a, 'input> {
    fn from(text: &'a str) -> Self {
        Source::Text(text)
    }
}

impl<'a, 'input> From<&'a String> for Source<'a, 'input> {
    fn from(text: &'a String) -> Self {
        Source::Text(text)
    }
}

impl<'a, 'input> From<&'a Document<'input>> for Source<'a, 'input> {
    fn from(doc: &'a Document<'input>) -> Self {
        Source::Document(doc)
    }
}

impl<'a, 'input> From<Node<'a, 'input>> for Source<'a, 'input> {
    fn from(node: Node<'a, 'input>) -> Self {
        Source::Node(node)
    }
}

/// Options of one parse call
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    single: bool,
    in_groups_of: Option<usize>,
    xpath: Option<String>,
    namespace: Option<String>,
    registry: Option<Arc<Registry>>,
    limits: Limits,
}

impl ParseOptions {
    /// Create default options: a collection result, no batching
    pub fn new() -> Self {
        Self::default()
    }

    /// Request one instance, or [`Parsed::Absent`]
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Deliver matches in groups of `size`; ignored for single requests.
    ///
    /// A size of 0 makes the parse fail with [`Error::Value`].
    pub fn in_groups_of(mut self, size: usize) -> Self {
        self.in_groups_of = Some(size);
        self
    }

    /// Base path the schema's tag step is appended to
    pub fn with_xpath(mut self, xpath: impl Into<String>) -> Self {
        self.xpath = Some(xpath.into());
        self
    }

    /// Force the namespace prefix of the top-level nodes
    pub fn with_namespace(mut self, prefix: impl Into<String>) -> Self {
        self.namespace = Some(prefix.into());
        self
    }

    /// Registry for schemas referenced by name
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Whether one instance is requested
    pub fn is_single(&self) -> bool {
        self.single
    }

    /// Requested group size
    pub fn group_size(&self) -> Option<usize> {
        self.in_groups_of
    }

    /// Limits in force
    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

/// Result of a parse
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// A single request matched nothing
    Absent,
    /// The instance of a single request
    One(Instance),
    /// Every match of a collection request, possibly none
    Many(Vec<Instance>),
}

impl Parsed {
    /// Whether this is the absent result
    pub fn is_absent(&self) -> bool {
        matches!(self, Parsed::Absent)
    }

    /// The instance of a single request
    pub fn one(&self) -> Option<&Instance> {
        match self {
            Parsed::One(instance) => Some(instance),
            _ => None,
        }
    }

    /// Take the instance of a single request
    pub fn into_one(self) -> Option<Instance> {
        match self {
            Parsed::One(instance) => Some(instance),
            _ => None,
        }
    }

    /// Instances as a slice; a single instance is a slice of one
    pub fn many(&self) -> &[Instance] {
        match self {
            Parsed::Absent => &[],
            Parsed::One(instance) => std::slice::from_ref(instance),
            Parsed::Many(instances) => instances,
        }
    }

    /// Take the instances; a single instance becomes a vector of one
    pub fn into_many(self) -> Vec<Instance> {
        match self {
            Parsed::Absent => Vec::new(),
            Parsed::One(instance) => vec![instance],
            Parsed::Many(instances) => instances,
        }
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.many().len()
    }

    /// Whether there are no instances
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Top-level nodes of a run, and the context they are materialized under
struct Selection<'a, 'input> {
    nodes: Vec<Node<'a, 'input>>,
    single: bool,
    ctx: ResolutionContext,
}

enum Outcome {
    Single(Option<Instance>),
    Delivered(usize),
}

/// Parse `source` against `schema`
pub fn parse<'a, 'input>(
    schema: &Arc<Schema>,
    source: impl Into<Source<'a, 'input>>,
    options: &ParseOptions,
) -> Result<Parsed>
where
    'input: 'a,
{
    let mut collected = Vec::new();
    let outcome = run(schema, source.into(), options, |group| {
        collected.extend(group);
        Ok(())
    })?;
    Ok(match outcome {
        Outcome::Single(Some(instance)) => Parsed::One(instance),
        Outcome::Single(None) => Parsed::Absent,
        Outcome::Delivered(_) => Parsed::Many(collected),
    })
}

/// Parse `source`, handing instances to `sink` group by group.
///
/// Each group is fully materialized and delivered before the next one is
/// built. A single request delivers at most one group of one. Returns the
/// number of instances delivered.
pub fn parse_in_groups<'a, 'input, F>(
    schema: &Arc<Schema>,
    source: impl Into<Source<'a, 'input>>,
    options: &ParseOptions,
    mut sink: F,
) -> Result<usize>
where
    'input: 'a,
    F: FnMut(Vec<Instance>) -> Result<()>,
{
    match run(schema, source.into(), options, &mut sink)? {
        Outcome::Single(Some(instance)) => {
            sink(vec![instance])?;
            Ok(1)
        }
        Outcome::Single(None) => Ok(0),
        Outcome::Delivered(total) => Ok(total),
    }
}

/// Refresh `instance` in place from the first matching node of `source`.
///
/// Nested mapped children are left as they are. Returns `false` when
/// nothing matched.
pub fn parse_update<'a, 'input>(
    instance: &mut Instance,
    source: impl Into<Source<'a, 'input>>,
    options: &ParseOptions,
) -> Result<bool>
where
    'input: 'a,
{
    let schema = Arc::clone(instance.schema());
    let options = options.clone().single();
    with_root(&schema, source.into(), &options, |node, at_document| {
        let selection = select(&schema, node, at_document, &options)?;
        let Some(first) = selection.nodes.first().copied() else {
            tracing::debug!(schema = schema.display_name(), "update source has no matching node");
            return Ok(false);
        };
        fill(&schema, first, &selection.ctx, instance, true)?;
        finish(&schema, first, instance);
        Ok(true)
    })
}

fn run<F>(
    schema: &Arc<Schema>,
    source: Source<'_, '_>,
    options: &ParseOptions,
    mut sink: F,
) -> Result<Outcome>
where
    F: FnMut(Vec<Instance>) -> Result<()>,
{
    with_root(schema, source, options, |node, at_document| {
        let selection = select(schema, node, at_document, options)?;
        tracing::debug!(
            schema = schema.display_name(),
            matches = selection.nodes.len(),
            single = selection.single,
            "resolved root"
        );

        if selection.single {
            let instance = match selection.nodes.first() {
                Some(node) => Some(build(schema, *node, &selection.ctx)?),
                None => None,
            };
            return Ok(Outcome::Single(instance));
        }

        let size = match options.in_groups_of {
            Some(0) => return Err(Error::Value("group size must be at least 1".to_string())),
            Some(size) => size,
            None => selection.nodes.len(),
        };
        if selection.nodes.is_empty() {
            return Ok(Outcome::Delivered(0));
        }

        let mut total = 0;
        for chunk in selection.nodes.chunks(size) {
            let group = chunk
                .iter()
                .map(|node| build(schema, *node, &selection.ctx))
                .collect::<Result<Vec<_>>>()?;
            total += group.len();
            sink(group)?;
        }
        Ok(Outcome::Delivered(total))
    })
}

/// Hand the context node of `source` to `f`, parsing raw text first.
///
/// The flag tells whether the node is a document's root element.
fn with_root<R, F>(
    schema: &Schema,
    source: Source<'_, '_>,
    options: &ParseOptions,
    f: F,
) -> Result<R>
where
    F: for<'a, 'input> FnOnce(Node<'a, 'input>, bool) -> Result<R>,
{
    match source {
        Source::Text(text) => {
            options.limits.check_xml_size(text.len())?;
            let config = schema.parser_config();
            let nodes_limit = config.nodes_limit().min(options.limits.max_nodes);
            let config = config.with_nodes_limit(nodes_limit);
            let doc = parse_document(text, &config)?;
            f(doc.root_element(), true)
        }
        Source::Document(doc) => f(doc.root_element(), true),
        Source::Node(node) if node.is_root() => f(node.document().root_element(), true),
        Source::Node(node) => f(node, false),
    }
}

fn select<'a, 'input>(
    schema: &Arc<Schema>,
    node: Node<'a, 'input>,
    at_document: bool,
    options: &ParseOptions,
) -> Result<Selection<'a, 'input>> {
    let declarations = if at_document {
        root_namespace_declarations(node.document())
    } else {
        namespaces_in_scope(node)
    };
    let mut bindings = NamespaceBindings::new();
    for (prefix, uri) in declarations {
        bindings.bind(prefix, uri);
    }
    bindings.bind_all(schema.namespaces());

    let namespace = options
        .namespace
        .clone()
        .or_else(|| schema.namespace_prefix().map(str::to_string))
        .or_else(|| {
            bindings
                .default_namespace()
                .map(|_| DEFAULT_NAMESPACE_PREFIX.to_string())
        });

    let at_root = at_document
        && schema
            .tag_name()
            .is_some_and(|tag| node.tag_name().name() == tag);

    // A node handed in directly is its own sole candidate when it carries the tag
    let is_candidate = !at_document
        && options.xpath.is_none()
        && schema.tag_name().is_some_and(|tag| {
            let mut step = PathStep::child(tag);
            if let Some(prefix) = namespace.as_deref() {
                step = step.with_prefix(prefix);
            }
            matches_step(node, &step, &bindings)
        });

    let ctx = ResolutionContext::new()
        .with_ambient(namespace.clone())
        .with_bindings(bindings)
        .with_registry(options.registry.clone())
        .with_limits(options.limits.clone());

    let nodes = match (schema.tag_name(), &options.xpath) {
        _ if is_candidate => vec![node],
        (Some(tag), xpath) => {
            let xpath = resolve_root(tag, namespace.as_deref(), xpath.as_deref(), at_root);
            element_matches(evaluate_xpath(node, &xpath, ctx.bindings())?)
        }
        (None, Some(xpath)) => element_matches(evaluate_xpath(node, xpath, ctx.bindings())?),
        (None, None) => vec![node],
    };

    Ok(Selection {
        nodes,
        single: options.single || at_root || is_candidate,
        ctx,
    })
}

fn element_matches<'a, 'input>(matches: Vec<XPathMatch<'a, 'input>>) -> Vec<Node<'a, 'input>> {
    matches
        .into_iter()
        .filter_map(|m| m.node())
        .filter(|n| n.is_element())
        .collect()
}

fn build(schema: &Arc<Schema>, node: Node<'_, '_>, ctx: &ResolutionContext) -> Result<Instance> {
    let mut instance = Instance::new(schema);
    fill(schema, node, ctx, &mut instance, false)?;
    finish(schema, node, &mut instance);
    Ok(instance)
}

fn finish(schema: &Schema, node: Node<'_, '_>, instance: &mut Instance) {
    if schema.keeps_xml() {
        instance.set_source_markup(outer_xml(node), inner_xml(node));
    }
    for callback in schema.after_parse_callbacks() {
        callback(instance);
    }
}

fn assign(instance: &mut Instance, name: &str, value: Option<Value>) {
    match value {
        Some(value) => {
            instance.set_field(name, value);
        }
        None => {
            instance.clear(name);
        }
    }
}

/// Read every declared item of `schema` from `node` into `instance`.
///
/// In update mode nested-schema elements are skipped.
fn fill(
    schema: &Arc<Schema>,
    node: Node<'_, '_>,
    ctx: &ResolutionContext,
    instance: &mut Instance,
    update: bool,
) -> Result<()> {
    for attr in schema.attributes() {
        let value = read_attribute(schema, attr, node, ctx)?;
        let value = value.or_else(|| attr.default_value().cloned());
        assign(instance, attr.name(), value);
    }

    if let Some(content) = schema.content_spec() {
        let value = read_content(schema, content, node)?;
        assign(instance, content.name(), value);
    }

    for element in schema.elements() {
        let nested = match element.item_type() {
            ItemType::Schema(reference) => Some(ctx.resolve_schema(reference, schema)?),
            _ => None,
        };
        let coercer = Coercer::for_item(element, schema, nested)?;
        let value = match &coercer {
            Coercer::Schema(_) if update => {
                tracing::trace!(item = element.name(), "nested element kept during update");
                continue;
            }
            Coercer::Schema(child) => read_nested(element, child, node, ctx)?,
            _ => read_element(element, &coercer, node, ctx)?,
        };
        assign(instance, element.name(), value);
    }
    Ok(())
}

fn read_attribute(
    schema: &Schema,
    attr: &ItemSpec,
    node: Node<'_, '_>,
    ctx: &ResolutionContext,
) -> Result<Option<Value>> {
    let path = resolve_attribute_path(attr);
    let matches = evaluate_xpath(node, &path.xpath, ctx.bindings())?;
    let Some(first) = matches.first() else {
        return Ok(None);
    };
    Coercer::for_item(attr, schema, None)?.coerce(&first.text(), attr.name())
}

fn read_content(schema: &Schema, content: &ItemSpec, node: Node<'_, '_>) -> Result<Option<Value>> {
    let coercer = Coercer::for_item(content, schema, None)?;
    match coercer {
        Coercer::XmlContent => Ok(Some(Value::String(inner_xml(node).to_string()))),
        _ if content.options().raw && content.options().parser.is_none() => {
            Ok(Some(Value::String(outer_xml(node).to_string())))
        }
        _ if content.options().raw => coercer.coerce(outer_xml(node), content.name()),
        _ => coercer.coerce(&node_text(node), content.name()),
    }
}

fn read_element(
    element: &ElementSpec,
    coercer: &Coercer,
    node: Node<'_, '_>,
    ctx: &ResolutionContext,
) -> Result<Option<Value>> {
    let path = resolve_path(element, ctx.ambient());
    tracing::trace!(item = element.name(), xpath = %path.xpath, "resolved element");
    let matches = evaluate_xpath(node, &path.xpath, ctx.bindings())?;

    if element.is_single() {
        let Some(first) = matches.first() else {
            return Ok(None);
        };
        return match coerce_match(element, coercer, first)? {
            Some(value) => annotate(element, value, first.node()).map(Some),
            None => Ok(None),
        };
    }

    let mut values = Vec::with_capacity(matches.len());
    for matched in &matches {
        if let Some(value) = coerce_match(element, coercer, matched)? {
            values.push(annotate(element, value, matched.node())?);
        }
    }
    Ok(Some(Value::List(values)))
}

fn coerce_match(
    element: &ElementSpec,
    coercer: &Coercer,
    matched: &XPathMatch<'_, '_>,
) -> Result<Option<Value>> {
    let options = element.options();
    match (coercer, matched.node()) {
        (Coercer::XmlContent, Some(node)) => Ok(Some(Value::String(inner_xml(node).to_string()))),
        (_, Some(node)) if options.raw => {
            if options.parser.is_some() {
                coercer.coerce(outer_xml(node), element.name())
            } else {
                Ok(Some(Value::String(outer_xml(node).to_string())))
            }
        }
        _ => coercer.coerce(&matched.text(), element.name()),
    }
}

fn read_nested(
    element: &ElementSpec,
    child: &Arc<Schema>,
    node: Node<'_, '_>,
    ctx: &ResolutionContext,
) -> Result<Option<Value>> {
    let (candidates, namespace) = resolve_nested(element, child, ctx.ambient());
    let child_ctx = ctx.descend(child, namespace)?;

    let mut matched = Vec::new();
    for xpath in &candidates {
        matched = element_matches(evaluate_xpath(node, xpath, child_ctx.bindings())?);
        if !matched.is_empty() {
            tracing::trace!(
                item = element.name(),
                xpath = %xpath,
                matches = matched.len(),
                "resolved nested element"
            );
            break;
        }
    }

    if element.is_single() {
        return match matched.first() {
            Some(first) => {
                let instance = build(child, *first, &child_ctx)?;
                annotate(element, Value::from(instance), Some(*first)).map(Some)
            }
            None => Ok(None),
        };
    }

    let values = matched
        .iter()
        .map(|n| {
            let instance = build(child, *n, &child_ctx)?;
            annotate(element, Value::from(instance), Some(*n))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(Value::List(values)))
}

/// Attach the matched element's attributes named in the element's
/// `attributes` sub-map to the coerced value
fn annotate(element: &ElementSpec, value: Value, node: Option<Node<'_, '_>>) -> Result<Value> {
    let declared = &element.options().attributes;
    if declared.is_empty() {
        return Ok(value);
    }
    let Some(node) = node.filter(|n| n.is_element()) else {
        return Ok(value);
    };

    let mut attributes = IndexMap::new();
    for attribute in node.attributes() {
        let Some(item_type) = declared.get(attribute.name()) else {
            continue;
        };
        let harvested = coerce_attribute_value(attribute.value(), item_type, attribute.name())?;
        if let Some(harvested) = harvested {
            attributes.insert(accessor_name(attribute.name()), harvested);
        }
    }
    Ok(Value::Annotated(Box::new(Annotated { value, attributes })))
}

impl Schema {
    /// Parse raw text with default options
    pub fn parse(self: &Arc<Self>, xml: &str) -> Result<Parsed> {
        parse(self, xml, &ParseOptions::default())
    }

    /// Parse with options
    pub fn parse_with<'a, 'input>(
        self: &Arc<Self>,
        source: impl Into<Source<'a, 'input>>,
        options: &ParseOptions,
    ) -> Result<Parsed>
    where
        'input: 'a,
    {
        parse(self, source, options)
    }

    /// Parse, delivering instances to `sink` in groups
    pub fn parse_in_groups<'a, 'input, F>(
        self: &Arc<Self>,
        source: impl Into<Source<'a, 'input>>,
        options: &ParseOptions,
        sink: F,
    ) -> Result<usize>
    where
        'input: 'a,
        F: FnMut(Vec<Instance>) -> Result<()>,
    {
        parse_in_groups(self, source, options, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::items::{AttributeSpec, ContentSpec};
    use crate::types::ScalarType;

    fn address() -> Arc<Schema> {
        let mut schema = Schema::new("Address");
        schema
            .attribute(AttributeSpec::new("location", ScalarType::String))
            .unwrap()
            .element(ElementSpec::new("street", ScalarType::String))
            .unwrap()
            .element(ElementSpec::new("housenumber", ScalarType::Integer))
            .unwrap();
        schema.build()
    }

    #[test]
    fn test_root_match_is_single() {
        let xml = r#"<address location="home"><street>Milchstrasse</street><housenumber>23</housenumber></address>"#;
        let parsed = address().parse(xml).unwrap();
        let instance = parsed.one().unwrap();
        assert_eq!(instance.get("location"), Some(&Value::from("home")));
        assert_eq!(instance.get("housenumber"), Some(&Value::Integer(23)));
    }

    #[test]
    fn test_absent_versus_empty() {
        let xml = "<other/>";
        let schema = address();
        let single = schema.parse_with(xml, &ParseOptions::new().single()).unwrap();
        assert!(single.is_absent());

        let many = schema.parse_with(xml, &ParseOptions::new()).unwrap();
        assert_eq!(many, Parsed::Many(Vec::new()));
        assert!(!many.is_absent());
    }

    #[test]
    fn test_descendant_matches_in_document_order() {
        let xml = concat!(
            "<book><address><street>a</street></address>",
            "<address><street>b</street></address></book>"
        );
        let parsed = address().parse(xml).unwrap();
        let streets: Vec<_> = parsed
            .many()
            .iter()
            .map(|i| i.get("street").unwrap().to_text())
            .collect();
        assert_eq!(streets, vec!["a", "b"]);
    }

    #[test]
    fn test_groups() {
        let items: String = (0..5)
            .map(|i| format!("<address><street>{}</street></address>", i))
            .collect();
        let xml = format!("<book>{}</book>", items);
        let mut sizes = Vec::new();
        let total = address()
            .parse_in_groups(&xml, &ParseOptions::new().in_groups_of(2), |group| {
                sizes.push(group.len());
                Ok(())
            })
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_coercion_error_surfaces() {
        let xml = "<address><housenumber>twenty</housenumber></address>";
        let err = address().parse(xml).unwrap_err();
        match err {
            Error::Coercion(e) => {
                assert_eq!(e.text, "twenty");
                assert_eq!(e.item.as_deref(), Some("housenumber"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_source_is_a_parse_error() {
        let err = address().parse("<address><street></address>").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_content_and_default() {
        let mut schema = Schema::new("Animal");
        schema
            .attribute(AttributeSpec::new("type", ScalarType::String).with_default("omnivore"))
            .unwrap();
        schema.content(ContentSpec::new("name", ScalarType::String));
        let schema = schema.build();

        let parsed = schema.parse(r#"<animal>Bear</animal>"#).unwrap();
        let bear = parsed.one().unwrap();
        assert_eq!(bear.get("type"), Some(&Value::from("omnivore")));
        assert_eq!(bear.get("name"), Some(&Value::from("Bear")));

        let parsed = schema.parse(r#"<animal type="">Bear</animal>"#).unwrap();
        assert_eq!(parsed.one().unwrap().get("type"), Some(&Value::from("")));
    }
}
