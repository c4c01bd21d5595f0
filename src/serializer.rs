//! Writing instances as XML
//!
//! Mirrors the parser: each instance writes its tag, attributes, content and
//! elements, in declaration order, recursing into nested instances through
//! the same [`XmlBuilder`] so that they compose into one document.
//!
//! Namespaces registered by a schema are declared on the document root when
//! an instance of that schema is written; schemas never reached during a
//! run declare nothing.

use crate::builder::XmlBuilder;
use crate::coercion::apply_on_save;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::items::ElementSpec;
use crate::names::accessor_name;
use crate::namespaces::ItemNamespace;
use crate::resolver::{qualify, resolve_namespace, ResolutionContext};
use crate::types::Value;

/// Serialize an instance to an XML document
pub fn to_xml(instance: &Instance) -> Result<String> {
    to_xml_with(instance, &ResolutionContext::new())
}

/// Serialize an instance under an explicit context (ambient namespace and
/// limits)
pub fn to_xml_with(instance: &Instance, ctx: &ResolutionContext) -> Result<String> {
    let mut builder = XmlBuilder::new();
    build_xml(instance, &mut builder, ctx, None, None)?;
    builder.serialize_to_text()
}

/// Write an instance into `builder` under the currently open element.
///
/// The element namespace is `namespace_override` when it is explicit, else
/// the schema's own namespace, else the ambient namespace of `ctx`. The tag
/// is `tag_from_parent`, else the schema's tag.
pub fn build_xml(
    instance: &Instance,
    builder: &mut XmlBuilder,
    ctx: &ResolutionContext,
    namespace_override: Option<&ItemNamespace>,
    tag_from_parent: Option<&str>,
) -> Result<()> {
    let schema = instance.schema();
    ctx.limits().check_depth(ctx.depth())?;

    let declared = schema
        .namespace_prefix()
        .map(ItemNamespace::prefixed)
        .unwrap_or_default();
    let namespace = resolve_namespace(namespace_override, &declared, ctx.ambient());
    let tag = tag_from_parent
        .or_else(|| schema.tag_name())
        .ok_or_else(|| Error::Xml(format!("{} declares no tag to write", schema.display_name())))?;

    let attributes = writable_attributes(instance);

    let mut element = builder.open_element(tag);
    element.set_attributes(attributes);
    for (prefix, uri) in schema.namespaces().sorted() {
        element.add_root_namespace_declaration(prefix, uri);
    }
    element.set_namespace(namespace.as_deref());

    if let Some(content) = schema.content_spec() {
        if !content.options().read_only {
            if let Some(value) = apply_on_save(content, instance.get(content.name()), schema) {
                element.write_text(value.to_text());
            }
        }
    }

    let own_or_ambient = schema
        .namespace_prefix()
        .map(str::to_string)
        .or_else(|| ctx.ambient().map(str::to_string));
    for spec in schema.elements() {
        write_element(instance, spec, &mut element, ctx, own_or_ambient.as_deref())?;
    }
    Ok(())
}

/// Attributes that are written: not read-only, not equal to their default,
/// and not nil unless stated
fn writable_attributes(instance: &Instance) -> Vec<(String, String)> {
    let schema = instance.schema();
    schema
        .attributes()
        .iter()
        .filter(|attr| !attr.options().read_only)
        .filter_map(|attr| {
            let value = instance
                .get(attr.name())
                .filter(|value| Some(*value) != attr.default_value());
            let value = apply_on_save(attr, value, schema);
            if value.is_none() && !attr.options().state_when_nil {
                return None;
            }
            let name = qualify(attr.namespace().prefix(), attr.tag());
            Some((name, value.map(|v| v.to_text()).unwrap_or_default()))
        })
        .collect()
}

fn write_element(
    instance: &Instance,
    spec: &ElementSpec,
    builder: &mut XmlBuilder,
    ctx: &ResolutionContext,
    own_or_ambient: Option<&str>,
) -> Result<()> {
    if spec.options().read_only {
        return Ok(());
    }
    let schema = instance.schema();
    let value = apply_on_save(spec, instance.get(spec.name()), schema);

    let items = match value {
        Some(Value::List(items)) if !spec.is_single() => items.into_iter().map(Some).collect(),
        other => vec![other],
    };

    for item in items {
        if let Some(Value::Object(child)) = item.as_ref().map(Value::plain) {
            let override_ns = spec.namespace().is_explicit().then(|| spec.namespace());
            let child_ctx = ctx.descend(child.schema(), own_or_ambient.map(str::to_string))?;
            build_xml(child, builder, &child_ctx, override_ns, spec.explicit_tag())?;
            continue;
        }
        if item.is_none() && !spec.options().state_when_nil {
            continue;
        }

        let namespace = resolve_namespace(None, spec.namespace(), own_or_ambient);
        let mut node = builder.open_element(spec.tag());
        if let Some(Value::Annotated(annotated)) = &item {
            let harvested = spec.options().attributes.keys().filter_map(|xml_name| {
                let value = annotated.attributes.get(&accessor_name(xml_name))?;
                Some((xml_name.clone(), value.to_text()))
            });
            node.set_attributes(harvested);
        }
        node.set_namespace(namespace.as_deref());
        if let Some(value) = item {
            node.write_text(value.to_text());
        }
    }
    Ok(())
}
