//! Path resolution
//!
//! Computes the XPath expression and the effective namespace of an item
//! under an ambient namespace. Namespace precedence, highest first:
//!
//! 1. an explicit override supplied by the caller
//! 2. the item's own declaration (where "no namespace" is a declaration)
//! 3. the ambient namespace of the enclosing schema or call
//!
//! Resolution never fails: absence resolves to "no namespace".
//!
//! The recursion state of a parse or serialize run travels in an immutable
//! [`ResolutionContext`]; descending into a nested schema derives a new one.

use crate::error::Result;
use crate::items::{ElementSpec, ItemSpec};
use crate::limits::Limits;
use crate::namespaces::{ItemNamespace, NamespaceBindings};
use crate::registry::{resolve_schema_ref, Registry};
use crate::schema::Schema;
use crate::types::SchemaRef;
use std::sync::Arc;

/// XPath expression and effective namespace of an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Expression evaluated against the context node
    pub xpath: String,
    /// Effective namespace prefix; `None` is no namespace
    pub namespace: Option<String>,
}

/// Resolve the effective namespace
pub fn resolve_namespace(
    override_ns: Option<&ItemNamespace>,
    declared: &ItemNamespace,
    ambient: Option<&str>,
) -> Option<String> {
    match override_ns {
        Some(ns) if ns.is_explicit() => ns.or_ambient(None),
        _ => declared.or_ambient(ambient),
    }
}

/// `prefix:tag`, or `tag` without a namespace
pub fn qualify(namespace: Option<&str>, tag: &str) -> String {
    match namespace {
        Some(prefix) => format!("{}:{}", prefix, tag),
        None => tag.to_string(),
    }
}

/// Path of a scalar element or content-typed element.
///
/// An explicit `xpath` option is used verbatim.
pub fn resolve_path(item: &ItemSpec, ambient: Option<&str>) -> ResolvedPath {
    let namespace = resolve_namespace(None, item.namespace(), ambient);
    let xpath = match &item.options().xpath {
        Some(xpath) => xpath.clone(),
        None => {
            let step = qualify(namespace.as_deref(), item.tag());
            if item.options().deep {
                format!(".//{}", step)
            } else {
                step
            }
        }
    };
    ResolvedPath { xpath, namespace }
}

/// Path of an attribute.
///
/// Attributes are never in the ambient namespace; only their own
/// declaration qualifies them.
pub fn resolve_attribute_path(item: &ItemSpec) -> ResolvedPath {
    let namespace = item.namespace().prefix().map(str::to_string);
    let xpath = match &item.options().xpath {
        Some(xpath) => xpath.clone(),
        None => format!("@{}", qualify(namespace.as_deref(), item.tag())),
    };
    ResolvedPath { xpath, namespace }
}

/// Candidate paths for a nested-schema element, tried in order until one
/// matches, and the namespace the nested schema is parsed under.
///
/// The namespace is the element's explicit declaration, else the child
/// schema's own, else the ambient one. Without an explicit tag the element
/// name is tried before the child schema's tag. The `xpath` option is a
/// base path onto which the tag step is appended.
pub fn resolve_nested(
    element: &ElementSpec,
    child: &Schema,
    ambient: Option<&str>,
) -> (Vec<String>, Option<String>) {
    let schema_ns = child.namespace_prefix().map(ItemNamespace::prefixed);
    let namespace = resolve_namespace(
        Some(element.namespace()),
        schema_ns.as_ref().unwrap_or(&ItemNamespace::Inherit),
        ambient,
    );

    let base = match &element.options().xpath {
        Some(xpath) => with_trailing_slash(xpath),
        None if element.options().deep => ".//".to_string(),
        None => String::new(),
    };

    let mut tags: Vec<&str> = Vec::new();
    match element.explicit_tag() {
        Some(tag) => tags.push(tag),
        None => {
            tags.push(element.name());
            if let Some(tag) = child.tag_name() {
                if tag != element.name() {
                    tags.push(tag);
                }
            }
        }
    }

    let candidates = tags
        .into_iter()
        .map(|tag| format!("{}{}", base, qualify(namespace.as_deref(), tag)))
        .collect();
    (candidates, namespace)
}

/// Path of the top-level nodes of a parse.
///
/// At the document root the path is absolute; elsewhere any descendant
/// matches. An `xpath` option replaces that base.
pub fn resolve_root(
    tag: &str,
    namespace: Option<&str>,
    xpath: Option<&str>,
    at_root: bool,
) -> String {
    let base = match xpath {
        Some(xpath) => with_trailing_slash(xpath),
        None if at_root => "/".to_string(),
        None => ".//".to_string(),
    };
    format!("{}{}", base, qualify(namespace, tag))
}

fn with_trailing_slash(xpath: &str) -> String {
    if xpath.ends_with('/') {
        xpath.to_string()
    } else {
        format!("{}/", xpath)
    }
}

/// Recursion state threaded through parse and serialize runs
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    ambient: Option<String>,
    bindings: NamespaceBindings,
    depth: usize,
    registry: Option<Arc<Registry>>,
    limits: Limits,
}

impl ResolutionContext {
    /// Create a context with no ambient namespace and no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ambient namespace
    pub fn with_ambient(mut self, ambient: Option<String>) -> Self {
        self.ambient = ambient;
        self
    }

    /// Set the namespace bindings
    pub fn with_bindings(mut self, bindings: NamespaceBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Set the registry used for schemas referenced by name
    pub fn with_registry(mut self, registry: Option<Arc<Registry>>) -> Self {
        self.registry = registry;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Ambient namespace
    pub fn ambient(&self) -> Option<&str> {
        self.ambient.as_deref()
    }

    /// Namespace bindings for XPath evaluation
    pub fn bindings(&self) -> &NamespaceBindings {
        &self.bindings
    }

    /// Nesting depth of mapped types
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Limits in force
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Context for descending into `schema` under `ambient`.
    ///
    /// The nested schema's registered namespaces are bound on top of the
    /// current bindings.
    pub fn descend(&self, schema: &Schema, ambient: Option<String>) -> Result<Self> {
        let depth = self.depth + 1;
        self.limits.check_depth(depth)?;

        let mut bindings = self.bindings.clone();
        bindings.bind_all(schema.namespaces());
        Ok(Self {
            ambient,
            bindings,
            depth,
            registry: self.registry.clone(),
            limits: self.limits.clone(),
        })
    }

    /// Resolve a schema reference made by an item of `owner`
    pub fn resolve_schema(
        &self,
        reference: &SchemaRef,
        owner: &Arc<Schema>,
    ) -> Result<Arc<Schema>> {
        resolve_schema_ref(reference, owner, self.registry.as_deref())
    }
}
