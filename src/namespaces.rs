//! XML namespace handling
//!
//! This module provides the three namespace notions the mapper works with:
//! - [`ItemNamespace`]: what a schema or item declares (inherit, none, or a prefix)
//! - [`NamespaceRegistry`]: prefix → URI registrations owned by one schema
//! - [`NamespaceBindings`]: the prefix → URI table handed to XPath evaluation

use indexmap::IndexMap;
use std::collections::HashMap;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// The prefix that stands for a document's default namespace.
///
/// Registering a namespace under this prefix declares the default namespace
/// (`xmlns="..."`) rather than a named prefix.
pub const DEFAULT_NAMESPACE_PREFIX: &str = "xmlns";

/// Namespace declared by a schema or an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ItemNamespace {
    /// Nothing declared; the ambient namespace applies
    #[default]
    Inherit,
    /// Explicitly no namespace, even under a namespaced parent
    Unqualified,
    /// A registered prefix
    Prefixed(Prefix),
}

impl ItemNamespace {
    /// Create a prefixed namespace declaration
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self::Prefixed(prefix.into())
    }

    /// Whether the declaration overrides the ambient namespace
    pub fn is_explicit(&self) -> bool {
        !matches!(self, Self::Inherit)
    }

    /// The declared prefix, if any
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::Prefixed(prefix) => Some(prefix),
            _ => None,
        }
    }

    /// Resolve against an ambient namespace
    pub fn or_ambient(&self, ambient: Option<&str>) -> Option<String> {
        match self {
            Self::Inherit => ambient.map(str::to_string),
            Self::Unqualified => None,
            Self::Prefixed(prefix) => Some(prefix.clone()),
        }
    }
}

impl From<&str> for ItemNamespace {
    fn from(prefix: &str) -> Self {
        Self::Prefixed(prefix.to_string())
    }
}

impl From<String> for ItemNamespace {
    fn from(prefix: String) -> Self {
        Self::Prefixed(prefix)
    }
}

impl From<Option<&str>> for ItemNamespace {
    fn from(prefix: Option<&str>) -> Self {
        match prefix {
            Some(prefix) => Self::Prefixed(prefix.to_string()),
            None => Self::Unqualified,
        }
    }
}

/// Prefix → URI registrations owned by one schema
///
/// Copied by value when a schema is derived, so parent and child evolve
/// independently afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceRegistry {
    entries: IndexMap<Prefix, NamespaceUri>,
}

impl NamespaceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prefix; re-registering a prefix replaces its URI
    pub fn register(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.entries.insert(prefix.into(), uri.into());
    }

    /// Get the URI registered for a prefix
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(|s| s.as_str())
    }

    /// Number of registered prefixes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no prefix is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over registrations in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Registrations sorted by prefix, for deterministic output
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Merge another registry into this one; entries of `other` win
    pub fn merge(&mut self, other: &NamespaceRegistry) {
        for (prefix, uri) in other.iter() {
            self.register(prefix, uri);
        }
    }
}

/// Prefix → URI table used to evaluate XPath name tests
#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    prefixes: HashMap<Prefix, NamespaceUri>,
}

impl NamespaceBindings {
    /// Create a new empty binding table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a prefix
    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), uri.into());
    }

    /// Bind every entry of a registry, replacing existing bindings
    pub fn bind_all(&mut self, registry: &NamespaceRegistry) {
        for (prefix, uri) in registry.iter() {
            self.bind(prefix, uri);
        }
    }

    /// Resolve a prefix to its URI
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// The document default namespace, when bound
    pub fn default_namespace(&self) -> Option<&str> {
        self.resolve(DEFAULT_NAMESPACE_PREFIX)
    }

    /// Whether a prefix is bound
    pub fn contains(&self, prefix: &str) -> bool {
        self.prefixes.contains_key(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_namespace_resolution() {
        assert_eq!(ItemNamespace::Inherit.or_ambient(Some("a")), Some("a".to_string()));
        assert_eq!(ItemNamespace::Unqualified.or_ambient(Some("a")), None);
        assert_eq!(
            ItemNamespace::prefixed("b").or_ambient(Some("a")),
            Some("b".to_string())
        );
        assert_eq!(ItemNamespace::Inherit.or_ambient(None), None);
    }

    #[test]
    fn test_item_namespace_from_option() {
        assert_eq!(ItemNamespace::from(None), ItemNamespace::Unqualified);
        assert_eq!(ItemNamespace::from(Some("p")), ItemNamespace::prefixed("p"));
        assert!(!ItemNamespace::Inherit.is_explicit());
        assert!(ItemNamespace::Unqualified.is_explicit());
    }

    #[test]
    fn test_registry_sorted_and_merge() {
        let mut registry = NamespaceRegistry::new();
        registry.register("p", "urn:loc.gov:people");
        registry.register("bk", "urn:loc.gov:books");

        let sorted = registry.sorted();
        assert_eq!(sorted[0].0, "bk");
        assert_eq!(sorted[1].0, "p");

        let mut other = NamespaceRegistry::new();
        other.register("p", "urn:other");
        registry.merge(&other);
        assert_eq!(registry.get("p"), Some("urn:other"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_bindings() {
        let mut bindings = NamespaceBindings::new();
        bindings.bind(DEFAULT_NAMESPACE_PREFIX, "http://example.com");
        bindings.bind("xs", "http://www.w3.org/2001/XMLSchema");

        assert_eq!(bindings.default_namespace(), Some("http://example.com"));
        assert_eq!(
            bindings.resolve("xs"),
            Some("http://www.w3.org/2001/XMLSchema")
        );
        assert!(!bindings.contains("missing"));
    }
}
