//! Named schema catalog
//!
//! Items may refer to a nested schema by name ([`ItemType::named`]) so that
//! schemas can reference each other before both are built, or recursively.
//! Names are resolved against a [`Registry`] at parse and serialize time.
//!
//! [`ItemType::named`]: crate::types::ItemType::named

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::types::SchemaRef;
use indexmap::IndexMap;
use std::sync::Arc;

/// Schemas keyed by type name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    schemas: IndexMap<String, Arc<Schema>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its type name.
    ///
    /// Anonymous schemas have no name to be found by and are rejected.
    pub fn register(&mut self, schema: Arc<Schema>) -> Result<&mut Self> {
        let name = schema
            .name()
            .ok_or_else(|| {
                Error::UnknownType("anonymous schemas cannot be registered by name".to_string())
            })?
            .to_string();
        if self.schemas.insert(name.clone(), schema).is_some() {
            tracing::debug!(schema = %name, "schema re-registered; previous declaration replaced");
        }
        Ok(self)
    }

    /// Register a schema under an explicit name
    pub fn register_as(&mut self, name: impl Into<String>, schema: Arc<Schema>) -> &mut Self {
        self.schemas.insert(name.into(), schema);
        self
    }

    /// Look up a schema
    pub fn get(&self, name: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(name)
    }

    /// Whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Schema>)> {
        self.schemas.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Resolve a schema reference made by an item of `owner`
pub fn resolve_schema_ref(
    reference: &SchemaRef,
    owner: &Arc<Schema>,
    registry: Option<&Registry>,
) -> Result<Arc<Schema>> {
    match reference {
        SchemaRef::Schema(schema) => Ok(Arc::clone(schema)),
        SchemaRef::This => Ok(Arc::clone(owner)),
        SchemaRef::Named(name) => registry
            .and_then(|r| r.get(name))
            .cloned()
            .ok_or_else(|| Error::UnknownType(name.clone())),
    }
}
