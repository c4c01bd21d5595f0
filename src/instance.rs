//! Materialized objects
//!
//! An [`Instance`] holds the field values of one mapped object, keyed by item
//! name, together with the schema it was built from. A missing field is nil.

use crate::error::Result;
use crate::parser::{self, ParseOptions, Source};
use crate::schema::Schema;
use crate::serializer;
use crate::types::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// A mapped object
#[derive(Debug, Clone)]
pub struct Instance {
    schema: Arc<Schema>,
    fields: IndexMap<String, Value>,
    xml_value: Option<String>,
    xml_content: Option<String>,
}

impl Instance {
    /// Create an instance with every declared attribute default applied
    pub fn new(schema: &Arc<Schema>) -> Self {
        let fields = schema
            .attributes()
            .iter()
            .filter_map(|attr| Some((attr.name().to_string(), attr.default_value()?.clone())))
            .collect();
        Self {
            schema: Arc::clone(schema),
            fields,
            xml_value: None,
            xml_content: None,
        }
    }

    /// Schema the instance was built from
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Get a field.
    ///
    /// Items declared inside a wrapper element (see [`Schema::wrap`]) are
    /// read through the wrapper object.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(name) {
            return Some(value);
        }
        self.schema
            .wrappers()
            .keys()
            .filter_map(|wrapper| self.fields.get(wrapper)?.as_object())
            .find_map(|wrapped| wrapped.get(name))
    }

    /// Set a field.
    ///
    /// A name declared only inside a wrapper element is stored on the
    /// wrapper object, which is created when missing.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        if let Some(wrapper) = self.wrapper_declaring(&name) {
            let (tag, schema) = wrapper;
            let slot = self
                .fields
                .entry(tag)
                .or_insert_with(|| Value::from(Instance::new(&schema)));
            if let Some(wrapped) = slot.as_object_mut() {
                wrapped.set(name, value);
                return self;
            }
        }
        self.fields.insert(name, value);
        self
    }

    /// Set a field to nil
    pub fn clear(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    /// Fields in assignment order
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Value of the declared content item
    pub fn content_value(&self) -> Option<&Value> {
        let content = self.schema.content_spec()?;
        self.fields.get(content.name())
    }

    /// Outer markup of the source node, when the schema keeps it
    pub fn xml_value(&self) -> Option<&str> {
        self.xml_value.as_deref()
    }

    /// Inner markup of the source node, when the schema keeps it
    pub fn xml_content(&self) -> Option<&str> {
        self.xml_content.as_deref()
    }

    pub(crate) fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub(crate) fn set_source_markup(&mut self, outer: &str, inner: &str) {
        self.xml_value = Some(outer.to_string());
        self.xml_content = Some(inner.to_string());
    }

    /// Serialize to an XML document
    pub fn to_xml(&self) -> Result<String> {
        serializer::to_xml(self)
    }

    /// Refresh this instance in place from a new source.
    ///
    /// Attributes, content and scalar elements are re-read; nested mapped
    /// children keep their current values. Returns `false`, leaving the
    /// instance untouched, when the source holds no matching node.
    pub fn reparse<'a, 'input>(
        &mut self,
        source: impl Into<Source<'a, 'input>>,
        options: &ParseOptions,
    ) -> Result<bool>
    where
        'input: 'a,
    {
        parser::parse_update(self, source, options)
    }

    fn wrapper_declaring(&self, name: &str) -> Option<(String, Arc<Schema>)> {
        if self.schema.find_element(name).is_some() || self.schema.find_attribute(name).is_some() {
            return None;
        }
        self.schema
            .wrappers()
            .iter()
            .find(|(_, wrapper)| {
                wrapper.find_element(name).is_some() || wrapper.find_attribute(name).is_some()
            })
            .map(|(tag, wrapper)| (tag.clone(), Arc::clone(wrapper)))
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.schema.display_name() == other.schema.display_name() && self.fields == other.fields
    }
}
