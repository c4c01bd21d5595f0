//! Mapping declarations
//!
//! [`AttributeSpec`], [`ElementSpec`] and [`ContentSpec`] all wrap an
//! [`ItemSpec`]: the program-facing name, the XML tag, the declared type,
//! the namespace and the per-item options.

use crate::namespaces::ItemNamespace;
use crate::types::{ItemType, ParseFn, SaveFn, Value};
use indexmap::IndexMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Whether an item maps to one value or an ordered collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    /// One value
    #[default]
    Single,
    /// Ordered collection
    Many,
}

/// Custom parser attached to an item
#[derive(Clone)]
pub enum ParserHook {
    /// Called with the raw text
    Function(ParseFn),
    /// Looked up on the target type, then on the owning schema
    Method(String),
}

impl fmt::Debug for ParserHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserHook::Function(_) => f.write_str("Function(..)"),
            ParserHook::Method(name) => f.debug_tuple("Method").field(name).finish(),
        }
    }
}

/// Transform applied to a value right before it is written
#[derive(Clone)]
pub enum OnSave {
    /// Called with the current value
    Function(SaveFn),
    /// Looked up on the owning schema
    Method(String),
}

impl fmt::Debug for OnSave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnSave::Function(_) => f.write_str("Function(..)"),
            OnSave::Method(name) => f.debug_tuple("Method").field(name).finish(),
        }
    }
}

/// Per-item options
#[derive(Debug, Clone, Default)]
pub struct ItemOptions {
    /// Single value or collection
    pub cardinality: Cardinality,
    /// Never written
    pub read_only: bool,
    /// Written even when nil
    pub state_when_nil: bool,
    /// Explicit XPath, replacing the resolved one
    pub xpath: Option<String>,
    /// Attributes harvested onto the coerced value (elements only)
    pub attributes: IndexMap<String, ItemType>,
    /// Custom parser
    pub parser: Option<ParserHook>,
    /// Transform before writing
    pub on_save: Option<OnSave>,
    /// Match any descendant, not only direct children
    pub deep: bool,
    /// Return the matched node's literal markup instead of coercing its text
    pub raw: bool,
}

/// Shape shared by every mapping declaration
#[derive(Debug, Clone)]
pub struct ItemSpec {
    name: String,
    tag: Option<String>,
    item_type: ItemType,
    namespace: ItemNamespace,
    options: ItemOptions,
}

impl ItemSpec {
    /// Create an item whose tag defaults to its name
    pub fn new(name: impl Into<String>, item_type: impl Into<ItemType>) -> Self {
        Self {
            name: name.into(),
            tag: None,
            item_type: item_type.into(),
            namespace: ItemNamespace::Inherit,
            options: ItemOptions::default(),
        }
    }

    /// Program-facing name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// XML tag; the explicit tag or else the name
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.name)
    }

    /// Tag given explicitly at declaration
    pub fn explicit_tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Declared type
    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    /// Declared namespace
    pub fn namespace(&self) -> &ItemNamespace {
        &self.namespace
    }

    /// Options
    pub fn options(&self) -> &ItemOptions {
        &self.options
    }

    /// Whether the item maps to one value
    pub fn is_single(&self) -> bool {
        self.options.cardinality == Cardinality::Single
    }
}

macro_rules! item_builders {
    ($ty:ident) => {
        impl $ty {
            /// Set the XML tag
            pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
                self.item.tag = Some(tag.into());
                self
            }

            /// Declare the namespace prefix
            pub fn with_namespace(mut self, namespace: impl Into<ItemNamespace>) -> Self {
                self.item.namespace = namespace.into();
                self
            }

            /// Force no namespace, even under a namespaced parent
            pub fn without_namespace(mut self) -> Self {
                self.item.namespace = ItemNamespace::Unqualified;
                self
            }

            /// Set the cardinality
            pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
                self.item.options.cardinality = cardinality;
                self
            }

            /// Map to an ordered collection
            pub fn many(self) -> Self {
                self.with_cardinality(Cardinality::Many)
            }

            /// Never write this item
            pub fn read_only(mut self) -> Self {
                self.item.options.read_only = true;
                self
            }

            /// Write this item even when nil
            pub fn state_when_nil(mut self) -> Self {
                self.item.options.state_when_nil = true;
                self
            }

            /// Use an explicit XPath
            pub fn with_xpath(mut self, xpath: impl Into<String>) -> Self {
                self.item.options.xpath = Some(xpath.into());
                self
            }

            /// Parse the raw text with a function
            pub fn with_parser<F>(mut self, f: F) -> Self
            where
                F: Fn(&str) -> crate::error::Result<Value> + Send + Sync + 'static,
            {
                self.item.options.parser = Some(ParserHook::Function(Arc::new(f)));
                self
            }

            /// Parse the raw text with a named method
            pub fn with_parser_method(mut self, method: impl Into<String>) -> Self {
                self.item.options.parser = Some(ParserHook::Method(method.into()));
                self
            }

            /// Transform the value with a function before writing
            pub fn with_on_save<F>(mut self, f: F) -> Self
            where
                F: Fn(&Value) -> Value + Send + Sync + 'static,
            {
                self.item.options.on_save = Some(OnSave::Function(Arc::new(f)));
                self
            }

            /// Transform the value with a named method before writing
            pub fn with_on_save_method(mut self, method: impl Into<String>) -> Self {
                self.item.options.on_save = Some(OnSave::Method(method.into()));
                self
            }

            /// Return literal markup instead of coerced text
            pub fn raw(mut self) -> Self {
                self.item.options.raw = true;
                self
            }
        }

        impl Deref for $ty {
            type Target = ItemSpec;

            fn deref(&self) -> &ItemSpec {
                &self.item
            }
        }
    };
}

/// Attribute of the mapped node
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    item: ItemSpec,
    default: Option<Value>,
}

impl AttributeSpec {
    /// Create an attribute declaration
    pub fn new(name: impl Into<String>, item_type: impl Into<ItemType>) -> Self {
        Self {
            item: ItemSpec::new(name, item_type),
            default: None,
        }
    }

    /// Value applied when the attribute is absent
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Declared default
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

item_builders!(AttributeSpec);

/// Child element of the mapped node
#[derive(Debug, Clone)]
pub struct ElementSpec {
    item: ItemSpec,
}

impl ElementSpec {
    /// Create an element declaration
    pub fn new(name: impl Into<String>, item_type: impl Into<ItemType>) -> Self {
        Self {
            item: ItemSpec::new(name, item_type),
        }
    }

    /// Match any descendant, not only direct children
    pub fn deep(mut self) -> Self {
        self.item.options.deep = true;
        self
    }

    /// Harvest an attribute of the matched element onto the parsed value
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        item_type: impl Into<ItemType>,
    ) -> Self {
        self.item.options.attributes.insert(name.into(), item_type.into());
        self
    }
}

item_builders!(ElementSpec);

/// Text content of the mapped node
#[derive(Debug, Clone)]
pub struct ContentSpec {
    item: ItemSpec,
}

impl ContentSpec {
    /// Create a content declaration
    pub fn new(name: impl Into<String>, item_type: impl Into<ItemType>) -> Self {
        Self {
            item: ItemSpec::new(name, item_type),
        }
    }
}

item_builders!(ContentSpec);
