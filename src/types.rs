//! Semantic types and materialized values
//!
//! Every item declares an [`ItemType`]: a built-in scalar, raw XML content,
//! a nested schema, or a [`CustomType`] carrying its own parser functions.
//! Parsed data is held as [`Value`]s.

use crate::error::Result;
use crate::instance::Instance;
use crate::schema::Schema;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// Function turning raw text into a value
pub type ParseFn = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// Function transforming a value right before it is written
pub type SaveFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Built-in scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Text, passed through unchanged
    String,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    /// Arbitrary-precision decimal
    Decimal,
    /// `true`/`1` are true, everything else false
    Boolean,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time with offset
    DateTime,
    /// Date and time, falling back to integer seconds since the epoch
    Timestamp,
}

impl ScalarType {
    /// Type name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Integer => "Integer",
            ScalarType::Float => "Float",
            ScalarType::Decimal => "Decimal",
            ScalarType::Boolean => "Boolean",
            ScalarType::Date => "Date",
            ScalarType::Time => "Time",
            ScalarType::DateTime => "DateTime",
            ScalarType::Timestamp => "Timestamp",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A user-defined type that knows how to parse itself
///
/// `constructor` is used when an item of this type declares no parser hook;
/// `parsers` back parser hooks that name a method.
#[derive(Clone)]
pub struct CustomType {
    name: String,
    constructor: Option<ParseFn>,
    parsers: IndexMap<String, ParseFn>,
}

impl CustomType {
    /// Create a custom type without any functions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructor: None,
            parsers: IndexMap::new(),
        }
    }

    /// Set the function used when no parser hook is declared
    pub fn with_constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(f));
        self
    }

    /// Add a named parser function
    pub fn with_parser<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.parsers.insert(name.into(), Arc::new(f));
        self
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constructor, if any
    pub fn constructor(&self) -> Option<&ParseFn> {
        self.constructor.as_ref()
    }

    /// Look up a named parser
    pub fn parser(&self, name: &str) -> Option<&ParseFn> {
        self.parsers.get(name)
    }
}

impl fmt::Debug for CustomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomType")
            .field("name", &self.name)
            .field("constructor", &self.constructor.is_some())
            .field("parsers", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Reference to a nested schema
#[derive(Debug, Clone)]
pub enum SchemaRef {
    /// A schema held directly
    Schema(Arc<Schema>),
    /// A schema looked up by name in a [`crate::registry::Registry`] at parse time
    Named(String),
    /// The schema that declares the item
    This,
}

/// Declared type of an item
#[derive(Debug, Clone)]
pub enum ItemType {
    /// Built-in scalar
    Scalar(ScalarType),
    /// Inner markup of the matched node, unparsed
    XmlContent,
    /// Nested mapped type
    Schema(SchemaRef),
    /// User-defined type
    Custom(Arc<CustomType>),
}

impl ItemType {
    /// Nested schema looked up by name
    pub fn named(name: impl Into<String>) -> Self {
        ItemType::Schema(SchemaRef::Named(name.into()))
    }

    /// The declaring schema itself
    pub fn this() -> Self {
        ItemType::Schema(SchemaRef::This)
    }

    /// Whether this is a nested mapped type
    pub fn is_schema(&self) -> bool {
        matches!(self, ItemType::Schema(_))
    }

    /// Type name used in messages
    pub fn name(&self) -> String {
        match self {
            ItemType::Scalar(scalar) => scalar.name().to_string(),
            ItemType::XmlContent => "XmlContent".to_string(),
            ItemType::Schema(SchemaRef::Schema(schema)) => schema.display_name().to_string(),
            ItemType::Schema(SchemaRef::Named(name)) => name.clone(),
            ItemType::Schema(SchemaRef::This) => "self".to_string(),
            ItemType::Custom(custom) => custom.name().to_string(),
        }
    }
}

impl Default for ItemType {
    fn default() -> Self {
        ItemType::Scalar(ScalarType::String)
    }
}

impl From<ScalarType> for ItemType {
    fn from(scalar: ScalarType) -> Self {
        ItemType::Scalar(scalar)
    }
}

impl From<Arc<Schema>> for ItemType {
    fn from(schema: Arc<Schema>) -> Self {
        ItemType::Schema(SchemaRef::Schema(schema))
    }
}

impl From<&Arc<Schema>> for ItemType {
    fn from(schema: &Arc<Schema>) -> Self {
        ItemType::Schema(SchemaRef::Schema(Arc::clone(schema)))
    }
}

impl From<Arc<CustomType>> for ItemType {
    fn from(custom: Arc<CustomType>) -> Self {
        ItemType::Custom(custom)
    }
}

impl From<CustomType> for ItemType {
    fn from(custom: CustomType) -> Self {
        ItemType::Custom(Arc::new(custom))
    }
}

/// A scalar paired with attributes harvested from its source element
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated {
    /// The coerced value
    pub value: Value,
    /// Harvested attributes, keyed by accessor name (`data-src` → `data_src`)
    pub attributes: IndexMap<String, Value>,
}

/// A materialized value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Text
    String(String),
    /// Integer
    Integer(i64),
    /// Float
    Float(f64),
    /// Decimal
    Decimal(Decimal),
    /// Boolean
    Boolean(bool),
    /// Date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Date and time
    DateTime(DateTime<FixedOffset>),
    /// Ordered collection
    List(Vec<Value>),
    /// Nested mapped object
    Object(Box<Instance>),
    /// Scalar with harvested element attributes
    Annotated(Box<Annotated>),
}

impl Value {
    /// The value with any annotation removed
    pub fn plain(&self) -> &Value {
        match self {
            Value::Annotated(annotated) => annotated.value.plain(),
            other => other,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self.plain() {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_i64(&self) -> Option<i64> {
        match self.plain() {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_f64(&self) -> Option<f64> {
        match self.plain() {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self.plain() {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self.plain() {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as nested object
    pub fn as_object(&self) -> Option<&Instance> {
        match self.plain() {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    /// Get as mutable nested object
    pub fn as_object_mut(&mut self) -> Option<&mut Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            Value::Annotated(annotated) => annotated.value.as_object_mut(),
            _ => None,
        }
    }

    /// Attribute harvested from the source element, by accessor or XML name
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Annotated(annotated) => annotated
                .attributes
                .get(&crate::names::accessor_name(name)),
            _ => None,
        }
    }

    /// Text written for this value
    pub fn to_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(instance) => instance
                .content_value()
                .map(Value::to_text)
                .unwrap_or_default(),
            Value::Annotated(annotated) => annotated.value.to_text(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Object(Box::new(instance))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}
