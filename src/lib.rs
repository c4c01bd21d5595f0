//! # xmlmapper
//!
//! Declarative mapping between XML documents and typed objects.
//!
//! A [`Schema`] declares how one kind of object maps onto XML: its tag, its
//! namespace, and the attributes, text content and child elements that feed
//! its fields. Parsing a document against a schema yields [`Instance`]s;
//! serializing an instance writes the same shape back out.
//!
//! ## Features
//!
//! - Attribute, content and element items with typed coercion
//! - Nested schemas, collections and self-referencing schemas
//! - Namespace prefixes with precedence rules (item, schema, ambient)
//! - XPath-driven element lookup
//! - Batched parsing of large collections
//! - In-place refresh of an existing instance
//! - Custom parser and on-save hooks
//! - Anonymous schemas inferred from a document
//! - Protection against oversized or deeply nested input
//!
//! ## Example
//!
//! ```rust
//! use xmlmapper::{AttributeSpec, ElementSpec, Parsed, ScalarType, Schema};
//!
//! let mut address = Schema::new("Address");
//! address
//!     .attribute(AttributeSpec::new("country", ScalarType::String))?
//!     .element(ElementSpec::new("street", ScalarType::String))?
//!     .element(ElementSpec::new("postcode", ScalarType::Integer))?;
//! let address = address.build();
//!
//! let xml = r#"<address country="NL"><street>Damrak</street><postcode>1012</postcode></address>"#;
//! let parsed = address.parse(xml)?;
//! let home = parsed.one().expect("single root");
//! assert_eq!(home.get("postcode").and_then(|v| v.as_i64()), Some(1012));
//!
//! let written = home.to_xml()?;
//! assert!(written.contains("<street>Damrak</street>"));
//! # Ok::<(), xmlmapper::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Utilities
pub mod names;
pub mod namespaces;

// Documents
pub mod documents;
pub mod loaders;
pub mod xpath;
pub mod builder;

// Declarations
pub mod types;
pub mod coercion;
pub mod items;
pub mod schema;
pub mod registry;

// Mapping
pub mod resolver;
pub mod instance;
pub mod parser;
pub mod serializer;
pub mod anonymous;

// Re-exports for convenience
pub use builder::XmlBuilder;
pub use coercion::Coercer;
pub use documents::ParserConfig;
pub use error::{CoercionError, Error, ParseError, Result, SyntaxError};
pub use instance::Instance;
pub use items::{
    AttributeSpec, Cardinality, ContentSpec, ElementSpec, ItemOptions, ItemSpec, OnSave, ParserHook,
};
pub use limits::Limits;
pub use loaders::Loader;
pub use namespaces::{ItemNamespace, NamespaceBindings, NamespaceRegistry, DEFAULT_NAMESPACE_PREFIX};
pub use parser::{parse, parse_in_groups, parse_update, ParseOptions, Parsed, Source};
pub use registry::Registry;
pub use resolver::ResolutionContext;
pub use schema::Schema;
pub use serializer::{build_xml, to_xml};
pub use types::{Annotated, CustomType, ItemType, ScalarType, SchemaRef, Value};

/// Version of the xmlmapper library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
