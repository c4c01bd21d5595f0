//! Error types for xmlmapper
//!
//! This module defines all error types used throughout the library.
//! "Absent" results are not errors: a `single` parse that matches nothing
//! returns [`crate::parser::Parsed::Absent`].

use std::fmt;
use thiserror::Error;

/// Result type alias using xmlmapper Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlmapper operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid schema declaration, raised at registration time
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// Malformed XML source
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A matched value could not be converted to its declared type
    #[error("coercion error: {0}")]
    Coercion(#[from] CoercionError),

    /// Unsupported or malformed XPath expression
    #[error("xpath error: {0}")]
    XPath(String),

    /// A schema referenced by name is not registered
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A named parser method could not be found on the target or owning type
    #[error("unknown method '{method}' on {type_name}")]
    UnknownMethod {
        /// Name of the method that was looked up
        method: String,
        /// Types searched, in lookup order
        type_name: String,
    },

    /// Invalid option value
    #[error("value error: {0}")]
    Value(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML output error
    #[error("XML error: {0}")]
    Xml(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),
}

/// A schema declared something that can never be valid, e.g. a tag
/// containing a namespace separator.
#[derive(Debug, Clone)]
pub struct SyntaxError {
    /// Error message
    pub message: String,
    /// The offending declaration
    pub declaration: Option<String>,
}

impl SyntaxError {
    /// Create a new syntax error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            declaration: None,
        }
    }

    /// Set the offending declaration
    pub fn with_declaration(mut self, declaration: impl Into<String>) -> Self {
        self.declaration = Some(declaration.into());
        self
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref declaration) = self.declaration {
            write!(f, " (in declaration '{}')", declaration)?;
        }

        Ok(())
    }
}

impl std::error::Error for SyntaxError {}

/// Malformed XML source
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the source, as `line:column`
    pub location: Option<String>,
    /// Source snippet that caused the error
    pub source: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        if let Some(ref src) = self.source {
            write!(f, "\n\nSource:\n{}", src)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// A matched text value that cannot be converted to its declared type
#[derive(Debug, Clone)]
pub struct CoercionError {
    /// The offending text
    pub text: String,
    /// Name of the item being coerced
    pub item: Option<String>,
    /// Name of the target type
    pub target: String,
    /// Underlying reason reported by the converter
    pub reason: Option<String>,
}

impl CoercionError {
    /// Create a new coercion error
    pub fn new(text: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            item: None,
            target: target.into(),
            reason: None,
        }
    }

    /// Set the item name
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot convert '{}' to {}", self.text, self.target)?;

        if let Some(ref item) = self.item {
            write!(f, " for item '{}'", item)?;
        }

        if let Some(ref reason) = self.reason {
            write!(f, ": {}", reason)?;
        }

        Ok(())
    }
}

impl std::error::Error for CoercionError {}
