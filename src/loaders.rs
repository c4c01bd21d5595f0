//! Resource loading utilities
//!
//! This module reads XML sources from disk before they are parsed; no I/O
//! happens during a parse run itself.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::parser::{parse, ParseOptions, Parsed};
use crate::schema::Schema;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Resource loader for documents
#[derive(Debug, Clone, Default)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a file as a string
    pub fn load(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        self.check_size(path)?;
        Ok(fs::read_to_string(path)?)
    }

    /// Load a file as bytes
    pub fn load_bytes(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        self.check_size(path)?;
        Ok(fs::read(path)?)
    }

    /// Load a file and parse it against `schema`
    pub fn parse_file(
        &self,
        schema: &Arc<Schema>,
        path: impl AsRef<Path>,
        options: &ParseOptions,
    ) -> Result<Parsed> {
        let path = path.as_ref();
        let content = self.load(path)?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "loaded document");
        parse(schema, content.as_str(), options)
    }

    // Size comes from metadata, before any read
    fn check_size(&self, path: &Path) -> Result<()> {
        let metadata = fs::metadata(path).map_err(|e| {
            Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
        })?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        self.limits.check_xml_size(size)
    }
}

impl Schema {
    /// Load a file and parse it
    pub fn parse_file(
        self: &Arc<Self>,
        path: impl AsRef<Path>,
        options: &ParseOptions,
    ) -> Result<Parsed> {
        Loader::new()
            .with_limits(options.limits().clone())
            .parse_file(self, path, options)
    }
}
