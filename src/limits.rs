//! Limits and constraints for mapping
//!
//! This module defines limits that protect parsing and serialization
//! against resource exhaustion: oversized sources, documents with huge
//! node counts, and unbounded nesting of mapped types.

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum XML source size in bytes
    pub max_xml_size: usize,

    /// Maximum nesting of mapped types during one parse or serialize
    pub max_depth: usize,

    /// Maximum number of nodes the document engine may allocate
    pub max_nodes: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_size: 100 * 1024 * 1024, // 100 MB
            max_depth: 256,
            max_nodes: u32::MAX,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_xml_size: 10 * 1024 * 1024, // 10 MB
            max_depth: 32,
            max_nodes: 1_000_000,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xml_size: 1024 * 1024 * 1024, // 1 GB
            max_depth: 4096,
            max_nodes: u32::MAX,
        }
    }

    /// Check if XML size is within limits
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        if size > self.max_xml_size {
            Err(Error::LimitExceeded(format!(
                "XML size {} bytes exceeds maximum {} bytes",
                size, self.max_xml_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if mapping depth is within limits
    pub fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            Err(Error::LimitExceeded(format!(
                "mapping depth {} exceeds maximum {}",
                depth, self.max_depth
            )))
        } else {
            Ok(())
        }
    }
}
