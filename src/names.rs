//! XML name validation and utilities
//!
//! Tags are always colon-free: the namespace of a mapped node is declared
//! separately, never folded into its tag.

use crate::error::{Result, SyntaxError};

/// Check if a string is a valid XML Name
pub fn is_valid_name(name: &str) -> bool {
    name.chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':')
}

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    !name.contains(':') && is_valid_name(name)
}

/// Validate a tag declared on a schema or item.
///
/// Fails with a [`SyntaxError`] when the tag carries a namespace separator.
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.contains(':') {
        return Err(SyntaxError::new(
            "tag must not contain a namespace separator; declare the namespace separately",
        )
        .with_declaration(tag)
        .into());
    }
    if tag.is_empty() {
        return Err(SyntaxError::new("tag must not be empty").into());
    }
    Ok(())
}

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some((prefix, local)) = qname.split_once(':') {
        (Some(prefix), local)
    } else {
        (None, qname)
    }
}

/// Derive the default tag of a named type: the last `::` segment, lower-cased.
///
/// `"QuarterTest::Game"` becomes `"game"`.
pub fn default_tag(type_name: &str) -> Option<String> {
    let last = type_name.rsplit("::").next()?.trim();
    if last.is_empty() {
        None
    } else {
        Some(last.to_lowercase())
    }
}

/// Normalise an XML attribute name into an accessor name (`data-src` → `data_src`).
pub fn accessor_name(name: &str) -> String {
    name.replace('-', "_")
}
