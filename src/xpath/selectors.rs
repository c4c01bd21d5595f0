//! XPath path expressions
//!
//! Splits location paths into steps and parses each step into an axis, a
//! node test and optional predicates.

use crate::error::{Error, Result};
use crate::names::split_qname;

/// A compiled location path
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// The raw XPath expression
    pub xpath: String,
    /// Whether evaluation starts at the document root
    pub absolute: bool,
    /// Parsed path steps
    pub steps: Vec<PathStep>,
}

impl LocationPath {
    /// Compile an XPath expression
    pub fn compile(xpath: &str) -> Result<Self> {
        let trimmed = xpath.trim();
        if trimmed.is_empty() {
            return Err(Error::XPath("empty expression".to_string()));
        }
        let steps = split_path(trimmed)
            .into_iter()
            .map(PathStep::parse)
            .collect::<Result<Vec<_>>>()?;

        if let Some(pos) = steps.iter().position(|s| s.kind == PathStepKind::Attribute) {
            if pos + 1 != steps.len() {
                return Err(Error::XPath(format!(
                    "attribute step must be the last step in '{}'",
                    trimmed
                )));
            }
        }

        Ok(Self {
            xpath: trimmed.to_string(),
            absolute: trimmed.starts_with('/'),
            steps,
        })
    }

    /// Get the XPath expression
    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    /// Get the parsed steps
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Check if this path searches descendants anywhere
    pub fn is_descendant(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.kind == PathStepKind::DescendantOrSelf)
    }
}

/// A single step in an XPath path expression
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    /// The kind of step
    pub kind: PathStepKind,
    /// The local name, `*` for any
    pub name: String,
    /// Optional namespace prefix
    pub prefix: Option<String>,
    /// Predicates, applied in order
    pub predicates: Vec<Predicate>,
}

impl PathStep {
    fn bare(kind: PathStepKind) -> Self {
        Self {
            kind,
            name: String::new(),
            prefix: None,
            predicates: Vec::new(),
        }
    }

    /// Parse a step from a string
    pub fn parse(step: &str) -> Result<Self> {
        let step = step.trim();

        match step {
            "." | "self::node()" => return Ok(Self::bare(PathStepKind::Self_)),
            ".." | "parent::node()" => return Ok(Self::bare(PathStepKind::Parent)),
            ".//" => return Ok(Self::bare(PathStepKind::DescendantOrSelf)),
            _ => {}
        }

        let (kind, rest) = if let Some(rest) = step.strip_prefix('@') {
            (PathStepKind::Attribute, rest)
        } else if let Some(rest) = step.strip_prefix("attribute::") {
            (PathStepKind::Attribute, rest)
        } else if let Some(rest) = step.strip_prefix("child::") {
            (PathStepKind::Child, rest)
        } else {
            (PathStepKind::Child, step)
        };

        let (name_part, predicates) = match rest.find('[') {
            Some(bracket) => (&rest[..bracket], parse_predicates(&rest[bracket..])?),
            None => (rest, Vec::new()),
        };

        let kind = match (kind, name_part) {
            (PathStepKind::Child, "text()") => PathStepKind::Text,
            (PathStepKind::Child, "node()") => PathStepKind::AnyNode,
            (kind, _) => kind,
        };

        if matches!(kind, PathStepKind::Text | PathStepKind::AnyNode) {
            return Ok(Self {
                predicates,
                ..Self::bare(kind)
            });
        }

        if name_part.is_empty() || name_part.contains('(') {
            return Err(Error::XPath(format!("unsupported step '{}'", step)));
        }

        let (prefix, name) = split_qname(name_part);
        if name != "*" && !is_ncname(name) {
            return Err(Error::XPath(format!("invalid name test '{}'", name_part)));
        }

        Ok(Self {
            kind,
            name: name.to_string(),
            prefix: prefix.map(str::to_string),
            predicates,
        })
    }

    /// Create a child step
    pub fn child(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::bare(PathStepKind::Child)
        }
    }

    /// Set the prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Check if this step matches any element (*)
    pub fn is_wildcard(&self) -> bool {
        self.name == "*"
    }
}

/// Kind of path step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStepKind {
    /// Child axis (default)
    Child,
    /// Attribute axis (@)
    Attribute,
    /// Descendant-or-self axis (//)
    DescendantOrSelf,
    /// Self axis (.)
    Self_,
    /// Parent axis (..)
    Parent,
    /// Child text nodes (text())
    Text,
    /// Any child node (node())
    AnyNode,
}

/// Step predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `[n]`, 1-based position among the step's matches
    Position(usize),
    /// `[@name]`
    HasAttribute(String),
    /// `[@name='value']`
    AttributeEquals(String, String),
}

fn parse_predicates(mut rest: &str) -> Result<Vec<Predicate>> {
    let mut predicates = Vec::new();
    while !rest.is_empty() {
        let body_end = rest
            .find(']')
            .ok_or_else(|| Error::XPath(format!("unterminated predicate '{}'", rest)))?;
        if !rest.starts_with('[') {
            return Err(Error::XPath(format!("unexpected text '{}'", rest)));
        }
        predicates.push(Predicate::parse(&rest[1..body_end])?);
        rest = &rest[body_end + 1..];
    }
    Ok(predicates)
}

impl Predicate {
    fn parse(body: &str) -> Result<Self> {
        let body = body.trim();
        if let Ok(position) = body.parse::<usize>() {
            if position == 0 {
                return Err(Error::XPath("positions start at 1".to_string()));
            }
            return Ok(Self::Position(position));
        }
        if let Some(attr) = body.strip_prefix('@') {
            return match attr.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim();
                    let unquoted = value
                        .strip_prefix('\'')
                        .and_then(|v| v.strip_suffix('\''))
                        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                        .ok_or_else(|| {
                            Error::XPath(format!("predicate value must be quoted: {}", value))
                        })?;
                    Ok(Self::AttributeEquals(
                        name.trim().to_string(),
                        unquoted.to_string(),
                    ))
                }
                None => Ok(Self::HasAttribute(attr.trim().to_string())),
            };
        }
        Err(Error::XPath(format!("unsupported predicate '[{}]'", body)))
    }
}

/// Split an XPath expression into path steps
///
/// Handles both `/` and `//` separators; `//` becomes a `.//` step.
pub fn split_path(path: &str) -> Vec<&str> {
    let path = path.trim();

    if path.is_empty() {
        return Vec::new();
    }
    if path == "." {
        return vec!["."];
    }

    let mut steps = Vec::new();
    let (mut current_start, mut i) = if path.starts_with(".//") {
        steps.push(".");
        steps.push(".//");
        (3, 3)
    } else if path.starts_with("./") {
        steps.push(".");
        (2, 2)
    } else if path.starts_with("//") {
        steps.push(".//");
        (2, 2)
    } else if path.starts_with('/') {
        (1, 1)
    } else {
        (0, 0)
    };

    let mut in_predicate = 0;
    let mut quote: Option<u8> = None;
    let bytes = path.as_bytes();
    let len = bytes.len();

    while i < len {
        let c = bytes[i];

        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            b'\'' | b'"' if in_predicate > 0 => quote = Some(c),
            b'[' => in_predicate += 1,
            b']' => in_predicate -= 1,
            b'/' if in_predicate == 0 => {
                if i > current_start {
                    steps.push(&path[current_start..i]);
                }

                if i + 1 < len && bytes[i + 1] == b'/' {
                    steps.push(".//");
                    current_start = i + 2;
                    i += 2;
                } else {
                    current_start = i + 1;
                    i += 1;
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    if current_start < len {
        steps.push(&path[current_start..]);
    }

    steps
}

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }

    chars.all(is_ncname_char)
}

/// Check if a character is valid in an NCName (not at start)
pub fn is_ncname_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}
