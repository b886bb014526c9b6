#![forbid(unsafe_code)]

//! Dot-delimited path expressions, parsed and validated up front.
//!
//! A [`Path`] is an immutable sequence of property names (`"obj.name"` →
//! `["obj", "name"]`). Malformed input (empty string, empty segment) is
//! rejected at parse time so resolution only ever deals with shape
//! mismatches, never with syntax. Array indices and bracket syntax are not
//! supported.

use std::fmt;
use std::str::FromStr;

/// Errors from [`Path::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The input string was empty.
    Empty,
    /// A `.`-separated segment was empty (leading, trailing, or doubled dot).
    EmptySegment { position: usize },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty path expression"),
            Self::EmptySegment { position } => {
                write!(f, "empty segment at position {position}")
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A parsed path expression: one or more property names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse a dot-delimited path expression.
    ///
    /// Guarantees at least one segment and no empty segments on success.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = Vec::new();
        for (position, segment) in input.split('.').enumerate() {
            if segment.is_empty() {
                return Err(PathError::EmptySegment { position });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// The property names, in traversal order. Never empty.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
