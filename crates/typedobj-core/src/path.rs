//! # Document Paths
//!
//! A [`DocumentPath`] is a snapshot of the token stream's path stack: the
//! sequence of object field names and array indices leading from the
//! document root to the current value.
//!
//! Paths render as `/`-joined JSON-pointer strings (`/m/z`, `/att/0`), with
//! `~` escaped as `~0` and `/` as `~1` inside field names. The root renders
//! as `/`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step in a document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathSegment {
    /// An object field name.
    Key(String),
    /// A zero-based array position.
    Index(usize),
}

impl PathSegment {
    /// The unescaped text of this segment.
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Self::Key(k) => std::borrow::Cow::Borrowed(k.as_str()),
            Self::Index(i) => std::borrow::Cow::Owned(i.to_string()),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(&escape_pointer_segment(k)),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Escape a field name for use in a JSON pointer.
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// A location inside a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentPath(Vec<PathSegment>);

impl DocumentPath {
    /// The document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from segments.
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Segments from the root down.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments; zero at the root.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the document root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment.
    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// Remove the last segment.
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut next = self.clone();
        next.push(segment);
        next
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
