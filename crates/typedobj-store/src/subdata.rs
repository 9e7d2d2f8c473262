//! # Subdata Extraction
//!
//! Copies selected parts of a document into a new compact document, in a
//! single streaming pass. A [`SubsetSelection`] is a set of JSON pointers;
//! together they form a selection tree in which a node with no children
//! selects its whole value.
//!
//! - `*` selects every field of an object and `[*]` every element of an
//!   array. A wildcard cannot share a level with named fields or positions.
//!   Trailing wildcards select nothing more than their parent and are
//!   dropped.
//! - Array levels must name positions as integers.
//! - Unselected fields and elements are skipped without being written.
//! - A selected field missing from an object is an error only with
//!   `strict_maps`; a selected position past the end of an array is an error
//!   unless `strict_arrays` is turned off.
//! - Descending into a scalar is always an error.
//!
//! When one path selects a node whole and another selects only part of it,
//! the whole node wins.

use std::io::Write;

use serde::{Deserialize, Serialize};
use typedobj_core::{DocumentPath, JsonEvent, JsonWriter, PathSegment, TokenSource};

use crate::error::{ExtractionError, PayloadError};

const ALL_FIELDS: &str = "*";
const ALL_ELEMENTS: &str = "[*]";

/// JSON pointer paths to extract, plus strictness rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetSelection {
    paths: Vec<String>,
    #[serde(default)]
    strict_maps: bool,
    #[serde(default = "default_strict_arrays")]
    strict_arrays: bool,
}

fn default_strict_arrays() -> bool {
    true
}

impl SubsetSelection {
    /// Select `paths` with lenient maps and strict arrays.
    pub fn new<I, S>(paths: I) -> Result<Self, ExtractionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            return Err(ExtractionError::EmptyPaths);
        }
        for path in &paths {
            parse_pointer(path)?;
        }
        Ok(Self {
            paths,
            strict_maps: false,
            strict_arrays: default_strict_arrays(),
        })
    }

    /// Fail when a selected map field is absent.
    pub fn with_strict_maps(mut self, strict: bool) -> Self {
        self.strict_maps = strict;
        self
    }

    /// Fail when a selected array position is absent.
    pub fn with_strict_arrays(mut self, strict: bool) -> Self {
        self.strict_arrays = strict;
        self
    }

    /// The selected paths as given.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Whether missing map fields are errors.
    pub fn strict_maps(&self) -> bool {
        self.strict_maps
    }

    /// Whether missing array positions are errors.
    pub fn strict_arrays(&self) -> bool {
        self.strict_arrays
    }

    fn tree(&self) -> Result<SelectionNode, ExtractionError> {
        if self.paths.is_empty() {
            return Err(ExtractionError::EmptyPaths);
        }
        let mut root = SelectionNode::default();
        for path in &self.paths {
            let mut segments = parse_pointer(path)?;
            while segments.len() > 1
                && segments
                    .last()
                    .map_or(false, |s| s == ALL_FIELDS || s == ALL_ELEMENTS)
            {
                segments.pop();
            }
            root.add(&segments);
        }
        Ok(root)
    }
}

/// Split a JSON pointer into unescaped segments.
///
/// Leading and trailing `/` are ignored, so `""` and `"/"` both address
/// the whole document.
pub fn parse_pointer(path: &str) -> Result<Vec<String>, ExtractionError> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('/')
        .map(|segment| unescape_segment(path, segment))
        .collect()
}

fn unescape_segment(path: &str, segment: &str) -> Result<String, ExtractionError> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.char_indices().peekable();
    while let Some((at, c)) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, '0')) => out.push('~'),
            Some((_, '1')) => out.push('/'),
            _ => {
                return Err(ExtractionError::BadPointerEscape {
                    path: path.to_string(),
                    marked: format!("{}[->]{}", &segment[..at], &segment[at..]),
                })
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Default)]
struct SelectionNode {
    whole: bool,
    children: Vec<(String, SelectionNode)>,
}

impl SelectionNode {
    fn add(&mut self, segments: &[String]) {
        if self.whole {
            return;
        }
        let Some((first, rest)) = segments.split_first() else {
            self.whole = true;
            self.children.clear();
            return;
        };
        let index = match self.children.iter().position(|(k, _)| k == first) {
            Some(i) => i,
            None => {
                self.children.push((first.clone(), SelectionNode::default()));
                self.children.len() - 1
            }
        };
        self.children[index].1.add(rest);
    }

    fn selects_all(&self) -> bool {
        self.whole || self.children.is_empty()
    }

    fn child(&self, key: &str) -> Option<&SelectionNode> {
        self.children.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    /// The single wildcard child, if this level uses `wildcard`.
    fn wildcard(&self, wildcard: &str, location: &DocumentPath) -> Result<Option<&SelectionNode>, ExtractionError> {
        match self.child(wildcard) {
            Some(_) if self.children.len() > 1 => Err(ExtractionError::MixedWildcard {
                location: location.clone(),
            }),
            found => Ok(found),
        }
    }
}

/// Write the parts of the document read from `stream` chosen by
/// `selection` into `out` as compact JSON.
pub fn extract<T: TokenSource, W: Write>(
    mut stream: T,
    selection: &SubsetSelection,
    out: W,
) -> Result<W, PayloadError> {
    let tree = selection.tree()?;
    let mut writer = JsonWriter::new(out);
    let first = stream.next_event()?;
    let mut extractor = Extractor {
        stream: &mut stream,
        writer: &mut writer,
        selection,
        path: DocumentPath::root(),
    };
    extractor.value(first, &tree)?;
    Ok(writer.into_inner()?)
}

/// Write the whole value starting with `first` to `out`.
pub(crate) fn copy_value<T: TokenSource + ?Sized, W: Write>(
    stream: &mut T,
    first: JsonEvent,
    out: &mut JsonWriter<W>,
) -> Result<(), PayloadError> {
    let mut depth = usize::from(first.is_container_start());
    out.event(&first)?;
    while depth > 0 {
        let event = stream.next_event()?;
        match event {
            JsonEvent::ObjectStart | JsonEvent::ArrayStart => depth += 1,
            JsonEvent::ObjectEnd | JsonEvent::ArrayEnd => depth -= 1,
            JsonEvent::EndOfStream => break,
            _ => {}
        }
        out.event(&event)?;
    }
    Ok(())
}

struct Extractor<'a, T, W> {
    stream: &'a mut T,
    writer: &'a mut JsonWriter<W>,
    selection: &'a SubsetSelection,
    path: DocumentPath,
}

impl<T: TokenSource, W: Write> Extractor<'_, T, W> {
    fn value(&mut self, first: JsonEvent, node: &SelectionNode) -> Result<(), PayloadError> {
        if node.selects_all() {
            return copy_value(self.stream, first, self.writer);
        }
        match first {
            JsonEvent::ObjectStart => self.object(node),
            JsonEvent::ArrayStart => self.array(node),
            _ => Err(ExtractionError::ScalarHasChildren {
                location: self.path.clone(),
            }
            .into()),
        }
    }

    fn object(&mut self, node: &SelectionNode) -> Result<(), PayloadError> {
        let all = node.wildcard(ALL_FIELDS, &self.path)?;
        let mut seen = vec![false; node.children.len()];
        self.writer.begin_object()?;
        loop {
            let name = match self.stream.next_event()? {
                JsonEvent::ObjectEnd => break,
                JsonEvent::FieldName(name) => name,
                other => return Err(self.unexpected(&other)),
            };
            let child = match all {
                Some(child) => Some(child),
                None => node.children.iter().position(|(k, _)| *k == name).map(|i| {
                    seen[i] = true;
                    &node.children[i].1
                }),
            };
            let first = self.stream.next_event()?;
            match child {
                Some(child) => {
                    self.writer.field_name(&name)?;
                    self.path.push(PathSegment::Key(name));
                    self.value(first, child)?;
                    self.path.pop();
                }
                None => self.stream.skip_rest_of_value(&first)?,
            }
        }
        self.writer.end_object()?;

        if all.is_none() && self.selection.strict_maps {
            if let Some(i) = seen.iter().position(|s| !s) {
                let key = node.children[i].0.clone();
                return Err(ExtractionError::MissingField {
                    location: self.path.child(PathSegment::Key(key.clone())),
                    key,
                }
                .into());
            }
        }
        Ok(())
    }

    fn array(&mut self, node: &SelectionNode) -> Result<(), PayloadError> {
        let all = node.wildcard(ALL_ELEMENTS, &self.path)?;
        let mut positions: Vec<(usize, &SelectionNode)> = Vec::new();
        if all.is_none() {
            for (key, child) in &node.children {
                let index = key.parse::<usize>().map_err(|_| ExtractionError::NonIntegerElement {
                    element: key.clone(),
                    location: self.path.clone(),
                })?;
                positions.push((index, child));
            }
        }
        let mut seen = vec![false; positions.len()];

        self.writer.begin_array()?;
        let mut index = 0usize;
        loop {
            let first = self.stream.next_event()?;
            if first == JsonEvent::ArrayEnd {
                break;
            }
            let child = match all {
                Some(child) => Some(child),
                None => positions.iter().position(|(p, _)| *p == index).map(|i| {
                    seen[i] = true;
                    positions[i].1
                }),
            };
            match child {
                Some(child) => {
                    self.path.push(PathSegment::Index(index));
                    self.value(first, child)?;
                    self.path.pop();
                }
                None => self.stream.skip_rest_of_value(&first)?,
            }
            index += 1;
        }
        self.writer.end_array()?;

        if self.selection.strict_arrays {
            if let Some(i) = seen.iter().position(|s| !s) {
                let index = positions[i].0;
                return Err(ExtractionError::MissingElement {
                    index,
                    location: self.path.child(PathSegment::Index(index)),
                }
                .into());
            }
        }
        Ok(())
    }

    fn unexpected(&self, event: &JsonEvent) -> PayloadError {
        typedobj_core::TokenError::Malformed {
            offset: 0,
            reason: format!("unexpected {} at {}", event.kind_name(), self.path),
        }
        .into()
    }
}
