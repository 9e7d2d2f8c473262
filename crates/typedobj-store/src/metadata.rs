//! # Object Metadata Extraction
//!
//! A type may declare a `metadata-ws` selection on its root object: a map
//! from metadata name to a field expression. Expressions are dotted field
//! paths (`info.name`), optionally wrapped in `length(...)`.
//!
//! - A plain expression on a scalar yields the scalar's text. Strings are
//!   unescaped and `null` yields `null`. Objects and arrays yield nothing.
//! - `length(...)` yields the entry count of an object or array, the
//!   character count of a string, or `NaN` for `null`. On a number or
//!   boolean it is an error.
//! - Fields missing from the document are left out of the result.
//!
//! Selections never descend into arrays. The names and values extracted are
//! charged against a byte limit and extraction fails once they exceed it.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use typedobj_core::{JsonEvent, ScalarValue, TokenSource};

use crate::error::MetadataError;

const LENGTH_PREFIX: &str = "length(";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SelectionNode {
    children: BTreeMap<String, SelectionNode>,
    values: Vec<String>,
    lengths: Vec<String>,
}

impl SelectionNode {
    fn field_list(&self) -> String {
        let names: Vec<&str> = self.children.keys().map(String::as_str).collect();
        format!("[{}]", names.join(", "))
    }
}

/// A compiled `metadata-ws` selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSelection {
    root: SelectionNode,
}

impl MetadataSelection {
    /// Compile `(name, expression)` pairs.
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut root = SelectionNode::default();
        for (name, expression) in entries {
            let expression = expression.trim();
            let (fields, length) = match expression
                .strip_prefix(LENGTH_PREFIX)
                .and_then(|rest| rest.strip_suffix(')'))
            {
                Some(inner) => (inner, true),
                None => (expression, false),
            };
            let mut node = &mut root;
            for field in fields.split('.') {
                node = node.children.entry(field.to_string()).or_default();
            }
            if length {
                node.lengths.push(name.to_string());
            } else {
                node.values.push(name.to_string());
            }
        }
        Self { root }
    }

    /// Compile a selection as declared in a schema: an object whose values
    /// are expression strings.
    pub fn from_value(value: &Value) -> Result<Self, MetadataError> {
        let entries = value.as_object().ok_or_else(|| {
            MetadataError::InvalidSelection("selection must be a JSON object".to_string())
        })?;
        let mut pairs = Vec::with_capacity(entries.len());
        for (name, expression) in entries {
            let expression = expression.as_str().ok_or_else(|| {
                MetadataError::InvalidSelection(format!(
                    "expression for metadata '{name}' must be a string"
                ))
            })?;
            pairs.push((name.as_str(), expression));
        }
        Ok(Self::new(pairs))
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

/// Metadata names and their extracted values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractedMetadata(BTreeMap<String, String>);

impl ExtractedMetadata {
    /// The value extracted for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of metadata entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Total UTF-8 bytes of every name and value.
    pub fn byte_size(&self) -> u64 {
        self.0.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum()
    }

    /// The underlying map.
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

struct Collector {
    saved: BTreeMap<String, String>,
    size: u64,
    limit: u64,
}

impl Collector {
    fn save(&mut self, names: &[String], value: &str) -> Result<(), MetadataError> {
        for name in names {
            if let Some(old) = self.saved.insert(name.clone(), value.to_string()) {
                self.size -= (name.len() + old.len()) as u64;
            }
            self.size += (name.len() + value.len()) as u64;
            if self.size > self.limit {
                return Err(MetadataError::ExceededMaxSize { limit: self.limit });
            }
        }
        Ok(())
    }
}

/// Extract the metadata `selection` names from the document in `source`.
///
/// Fails with [`MetadataError::ExceededMaxSize`] once names and values
/// together exceed `max_size` bytes.
pub fn extract_metadata<T: TokenSource>(
    mut source: T,
    selection: &MetadataSelection,
    max_size: u64,
) -> Result<ExtractedMetadata, MetadataError> {
    if selection.is_empty() {
        return Ok(ExtractedMetadata::default());
    }
    let mut collector = Collector {
        saved: BTreeMap::new(),
        size: 0,
        limit: max_size,
    };
    let first = source.next_event()?;
    visit(&mut source, first, &selection.root, &mut collector)?;
    tracing::debug!(
        entries = collector.saved.len(),
        size = collector.size,
        "metadata extracted"
    );
    Ok(ExtractedMetadata(collector.saved))
}

fn visit<T: TokenSource>(
    source: &mut T,
    first: JsonEvent,
    node: &SelectionNode,
    out: &mut Collector,
) -> Result<(), MetadataError> {
    match first {
        JsonEvent::ObjectStart => {
            let mut count = 0u64;
            loop {
                match source.next_event()? {
                    JsonEvent::ObjectEnd => break,
                    JsonEvent::FieldName(name) => {
                        count += 1;
                        let value = source.next_event()?;
                        match node.children.get(&name) {
                            Some(child) => visit(source, value, child, out)?,
                            None => source.skip_rest_of_value(&value)?,
                        }
                    }
                    other => return Err(unexpected(source, &other)),
                }
            }
            out.save(&node.lengths, &count.to_string())
        }
        JsonEvent::ArrayStart => {
            if !node.children.is_empty() {
                return Err(MetadataError::ArrayHasFields {
                    fields: node.field_list(),
                    location: source.current_path(),
                });
            }
            let mut count = 0u64;
            loop {
                match source.next_event()? {
                    JsonEvent::ArrayEnd => break,
                    JsonEvent::EndOfStream => {
                        return Err(unexpected(source, &JsonEvent::EndOfStream))
                    }
                    element => {
                        count += 1;
                        source.skip_rest_of_value(&element)?;
                    }
                }
            }
            out.save(&node.lengths, &count.to_string())
        }
        JsonEvent::Scalar(value) => {
            if !node.children.is_empty() {
                return Err(MetadataError::ScalarHasFields {
                    location: source.current_path(),
                });
            }
            match &value {
                ScalarValue::String(s) => out.save(&node.lengths, &s.chars().count().to_string())?,
                ScalarValue::Null => out.save(&node.lengths, "NaN")?,
                _ if !node.lengths.is_empty() => {
                    return Err(MetadataError::LengthOfScalar {
                        location: source.current_path(),
                    })
                }
                _ => {}
            }
            out.save(&node.values, value.text())
        }
        other => Err(unexpected(source, &other)),
    }
}

fn unexpected<T: TokenSource>(source: &T, found: &JsonEvent) -> MetadataError {
    MetadataError::UnexpectedEvent {
        found: found.kind_name(),
        location: source.current_path(),
    }
}
