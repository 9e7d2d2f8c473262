//! # Streaming Validator
//!
//! Recursive descent over a [`TokenSource`] and a [`SchemaNode`] in
//! lock-step. The document is never materialized: each value is checked as
//! its events arrive and then forgotten.
//!
//! ## Findings versus failures
//!
//! Type mismatches, unknown fields, missing required fields, item-count and
//! range violations are *findings*. They are accumulated in the
//! [`ValidationReport`] (only the first [`MAX_ERROR_COUNT`] messages are
//! kept) and the scan continues to the end of the document, so every ID
//! reference is still collected.
//!
//! Malformed JSON, I/O failure and exceeding the unique-ID limit abort the
//! pass with a [`ValidationError`].
//!
//! ## ID references
//!
//! - A string node with an `id-reference` reports its value at the value's
//!   own path.
//! - An object node with an `id-reference` reports each field *name* at the
//!   field's path, after the field's value has been processed.

use serde_json::Value;
use typedobj_core::{DocumentPath, JsonEvent, ScalarValue, TokenSource};
use typedobj_idref::{IdReference, IdReferenceTracker};

use crate::error::ValidationError;
use crate::node::{
    bracket_list, ArrayNode, FieldRule, NumericRange, ObjectNode, ScalarKind, ScalarNode,
    SchemaNode,
};
use crate::report::{MetadataSelectionAnnotation, SearchableSubset, ValidationReport, MAX_ERROR_COUNT};

/// Receives findings as they are made.
///
/// All methods default to doing nothing; implement the ones you need.
pub trait ValidationObserver {
    /// A validation error, whether or not it is retained in the report.
    fn on_error(&mut self, _message: &str) {}

    /// An ID occurrence, after it was accepted by the tracker.
    fn on_id_reference(&mut self, _reference: &IdReference) {}

    /// A searchable subset annotation for an object instance.
    fn on_searchable_subset(&mut self, _location: &DocumentPath, _subset: &Value) {}

    /// A `metadata-ws` selection for an object instance.
    fn on_metadata_selection(&mut self, _location: &DocumentPath, _selection: &Value) {}
}

/// Configurable validation pass over one compiled schema.
pub struct Validator<'a> {
    schema: &'a SchemaNode,
    max_unique_ids: Option<u64>,
    observer: Option<&'a mut dyn ValidationObserver>,
}

impl<'a> Validator<'a> {
    /// A validator with no ID limit and no observer.
    pub fn new(schema: &'a SchemaNode) -> Self {
        Self {
            schema,
            max_unique_ids: None,
            observer: None,
        }
    }

    /// Fail once more than `max` unique IDs are found.
    pub fn with_max_unique_ids(mut self, max: u64) -> Self {
        self.max_unique_ids = Some(max);
        self
    }

    /// Send findings to `observer` as they are made.
    pub fn with_observer(mut self, observer: &'a mut dyn ValidationObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validate the single document read from `source`.
    pub fn validate<T: TokenSource>(self, source: T) -> Result<ValidationReport, ValidationError> {
        let ids = match self.max_unique_ids {
            Some(max) => IdReferenceTracker::with_max_unique_ids(max),
            None => IdReferenceTracker::new(),
        };
        let mut pass = Pass {
            source,
            errors: Vec::new(),
            error_count: 0,
            ids,
            subsets: Vec::new(),
            metadata: Vec::new(),
            observer: self.observer,
        };
        let first = pass.source.next_event()?;
        pass.check(self.schema, first)?;
        match pass.source.next_event()? {
            JsonEvent::EndOfStream => {}
            other => {
                return Err(ValidationError::UnexpectedEvent {
                    expected: "End of document",
                    found: other.kind_name(),
                    location: pass.source.current_path().to_string(),
                })
            }
        }
        tracing::debug!(
            errors = pass.error_count,
            ids = pass.ids.len(),
            unique_ids = pass.ids.unique_count(),
            "validation pass complete"
        );
        Ok(ValidationReport {
            type_id: None,
            errors: pass.errors,
            error_count: pass.error_count,
            ids: pass.ids,
            searchable_subsets: pass.subsets,
            metadata_selections: pass.metadata,
        })
    }
}

/// Validate `source` against `schema` with default settings.
pub fn validate<T: TokenSource>(
    source: T,
    schema: &SchemaNode,
) -> Result<ValidationReport, ValidationError> {
    Validator::new(schema).validate(source)
}

struct Pass<'o, T> {
    source: T,
    errors: Vec<String>,
    error_count: usize,
    ids: IdReferenceTracker,
    subsets: Vec<SearchableSubset>,
    metadata: Vec<MetadataSelectionAnnotation>,
    observer: Option<&'o mut dyn ValidationObserver>,
}

impl<T: TokenSource> Pass<'_, T> {
    fn error(&mut self, message: String) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_error(&message);
        }
        self.error_count += 1;
        if self.errors.len() < MAX_ERROR_COUNT {
            self.errors.push(message);
        }
    }

    fn id(&mut self, reference: IdReference) -> Result<(), ValidationError> {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_id_reference(&reference);
        }
        self.ids.add(reference)?;
        Ok(())
    }

    fn mismatch(&mut self, expected: impl std::fmt::Display, found: &JsonEvent) {
        let path = self.source.current_path();
        self.error(format!(
            "{expected} is expected but found {}, at {path}",
            found.kind_name()
        ));
    }

    /// Check the value whose first event is `first`.
    fn check(&mut self, node: &SchemaNode, first: JsonEvent) -> Result<(), ValidationError> {
        match node {
            SchemaNode::Object(object) => self.check_object(object, first),
            SchemaNode::Array(array) => self.check_array(array, first),
            SchemaNode::Scalar(scalar) => self.check_scalar(scalar, first),
        }
    }

    fn check_object(&mut self, node: &ObjectNode, first: JsonEvent) -> Result<(), ValidationError> {
        if first != JsonEvent::ObjectStart {
            self.mismatch("Object", &first);
            self.source.skip_rest_of_value(&first)?;
            return Ok(());
        }
        let object_path = self.source.current_path();
        if let Some(subset) = &node.meta.searchable_subset {
            if let Some(observer) = self.observer.as_deref_mut() {
                observer.on_searchable_subset(&object_path, subset);
            }
            self.subsets.push(SearchableSubset {
                location: object_path.clone(),
                subset: subset.clone(),
            });
        }
        if let Some(selection) = &node.meta.metadata_ws {
            if let Some(observer) = self.observer.as_deref_mut() {
                observer.on_metadata_selection(&object_path, selection);
            }
            self.metadata.push(MetadataSelectionAnnotation {
                location: object_path.clone(),
                selection: selection.clone(),
            });
        }

        let mut seen = vec![false; node.required().len()];
        loop {
            let name = match self.source.next_event()? {
                JsonEvent::ObjectEnd => break,
                JsonEvent::FieldName(name) => name,
                other => {
                    return Err(ValidationError::UnexpectedEvent {
                        expected: "Object field name",
                        found: other.kind_name(),
                        location: self.source.current_path().to_string(),
                    })
                }
            };
            let field_path = self.source.current_path();
            if let Some(index) = node.required_index(&name) {
                seen[index] = true;
            }
            let value = self.source.next_event()?;
            match node.field_rule(&name) {
                FieldRule::Typed(child) => self.check(child, value)?,
                FieldRule::Unchecked => self.source.skip_rest_of_value(&value)?,
                FieldRule::Disallowed => {
                    self.error(format!(
                        "Object field name [{name}] is not in allowed object properties: {}, at {field_path}",
                        node.property_list()
                    ));
                    self.source.skip_rest_of_value(&value)?;
                }
            }
            if let Some(spec) = &node.meta.id_reference {
                self.id(IdReference::field_name(
                    spec.id_type.clone(),
                    name,
                    spec.attributes.clone(),
                    field_path,
                ))?;
            }
        }

        if seen.iter().any(|s| !s) {
            let missing = bracket_list(
                node.required()
                    .iter()
                    .zip(&seen)
                    .filter(|(_, s)| !**s)
                    .map(|(name, _)| name.as_str()),
            );
            self.error(format!(
                "Object doesn't have required fields : {missing}, at {object_path}"
            ));
        }
        Ok(())
    }

    fn check_array(&mut self, node: &ArrayNode, first: JsonEvent) -> Result<(), ValidationError> {
        if first != JsonEvent::ArrayStart {
            self.mismatch("Array", &first);
            self.source.skip_rest_of_value(&first)?;
            return Ok(());
        }
        let array_path = self.source.current_path();
        let mut count = 0usize;
        let mut overflowed = false;
        loop {
            let event = self.source.next_event()?;
            if event == JsonEvent::ArrayEnd {
                break;
            }
            if let Some(max) = node.max_items {
                if count >= max && !overflowed {
                    overflowed = true;
                    self.error(format!("Array contains more than {max} items, at {array_path}"));
                }
            }
            match node.item(count).filter(|_| !overflowed) {
                Some(child) => self.check(child, event)?,
                None => self.source.skip_rest_of_value(&event)?,
            }
            count += 1;
        }
        if let Some(min) = node.min_items {
            if count < min {
                self.error(format!("Array contains less than {min} items, at {array_path}"));
            }
        }
        Ok(())
    }

    fn check_scalar(&mut self, node: &ScalarNode, first: JsonEvent) -> Result<(), ValidationError> {
        let id_spec = match node.kind {
            ScalarKind::String => node.meta.id_reference.as_ref(),
            ScalarKind::Integer | ScalarKind::Number => None,
        };
        let accepted = match (&node.kind, &first) {
            (ScalarKind::String, JsonEvent::Scalar(ScalarValue::String(_))) => true,
            (ScalarKind::Integer, JsonEvent::Scalar(ScalarValue::Integer(_))) => true,
            (
                ScalarKind::Number,
                JsonEvent::Scalar(ScalarValue::Integer(_) | ScalarValue::Float(_)),
            ) => true,
            (_, JsonEvent::Scalar(ScalarValue::Null)) => id_spec.is_none(),
            _ => false,
        };
        let path = self.source.current_path();

        if !accepted {
            if id_spec.is_some() {
                self.error(format!(
                    "instance type ({}) not allowed for ID reference (allowed: [\"string\"]), at {path}",
                    first.kind_name()
                ));
            } else {
                self.mismatch(node.kind, &first);
            }
            self.source.skip_rest_of_value(&first)?;
            return Ok(());
        }

        match first {
            JsonEvent::Scalar(ScalarValue::String(id)) => {
                if let Some(spec) = id_spec {
                    self.id(IdReference::value(
                        spec.id_type.clone(),
                        id,
                        spec.attributes.clone(),
                        path,
                    ))?;
                }
            }
            JsonEvent::Scalar(ScalarValue::Integer(raw) | ScalarValue::Float(raw)) => {
                if let Some(range) = &node.range {
                    for message in range_violations(range, &raw) {
                        self.error(format!("{message} at {path}"));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn inclusivity(exclusive: bool) -> &'static str {
    if exclusive {
        "exclusive"
    } else {
        "inclusive"
    }
}

/// Range messages for a numeric value, without location.
fn range_violations(range: &NumericRange, raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    match range {
        NumericRange::Integer { minimum, maximum } => {
            let Ok(value) = raw.parse::<i128>() else {
                out.push("Number value given cannot be parsed as an integer".to_string());
                return out;
            };
            if let Some(min) = minimum {
                let below = if min.exclusive { value <= min.value } else { value < min.value };
                if below {
                    out.push(format!(
                        "Number value given ({raw}) was less than minimum value accepted ({}, {})",
                        min.value,
                        inclusivity(min.exclusive)
                    ));
                }
            }
            if let Some(max) = maximum {
                let above = if max.exclusive { value >= max.value } else { value > max.value };
                if above {
                    out.push(format!(
                        "Number value given ({raw}) was more than maximum value accepted ({}, {})",
                        max.value,
                        inclusivity(max.exclusive)
                    ));
                }
            }
        }
        NumericRange::Number { minimum, maximum } => {
            let Ok(value) = raw.parse::<f64>() else {
                out.push("Number value given cannot be parsed as a number".to_string());
                return out;
            };
            if let Some(min) = minimum {
                let ok = if min.exclusive { value > min.value } else { value >= min.value };
                if !ok {
                    out.push(format!(
                        "Number value given ({raw}) was less than minimum value accepted ({}, {})",
                        min.value,
                        inclusivity(min.exclusive)
                    ));
                }
            }
            if let Some(max) = maximum {
                let ok = if max.exclusive { value < max.value } else { value <= max.value };
                if !ok {
                    out.push(format!(
                        "Number value given ({raw}) was more than maximum value accepted ({}, {})",
                        max.value,
                        inclusivity(max.exclusive)
                    ));
                }
            }
        }
    }
    out
}
