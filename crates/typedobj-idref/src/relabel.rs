//! # Relabeling Pass
//!
//! A second streaming pass over the original document that substitutes
//! mapped IDs. Only string values and field names at locations recorded by
//! the tracker are candidates; anything else passes through untouched, and
//! the document's structure is never altered. Output is compact JSON.
//!
//! The pass also measures the relabeled output and records whether every
//! object's keys already came out in strictly increasing UTF-8 byte order.
//! A naturally sorted document needs no sort pass at all.

use std::io::Write;

use typedobj_core::{JsonEvent, JsonWriter, ScalarValue, TokenSource};

use crate::error::RelabelError;
use crate::mapping::IdMapping;
use crate::tracker::IdReferenceTracker;

/// Measurements taken while writing relabeled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelabelOutcome {
    /// Bytes written.
    pub size: u64,
    /// Whether every object's keys were already strictly ascending.
    pub naturally_sorted: bool,
    /// Number of IDs replaced.
    pub replaced: usize,
}

/// Relabel the document read from `stream` into `out`.
///
/// The stream is consumed: a relabel pass owns its cursor for its whole
/// duration.
pub fn relabel<T, W>(
    mut stream: T,
    tracker: &IdReferenceTracker,
    mapping: &IdMapping,
    out: W,
) -> Result<RelabelOutcome, RelabelError>
where
    T: TokenSource,
    W: Write,
{
    let mut writer = JsonWriter::new(out);
    let mut last_keys: Vec<Option<String>> = Vec::new();
    let mut naturally_sorted = true;
    let mut replaced = 0usize;
    let active = !mapping.is_empty() && !tracker.is_empty();

    loop {
        let event = stream.next_event()?;
        match event {
            JsonEvent::EndOfStream => break,
            JsonEvent::ObjectStart => {
                last_keys.push(None);
                writer.begin_object()?;
            }
            JsonEvent::ObjectEnd => {
                last_keys.pop();
                writer.end_object()?;
            }
            JsonEvent::FieldName(name) => {
                let name = if active {
                    substitute(&stream, tracker, mapping, name, true, &mut replaced)
                } else {
                    name
                };
                if let Some(last) = last_keys.last_mut() {
                    if let Some(previous) = last.as_deref() {
                        if previous.as_bytes() >= name.as_bytes() {
                            naturally_sorted = false;
                        }
                    }
                    *last = Some(name.clone());
                }
                writer.field_name(&name)?;
            }
            JsonEvent::Scalar(ScalarValue::String(value)) if active => {
                let value = substitute(&stream, tracker, mapping, value, false, &mut replaced);
                writer.string(&value)?;
            }
            other => writer.event(&other)?,
        }
    }

    let size = writer.bytes_written();
    writer.into_inner()?;
    tracing::debug!(size, naturally_sorted, replaced, "relabel pass complete");
    Ok(RelabelOutcome {
        size,
        naturally_sorted,
        replaced,
    })
}

fn substitute<T: TokenSource>(
    stream: &T,
    tracker: &IdReferenceTracker,
    mapping: &IdMapping,
    text: String,
    is_field_name: bool,
    replaced: &mut usize,
) -> String {
    let location = stream.current_path();
    let Some(reference) = tracker.at(&location, is_field_name) else {
        return text;
    };
    if reference.id != text {
        return text;
    }
    match mapping.lookup(&reference.id_type, &text) {
        Some(replacement) => {
            *replaced += 1;
            replacement.to_string()
        }
        None => text,
    }
}

/// Relabel into a fresh buffer.
pub fn relabel_to_vec<T: TokenSource>(
    stream: T,
    tracker: &IdReferenceTracker,
    mapping: &IdMapping,
) -> Result<(Vec<u8>, RelabelOutcome), RelabelError> {
    let mut buf = Vec::new();
    let outcome = relabel(stream, tracker, mapping, &mut buf)?;
    Ok((buf, outcome))
}
