//! # Compact JSON Writer
//!
//! Emits compact JSON (no insignificant whitespace) event by event. This is
//! the single encoder behind relabeling, sorting and subdata extraction, so
//! every byte the engine hashes passes through the same escaping rules:
//!
//! - `"` and `\` are backslash-escaped;
//! - `\b`, `\t`, `\n`, `\f`, `\r` use their short forms;
//! - other control characters become `\u00XX` (uppercase hex);
//! - everything else, including non-ASCII, is written as raw UTF-8.
//!
//! Numbers are written as their original text.

use std::io::Write;

use crate::stream::{JsonEvent, ScalarValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Object { first: bool },
    Array { first: bool },
}

/// Compact, streaming JSON encoder.
pub struct JsonWriter<W> {
    out: W,
    stack: Vec<Context>,
    written: u64,
}

impl<W: Write> JsonWriter<W> {
    /// Write into `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            stack: Vec::new(),
            written: 0,
        }
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> std::io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.out.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Emit the separator owed before a value in the current context.
    fn before_value(&mut self) -> std::io::Result<()> {
        let sep = match self.stack.last_mut() {
            Some(Context::Array { first }) => {
                let sep = !*first;
                *first = false;
                sep
            }
            Some(Context::Object { .. }) | None => false,
        };
        if sep {
            self.raw(b",")?;
        }
        Ok(())
    }

    /// `{`
    pub fn begin_object(&mut self) -> std::io::Result<()> {
        self.before_value()?;
        self.stack.push(Context::Object { first: true });
        self.raw(b"{")
    }

    /// `}`
    pub fn end_object(&mut self) -> std::io::Result<()> {
        self.stack.pop();
        self.raw(b"}")
    }

    /// `[`
    pub fn begin_array(&mut self) -> std::io::Result<()> {
        self.before_value()?;
        self.stack.push(Context::Array { first: true });
        self.raw(b"[")
    }

    /// `]`
    pub fn end_array(&mut self) -> std::io::Result<()> {
        self.stack.pop();
        self.raw(b"]")
    }

    /// An object key followed by `:`.
    pub fn field_name(&mut self, name: &str) -> std::io::Result<()> {
        let sep = match self.stack.last_mut() {
            Some(Context::Object { first }) => {
                let sep = !*first;
                *first = false;
                sep
            }
            _ => false,
        };
        if sep {
            self.raw(b",")?;
        }
        self.quoted(name)?;
        self.raw(b":")
    }

    /// A string value.
    pub fn string(&mut self, value: &str) -> std::io::Result<()> {
        self.before_value()?;
        self.quoted(value)
    }

    /// A number written exactly as given.
    pub fn number(&mut self, raw: &str) -> std::io::Result<()> {
        self.before_value()?;
        self.raw(raw.as_bytes())
    }

    /// `true` / `false`.
    pub fn boolean(&mut self, value: bool) -> std::io::Result<()> {
        self.before_value()?;
        let text: &[u8] = if value { b"true" } else { b"false" };
        self.raw(text)
    }

    /// `null`.
    pub fn null(&mut self) -> std::io::Result<()> {
        self.before_value()?;
        self.raw(b"null")
    }

    /// Write any scalar.
    pub fn scalar(&mut self, value: &ScalarValue) -> std::io::Result<()> {
        match value {
            ScalarValue::String(s) => self.string(s),
            ScalarValue::Integer(n) | ScalarValue::Float(n) => self.number(n),
            ScalarValue::Bool(b) => self.boolean(*b),
            ScalarValue::Null => self.null(),
        }
    }

    /// Re-emit one stream event. `EndOfStream` writes nothing.
    pub fn event(&mut self, event: &JsonEvent) -> std::io::Result<()> {
        match event {
            JsonEvent::ObjectStart => self.begin_object(),
            JsonEvent::ObjectEnd => self.end_object(),
            JsonEvent::ArrayStart => self.begin_array(),
            JsonEvent::ArrayEnd => self.end_array(),
            JsonEvent::FieldName(name) => self.field_name(name),
            JsonEvent::Scalar(value) => self.scalar(value),
            JsonEvent::EndOfStream => Ok(()),
        }
    }

    fn quoted(&mut self, text: &str) -> std::io::Result<()> {
        let escaped = escape_json_string(text);
        self.raw(b"\"")?;
        self.raw(escaped.as_bytes())?;
        self.raw(b"\"")
    }
}

/// Escape string content for a JSON string literal (without the quotes).
pub fn escape_json_string(text: &str) -> std::borrow::Cow<'_, str> {
    if !text.bytes().any(|b| b < 0x20 || b == b'"' || b == b'\\') {
        return std::borrow::Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x08' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\x0C' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    std::borrow::Cow::Owned(out)
}

/// Length in bytes of `text` once encoded as a JSON string literal,
/// including the surrounding quotes.
pub fn encoded_string_len(text: &str) -> u64 {
    escape_json_string(text).len() as u64 + 2
}
