//! # Token Stream — Path-Tracking JSON Event Cursor
//!
//! [`TokenStream`] turns lexer tokens into a lazy, finite, single-pass
//! sequence of [`JsonEvent`]s while maintaining the path stack: where in the
//! document the cursor currently is.
//!
//! ## Path discipline
//!
//! - `ObjectStart` pushes a placeholder; each `FieldName` overwrites it.
//! - `ArrayStart` pushes an array frame; each element advances its index,
//!   so the first element sits at index `0`.
//! - `ObjectEnd` / `ArrayEnd` pop.
//!
//! Placeholders and not-yet-started arrays do not render, so at an
//! `ObjectStart` the current path is the location of the object itself.
//!
//! ## Rooted streams
//!
//! [`TokenStream::with_root`] fast-forwards to a sub-path (`"a/2/b"`) and
//! then exposes only that subtree, reporting [`JsonEvent::EndOfStream`] once
//! the subtree closes.
//!
//! ## Ownership
//!
//! A stream is not `Clone`. Every consumer opens its own stream from a
//! [`crate::JsonSource`], so two logical operations can never interleave
//! reads on one cursor.

use std::collections::VecDeque;
use std::io::BufRead;

use crate::error::TokenError;
use crate::lexer::{Lexer, ReadBytes, Token};
use crate::path::{DocumentPath, PathSegment};

/// Deepest container nesting any pass over a document accepts.
///
/// Counts open objects and arrays, so a document of exactly this many nested
/// containers is accepted and one more is rejected with
/// [`TokenError::NestingTooDeep`].
pub const MAX_NESTING_DEPTH: usize = 512;

/// A scalar JSON value as it appeared in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    /// A string, unescaped.
    String(String),
    /// An integer, raw text (arbitrary precision).
    Integer(String),
    /// A number with fraction or exponent, raw text.
    Float(String),
    /// `true` or `false`.
    Bool(bool),
    /// `null`.
    Null,
}

impl ScalarValue {
    /// The JSON type name used in validation messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "boolean",
            Self::Null => "null",
        }
    }

    /// Raw text of the scalar (unescaped for strings).
    pub fn text(&self) -> &str {
        match self {
            Self::String(s) | Self::Integer(s) | Self::Float(s) => s,
            Self::Bool(true) => "true",
            Self::Bool(false) => "false",
            Self::Null => "null",
        }
    }
}

/// One primitive event in a JSON token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonEvent {
    /// `{`
    ObjectStart,
    /// `}`
    ObjectEnd,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// An object key.
    FieldName(String),
    /// A scalar value.
    Scalar(ScalarValue),
    /// No more events.
    EndOfStream,
}

impl JsonEvent {
    /// The token kind name used in validation messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ObjectStart => "object",
            Self::ObjectEnd => "end of object",
            Self::ArrayStart => "array",
            Self::ArrayEnd => "end of array",
            Self::FieldName(_) => "field name",
            Self::Scalar(s) => s.kind_name(),
            Self::EndOfStream => "end of stream",
        }
    }

    /// Whether this event opens a container.
    pub fn is_container_start(&self) -> bool {
        matches!(self, Self::ObjectStart | Self::ArrayStart)
    }

    /// Whether this event begins a value (container start or scalar).
    pub fn is_value_start(&self) -> bool {
        matches!(self, Self::ObjectStart | Self::ArrayStart | Self::Scalar(_))
    }
}

/// The minimal cursor surface the validator, relabeler and extractor need.
pub trait TokenSource {
    /// Advance to the next event.
    fn next_event(&mut self) -> Result<JsonEvent, TokenError>;

    /// Snapshot of the path stack at the current event.
    fn current_path(&self) -> DocumentPath;

    /// Text of the most recent field name or scalar.
    fn raw_text(&self) -> Option<&str>;

    /// Consume the remainder of a value whose first event was `first`.
    ///
    /// Scalars need nothing more; containers are read through their
    /// matching end event without interpretation.
    fn skip_rest_of_value(&mut self, first: &JsonEvent) -> Result<(), TokenError> {
        if !first.is_container_start() {
            return Ok(());
        }
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_event()? {
                JsonEvent::ObjectStart | JsonEvent::ArrayStart => depth += 1,
                JsonEvent::ObjectEnd | JsonEvent::ArrayEnd => depth -= 1,
                JsonEvent::EndOfStream => {
                    return Err(TokenError::malformed(0, "stream ended inside a value"))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Frame {
    Object(Option<String>),
    Array(Option<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// A value (document start, after a colon, or after an array comma).
    Value,
    /// A key, or `}` when `first`.
    Key { first: bool },
    /// An array element or `]`.
    FirstElement,
    /// `,` or the current container's closing token.
    CommaOrEnd,
    /// Trailing whitespace then end of input.
    Done,
}

#[derive(Debug)]
struct Rooted {
    /// Nesting depth outside the rooted value.
    base_depth: usize,
}

/// Path-tracking JSON event cursor over a buffered reader.
pub struct TokenStream<R> {
    lexer: Lexer<ReadBytes<R>>,
    frames: Vec<Frame>,
    expect: Expect,
    finished: bool,
    last_text: Option<String>,
    replay: VecDeque<JsonEvent>,
    rooted: Option<Rooted>,
}

impl<R: BufRead> TokenStream<R> {
    /// Stream the whole document.
    pub fn new(reader: R) -> Self {
        Self {
            lexer: Lexer::new(ReadBytes::new(reader)),
            frames: Vec::new(),
            expect: Expect::Value,
            finished: false,
            last_text: None,
            replay: VecDeque::new(),
            rooted: None,
        }
    }

    /// Stream only the subtree at `root`, a `/`-separated path of field
    /// names and array indices such as `"a/2/b"`. An empty root streams the
    /// whole document.
    pub fn with_root(reader: R, root: &str) -> Result<Self, TokenError> {
        let mut stream = Self::new(reader);
        let segments: Vec<&str> = root
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if !segments.is_empty() {
            stream.fast_forward(root, &segments)?;
            tracing::trace!(root, offset = stream.position(), "token stream positioned at root");
        }
        Ok(stream)
    }

    /// Byte offset of the next unread input byte.
    pub fn position(&self) -> u64 {
        self.lexer.position()
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn fast_forward(&mut self, root: &str, segments: &[&str]) -> Result<(), TokenError> {
        let mut matched = 0usize;
        loop {
            let event = self.read_event()?;
            match &event {
                JsonEvent::EndOfStream => {
                    return Err(TokenError::RootNotReached(root.to_string()));
                }
                JsonEvent::ObjectEnd | JsonEvent::ArrayEnd
                    if matched > 0 && self.frames.len() <= matched =>
                {
                    return Err(TokenError::RootNotFound(root.to_string()));
                }
                e if e.is_value_start() => {
                    let depth = self.value_depth(e);
                    if depth != matched + 1 {
                        continue;
                    }
                    let hit = self
                        .path_segment_at(matched)
                        .map_or(false, |s| s.as_text() == segments[matched]);
                    if !hit {
                        self.skip_rest_of_value(&event)?;
                        continue;
                    }
                    matched += 1;
                    if matched == segments.len() {
                        let base_depth = if e.is_container_start() {
                            self.frames.len() - 1
                        } else {
                            self.frames.len()
                        };
                        self.rooted = Some(Rooted { base_depth });
                        self.replay.push_back(event.clone());
                        return Ok(());
                    }
                    if !e.is_container_start() {
                        return Err(TokenError::RootNotFound(root.to_string()));
                    }
                }
                _ => {}
            }
        }
    }

    /// Number of rendered path segments locating a value whose first event
    /// was just read.
    fn value_depth(&self, first: &JsonEvent) -> usize {
        if first.is_container_start() {
            self.frames.len() - 1
        } else {
            self.frames.len()
        }
    }

    fn path_segment_at(&self, index: usize) -> Option<PathSegment> {
        match self.frames.get(index)? {
            Frame::Object(Some(k)) => Some(PathSegment::Key(k.clone())),
            Frame::Array(Some(i)) => Some(PathSegment::Index(*i)),
            _ => None,
        }
    }

    fn advance_array_index(&mut self) {
        if let Some(Frame::Array(index)) = self.frames.last_mut() {
            *index = Some(index.map_or(0, |i| i + 1));
        }
    }

    fn after_value(&mut self) {
        self.expect = if self.frames.is_empty() {
            Expect::Done
        } else {
            Expect::CommaOrEnd
        };
    }

    fn begin_value(&mut self, token: Token) -> Result<JsonEvent, TokenError> {
        let offset = self.lexer.token_start();
        if matches!(token, Token::LeftBrace | Token::LeftBracket)
            && self.frames.len() >= MAX_NESTING_DEPTH
        {
            return Err(TokenError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                offset,
            });
        }
        self.advance_array_index();
        let event = match token {
            Token::LeftBrace => {
                self.frames.push(Frame::Object(None));
                self.expect = Expect::Key { first: true };
                return Ok(JsonEvent::ObjectStart);
            }
            Token::LeftBracket => {
                self.frames.push(Frame::Array(None));
                self.expect = Expect::FirstElement;
                return Ok(JsonEvent::ArrayStart);
            }
            Token::String(s) => ScalarValue::String(s),
            Token::Integer(s) => ScalarValue::Integer(s),
            Token::Float(s) => ScalarValue::Float(s),
            Token::True => ScalarValue::Bool(true),
            Token::False => ScalarValue::Bool(false),
            Token::Null => ScalarValue::Null,
            Token::Eof => return Err(TokenError::UnexpectedEnd { offset }),
            other => {
                return Err(TokenError::malformed(
                    offset,
                    format!("expected a value, found {other:?}"),
                ))
            }
        };
        self.last_text = Some(event.text().to_string());
        self.after_value();
        Ok(JsonEvent::Scalar(event))
    }

    fn end_container(&mut self, event: JsonEvent) -> JsonEvent {
        self.frames.pop();
        self.after_value();
        event
    }

    /// Read the next event from the lexer, ignoring any rooted window.
    fn read_event(&mut self) -> Result<JsonEvent, TokenError> {
        if let Some(event) = self.replay.pop_front() {
            return Ok(event);
        }
        if self.finished {
            return Ok(JsonEvent::EndOfStream);
        }
        loop {
            let token = self.lexer.next_token()?;
            let offset = self.lexer.token_start();
            match self.expect {
                Expect::Value => return self.begin_value(token),
                Expect::FirstElement => {
                    if token == Token::RightBracket {
                        return Ok(self.end_container(JsonEvent::ArrayEnd));
                    }
                    return self.begin_value(token);
                }
                Expect::Key { first } => match token {
                    Token::RightBrace if first => {
                        return Ok(self.end_container(JsonEvent::ObjectEnd));
                    }
                    Token::String(name) => {
                        match self.lexer.next_token()? {
                            Token::Colon => {}
                            _ => {
                                return Err(TokenError::malformed(
                                    self.lexer.token_start(),
                                    "expected ':' after field name",
                                ))
                            }
                        }
                        if let Some(Frame::Object(key)) = self.frames.last_mut() {
                            *key = Some(name.clone());
                        }
                        self.last_text = Some(name.clone());
                        self.expect = Expect::Value;
                        return Ok(JsonEvent::FieldName(name));
                    }
                    Token::Eof => return Err(TokenError::UnexpectedEnd { offset }),
                    _ => return Err(TokenError::malformed(offset, "expected a field name")),
                },
                Expect::CommaOrEnd => match (token, self.frames.last()) {
                    (Token::Comma, Some(Frame::Object(_))) => {
                        self.expect = Expect::Key { first: false };
                    }
                    (Token::Comma, Some(Frame::Array(_))) => {
                        self.expect = Expect::Value;
                    }
                    (Token::RightBrace, Some(Frame::Object(_))) => {
                        return Ok(self.end_container(JsonEvent::ObjectEnd));
                    }
                    (Token::RightBracket, Some(Frame::Array(_))) => {
                        return Ok(self.end_container(JsonEvent::ArrayEnd));
                    }
                    (Token::Eof, _) => return Err(TokenError::UnexpectedEnd { offset }),
                    _ => {
                        return Err(TokenError::malformed(
                            offset,
                            "expected ',' or end of container",
                        ))
                    }
                },
                Expect::Done => {
                    if token == Token::Eof {
                        self.finished = true;
                        return Ok(JsonEvent::EndOfStream);
                    }
                    return Err(TokenError::malformed(offset, "trailing data after document"));
                }
            }
        }
    }
}

impl<R: BufRead> TokenSource for TokenStream<R> {
    fn next_event(&mut self) -> Result<JsonEvent, TokenError> {
        if self.finished && self.replay.is_empty() {
            return Ok(JsonEvent::EndOfStream);
        }
        let event = self.read_event()?;
        if let Some(rooted) = &self.rooted {
            if self.frames.len() == rooted.base_depth {
                // The rooted value just completed; nothing past it is exposed.
                self.finished = true;
            }
        }
        Ok(event)
    }

    fn current_path(&self) -> DocumentPath {
        DocumentPath::from_segments(
            self.frames
                .iter()
                .filter_map(|frame| match frame {
                    Frame::Object(Some(k)) => Some(PathSegment::Key(k.clone())),
                    Frame::Array(Some(i)) => Some(PathSegment::Index(*i)),
                    _ => None,
                })
                .collect(),
        )
    }

    fn raw_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &str) -> Vec<(JsonEvent, String)> {
        let mut stream = TokenStream::new(input.as_bytes());
        let mut out = Vec::new();
        loop {
            let event = stream.next_event().unwrap();
            if event == JsonEvent::EndOfStream {
                break;
            }
            out.push((event, stream.current_path().to_string()));
        }
        out
    }

    fn field(name: &str) -> JsonEvent {
        JsonEvent::FieldName(name.to_string())
    }

    fn string(value: &str) -> JsonEvent {
        JsonEvent::Scalar(ScalarValue::String(value.to_string()))
    }

    #[test]
    fn test_paths_follow_the_cursor() {
        let got = events(r#"{"m":{"c":"a"},"att":["a1",3]}"#);
        let expected = vec![
            (JsonEvent::ObjectStart, "/"),
            (field("m"), "/m"),
            (JsonEvent::ObjectStart, "/m"),
            (field("c"), "/m/c"),
            (string("a"), "/m/c"),
            (JsonEvent::ObjectEnd, "/m"),
            (field("att"), "/att"),
            (JsonEvent::ArrayStart, "/att"),
            (string("a1"), "/att/0"),
            (JsonEvent::Scalar(ScalarValue::Integer("3".into())), "/att/1"),
            (JsonEvent::ArrayEnd, "/att"),
            (JsonEvent::ObjectEnd, "/"),
        ];
        let got: Vec<(JsonEvent, &str)> = got.iter().map(|(e, p)| (e.clone(), p.as_str())).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_nested_arrays_index_independently() {
        let got = events("[[1,2],[3]]");
        let paths: Vec<&str> = got.iter().map(|(_, p)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/", "/0", "/0/0", "/0/1", "/0", "/1", "/1/0", "/1", "/"]
        );
    }

    #[test]
    fn test_top_level_scalar() {
        let got = events("  42 ");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, JsonEvent::Scalar(ScalarValue::Integer("42".into())));
    }

    #[test]
    fn test_end_of_stream_is_sticky() {
        let mut stream = TokenStream::new(&b"{}"[..]);
        assert_eq!(stream.next_event().unwrap(), JsonEvent::ObjectStart);
        assert_eq!(stream.next_event().unwrap(), JsonEvent::ObjectEnd);
        assert_eq!(stream.next_event().unwrap(), JsonEvent::EndOfStream);
        assert_eq!(stream.next_event().unwrap(), JsonEvent::EndOfStream);
    }

    #[test]
    fn test_malformed_documents_fail() {
        for bad in [
            "{", "[1,", "{\"a\" 1}", "{\"a\":1,}", "[1 2]", "{} {}", "{1:2}", "]", "",
        ] {
            let mut stream = TokenStream::new(bad.as_bytes());
            let result = (0..10).try_for_each(|_| stream.next_event().map(|_| ()));
            assert!(result.is_err(), "accepted malformed input {bad:?}");
        }
    }

    #[test]
    fn test_raw_text_tracks_last_name_or_scalar() {
        let mut stream = TokenStream::new(&br#"{"k":12.5}"#[..]);
        stream.next_event().unwrap();
        stream.next_event().unwrap();
        assert_eq!(stream.raw_text(), Some("k"));
        stream.next_event().unwrap();
        assert_eq!(stream.raw_text(), Some("12.5"));
    }

    #[test]
    fn test_skip_rest_of_value() {
        let mut stream = TokenStream::new(&br#"{"a":{"x":[1,{"y":2}]},"b":true}"#[..]);
        stream.next_event().unwrap();
        stream.next_event().unwrap();
        let first = stream.next_event().unwrap();
        stream.skip_rest_of_value(&first).unwrap();
        assert_eq!(stream.next_event().unwrap(), field("b"));
        assert_eq!(stream.current_path().to_string(), "/b");
    }

    #[test]
    fn test_rooted_stream_exposes_only_subtree() {
        let doc = r#"{"x":1,"a":[0,{"b":"no"},{"c":1,"b":{"d":[true]}}],"z":2}"#;
        let mut stream = TokenStream::with_root(doc.as_bytes(), "a/2/b").unwrap();
        let mut got = Vec::new();
        loop {
            let event = stream.next_event().unwrap();
            if event == JsonEvent::EndOfStream {
                break;
            }
            got.push(event);
        }
        assert_eq!(
            got,
            vec![
                JsonEvent::ObjectStart,
                field("d"),
                JsonEvent::ArrayStart,
                JsonEvent::Scalar(ScalarValue::Bool(true)),
                JsonEvent::ArrayEnd,
                JsonEvent::ObjectEnd,
            ]
        );
    }

    #[test]
    fn test_rooted_stream_at_scalar() {
        let mut stream = TokenStream::with_root(&br#"{"a":{"b":"leaf"},"c":1}"#[..], "/a/b").unwrap();
        assert_eq!(stream.next_event().unwrap(), string("leaf"));
        assert_eq!(stream.current_path().to_string(), "/a/b");
        assert_eq!(stream.next_event().unwrap(), JsonEvent::EndOfStream);
    }

    #[test]
    fn test_rooted_stream_missing_path() {
        let err = TokenStream::with_root(&br#"{"a":{"b":1},"c":2}"#[..], "a/x")
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Root path not found: a/x");

        let err = TokenStream::with_root(&br#"{"a":1}"#[..], "q")
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "End of token stream for root path: q");
    }

    #[test]
    fn test_rooted_stream_through_scalar_fails() {
        let err = TokenStream::with_root(&br#"{"a":1}"#[..], "a/b")
            .err()
            .unwrap();
        assert!(matches!(err, TokenError::RootNotFound(_)));
    }

    #[test]
    fn test_empty_root_streams_everything() {
        let mut stream = TokenStream::with_root(&b"[1]"[..], "").unwrap();
        assert_eq!(stream.next_event().unwrap(), JsonEvent::ArrayStart);
    }

    fn nested_arrays(depth: usize) -> String {
        format!("{}{}", "[".repeat(depth), "]".repeat(depth))
    }

    fn drain(input: &str) -> Result<usize, TokenError> {
        let mut stream = TokenStream::new(input.as_bytes());
        let mut count = 0;
        while stream.next_event()? != JsonEvent::EndOfStream {
            count += 1;
        }
        Ok(count)
    }

    #[test]
    fn test_nesting_at_limit_is_accepted() {
        let count = drain(&nested_arrays(MAX_NESTING_DEPTH)).unwrap();
        assert_eq!(count, 2 * MAX_NESTING_DEPTH);
    }

    #[test]
    fn test_nesting_past_limit_is_rejected() {
        let err = drain(&nested_arrays(MAX_NESTING_DEPTH + 1)).unwrap_err();
        match err {
            TokenError::NestingTooDeep { limit, offset } => {
                assert_eq!(limit, MAX_NESTING_DEPTH);
                assert_eq!(offset, MAX_NESTING_DEPTH as u64);
            }
            other => panic!("unexpected error: {other}"),
        }

        let deep_object = format!(r#"{{"b":1,"a":{}}}"#, nested_arrays(2000));
        assert!(matches!(
            drain(&deep_object),
            Err(TokenError::NestingTooDeep { .. })
        ));
    }
}
