//! # Budgeted Key Sorter
//!
//! Rewrites a compact JSON document with the keys of every object in
//! ascending UTF-8 byte order. Only keys are ever held in memory: for each
//! object the sorter scans its entries once, remembering every key and the
//! byte offset of its value, then seeks back to each value in sorted order
//! and writes it, recursing into nested objects the same way. Values are
//! never buffered, so a document may be far larger than memory provided its
//! keys are not.
//!
//! Key memory is charged against a fixed limit. Each key costs
//! [`KEY_ENTRY_OVERHEAD`] plus its UTF-8 length, and an object's charge
//! stacks on top of the charges of every object enclosing it. Exceeding the
//! limit fails the pass at once with the path of the offending object, so
//! the same document and limit always fail at the same place. Containers
//! nested deeper than [`MAX_NESTING_DEPTH`] fail the pass the same way.
//!
//! The input must be seekable. [`SeekBytes`] adapts any `Read + Seek` into
//! the lexer's [`ByteSource`], buffering reads and serving short backward
//! seeks from its buffer.

use std::io::{Read, Seek, SeekFrom, Write};

use typedobj_core::{
    ByteSource, DocumentPath, JsonWriter, Lexer, PathSegment, Token, TokenError, MAX_NESTING_DEPTH,
};

use crate::error::SortError;

/// Fixed bytes charged per object key in addition to its UTF-8 length.
pub const KEY_ENTRY_OVERHEAD: u64 = 71;

const BUFFER_SIZE: usize = 8 * 1024;

/// Buffered, repositionable [`ByteSource`] over a seekable reader.
pub struct SeekBytes<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
    offset: u64,
}

impl<R: Read + Seek> SeekBytes<R> {
    /// Read `inner` from its start.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            filled: 0,
            offset: 0,
        }
    }

    /// Continue reading at absolute byte `offset`.
    pub fn seek_to(&mut self, offset: u64) -> std::io::Result<()> {
        let window_start = self.offset - self.pos as u64;
        let window_end = window_start + self.filled as u64;
        if (window_start..=window_end).contains(&offset) {
            self.pos = (offset - window_start) as usize;
        } else {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.pos = 0;
            self.filled = 0;
        }
        self.offset = offset;
        Ok(())
    }

    fn fill(&mut self) -> std::io::Result<()> {
        if self.pos < self.filled {
            return Ok(());
        }
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(n) => {
                    self.pos = 0;
                    self.filled = n;
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R: Read + Seek> ByteSource for SeekBytes<R> {
    fn peek(&mut self) -> std::io::Result<Option<u8>> {
        self.fill()?;
        Ok(self.buf[..self.filled].get(self.pos).copied())
    }

    fn advance(&mut self) -> std::io::Result<Option<u8>> {
        let b = self.peek()?;
        if b.is_some() {
            self.pos += 1;
            self.offset += 1;
        }
        Ok(b)
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

struct Entry {
    key: String,
    value_start: u64,
}

/// One sorting pass over a seekable document.
pub struct KeySorter<R> {
    lexer: Lexer<SeekBytes<R>>,
    limit: u64,
}

impl<R: Read + Seek> KeySorter<R> {
    /// Sort `input`, holding at most `limit` bytes of key entries.
    pub fn new(input: R, limit: u64) -> Self {
        Self {
            lexer: Lexer::new(SeekBytes::new(input)),
            limit,
        }
    }

    /// Write the sorted document into `out` and hand `out` back.
    pub fn write_into<W: Write>(mut self, out: W) -> Result<W, SortError> {
        let mut writer = JsonWriter::new(out);
        let mut path = DocumentPath::root();
        let first = self.lexer.next_token()?;
        self.write_value(first, &mut path, 0, &mut writer)?;
        match self.lexer.next_token()? {
            Token::Eof => {}
            other => return Err(self.unexpected(&other)),
        }
        Ok(writer.into_inner()?)
    }

    fn unexpected(&self, token: &Token) -> SortError {
        SortError::Token(TokenError::Malformed {
            offset: self.lexer.token_start(),
            reason: format!("unexpected token {token:?}"),
        })
    }

    fn expect(&mut self, expected: Token) -> Result<(), SortError> {
        let token = self.lexer.next_token()?;
        if token == expected {
            Ok(())
        } else {
            Err(self.unexpected(&token))
        }
    }

    fn seek(&mut self, offset: u64) -> Result<(), SortError> {
        self.lexer.source_mut().seek_to(offset)?;
        Ok(())
    }

    fn write_value<W: Write>(
        &mut self,
        token: Token,
        path: &mut DocumentPath,
        used: u64,
        out: &mut JsonWriter<W>,
    ) -> Result<(), SortError> {
        let opens = matches!(token, Token::LeftBrace | Token::LeftBracket);
        if opens && path.depth() >= MAX_NESTING_DEPTH {
            return Err(SortError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                location: path.clone(),
            });
        }
        match token {
            Token::LeftBrace => self.write_object(path, used, out),
            Token::LeftBracket => self.write_array(path, used, out),
            Token::String(s) => Ok(out.string(&s)?),
            Token::Integer(n) | Token::Float(n) => Ok(out.number(&n)?),
            Token::True => Ok(out.boolean(true)?),
            Token::False => Ok(out.boolean(false)?),
            Token::Null => Ok(out.null()?),
            other => Err(self.unexpected(&other)),
        }
    }

    fn write_object<W: Write>(
        &mut self,
        path: &mut DocumentPath,
        used: u64,
        out: &mut JsonWriter<W>,
    ) -> Result<(), SortError> {
        let mut entries: Vec<Entry> = Vec::new();
        let mut total = used;

        let mut token = self.lexer.next_token()?;
        if token != Token::RightBrace {
            loop {
                let key = match token {
                    Token::String(key) => key,
                    other => return Err(self.unexpected(&other)),
                };
                self.expect(Token::Colon)?;
                total += KEY_ENTRY_OVERHEAD + key.len() as u64;
                if total > self.limit {
                    return Err(SortError::TooManyKeys {
                        limit: self.limit,
                        location: path.clone(),
                    });
                }
                entries.push(Entry {
                    key,
                    value_start: self.lexer.position(),
                });
                let first = self.lexer.next_token()?;
                self.skip_value(first)?;
                match self.lexer.next_token()? {
                    Token::Comma => token = self.lexer.next_token()?,
                    Token::RightBrace => break,
                    other => return Err(self.unexpected(&other)),
                }
            }
        }
        let end = self.lexer.position();

        entries.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));
        if let Some(pair) = entries.windows(2).find(|w| w[0].key == w[1].key) {
            return Err(SortError::DuplicateKey {
                key: pair[0].key.clone(),
                location: path.clone(),
            });
        }

        out.begin_object()?;
        for entry in entries {
            out.field_name(&entry.key)?;
            self.seek(entry.value_start)?;
            let first = self.lexer.next_token()?;
            path.push(PathSegment::Key(entry.key));
            self.write_value(first, path, total, out)?;
            path.pop();
        }
        out.end_object()?;
        self.seek(end)
    }

    fn write_array<W: Write>(
        &mut self,
        path: &mut DocumentPath,
        used: u64,
        out: &mut JsonWriter<W>,
    ) -> Result<(), SortError> {
        out.begin_array()?;
        let mut token = self.lexer.next_token()?;
        if token != Token::RightBracket {
            let mut index = 0usize;
            loop {
                path.push(PathSegment::Index(index));
                self.write_value(token, path, used, out)?;
                path.pop();
                index += 1;
                match self.lexer.next_token()? {
                    Token::Comma => token = self.lexer.next_token()?,
                    Token::RightBracket => break,
                    other => return Err(self.unexpected(&other)),
                }
            }
        }
        Ok(out.end_array()?)
    }

    /// Pass over a value during the key scan. Structure is checked properly
    /// when the value is written.
    fn skip_value(&mut self, first: Token) -> Result<(), SortError> {
        let mut depth = match first {
            Token::LeftBrace | Token::LeftBracket => 1usize,
            Token::String(_)
            | Token::Integer(_)
            | Token::Float(_)
            | Token::True
            | Token::False
            | Token::Null => 0,
            other => return Err(self.unexpected(&other)),
        };
        while depth > 0 {
            match self.lexer.next_token()? {
                Token::LeftBrace | Token::LeftBracket => depth += 1,
                Token::RightBrace | Token::RightBracket => depth -= 1,
                Token::Eof => {
                    return Err(SortError::Token(TokenError::UnexpectedEnd {
                        offset: self.lexer.position(),
                    }))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Sort an in-memory document into a new buffer.
pub fn sort_to_vec(input: &[u8], limit: u64) -> Result<Vec<u8>, SortError> {
    KeySorter::new(std::io::Cursor::new(input), limit).write_into(Vec::with_capacity(input.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNLIMITED: u64 = u64::MAX;

    fn sorted(json: &str) -> String {
        String::from_utf8(sort_to_vec(json.as_bytes(), UNLIMITED).unwrap()).unwrap()
    }

    #[test]
    fn test_sorts_nested_objects() {
        assert_eq!(sorted(r#"{"z":"a","b":"d"}"#), r#"{"b":"d","z":"a"}"#);
        assert_eq!(
            sorted(r#"{"m":{"y":"a","b":"whoop"},"a":[{"q":1,"p":[true,null]},2.5e3]}"#),
            r#"{"a":[{"p":[true,null],"q":1},2.5e3],"m":{"b":"whoop","y":"a"}}"#
        );
    }

    #[test]
    fn test_scalars_and_empty_containers() {
        assert_eq!(sorted("42"), "42");
        assert_eq!(sorted(r#"  "x"  "#), r#""x""#);
        assert_eq!(sorted(r#"{"b":{},"a":[]}"#), r#"{"a":[],"b":{}}"#);
    }

    #[test]
    fn test_byte_order_not_char_order() {
        // U+00E9 encodes as 0xC3 0xA9, after every ASCII byte.
        assert_eq!(sorted(r#"{"é":1,"z":2,"Z":3}"#), r#"{"Z":3,"z":2,"é":1}"#);
    }

    #[test]
    fn test_escapes_survive() {
        assert_eq!(sorted(r#"{"b":"line\nbreak","a":"q\"uote"}"#), r#"{"a":"q\"uote","b":"line\nbreak"}"#);
    }

    #[test]
    fn test_key_budget_boundary() {
        let json = br#"{"z":"a","b":"d"}"#;
        let needed = 2 * (KEY_ENTRY_OVERHEAD + 1);
        assert_eq!(needed, 8 + 64 + 8 + 64);
        assert!(sort_to_vec(json, needed).is_ok());
        let err = sort_to_vec(json, needed - 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Memory necessary for sorting map keys exceeds the limit 143 bytes at /"
        );
    }

    #[test]
    fn test_budget_accumulates_through_nesting() {
        // Outer key costs 72, inner keys 72 each: 216 in total at /m.
        let json = br#"{"m":{"a":1,"b":2}}"#;
        assert!(sort_to_vec(json, 216).is_ok());
        let err = sort_to_vec(json, 215).unwrap_err();
        assert!(matches!(err, SortError::TooManyKeys { limit: 215, ref location } if location.to_string() == "/m"));
    }

    #[test]
    fn test_nesting_limit() {
        let at_limit = format!("{}{}", "[".repeat(MAX_NESTING_DEPTH), "]".repeat(MAX_NESTING_DEPTH));
        assert_eq!(sorted(&at_limit), at_limit);

        let depth = 2000;
        let deep = format!(r#"{{"b":1,"a":{}{}}}"#, "[".repeat(depth), "]".repeat(depth));
        let err = sort_to_vec(deep.as_bytes(), UNLIMITED).unwrap_err();
        match err {
            SortError::NestingTooDeep { limit, location } => {
                assert_eq!(limit, MAX_NESTING_DEPTH);
                assert_eq!(location.depth(), MAX_NESTING_DEPTH);
                assert!(location.to_string().starts_with("/a/0/0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_siblings_do_not_accumulate() {
        let json = br#"[{"a":1},{"b":2},{"c":3}]"#;
        assert!(sort_to_vec(json, KEY_ENTRY_OVERHEAD + 1).is_ok());
    }

    #[test]
    fn test_duplicate_key() {
        let err = sort_to_vec(br#"{"m":{"b":"a","b":"d"}}"#, UNLIMITED).unwrap_err();
        assert_eq!(err.to_string(), "Duplicated key 'b' was found at /m");
    }

    #[test]
    fn test_seek_across_buffer_windows() {
        let big = "x".repeat(BUFFER_SIZE * 2);
        let json = format!(r#"{{"z":"{big}","a":{{"k":"{big}","c":1}}}}"#);
        let expected = format!(r#"{{"a":{{"c":1,"k":"{big}"}},"z":"{big}"}}"#);
        assert_eq!(sorted(&json), expected);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(sort_to_vec(br#"{"a" 1}"#, UNLIMITED), Err(SortError::Token(_))));
        assert!(matches!(sort_to_vec(br#"{"a":1} 2"#, UNLIMITED), Err(SortError::Token(_))));
        assert!(matches!(sort_to_vec(br#"{"a":[1,2}"#, UNLIMITED), Err(SortError::Token(_))));
    }
}
