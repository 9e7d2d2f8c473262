//! # JSON Lexer
//!
//! Converts raw JSON bytes into tokens. The lexer never holds more than the
//! token it is currently reading: bytes are pulled one at a time from a
//! [`ByteSource`], so a multi-gigabyte file costs no more memory than its
//! longest string.
//!
//! Two byte sources exist. [`ReadBytes`] wraps any `BufRead` and is what the
//! token stream uses. Random-access sources (see the sorter in
//! `typedobj-store`) implement [`ByteSource`] over a seekable reader so that
//! the same lexer can be restarted at arbitrary byte offsets.
//!
//! Numbers are kept as their raw text; integer vs. float is decided
//! lexically (a fraction or exponent makes a float).

use std::io::BufRead;

use crate::error::TokenError;

/// A peekable byte supply with a known offset.
pub trait ByteSource {
    /// Look at the next byte without consuming it.
    fn peek(&mut self) -> std::io::Result<Option<u8>>;

    /// Consume the next byte.
    fn advance(&mut self) -> std::io::Result<Option<u8>>;

    /// Number of bytes consumed from the start of the underlying input.
    fn offset(&self) -> u64;
}

/// [`ByteSource`] over a buffered reader.
pub struct ReadBytes<R> {
    inner: R,
    offset: u64,
}

impl<R: BufRead> ReadBytes<R> {
    /// Wrap a buffered reader, counting offsets from zero.
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }
}

impl<R: BufRead> ByteSource for ReadBytes<R> {
    fn peek(&mut self) -> std::io::Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn advance(&mut self) -> std::io::Result<Option<u8>> {
        let b = self.peek()?;
        if b.is_some() {
            self.inner.consume(1);
            self.offset += 1;
        }
        Ok(b)
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Left brace `{`
    LeftBrace,
    /// Right brace `}`
    RightBrace,
    /// Left bracket `[`
    LeftBracket,
    /// Right bracket `]`
    RightBracket,
    /// Colon `:`
    Colon,
    /// Comma `,`
    Comma,
    /// Null literal
    Null,
    /// True literal
    True,
    /// False literal
    False,
    /// String value (unescaped)
    String(String),
    /// Integer number, raw text
    Integer(String),
    /// Number with a fraction or exponent, raw text
    Float(String),
    /// End of input
    Eof,
}

/// JSON lexer that tokenizes a byte source.
pub struct Lexer<S> {
    source: S,
    token_start: u64,
}

impl<S: ByteSource> Lexer<S> {
    /// Create a lexer over the given byte source.
    pub fn new(source: S) -> Self {
        Self {
            source,
            token_start: 0,
        }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.source.offset()
    }

    /// Offset at which the most recently returned token began.
    pub fn token_start(&self) -> u64 {
        self.token_start
    }

    /// Give back the byte source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Mutable access to the byte source, for repositioning seekable sources
    /// between tokens.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn peek(&mut self) -> Result<Option<u8>, TokenError> {
        Ok(self.source.peek()?)
    }

    fn advance(&mut self) -> Result<Option<u8>, TokenError> {
        Ok(self.source.advance()?)
    }

    fn advance_required(&mut self) -> Result<u8, TokenError> {
        let offset = self.position();
        self.advance()?
            .ok_or(TokenError::UnexpectedEnd { offset })
    }

    fn skip_whitespace(&mut self) -> Result<(), TokenError> {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek()? {
            self.advance()?;
        }
        Ok(())
    }

    /// Read the next token from the input.
    pub fn next_token(&mut self) -> Result<Token, TokenError> {
        self.skip_whitespace()?;
        self.token_start = self.position();

        let token = match self.peek()? {
            None => return Ok(Token::Eof),
            Some(b'{') => Token::LeftBrace,
            Some(b'}') => Token::RightBrace,
            Some(b'[') => Token::LeftBracket,
            Some(b']') => Token::RightBracket,
            Some(b':') => Token::Colon,
            Some(b',') => Token::Comma,
            Some(b'"') => return self.read_string(),
            Some(b'-' | b'0'..=b'9') => return self.read_number(),
            Some(b't') => return self.read_literal(b"true", Token::True),
            Some(b'f') => return self.read_literal(b"false", Token::False),
            Some(b'n') => return self.read_literal(b"null", Token::Null),
            Some(b) => {
                return Err(TokenError::malformed(
                    self.token_start,
                    format!("unexpected character '{}'", char::from(b).escape_default()),
                ))
            }
        };
        self.advance()?;
        Ok(token)
    }

    /// Read a string token, handling escape sequences.
    fn read_string(&mut self) -> Result<Token, TokenError> {
        // Consume opening quote
        self.advance()?;

        let mut bytes = Vec::new();
        loop {
            let offset = self.position();
            match self.advance_required()? {
                b'"' => break,
                b'\\' => {
                    let ch = self.read_escape_sequence()?;
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
                b if b < 0x20 => {
                    return Err(TokenError::malformed(
                        offset,
                        "control character in string",
                    ));
                }
                b => bytes.push(b),
            }
        }

        String::from_utf8(bytes)
            .map(Token::String)
            .map_err(|_| TokenError::InvalidUtf8 {
                offset: self.token_start,
            })
    }

    /// Read an escape sequence after a backslash.
    fn read_escape_sequence(&mut self) -> Result<char, TokenError> {
        let offset = self.position();
        match self.advance_required()? {
            b'"' => Ok('"'),
            b'\\' => Ok('\\'),
            b'/' => Ok('/'),
            b'b' => Ok('\x08'),
            b'f' => Ok('\x0C'),
            b'n' => Ok('\n'),
            b'r' => Ok('\r'),
            b't' => Ok('\t'),
            b'u' => self.read_unicode_escape(),
            _ => Err(TokenError::malformed(offset, "invalid escape sequence")),
        }
    }

    /// Read a \uXXXX unicode escape sequence, joining surrogate pairs.
    fn read_unicode_escape(&mut self) -> Result<char, TokenError> {
        let offset = self.position();
        let codepoint = self.read_hex4()?;

        if (0xD800..=0xDBFF).contains(&codepoint) {
            if self.advance()? != Some(b'\\') || self.advance()? != Some(b'u') {
                return Err(TokenError::malformed(offset, "unpaired high surrogate"));
            }
            let low = self.read_hex4()?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(TokenError::malformed(offset, "invalid low surrogate"));
            }
            let combined = 0x10000 + ((u32::from(codepoint) - 0xD800) << 10)
                + (u32::from(low) - 0xDC00);
            return char::from_u32(combined)
                .ok_or_else(|| TokenError::malformed(offset, "invalid code point"));
        }

        if (0xDC00..=0xDFFF).contains(&codepoint) {
            return Err(TokenError::malformed(offset, "unpaired low surrogate"));
        }

        char::from_u32(u32::from(codepoint))
            .ok_or_else(|| TokenError::malformed(offset, "invalid code point"))
    }

    /// Read 4 hex digits and return the value.
    fn read_hex4(&mut self) -> Result<u16, TokenError> {
        let mut value: u16 = 0;
        for _ in 0..4 {
            let offset = self.position();
            let digit = match self.advance_required()? {
                b @ b'0'..=b'9' => b - b'0',
                b @ b'a'..=b'f' => b - b'a' + 10,
                b @ b'A'..=b'F' => b - b'A' + 10,
                _ => return Err(TokenError::malformed(offset, "invalid hex digit")),
            };
            value = (value << 4) | u16::from(digit);
        }
        Ok(value)
    }

    fn take_digits(&mut self, text: &mut String) -> Result<usize, TokenError> {
        let mut count = 0;
        while let Some(b @ b'0'..=b'9') = self.peek()? {
            self.advance()?;
            text.push(char::from(b));
            count += 1;
        }
        Ok(count)
    }

    /// Read a number token.
    fn read_number(&mut self) -> Result<Token, TokenError> {
        let start = self.token_start;
        let mut text = String::new();
        let mut is_float = false;

        if self.peek()? == Some(b'-') {
            self.advance()?;
            text.push('-');
        }

        match self.peek()? {
            Some(b'0') => {
                self.advance()?;
                text.push('0');
                if let Some(b'0'..=b'9') = self.peek()? {
                    return Err(TokenError::malformed(start, "leading zero in number"));
                }
            }
            Some(b'1'..=b'9') => {
                self.take_digits(&mut text)?;
            }
            _ => return Err(TokenError::malformed(start, "invalid number")),
        }

        if self.peek()? == Some(b'.') {
            self.advance()?;
            text.push('.');
            is_float = true;
            if self.take_digits(&mut text)? == 0 {
                return Err(TokenError::malformed(start, "missing digits after decimal point"));
            }
        }

        if let Some(e @ (b'e' | b'E')) = self.peek()? {
            self.advance()?;
            text.push(char::from(e));
            is_float = true;
            if let Some(sign @ (b'+' | b'-')) = self.peek()? {
                self.advance()?;
                text.push(char::from(sign));
            }
            if self.take_digits(&mut text)? == 0 {
                return Err(TokenError::malformed(start, "missing exponent digits"));
            }
        }

        Ok(if is_float {
            Token::Float(text)
        } else {
            Token::Integer(text)
        })
    }

    fn read_literal(&mut self, expected: &[u8], token: Token) -> Result<Token, TokenError> {
        let start = self.token_start;
        for &b in expected {
            if self.advance()? != Some(b) {
                return Err(TokenError::malformed(start, "invalid literal"));
            }
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Result<Vec<Token>, TokenError> {
        let mut lexer = Lexer::new(ReadBytes::new(input.as_bytes()));
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            if token == Token::Eof {
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    #[test]
    fn test_structural_tokens() {
        let tokens = lex("{ } [ ] : ,").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LeftBrace,
                Token::RightBrace,
                Token::LeftBracket,
                Token::RightBracket,
                Token::Colon,
                Token::Comma,
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            lex("true false null").unwrap(),
            vec![Token::True, Token::False, Token::Null]
        );
        assert!(lex("nul").is_err());
        assert!(lex("tru").is_err());
    }

    #[test]
    fn test_numbers_keep_raw_text() {
        assert_eq!(
            lex("0 -12 1.50 2e10 -3.0E-2 123456789012345678901234567890").unwrap(),
            vec![
                Token::Integer("0".into()),
                Token::Integer("-12".into()),
                Token::Float("1.50".into()),
                Token::Float("2e10".into()),
                Token::Float("-3.0E-2".into()),
                Token::Integer("123456789012345678901234567890".into()),
            ]
        );
    }

    #[test]
    fn test_bad_numbers_rejected() {
        assert!(lex("01").is_err());
        assert!(lex("1.").is_err());
        assert!(lex("1e").is_err());
        assert!(lex("-").is_err());
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            lex(r#""a\"b\\c\/d\b\f\n\r\t""#).unwrap(),
            vec![Token::String("a\"b\\c/d\x08\x0C\n\r\t".into())]
        );
    }

    #[test]
    fn test_unicode_escape_and_surrogates() {
        assert_eq!(lex(r#""\u00e9""#).unwrap(), vec![Token::String("é".into())]);
        assert_eq!(
            lex(r#""\ud83d\ude00""#).unwrap(),
            vec![Token::String("😀".into())]
        );
        assert!(lex(r#""\ud83d""#).is_err());
        assert!(lex(r#""\ude00""#).is_err());
    }

    #[test]
    fn test_raw_utf8_passes_through() {
        assert_eq!(lex("\"héllo\"").unwrap(), vec![Token::String("héllo".into())]);
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut lexer = Lexer::new(ReadBytes::new(&b"\"\xff\""[..]));
        assert!(matches!(
            lexer.next_token(),
            Err(TokenError::InvalidUtf8 { offset: 0 })
        ));
    }

    #[test]
    fn test_control_character_rejected() {
        assert!(lex("\"a\nb\"").is_err());
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            lex("\"abc"),
            Err(TokenError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_token_offsets() {
        let mut lexer = Lexer::new(ReadBytes::new(&b"  {\"k\": 12}"[..]));
        assert_eq!(lexer.next_token().unwrap(), Token::LeftBrace);
        assert_eq!(lexer.token_start(), 2);
        assert_eq!(lexer.next_token().unwrap(), Token::String("k".into()));
        assert_eq!(lexer.token_start(), 3);
        assert_eq!(lexer.position(), 6);
        lexer.next_token().unwrap();
        assert_eq!(lexer.next_token().unwrap(), Token::Integer("12".into()));
        assert_eq!(lexer.token_start(), 8);
    }
}
