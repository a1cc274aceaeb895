//! IMAP lexer for tokenizing server responses.
//!
//! The lexer works over one complete response unit. Literal segments are
//! already inline in the buffer (the framed reader fetched exactly `n`
//! bytes after each `{n}` marker), so a literal token simply slices them
//! out.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Maximum bytes of input quoted back in a parse error.
const FRAGMENT_LEN: usize = 24;

/// IMAP lexer state.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos.min(self.input.len())..]
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Peeks at the byte at offset from current position.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Returns true if the remaining input starts with CRLF.
    #[must_use]
    pub fn at_crlf(&self) -> bool {
        self.remaining().starts_with(b"\r\n")
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips n bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Consumes `byte` if it is next.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b'\r' => {
                if self.peek_at(1) == Some(b'\n') {
                    self.skip(2);
                    Ok(Token::Crlf)
                } else {
                    Err(self.error("Expected LF after CR"))
                }
            }
            b' ' => {
                self.advance();
                Ok(Token::Space)
            }
            b'(' => {
                self.advance();
                Ok(Token::LParen)
            }
            b')' => {
                self.advance();
                Ok(Token::RParen)
            }
            b'[' => {
                self.advance();
                Ok(Token::LBracket)
            }
            b']' => {
                self.advance();
                Ok(Token::RBracket)
            }
            b'*' => {
                self.advance();
                Ok(Token::Asterisk)
            }
            b'+' => {
                self.advance();
                Ok(Token::Plus)
            }
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            b'0'..=b'9' => self.read_number_or_atom(),
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    /// Reads a quoted string token.
    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.advance();

        let mut result = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => result.push(c),
                    Some(c) => {
                        return Err(self.error(&format!("Invalid escape: \\{}", char::from(c))));
                    }
                    None => return Err(self.error("Unexpected EOF in quoted string")),
                },
                Some(b'\r' | b'\n') => return Err(self.error("Line break in quoted string")),
                Some(c) => result.push(c),
                None => return Err(self.error("Unexpected EOF in quoted string")),
            }
        }

        Ok(Token::QuotedString(
            String::from_utf8_lossy(&result).into_owned(),
        ))
    }

    /// Reads a literal: `{n}` CRLF followed by exactly `n` bytes.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.advance();

        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let digits = &self.input[start..self.pos];
        // LITERAL+ marker is tolerated on input.
        self.eat(b'+');

        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("Invalid literal size"))?;

        if !self.eat(b'}') {
            return Err(self.error("Expected } after literal size"));
        }
        if !self.eat(b'\r') || !self.eat(b'\n') {
            return Err(self.error("Expected CRLF after literal size"));
        }

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("Incomplete literal data"))?;

        let data = self.input[self.pos..end].to_vec();
        self.pos = end;

        Ok(Token::Literal(data))
    }

    /// Reads a number or atom starting with a digit.
    fn read_number_or_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let mut all_digits = true;

        while let Some(b) = self.peek() {
            if !is_atom_char(b) {
                break;
            }
            all_digits &= b.is_ascii_digit();
            self.advance();
        }

        let s = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))?;

        if all_digits {
            let n: u64 = s.parse().map_err(|_| self.error("Number too large"))?;
            Ok(Token::Number(n))
        } else {
            Ok(Token::Atom(s))
        }
    }

    /// Reads an atom token.
    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;

        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }

        let s = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))?;

        if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    /// Creates a parse error at the current position.
    #[must_use]
    pub fn error(&self, message: &str) -> Error {
        let fragment = self.remaining();
        let fragment = &fragment[..fragment.len().min(FRAGMENT_LEN)];
        Error::ResponseParse {
            position: self.pos,
            message: message.to_string(),
            response: None,
            fragment: String::from_utf8_lossy(fragment).into_owned(),
        }
    }

    /// Expects and consumes a specific token.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Expects and consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Expects and consumes CRLF, tolerating one stray space before it.
    pub fn expect_crlf(&mut self) -> Result<()> {
        if self.peek() == Some(b' ') && self.peek_at(1) == Some(b'\r') {
            self.advance();
        }
        self.expect(Token::Crlf)
    }

    /// Reads an astring (atom, quoted string or literal).
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s.to_string()),
            Token::Number(n) => Ok(n.to_string()),
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            token => Err(self.error(&format!("Expected astring, got {token:?}"))),
        }
    }

    /// Reads a string (quoted or literal).
    pub fn read_string(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            token => Err(self.error(&format!("Expected string, got {token:?}"))),
        }
    }

    /// Reads a nstring (NIL or string).
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s)),
            Token::Literal(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            token => Err(self.error(&format!("Expected nstring, got {token:?}"))),
        }
    }

    /// Reads a nstring as raw bytes, keeping literal content byte-exact.
    pub fn read_nstring_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s.into_bytes())),
            Token::Literal(data) => Ok(Some(data)),
            token => Err(self.error(&format!("Expected nstring, got {token:?}"))),
        }
    }

    /// Reads a 32-bit number.
    pub fn read_number(&mut self) -> Result<u32> {
        let n = self.read_number64()?;
        u32::try_from(n).map_err(|_| self.error(&format!("Number out of range: {n}")))
    }

    /// Reads a number up to 64 bits wide.
    pub fn read_number64(&mut self) -> Result<u64> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("Expected number, got {token:?}"))),
        }
    }

    /// Reads a number or NIL.
    pub fn read_nnumber(&mut self) -> Result<Option<u32>> {
        if self.peek_nil() {
            self.skip(3);
            return Ok(None);
        }
        self.read_number().map(Some)
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("Expected atom, got {token:?}"))),
        }
    }

    /// Reads a flag or list attribute such as `\Seen`, `$Junk` or `\*`.
    pub fn read_flag(&mut self) -> Result<&'a str> {
        let start = self.pos;
        if self.eat(b'\\') && self.eat(b'*') {
            return self.slice_str(start);
        }
        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }
        if self.pos == start {
            return Err(self.error("Expected flag"));
        }
        self.slice_str(start)
    }

    /// Reads raw bytes up to (not including) the first byte in `stops`.
    pub fn read_until(&mut self, stops: &[u8]) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(|b| !stops.contains(&b)) {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    /// Returns true if the next three bytes spell NIL (case-insensitive)
    /// and are not the prefix of a longer atom.
    #[must_use]
    pub fn peek_nil(&self) -> bool {
        let rest = self.remaining();
        rest.len() >= 3
            && rest[..3].eq_ignore_ascii_case(b"NIL")
            && !rest.get(3).is_some_and(|&b| is_atom_char(b))
    }

    fn slice_str(&self, start: usize) -> Result<&'a str> {
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))
    }
}

/// Returns true if the byte is a valid atom character.
///
/// Note: This includes `\` to handle flags like `\Seen` as single tokens,
/// even though RFC 3501 defines `\` as a quoted-special.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b,
        0x21 | 0x23..=0x24 | 0x26..=0x27 |  // ! # $ & '
        0x2B..=0x5A |  // + , - . / 0-9 : ; < = > ? @ A-Z
        0x5C |         // \ (for flags like \Seen)
        0x5E..=0x7A |  // ^ _ ` a-z
        0x7C |         // |
        0x7E           // ~
    )
}
