//! Byte cursor over a single framed server response.
//!
//! A framed response may contain literals (`{n}\r\n` followed by `n` raw
//! bytes), so the cursor works on bytes and only decodes text on demand.

use crate::{Error, Result};

/// Cursor over one response.
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the next byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// True once only a CRLF (or nothing) remains.
    #[must_use]
    pub fn at_line_end(&self) -> bool {
        matches!(self.remaining(), [] | [b'\r', b'\n'] | [b'\n'])
    }

    /// The unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    /// Consumes `expected` or fails.
    pub fn expect(&mut self, expected: u8) -> Result<()> {
        match self.peek() {
            Some(b) if b == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(self.error(format!(
                "expected '{}', found '{}'",
                char::from(expected),
                char::from(b)
            ))),
            None => Err(self.error(format!("expected '{}', found end", char::from(expected)))),
        }
    }

    /// Consumes a single space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(b' ')
    }

    /// Skips any run of spaces.
    pub fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    /// Reads an atom. Square-bracketed sections are kept whole, so
    /// `BODY[HEADER.FIELDS (FROM)]<0>` is one atom.
    pub fn read_atom(&mut self) -> Result<&'a str> {
        let input = self.input;
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b' ' | b'(' | b')' if depth == 0 => break,
                b'\r' | b'\n' | b'{' | b'"' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected atom"));
        }
        std::str::from_utf8(&input[start..self.pos]).map_err(|_| self.error("atom is not UTF-8"))
    }

    /// Reads an unsigned 32-bit number.
    pub fn read_number(&mut self) -> Result<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Parse {
                position: start,
                message: "expected number".to_string(),
            })
    }

    /// Reads a quoted string, literal or `NIL`. Returns raw bytes.
    pub fn read_nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek() {
            Some(b'"') => self.read_quoted().map(Some),
            Some(b'{') => self.read_literal().map(|lit| Some(lit.to_vec())),
            Some(b'N' | b'n') => {
                let atom = self.read_atom()?;
                if atom.eq_ignore_ascii_case("NIL") {
                    Ok(None)
                } else {
                    Err(self.error(format!("expected string, found {atom}")))
                }
            }
            _ => Err(self.error("expected string")),
        }
    }

    /// Reads an atom, quoted string or literal as text.
    pub fn read_astring(&mut self) -> Result<String> {
        match self.peek() {
            Some(b'"') => Ok(String::from_utf8_lossy(&self.read_quoted()?).into_owned()),
            Some(b'{') => Ok(String::from_utf8_lossy(self.read_literal()?).into_owned()),
            _ => self.read_atom().map(str::to_string),
        }
    }

    fn read_quoted(&mut self) -> Result<Vec<u8>> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => return Ok(out),
                Some(b'\\') => match self.advance() {
                    Some(b) => out.push(b),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(b'\r' | b'\n') | None => return Err(self.error("unterminated quoted string")),
                Some(b) => out.push(b),
            }
        }
    }

    fn read_literal(&mut self) -> Result<&'a [u8]> {
        self.expect(b'{')?;
        let len = self.read_number()? as usize;
        if self.peek() == Some(b'+') {
            self.pos += 1;
        }
        self.expect(b'}')?;
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        self.expect(b'\n')?;
        let input = self.input;
        let end = self.pos + len;
        let data = input
            .get(self.pos..end)
            .ok_or_else(|| self.error(format!("literal of {len} bytes is truncated")))?;
        self.pos = end;
        Ok(data)
    }

    /// Skips one value of any shape: atom, string, literal or
    /// parenthesized list.
    pub fn skip_value(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                loop {
                    self.skip_spaces();
                    match self.peek() {
                        Some(b')') => {
                            self.pos += 1;
                            return Ok(());
                        }
                        Some(_) => self.skip_value()?,
                        None => return Err(self.error("unterminated list")),
                    }
                }
            }
            Some(b'"') => self.read_quoted().map(|_| ()),
            Some(b'{') => self.read_literal().map(|_| ()),
            Some(_) => self.read_atom().map(|_| ()),
            None => Err(self.error("expected value")),
        }
    }

    /// Consumes the rest of the line, excluding the CRLF, as text.
    pub fn read_text(&mut self) -> String {
        let rest = self.remaining();
        let text = rest
            .strip_suffix(b"\r\n")
            .or_else(|| rest.strip_suffix(b"\n"))
            .unwrap_or(rest);
        self.pos = self.input.len();
        String::from_utf8_lossy(text).into_owned()
    }
}
