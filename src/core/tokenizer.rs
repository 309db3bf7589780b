// src/core/tokenizer.rs

//! # Tokenizer
//!
//! Lexes a repository description into a stream of typed tokens. The grammar is
//! JSON plus `//` line comments, `/* */` block comments and bare identifiers.
//! Tokens borrow from the input buffer; string tokens keep their quotes and
//! remember whether they contain a backslash so the codec can skip unescaping
//! in the common case.

use std::fmt;
use thiserror::Error;

/// A position-tagged syntax error. Always fatal to the current parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("At {line}:{col}: {message}.")]
pub struct ParseError {
    /// 1-based line of the offending token.
    pub line: usize,
    /// 1-based column of the offending token.
    pub col: usize,
    /// Human readable description.
    pub message: String,
}

impl ParseError {
    /// Creates an error at the given position.
    pub fn new(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            col,
            message: message.into(),
        }
    }

    /// Creates an error located at `token`.
    pub fn at(token: &Token<'_>, message: impl Into<String>) -> Self {
        Self::new(token.line, token.col, message)
    }
}

/// The kinds of token the description grammar knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `[`
    ArrayOpen,
    /// `]`
    ArrayClose,
    /// `{`
    ObjectOpen,
    /// `}`
    ObjectClose,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// A double-quoted string literal.
    String,
    /// A greedy run of digits, `-`, `.`, `e`, `E` and `+`.
    Number,
    /// A bare alphabetic word (`true`, `false`, `null`).
    Identifier,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::ArrayOpen => "[",
            Self::ArrayClose => "]",
            Self::ObjectOpen => "{",
            Self::ObjectClose => "}",
            Self::Colon => ":",
            Self::Comma => ",",
            Self::String => "string",
            Self::Number => "number",
            Self::Identifier => "identifier",
        };
        f.write_str(symbol)
    }
}

/// One lexed token, borrowing its text from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// What was lexed.
    pub kind: TokenKind,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column of the first character.
    pub col: usize,
    /// For strings: whether the literal contains at least one backslash escape.
    pub escaped: bool,
    /// Raw text of the token. String tokens include both quotes.
    pub text: &'a str,
}

impl Token<'_> {
    /// The content of a string token without its surrounding quotes.
    pub fn unquoted(&self) -> &str {
        self.text
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(self.text)
    }
}

/// A cursor over a description buffer with a single token of lookahead.
#[derive(Debug)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
    line: usize,
    col: usize,
    lookahead: Option<Token<'a>>,
}

impl<'a> Tokenizer<'a> {
    /// Creates a tokenizer over the whole of `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: 0,
            line: 1,
            col: 1,
            lookahead: None,
        }
    }

    /// Current (line, column) of the cursor, after any consumed token.
    pub fn position(&self) -> (usize, usize) {
        match &self.lookahead {
            Some(token) => (token.line, token.col),
            None => (self.line, self.col),
        }
    }

    /// Returns and consumes the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>, ParseError> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.lex(),
        }
    }

    /// Returns the next token without consuming it. Repeated peeks return the same token.
    pub fn peek(&mut self) -> Result<Token<'a>, ParseError> {
        if let Some(token) = self.lookahead {
            return Ok(token);
        }
        let token = self.lex()?;
        self.lookahead = Some(token);
        Ok(token)
    }

    /// Consumes the next token and checks its kind.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>, ParseError> {
        let token = self.next_token()?;
        if token.kind != kind {
            return Err(ParseError::at(
                &token,
                format!("expected '{}' found '{}'", kind, token.text),
            ));
        }
        Ok(token)
    }

    /// True once only whitespace and comments remain.
    pub fn at_end(&mut self) -> Result<bool, ParseError> {
        if self.lookahead.is_some() {
            return Ok(false);
        }
        self.skip_trivia()?;
        Ok(self.cursor >= self.input.len())
    }

    fn byte_at(&self, index: usize) -> Option<u8> {
        self.input.as_bytes().get(index).copied()
    }

    fn lex(&mut self) -> Result<Token<'a>, ParseError> {
        self.skip_trivia()?;

        let Some(first) = self.byte_at(self.cursor) else {
            return Err(ParseError::new(
                self.line,
                self.col,
                "unexpected end of input",
            ));
        };
        let (line, col, start) = (self.line, self.col, self.cursor);

        let mut escaped = false;
        let kind = match first {
            b'[' => TokenKind::ArrayOpen,
            b']' => TokenKind::ArrayClose,
            b'{' => TokenKind::ObjectOpen,
            b'}' => TokenKind::ObjectClose,
            b':' => TokenKind::Colon,
            b',' => TokenKind::Comma,
            b'"' => TokenKind::String,
            b'-' | b'0'..=b'9' => TokenKind::Number,
            c if c.is_ascii_alphabetic() => TokenKind::Identifier,
            c if c.is_ascii_graphic() => {
                return Err(ParseError::new(
                    line,
                    col,
                    format!("unexpected character '{}'", char::from(c)),
                ));
            }
            c => {
                return Err(ParseError::new(
                    line,
                    col,
                    format!("unprintable character 0x{:02x}", c),
                ));
            }
        };

        let end = match kind {
            TokenKind::String => self.scan_string(&mut escaped)?,
            TokenKind::Number => self.scan_while(start, is_number_byte),
            TokenKind::Identifier => self.scan_while(start, |c| c.is_ascii_alphabetic()),
            _ => start + 1,
        };

        let text = self.input.get(start..end).ok_or_else(|| {
            ParseError::new(line, col, "token does not end on a character boundary")
        })?;
        self.cursor = end;
        if kind != TokenKind::String {
            self.col += end - start;
        }

        Ok(Token {
            kind,
            line,
            col,
            escaped,
            text,
        })
    }

    fn scan_while(&self, start: usize, accept: impl Fn(u8) -> bool) -> usize {
        let mut end = start;
        while self.byte_at(end).is_some_and(&accept) {
            end += 1;
        }
        end
    }

    /// Scans a string literal starting at the cursor's opening quote.
    /// Updates line/column as it goes, since literals may span lines.
    fn scan_string(&mut self, escaped: &mut bool) -> Result<usize, ParseError> {
        let (line, col) = (self.line, self.col);
        let mut cur = self.cursor + 1;
        self.col += 1;
        loop {
            let Some(c) = self.byte_at(cur) else {
                return Err(ParseError::new(line, col, "unterminated string"));
            };
            match c {
                b'"' => {
                    self.col += 1;
                    return Ok(cur + 1);
                }
                b'\\' => {
                    *escaped = true;
                    if self.byte_at(cur + 1).is_none() {
                        return Err(ParseError::new(line, col, "unterminated string"));
                    }
                    cur += 2;
                    self.col += 2;
                }
                b'\n' => {
                    cur += 1;
                    self.line += 1;
                    self.col = 1;
                }
                _ => {
                    cur += 1;
                    // Continuation bytes of a UTF-8 sequence do not start a column.
                    if c & 0xC0 != 0x80 {
                        self.col += 1;
                    }
                }
            }
        }
    }

    /// Skips whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.byte_at(self.cursor) {
            match c {
                b' ' | b'\t' => {
                    self.cursor += 1;
                    self.col += 1;
                }
                b'\r' => self.cursor += 1,
                b'\n' | 0x0B | 0x0C => {
                    self.cursor += 1;
                    self.line += 1;
                    self.col = 1;
                }
                b'/' if self.byte_at(self.cursor + 1) == Some(b'/') => {
                    while let Some(c) = self.byte_at(self.cursor) {
                        if c == b'\n' {
                            break;
                        }
                        self.cursor += 1;
                    }
                }
                b'/' if self.byte_at(self.cursor + 1) == Some(b'*') => {
                    self.skip_block_comment()?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let (line, col) = (self.line, self.col);
        self.cursor += 2;
        self.col += 2;
        loop {
            match self.byte_at(self.cursor) {
                None => return Err(ParseError::new(line, col, "unterminated comment")),
                Some(b'*') if self.byte_at(self.cursor + 1) == Some(b'/') => {
                    self.cursor += 2;
                    self.col += 2;
                    return Ok(());
                }
                Some(b'\n') => {
                    self.cursor += 1;
                    self.line += 1;
                    self.col = 1;
                }
                Some(c) => {
                    self.cursor += 1;
                    if c & 0xC0 != 0x80 {
                        self.col += 1;
                    }
                }
            }
        }
    }
}

fn is_number_byte(c: u8) -> bool {
    c.is_ascii_digit() || matches!(c, b'-' | b'.' | b'e' | b'E' | b'+')
}
