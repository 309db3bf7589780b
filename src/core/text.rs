// src/core/text.rs

//! # Structured-text codec
//!
//! Maps between the token stream and typed values. Every type that can appear
//! in a description implements [`Text`]. Entities get their implementation from
//! the field tables in `models.rs` (see `core::codec`); this module provides the
//! primitive, string, sequence and map bindings plus the layout helpers shared
//! by all of them.
//!
//! Layout rule: a compact single-line rendering is attempted first; if it is
//! shorter than [`INLINE_THRESHOLD`] and has no newline it is used, otherwise
//! one element per line with two spaces of indent per nesting level.

use crate::constants::INLINE_THRESHOLD;
use crate::core::tokenizer::{ParseError, Token, TokenKind, Tokenizer};
use crate::models::MultiMap;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A value that can be read from and written to the structured-text format.
pub trait Text: Sized {
    /// Parses one value from the token stream.
    fn parse(tokens: &mut Tokenizer<'_>) -> Result<Self, ParseError>;

    /// Appends the value to `out`. `indent` is the nesting level of the value itself.
    fn write(&self, out: &mut String, indent: usize);
}

/// Parses a whole document: one value followed only by whitespace or comments.
pub fn from_str<T: Text>(input: &str) -> Result<T, ParseError> {
    let mut tokens = Tokenizer::new(input);
    let value = T::parse(&mut tokens)?;
    if !tokens.at_end()? {
        let token = tokens.peek()?;
        return Err(ParseError::at(
            &token,
            format!("unexpected '{}' after end of document", token.text),
        ));
    }
    Ok(value)
}

/// Renders a value as a document, with a trailing newline.
pub fn to_string<T: Text>(value: &T) -> String {
    let mut out = String::new();
    value.write(&mut out, 0);
    out.push('\n');
    out
}

pub(crate) fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// Writes a bracketed list of pre-rendered items using the inline heuristic.
///
/// `render` is called with the nesting level the item lives at and must append
/// exactly one item. Items are rendered once for the compact attempt (stopping
/// as soon as the threshold is crossed) and again for the multi-line layout.
pub(crate) fn write_block(
    out: &mut String,
    indent_level: usize,
    open: char,
    close: char,
    count: usize,
    render: impl Fn(usize, &mut String),
) {
    out.push(open);
    if count == 0 {
        out.push(close);
        return;
    }

    let mut compact = String::new();
    let mut fits = true;
    for i in 0..count {
        if i > 0 {
            compact.push_str(", ");
        }
        render(i, &mut compact);
        if compact.len() >= INLINE_THRESHOLD || compact.contains('\n') {
            fits = false;
            break;
        }
    }

    if fits {
        out.push_str(&compact);
    } else {
        for i in 0..count {
            out.push('\n');
            indent(out, indent_level + 1);
            render(i, out);
            if i + 1 < count {
                out.push(',');
            }
        }
        out.push('\n');
        indent(out, indent_level);
    }
    out.push(close);
}

/// Parses `[ elem (, elem)* ,? ]`, calling `element` for each item.
pub(crate) fn parse_array<'a>(
    tokens: &mut Tokenizer<'a>,
    mut element: impl FnMut(&mut Tokenizer<'a>) -> Result<(), ParseError>,
) -> Result<(), ParseError> {
    tokens.expect(TokenKind::ArrayOpen)?;
    while tokens.peek()?.kind != TokenKind::ArrayClose {
        element(tokens)?;
        if tokens.peek()?.kind != TokenKind::ArrayClose {
            tokens.expect(TokenKind::Comma)?;
        }
    }
    tokens.expect(TokenKind::ArrayClose)?;
    Ok(())
}

/// Parses `{ "key": value (, ...)* ,? }`, calling `entry` after each key and colon.
/// The callback must consume exactly one value.
pub(crate) fn parse_object<'a>(
    tokens: &mut Tokenizer<'a>,
    mut entry: impl FnMut(&mut Tokenizer<'a>, String, &Token<'a>) -> Result<(), ParseError>,
) -> Result<(), ParseError> {
    tokens.expect(TokenKind::ObjectOpen)?;
    while tokens.peek()?.kind != TokenKind::ObjectClose {
        let key_token = tokens.peek()?;
        let key = String::parse(tokens)?;
        tokens.expect(TokenKind::Colon)?;
        entry(tokens, key, &key_token)?;
        if tokens.peek()?.kind != TokenKind::ObjectClose {
            tokens.expect(TokenKind::Comma)?;
        }
    }
    tokens.expect(TokenKind::ObjectClose)?;
    Ok(())
}

// --- Primitives ---

impl Text for bool {
    fn parse(tokens: &mut Tokenizer<'_>) -> Result<Self, ParseError> {
        let token = tokens.expect(TokenKind::Identifier)?;
        match token.text {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ParseError::at(
                &token,
                format!("expected 'true' or 'false' found '{}'", other),
            )),
        }
    }

    fn write(&self, out: &mut String, _indent: usize) {
        out.push_str(if *self { "true" } else { "false" });
    }
}

macro_rules! text_number {
    ($($ty:ty => $what:literal),* $(,)?) => {
        $(
            impl Text for $ty {
                fn parse(tokens: &mut Tokenizer<'_>) -> Result<Self, ParseError> {
                    let token = tokens.expect(TokenKind::Number)?;
                    token.text.parse::<$ty>().map_err(|_| {
                        ParseError::at(
                            &token,
                            format!("'{}' is not a valid {}", token.text, $what),
                        )
                    })
                }

                fn write(&self, out: &mut String, _indent: usize) {
                    let _ = write!(out, "{}", self);
                }
            }
        )*
    };
}

text_number! {
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
}

// Overflowing literals such as `1e999` parse to infinity, which has no textual
// form the tokenizer accepts, so only finite values are let through. Writing
// a non-finite value built in code yields `inf` or `NaN`, which reparsing
// rejects.
macro_rules! text_float {
    ($($ty:ty => $what:literal),* $(,)?) => {
        $(
            impl Text for $ty {
                fn parse(tokens: &mut Tokenizer<'_>) -> Result<Self, ParseError> {
                    let token = tokens.expect(TokenKind::Number)?;
                    let value = token.text.parse::<$ty>().map_err(|_| {
                        ParseError::at(
                            &token,
                            format!("'{}' is not a valid {}", token.text, $what),
                        )
                    })?;
                    if !value.is_finite() {
                        return Err(ParseError::at(
                            &token,
                            format!("'{}' is not a finite {}", token.text, $what),
                        ));
                    }
                    Ok(value)
                }

                fn write(&self, out: &mut String, _indent: usize) {
                    let _ = write!(out, "{}", self);
                }
            }
        )*
    };
}

text_float! {
    f32 => "f32",
    f64 => "f64",
}

// --- Strings ---

impl Text for String {
    fn parse(tokens: &mut Tokenizer<'_>) -> Result<Self, ParseError> {
        let token = tokens.expect(TokenKind::String)?;
        if token.escaped {
            unescape(&token)
        } else {
            Ok(token.unquoted().to_string())
        }
    }

    fn write(&self, out: &mut String, _indent: usize) {
        out.push('"');
        escape_into(self, out);
        out.push('"');
    }
}

/// Appends `value` to `out`, escaping quotes, backslashes and control characters.
pub fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
}

/// Decodes the escape sequences of a string token.
pub fn unescape(token: &Token<'_>) -> Result<String, ParseError> {
    let raw = token.unquoted();
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        let escape = chars
            .next()
            .ok_or_else(|| ParseError::at(token, "dangling backslash in string"))?;
        match escape {
            '"' => result.push('"'),
            '\\' => result.push('\\'),
            '/' => result.push('/'),
            'b' => result.push('\u{8}'),
            'f' => result.push('\u{c}'),
            'n' => result.push('\n'),
            'r' => result.push('\r'),
            't' => result.push('\t'),
            'u' => {
                let high = parse_hex4(token, &mut chars)?;
                let code = if (0xD800..=0xDFFF).contains(&high) {
                    if high >= 0xDC00 {
                        return Err(ParseError::at(
                            token,
                            format!("unpaired low surrogate \\u{:04x}", high),
                        ));
                    }
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(ParseError::at(
                            token,
                            "expected another unicode escape sequence for surrogate pair",
                        ));
                    }
                    let low = parse_hex4(token, &mut chars)?;
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Err(ParseError::at(
                            token,
                            format!("invalid low surrogate \\u{:04x}", low),
                        ));
                    }
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                let decoded = char::from_u32(code).ok_or_else(|| {
                    ParseError::at(token, format!("invalid code point U+{:04X}", code))
                })?;
                result.push(decoded);
            }
            other => {
                return Err(ParseError::at(
                    token,
                    format!("unexpected escape sequence: \\{}", other),
                ));
            }
        }
    }
    Ok(result)
}

fn parse_hex4(token: &Token<'_>, chars: &mut std::str::Chars<'_>) -> Result<u32, ParseError> {
    let mut code = 0u32;
    for _ in 0..4 {
        let c = chars
            .next()
            .ok_or_else(|| ParseError::at(token, "truncated unicode escape sequence"))?;
        let digit = c.to_digit(16).ok_or_else(|| {
            ParseError::at(token, format!("invalid char in escape sequence: {}", c))
        })?;
        code = (code << 4) | digit;
    }
    Ok(code)
}

// --- Containers ---

impl<T: Text> Text for Vec<T> {
    fn parse(tokens: &mut Tokenizer<'_>) -> Result<Self, ParseError> {
        let mut result = Vec::new();
        parse_array(tokens, |tokens| {
            result.push(T::parse(tokens)?);
            Ok(())
        })?;
        Ok(result)
    }

    fn write(&self, out: &mut String, indent: usize) {
        write_block(out, indent, '[', ']', self.len(), |i, buf| {
            if let Some(item) = self.get(i) {
                item.write(buf, indent + 1);
            }
        });
    }
}

impl<T: Text> Text for Option<T> {
    fn parse(tokens: &mut Tokenizer<'_>) -> Result<Self, ParseError> {
        let next = tokens.peek()?;
        if next.kind == TokenKind::Identifier && next.text == "null" {
            tokens.next_token()?;
            return Ok(None);
        }
        T::parse(tokens).map(Some)
    }

    fn write(&self, out: &mut String, indent: usize) {
        match self {
            Some(value) => value.write(out, indent),
            None => out.push_str("null"),
        }
    }
}

fn write_entry<V: Text>(buf: &mut String, key: &str, value: &V, indent: usize) {
    key.to_string().write(buf, indent + 1);
    buf.push_str(": ");
    value.write(buf, indent + 1);
}

impl<V: Text> Text for BTreeMap<String, V> {
    fn parse(tokens: &mut Tokenizer<'_>) -> Result<Self, ParseError> {
        let mut result = BTreeMap::new();
        parse_object(tokens, |tokens, key, key_token| {
            if result.contains_key(&key) {
                return Err(ParseError::at(
                    key_token,
                    format!("duplicate key '{}'", key),
                ));
            }
            result.insert(key, V::parse(tokens)?);
            Ok(())
        })?;
        Ok(result)
    }

    fn write(&self, out: &mut String, indent: usize) {
        let entries: Vec<(&String, &V)> = self.iter().collect();
        write_block(out, indent, '{', '}', entries.len(), |i, buf| {
            if let Some((key, value)) = entries.get(i) {
                write_entry(buf, key, *value, indent);
            }
        });
    }
}

impl<V: Text> Text for MultiMap<V> {
    fn parse(tokens: &mut Tokenizer<'_>) -> Result<Self, ParseError> {
        let mut result = MultiMap::new();
        parse_object(tokens, |tokens, key, _| {
            result.insert(key, V::parse(tokens)?);
            Ok(())
        })?;
        Ok(result)
    }

    fn write(&self, out: &mut String, indent: usize) {
        let entries: Vec<(&str, &V)> = self.iter().collect();
        write_block(out, indent, '{', '}', entries.len(), |i, buf| {
            if let Some((key, value)) = entries.get(i) {
                write_entry(buf, key, *value, indent);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives_in_sequence() {
        let mut tokens = Tokenizer::new("42 2.5 \"test\" [1, 2, 4] {\"a\": 1, \"b\": 2} true");
        assert_eq!(i32::parse(&mut tokens).unwrap(), 42);
        assert!((f32::parse(&mut tokens).unwrap() - 2.5).abs() < f32::EPSILON);
        assert_eq!(String::parse(&mut tokens).unwrap(), "test");
        assert_eq!(Vec::<u8>::parse(&mut tokens).unwrap(), vec![1, 2, 4]);
        let map = BTreeMap::<String, i64>::parse(&mut tokens).unwrap();
        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.get("b"), Some(&2));
        assert!(bool::parse(&mut tokens).unwrap());
    }

    #[test]
    fn test_unescape_control_characters() {
        let value: String = from_str(r#""\u0001\u0012\u0008\u0016\"\\""#).unwrap();
        assert_eq!(value.as_bytes(), &[0x01, 0x12, 0x08, 0x16, b'"', b'\\']);
    }

    #[test]
    fn test_unescape_surrogate_pair() {
        let value: String = from_str(r#""clef \ud834\udd1e \u00e9 \/""#).unwrap();
        assert_eq!(value, "clef \u{1D11E} \u{e9} /");
    }

    #[test]
    fn test_malformed_escapes_are_errors() {
        assert!(from_str::<String>(r#""\q""#).unwrap_err().message.contains("unexpected escape"));
        assert!(from_str::<String>(r#""\u12g4""#).unwrap_err().message.contains("invalid char"));
        assert!(from_str::<String>(r#""\ud834 alone""#).is_err());
        assert!(from_str::<String>(r#""\udd1e""#).unwrap_err().message.contains("unpaired"));
    }

    #[test]
    fn test_escape_round_trip() {
        let original = "tab\tquote\"slash\\nl\n\u{1}";
        let rendered = to_string(&original.to_string());
        assert_eq!(rendered, "\"tab\\tquote\\\"slash\\\\nl\\n\\u0001\"\n");
        let parsed: String = from_str(&rendered).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_trailing_commas_are_tolerated() {
        let list: Vec<String> = from_str("[\"a\", \"b\",]").unwrap();
        assert_eq!(list, vec!["a", "b"]);
        let map: BTreeMap<String, u32> = from_str("{\"a\": 1,}").unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_missing_separator_is_an_error() {
        let err = from_str::<Vec<u32>>("[1 2]").unwrap_err();
        assert!(err.message.contains("expected ','"));
    }

    #[test]
    fn test_number_out_of_range() {
        let err = from_str::<u8>("300").unwrap_err();
        assert!(err.message.contains("not a valid u8"));
    }

    #[test]
    fn test_overflowing_float_is_rejected() {
        let err = from_str::<f32>("1e999").unwrap_err();
        assert!(err.message.contains("not a finite f32"));
        assert!(from_str::<f64>("-1e400").is_err());
        assert_eq!(from_str::<f64>("1e300").unwrap(), 1e300);
    }

    #[test]
    fn test_map_rejects_duplicate_keys() {
        let err = from_str::<BTreeMap<String, u32>>("{\"x\": 1,\n \"x\": 2}").unwrap_err();
        assert_eq!((err.line, err.col), (2, 2));
        assert!(err.message.contains("duplicate key 'x'"));
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        let err = from_str::<u32>("1 2").unwrap_err();
        assert!(err.message.contains("after end of document"));
    }

    #[test]
    fn test_short_array_is_inlined() {
        let list = vec!["a.cpp".to_string(), "b.cpp".to_string()];
        assert_eq!(to_string(&list), "[\"a.cpp\", \"b.cpp\"]\n");
    }

    #[test]
    fn test_long_array_is_split_across_lines() {
        let list: Vec<String> = (0..8).map(|i| format!("src/module_{}.cpp", i)).collect();
        let rendered = to_string(&list);
        assert!(rendered.starts_with("[\n  \"src/module_0.cpp\",\n"));
        assert!(rendered.ends_with("  \"src/module_7.cpp\"\n]\n"));
        let parsed: Vec<String> = from_str(&rendered).unwrap();
        assert_eq!(parsed, list);
    }

    #[test]
    fn test_multimap_keeps_duplicate_keys() {
        let map: MultiMap<u32> = from_str("{\"x\": 1, \"y\": 2, \"x\": 3}").unwrap();
        assert_eq!(map.get_all("x"), &[1, 3]);
        assert_eq!(to_string(&map), "{\"x\": 1, \"x\": 3, \"y\": 2}\n");
    }
}
