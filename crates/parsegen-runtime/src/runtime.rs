//! Byte-level scanning primitives called by generated parsers.
//!
//! This file is copied verbatim next to every generated `mod.rs`, so it must
//! compile with the standard library alone. All primitives operate on a
//! `(buf, pos)` pair where `pos` is the cursor into the input buffer and is
//! advanced in place.

use std::fmt;

/// Message for UTF-8 validation failures.
pub const ERR_UTF8: &str = "invalid UTF-8";
/// Message for escape-decoding failures.
pub const ERR_UNQUOTE: &str = "invalid string escape";
/// Message prefix for unknown object keys under the `fail` policy.
pub const ERR_UNEXPECTED_KEY: &str = "unexpected key \"";
/// Message prefix for numeric decode failures.
pub const ERR_NUMBER: &str = "invalid number: ";
/// Message for a truncated JSON array.
pub const ERR_END_OF_ARRAY: &str = "unexpected end of array";

/// How many input bytes around the failure offset are captured into
/// [`ParseError::context`].
const CONTEXT_BYTES: usize = 24;

/// A parse failure: the cursor position it happened at, what went wrong,
/// and the surrounding input bytes for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
    pub context: String,
}

impl ParseError {
    /// Builds an error at `offset`, capturing nearby bytes from `buf`.
    pub fn at(buf: &[u8], offset: usize, message: impl Into<String>) -> Self {
        let start = offset.saturating_sub(CONTEXT_BYTES / 2).min(buf.len());
        let end = (start + CONTEXT_BYTES).min(buf.len());
        ParseError {
            offset,
            message: message.into(),
            context: String::from_utf8_lossy(&buf[start..end]).into_owned(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at byte {} near {:?}",
            self.message, self.offset, self.context
        )
    }
}

impl std::error::Error for ParseError {}

/// Error for an object key not present in the schema, raised under the
/// `fail` unknown-keys policy.
pub fn unexpected_key(buf: &[u8], offset: usize, key: &[u8]) -> ParseError {
    let key = String::from_utf8_lossy(key);
    ParseError::at(buf, offset, format!("{ERR_UNEXPECTED_KEY}{key}\""))
}

/// Advances past JSON whitespace (space, tab, LF, CR).
#[inline]
pub fn skip_whitespace(buf: &[u8], pos: &mut usize) {
    while let Some(b' ' | b'\t' | b'\n' | b'\r') = buf.get(*pos) {
        *pos += 1;
    }
}

/// Consumes the byte `want` at the cursor, or fails.
#[inline]
pub fn expect_byte(buf: &[u8], pos: &mut usize, want: u8) -> Result<(), ParseError> {
    match buf.get(*pos) {
        Some(&c) if c == want => {
            *pos += 1;
            Ok(())
        }
        _ => Err(ParseError::at(
            buf,
            *pos,
            format!("expected '{}'", want as char),
        )),
    }
}

/// Returns the byte at the cursor and advances; EOF is an error.
#[inline]
pub fn next_byte(buf: &[u8], pos: &mut usize) -> Result<u8, ParseError> {
    match buf.get(*pos) {
        Some(&c) => {
            *pos += 1;
            Ok(c)
        }
        None => Err(ParseError::at(buf, *pos, "unexpected end of input")),
    }
}

/// Consumes a JSON string token and returns the raw bytes between the
/// quotes, escape sequences left unresolved. The cursor ends just past the
/// closing quote.
pub fn take_string_bytes<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8], ParseError> {
    expect_byte(buf, pos, b'"')?;
    let start = *pos;
    loop {
        match buf.get(*pos) {
            Some(b'"') => {
                let span = &buf[start..*pos];
                *pos += 1;
                return Ok(span);
            }
            // The byte after a backslash can never terminate the string.
            Some(b'\\') => *pos += 2,
            Some(_) => *pos += 1,
            None => return Err(ParseError::at(buf, *pos, "unexpected end of string")),
        }
    }
}

/// Takes an object key: a string token, then `:` with surrounding
/// whitespace. Returns the raw key bytes.
pub fn take_key_colon<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8], ParseError> {
    let key = take_string_bytes(buf, pos)?;
    skip_whitespace(buf, pos);
    expect_byte(buf, pos, b':')?;
    skip_whitespace(buf, pos);
    Ok(key)
}

/// Decodes a `true` or `false` literal.
#[inline]
pub fn decode_bool(buf: &[u8], pos: &mut usize) -> Result<bool, ParseError> {
    let rest = buf.get(*pos..).unwrap_or_default();
    if rest.starts_with(b"true") {
        *pos += 4;
        Ok(true)
    } else if rest.starts_with(b"false") {
        *pos += 5;
        Ok(false)
    } else {
        Err(ParseError::at(buf, *pos, "expected 'true' or 'false'"))
    }
}

/// Extent of a leading integer: optional sign, then digits.
fn integer_extent(buf: &[u8], pos: usize, signed: bool) -> usize {
    let mut end = pos;
    if signed && buf.get(end) == Some(&b'-') {
        end += 1;
    }
    while matches!(buf.get(end), Some(b'0'..=b'9')) {
        end += 1;
    }
    end
}

/// Extent of a leading JSON number: `-? digits frac? exp?`.
fn number_extent(buf: &[u8], pos: usize) -> usize {
    let mut end = integer_extent(buf, pos, true);
    if buf.get(end) == Some(&b'.') {
        end += 1;
        while matches!(buf.get(end), Some(b'0'..=b'9')) {
            end += 1;
        }
    }
    if matches!(buf.get(end), Some(b'e' | b'E')) {
        end += 1;
        if matches!(buf.get(end), Some(b'+' | b'-')) {
            end += 1;
        }
        while matches!(buf.get(end), Some(b'0'..=b'9')) {
            end += 1;
        }
    }
    end
}

/// Decodes a JSON integer into an `i64`, advancing past the consumed bytes.
pub fn decode_int64(buf: &[u8], pos: &mut usize) -> Result<i64, ParseError> {
    let end = integer_extent(buf, *pos, true);
    // The extent contains only ASCII digits and '-'.
    let text = unsafe { std::str::from_utf8_unchecked(&buf[*pos..end]) };
    match text.parse::<i64>() {
        Ok(value) => {
            *pos = end;
            Ok(value)
        }
        Err(err) => Err(ParseError::at(buf, *pos, format!("{ERR_NUMBER}{err}"))),
    }
}

/// Decodes a JSON integer into a `u64`, advancing past the consumed bytes.
pub fn decode_uint64(buf: &[u8], pos: &mut usize) -> Result<u64, ParseError> {
    let end = integer_extent(buf, *pos, false);
    // The extent contains only ASCII digits.
    let text = unsafe { std::str::from_utf8_unchecked(&buf[*pos..end]) };
    match text.parse::<u64>() {
        Ok(value) => {
            *pos = end;
            Ok(value)
        }
        Err(err) => Err(ParseError::at(buf, *pos, format!("{ERR_NUMBER}{err}"))),
    }
}

/// Decodes a JSON number into an `f32`, advancing past the consumed bytes.
pub fn decode_float32(buf: &[u8], pos: &mut usize) -> Result<f32, ParseError> {
    let end = number_extent(buf, *pos);
    // The extent contains only ASCII number bytes.
    let text = unsafe { std::str::from_utf8_unchecked(&buf[*pos..end]) };
    match text.parse::<f32>() {
        Ok(value) => {
            *pos = end;
            Ok(value)
        }
        Err(err) => Err(ParseError::at(buf, *pos, format!("{ERR_NUMBER}{err}"))),
    }
}

/// Decodes a JSON number into an `f64`, advancing past the consumed bytes.
pub fn decode_float64(buf: &[u8], pos: &mut usize) -> Result<f64, ParseError> {
    let end = number_extent(buf, *pos);
    // The extent contains only ASCII number bytes.
    let text = unsafe { std::str::from_utf8_unchecked(&buf[*pos..end]) };
    match text.parse::<f64>() {
        Ok(value) => {
            *pos = end;
            Ok(value)
        }
        Err(err) => Err(ParseError::at(buf, *pos, format!("{ERR_NUMBER}{err}"))),
    }
}

/// Validates that `span` is well-formed UTF-8; failures are reported at
/// `offset`.
#[inline]
pub fn check_utf8<'a>(buf: &[u8], offset: usize, span: &'a [u8]) -> Result<&'a str, ParseError> {
    std::str::from_utf8(span).map_err(|_| ParseError::at(buf, offset, ERR_UTF8))
}

/// Decodes the escape sequences of a raw JSON string span into owned text.
///
/// Handles the full escape grammar: `\" \\ \/ \b \f \n \r \t` and `\uXXXX`
/// including surrogate pairs. Returns `None` on a malformed escape, an
/// unpaired surrogate, or ill-formed UTF-8 between escapes.
pub fn unquote_bytes(span: &[u8]) -> Option<String> {
    let mut out = String::with_capacity(span.len());
    let mut i = 0;
    while i < span.len() {
        if span[i] == b'\\' {
            let (ch, used) = decode_escape(&span[i + 1..])?;
            out.push(ch);
            i += 1 + used;
        } else {
            let start = i;
            while i < span.len() && span[i] != b'\\' {
                i += 1;
            }
            out.push_str(std::str::from_utf8(&span[start..i]).ok()?);
        }
    }
    Some(out)
}

/// Decodes one escape sequence (the bytes after the backslash). Returns the
/// decoded char and how many input bytes it consumed.
fn decode_escape(rest: &[u8]) -> Option<(char, usize)> {
    match rest.first()? {
        b'"' => Some(('"', 1)),
        b'\\' => Some(('\\', 1)),
        b'/' => Some(('/', 1)),
        b'b' => Some(('\u{0008}', 1)),
        b'f' => Some(('\u{000C}', 1)),
        b'n' => Some(('\n', 1)),
        b'r' => Some(('\r', 1)),
        b't' => Some(('\t', 1)),
        b'u' => {
            let hi = hex4(rest.get(1..5)?)?;
            if (0xD800..0xDC00).contains(&hi) {
                // High surrogate: the low half must follow as another \u.
                if rest.get(5..7)? != b"\\u" {
                    return None;
                }
                let lo = hex4(rest.get(7..11)?)?;
                if !(0xDC00..0xE000).contains(&lo) {
                    return None;
                }
                let code = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
                Some((char::from_u32(code)?, 11))
            } else if (0xDC00..0xE000).contains(&hi) {
                None
            } else {
                Some((char::from_u32(hi)?, 5))
            }
        }
        _ => None,
    }
}

fn hex4(bytes: &[u8]) -> Option<u32> {
    let mut value = 0u32;
    for &b in bytes {
        value = value * 16 + (b as char).to_digit(16)?;
    }
    Some(value)
}

fn expect_literal(buf: &[u8], pos: &mut usize, lit: &[u8]) -> Result<(), ParseError> {
    let rest = buf.get(*pos..).unwrap_or_default();
    if rest.starts_with(lit) {
        *pos += lit.len();
        Ok(())
    } else {
        Err(ParseError::at(buf, *pos, "expected a value"))
    }
}

/// Skips one complete JSON value of any shape: scalar, string, array, or
/// object, with arbitrary nesting. Iterative, so input depth cannot
/// overflow the stack.
pub fn skip_value(buf: &[u8], pos: &mut usize) -> Result<(), ParseError> {
    let mut depth = 0usize;
    loop {
        skip_whitespace(buf, pos);
        let c = next_byte(buf, pos)?;
        match c {
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                if depth == 0 {
                    return Err(ParseError::at(buf, *pos - 1, "expected a value"));
                }
                depth -= 1;
            }
            b',' | b':' if depth > 0 => {}
            b'"' => {
                *pos -= 1;
                take_string_bytes(buf, pos)?;
            }
            b't' => {
                *pos -= 1;
                expect_literal(buf, pos, b"true")?;
            }
            b'f' => {
                *pos -= 1;
                expect_literal(buf, pos, b"false")?;
            }
            b'n' => {
                *pos -= 1;
                expect_literal(buf, pos, b"null")?;
            }
            b'-' | b'0'..=b'9' => {
                *pos -= 1;
                let end = number_extent(buf, *pos);
                if end == *pos {
                    return Err(ParseError::at(buf, *pos, "expected a value"));
                }
                *pos = end;
            }
            _ => return Err(ParseError::at(buf, *pos - 1, "expected a value")),
        }
        if depth == 0 {
            return Ok(());
        }
    }
}
