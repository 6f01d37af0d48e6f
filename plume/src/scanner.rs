//! Byte-level JSON primitives shared by the buffer and stream engines.
//!
//! Everything here is written against [`Input`], which is implemented by
//! [`SliceInput`] (a fully materialized buffer plus an integer cursor) and by
//! [`Stream`](crate::Stream) (a refillable window). Both monomorphize to
//! straight-line byte loops.

use std::borrow::Cow;

use crate::codec::{Codec, DecodeContext};
use crate::error::{DecodeError, DecodeErrorKind, Result};
use crate::shape::FieldCodec;

/// A cursor over JSON input.
pub(crate) trait Input {
    /// The byte at the cursor, pulling more input if needed. `None` at end of input.
    fn peek(&mut self) -> Result<Option<u8>>;

    /// Advance past the byte returned by the last successful [`Input::peek`].
    fn bump(&mut self);

    /// Local cursor position, valid until the next [`Input::release`].
    fn pos(&self) -> usize;

    /// Number of bytes before local position 0.
    fn base(&self) -> usize {
        0
    }

    /// Absolute offset of the cursor, for diagnostics.
    fn offset(&self) -> usize {
        self.base() + self.pos()
    }

    /// Bytes from local position `start` up to the cursor.
    fn span(&self, start: usize) -> &[u8];

    /// Forget everything before the cursor. Local positions taken earlier are invalidated.
    fn release(&mut self) {}

    /// With the cursor just past an opening quote, move past the closing quote.
    /// Returns whether the string body contained escapes.
    fn skip_string_body(&mut self) -> Result<bool> {
        let mut escaped = false;
        loop {
            match self.peek()? {
                None => return Err(DecodeError::eof("in string", self.offset())),
                Some(b'"') => {
                    self.bump();
                    return Ok(escaped);
                }
                Some(b'\\') => {
                    escaped = true;
                    self.bump();
                    if self.peek()?.is_none() {
                        return Err(DecodeError::eof("in escape sequence", self.offset()));
                    }
                    self.bump();
                }
                Some(_) => self.bump(),
            }
        }
    }

    /// Decode one value with `value`'s codec, continuing from the cursor.
    fn decode_codec<C: Codec + ?Sized>(&mut self, value: &mut C, cx: DecodeContext) -> Result<()>;

    /// Decode one value into a record field, continuing from the cursor.
    fn decode_field<R>(
        &mut self,
        field: &dyn FieldCodec<R>,
        record: &mut R,
        cx: DecodeContext,
    ) -> Result<()>;
}

/// A fully materialized buffer with an integer cursor.
pub(crate) struct SliceInput<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceInput<'a> {
    pub(crate) const fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }
}

impl Input for SliceInput<'_> {
    #[inline]
    fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.buf.get(self.pos).copied())
    }

    #[inline]
    fn bump(&mut self) {
        self.pos += 1;
    }

    #[inline]
    fn pos(&self) -> usize {
        self.pos
    }

    fn span(&self, start: usize) -> &[u8] {
        &self.buf[start..self.pos]
    }

    fn skip_string_body(&mut self) -> Result<bool> {
        let mut escaped = false;
        loop {
            let rest = self.buf.get(self.pos..).unwrap_or_default();
            let Some(hit) = memchr::memchr2(b'"', b'\\', rest) else {
                self.pos = self.buf.len();
                return Err(DecodeError::eof("in string", self.pos));
            };
            self.pos += hit;
            if rest[hit] == b'"' {
                self.pos += 1;
                return Ok(escaped);
            }
            escaped = true;
            if self.pos + 1 >= self.buf.len() {
                self.pos = self.buf.len();
                return Err(DecodeError::eof("in escape sequence", self.pos));
            }
            self.pos += 2;
        }
    }

    fn decode_codec<C: Codec + ?Sized>(&mut self, value: &mut C, cx: DecodeContext) -> Result<()> {
        self.pos = value.decode(self.buf, self.pos, cx)?;
        Ok(())
    }

    fn decode_field<R>(
        &mut self,
        field: &dyn FieldCodec<R>,
        record: &mut R,
        cx: DecodeContext,
    ) -> Result<()> {
        self.pos = field.decode(record, self.buf, self.pos, cx)?;
        Ok(())
    }
}

#[inline]
pub(crate) const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Skip whitespace and return the next byte without consuming it.
#[inline]
pub(crate) fn skip_whitespace<I: Input>(input: &mut I) -> Result<Option<u8>> {
    loop {
        match input.peek()? {
            Some(b) if is_whitespace(b) => input.bump(),
            other => return Ok(other),
        }
    }
}

/// Consume `literal` byte for byte.
pub(crate) fn expect_literal<I: Input>(
    input: &mut I,
    literal: &'static [u8],
    context: &'static str,
) -> Result<()> {
    for &expected in literal {
        match input.peek()? {
            None => return Err(DecodeError::eof(context, input.offset())),
            Some(b) if b == expected => input.bump(),
            Some(b) => return Err(DecodeError::invalid_char(b, context, input.offset())),
        }
    }
    Ok(())
}

/// Skip whitespace and consume the opening quote of a string.
pub(crate) fn open_string<I: Input>(input: &mut I, context: &'static str) -> Result<()> {
    match skip_whitespace(input)? {
        Some(b'"') => {
            input.bump();
            Ok(())
        }
        None => Err(DecodeError::eof(context, input.offset())),
        Some(_) => Err(DecodeError::not_at_value(input.offset())),
    }
}

/// Read a complete string value, unescaping it only if needed.
pub(crate) fn read_string<I: Input>(input: &mut I) -> Result<Cow<'_, str>> {
    open_string(input, "while looking for a string")?;
    let start = input.pos();
    let offset = input.offset();
    let escaped = input.skip_string_body()?;
    let raw = input.span(start);
    decode_str(&raw[..raw.len() - 1], escaped, offset)
}

/// Turn a raw string body (between the quotes) into text.
pub(crate) fn decode_str(body: &[u8], escaped: bool, offset: usize) -> Result<Cow<'_, str>> {
    if escaped {
        return unescape(body, offset).map(Cow::Owned);
    }
    if let Some(i) = body.iter().position(|&b| b < 0x20) {
        return Err(DecodeError::invalid_string(
            "control character in string",
            offset + i,
        ));
    }
    core::str::from_utf8(body)
        .map(Cow::Borrowed)
        .map_err(|e| DecodeError::invalid_string("invalid UTF-8", offset + e.valid_up_to()))
}

/// Decode a string body that contains escape sequences.
fn unescape(body: &[u8], offset: usize) -> Result<String> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;

    while i < body.len() {
        let byte = body[i];
        if byte < 0x20 {
            return Err(DecodeError::invalid_string(
                "control character in string",
                offset + i,
            ));
        }
        if byte != b'\\' {
            out.push(byte);
            i += 1;
            continue;
        }

        let Some(&escape) = body.get(i + 1) else {
            return Err(DecodeError::eof("in escape sequence", offset + i));
        };
        match escape {
            b'"' => out.push(b'"'),
            b'\\' => out.push(b'\\'),
            b'/' => out.push(b'/'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'u' => {
                let high = hex4(body, i + 2, offset)?;
                i += 6;

                let code_point = if (0xD800..=0xDBFF).contains(&high) {
                    if body.get(i) != Some(&b'\\') || body.get(i + 1) != Some(&b'u') {
                        return Err(DecodeError::invalid_string("lone leading surrogate", offset + i));
                    }
                    let low = hex4(body, i + 2, offset)?;
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Err(DecodeError::invalid_string("lone leading surrogate", offset + i));
                    }
                    i += 6;
                    0x10000 + (((high as u32) & 0x3FF) << 10) + ((low as u32) & 0x3FF)
                } else if (0xDC00..=0xDFFF).contains(&high) {
                    return Err(DecodeError::invalid_string("lone trailing surrogate", offset + i - 6));
                } else {
                    high as u32
                };

                let c = char::from_u32(code_point)
                    .ok_or_else(|| DecodeError::invalid_string("invalid code point", offset + i))?;
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                continue;
            }
            _ => return Err(DecodeError::invalid_string("invalid escape", offset + i)),
        }
        i += 2;
    }

    String::from_utf8(out).map_err(|e| {
        DecodeError::invalid_string("invalid UTF-8", offset + e.utf8_error().valid_up_to())
    })
}

fn hex4(body: &[u8], at: usize, offset: usize) -> Result<u16> {
    let Some(digits) = body.get(at..at + 4) else {
        return Err(DecodeError::eof("in unicode escape", offset + body.len()));
    };
    let mut value = 0u16;
    for (k, &d) in digits.iter().enumerate() {
        let nibble = match d {
            b'0'..=b'9' => d - b'0',
            b'a'..=b'f' => d - b'a' + 10,
            b'A'..=b'F' => d - b'A' + 10,
            _ => return Err(DecodeError::invalid_char(d, "in unicode escape", offset + at + k)),
        };
        value = (value << 4) | nibble as u16;
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberState {
    Start,
    Sign,
    Zero,
    Int,
    Dot,
    Frac,
    Exp,
    ExpSign,
    ExpDigits,
}

/// The JSON number grammar as a byte-at-a-time state machine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NumberGrammar {
    state: NumberState,
}

impl NumberGrammar {
    pub(crate) const fn new() -> Self {
        Self {
            state: NumberState::Start,
        }
    }

    /// Feed one byte. Returns false, leaving the state untouched, if the byte
    /// cannot continue the number.
    pub(crate) fn accept(&mut self, b: u8) -> bool {
        use NumberState::*;
        let next = match (self.state, b) {
            (Start, b'-') => Sign,
            (Start | Sign, b'0') => Zero,
            (Start | Sign, b'1'..=b'9') => Int,
            (Int, b'0'..=b'9') => Int,
            (Zero | Int, b'.') => Dot,
            (Dot | Frac, b'0'..=b'9') => Frac,
            (Zero | Int | Frac, b'e' | b'E') => Exp,
            (Exp, b'+' | b'-') => ExpSign,
            (Exp | ExpSign | ExpDigits, b'0'..=b'9') => ExpDigits,
            _ => return false,
        };
        self.state = next;
        true
    }

    pub(crate) const fn is_complete(&self) -> bool {
        matches!(
            self.state,
            NumberState::Zero | NumberState::Int | NumberState::Frac | NumberState::ExpDigits
        )
    }

    pub(crate) const fn is_integer(&self) -> bool {
        matches!(self.state, NumberState::Zero | NumberState::Int)
    }

    /// Run the whole of `literal` through the grammar. `Some(is_integer)` if it is one number.
    pub(crate) fn check(literal: &[u8]) -> Option<bool> {
        let mut grammar = Self::new();
        for &b in literal {
            if !grammar.accept(b) {
                return None;
            }
        }
        grammar.is_complete().then(|| grammar.is_integer())
    }
}

/// Consume one number token. Returns whether it was an integer literal.
pub(crate) fn scan_number<I: Input>(input: &mut I) -> Result<bool> {
    let start = input.pos();
    let offset = input.offset();
    let mut grammar = NumberGrammar::new();
    loop {
        match input.peek()? {
            Some(b) if grammar.accept(b) => input.bump(),
            _ if grammar.is_complete() => return Ok(grammar.is_integer()),
            None => return Err(DecodeError::eof("in number", input.offset())),
            Some(b) => {
                let mut literal = input.span(start).to_vec();
                literal.push(b);
                return Err(DecodeError::invalid_number(&literal, "number", offset));
            }
        }
    }
}

/// Structurally validate and discard one value of any kind.
pub(crate) fn skip_value<I: Input>(input: &mut I) -> Result<()> {
    // closing delimiters of the containers we are inside of
    let mut nesting: Vec<u8> = Vec::new();

    loop {
        match skip_whitespace(input)? {
            None => return Err(DecodeError::eof("while skipping a value", input.offset())),
            Some(b'{') => {
                input.bump();
                if skip_whitespace(input)? == Some(b'}') {
                    input.bump();
                } else {
                    nesting.push(b'}');
                    skip_key(input)?;
                    continue;
                }
            }
            Some(b'[') => {
                input.bump();
                if skip_whitespace(input)? == Some(b']') {
                    input.bump();
                } else {
                    nesting.push(b']');
                    continue;
                }
            }
            Some(b'"') => {
                input.bump();
                input.skip_string_body()?;
            }
            Some(b'-' | b'0'..=b'9') => {
                scan_number(input)?;
            }
            Some(b't') => expect_literal(input, b"true", "in literal true")?,
            Some(b'f') => expect_literal(input, b"false", "in literal false")?,
            Some(b'n') => expect_literal(input, b"null", "in literal null")?,
            Some(_) => return Err(DecodeError::not_at_value(input.offset())),
        }

        // a complete value was consumed; close whatever containers end here
        loop {
            let Some(&close) = nesting.last() else {
                return Ok(());
            };
            match skip_whitespace(input)? {
                Some(b',') => {
                    input.bump();
                    if close == b'}' {
                        skip_key(input)?;
                    }
                    break;
                }
                Some(b) if b == close => {
                    input.bump();
                    nesting.pop();
                }
                None => return Err(DecodeError::eof("while skipping a value", input.offset())),
                Some(_) => {
                    return Err(DecodeError::new(
                        DecodeErrorKind::ExpectedCommaAfterElement,
                        input.offset(),
                    ));
                }
            }
        }
    }
}

fn skip_key<I: Input>(input: &mut I) -> Result<()> {
    open_string(input, "while looking for an object key")?;
    input.skip_string_body()?;
    expect_colon(input)
}

/// Skip whitespace and consume the `:` after an object key.
pub(crate) fn expect_colon<I: Input>(input: &mut I) -> Result<()> {
    match skip_whitespace(input)? {
        Some(b':') => {
            input.bump();
            Ok(())
        }
        None => Err(DecodeError::eof("after object key", input.offset())),
        Some(_) => Err(DecodeError::new(
            DecodeErrorKind::ExpectedColonAfterKey,
            input.offset(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_testhelpers::test;

    fn skip(json: &str) -> Result<usize> {
        let mut input = SliceInput::new(json.as_bytes(), 0);
        skip_value(&mut input)?;
        Ok(input.pos())
    }

    #[test]
    fn skips_nested_values() {
        let json = r#"{"a":[1,2,{"b":null}],"c":{"d":"x\"y"},"e":-1.5e3} tail"#;
        assert_eq!(skip(json).unwrap(), json.len() - " tail".len());
        assert_eq!(skip("[]").unwrap(), 2);
        assert_eq!(skip(" {} ").unwrap(), 3);
        assert_eq!(skip("true,").unwrap(), 4);
    }

    #[test]
    fn skip_reports_structural_errors() {
        assert_eq!(
            skip(r#"{"a" 1}"#).unwrap_err().kind,
            DecodeErrorKind::ExpectedColonAfterKey
        );
        assert_eq!(
            skip("[1 2]").unwrap_err().kind,
            DecodeErrorKind::ExpectedCommaAfterElement
        );
        assert_eq!(
            skip("[1,").unwrap_err().code(),
            "plume::unexpected_end_of_input"
        );
        let err = skip("nul!").unwrap_err();
        assert_eq!(err.code(), "plume::invalid_character");
        assert_eq!(err.offset, 3);
        assert_eq!(skip("]").unwrap_err().kind, DecodeErrorKind::NotAtBeginningOfValue);
    }

    #[test]
    fn number_grammar() {
        assert_eq!(NumberGrammar::check(b"0"), Some(true));
        assert_eq!(NumberGrammar::check(b"-12"), Some(true));
        assert_eq!(NumberGrammar::check(b"1.25"), Some(false));
        assert_eq!(NumberGrammar::check(b"1E+9"), Some(false));
        assert_eq!(NumberGrammar::check(b"01"), None);
        assert_eq!(NumberGrammar::check(b"1."), None);
        assert_eq!(NumberGrammar::check(b"-"), None);
        assert_eq!(NumberGrammar::check(b""), None);
    }

    #[test]
    fn unescapes_strings() {
        let mut input = SliceInput::new(r#""a\n\u00e9\ud83d\ude00\/""#.as_bytes(), 0);
        assert_eq!(read_string(&mut input).unwrap(), "a\n\u{e9}\u{1F600}/");

        let mut input = SliceInput::new(br#""plain""#, 0);
        assert!(matches!(read_string(&mut input).unwrap(), Cow::Borrowed("plain")));

        let mut input = SliceInput::new(br#""\ud800x""#, 0);
        assert_eq!(read_string(&mut input).unwrap_err().code(), "plume::invalid_string");

        let mut input = SliceInput::new(br#""abc"#, 0);
        let err = read_string(&mut input).unwrap_err();
        assert_eq!(err.code(), "plume::unexpected_end_of_input");
        assert_eq!(err.offset, 4);
    }
}
