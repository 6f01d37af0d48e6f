//! Per-type value codecs: the units a record plan delegates each field to.

use std::borrow::Cow;

use crate::error::{DecodeError, DecodeErrorKind, Result};
use crate::scanner::{
    Input, NumberGrammar, SliceInput, expect_literal, read_string, scan_number, skip_whitespace,
};
use crate::serialize::Encoder;
use crate::stream::Stream;

/// How many objects and arrays a decoded value may nest before decoding fails.
///
/// Skipped values are not counted: they are walked without recursion.
pub const MAX_DEPTH: usize = 128;

/// Decode-time settings threaded through every codec call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeContext {
    strict: bool,
    quoted: bool,
    depth: usize,
}

impl DecodeContext {
    /// Lenient decoding: unknown keys are skipped.
    pub const fn new() -> Self {
        Self {
            strict: false,
            quoted: false,
            depth: 0,
        }
    }

    /// Reject keys that resolve to no field.
    pub const fn deny_unknown_fields(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Whether unknown keys are errors.
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Whether the value being decoded is a quoted scalar.
    pub const fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// The same context with the quoted-scalar flag replaced.
    pub const fn with_quoted(mut self, quoted: bool) -> Self {
        self.quoted = quoted;
        self
    }

    /// How many containers enclose the value being decoded.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// The context for the contents of a container opened at `offset`.
    pub(crate) fn nested(mut self, offset: usize) -> Result<Self> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(DecodeError::new(DecodeErrorKind::ExceededMaxDepth, offset));
        }
        Ok(self)
    }
}

/// A type that can be read from and written to JSON.
///
/// Every decode either fills `self` in place or leaves it untouched on
/// `null`. Implementations exist for the integer and float primitives,
/// `bool`, `String`, `Option<T>`, `Box<T>`, `Vec<T>` and every
/// `#[derive(Record)]` type.
pub trait Codec {
    /// The quoted-scalar option (`#[plume(string)]`) has an effect on this type.
    const QUOTABLE: bool = false;

    /// This type is a number, bool or string.
    const SCALAR: bool = false;

    /// Decode one value from `buf` starting at `cursor`, returning the cursor
    /// just past it.
    fn decode(&mut self, buf: &[u8], cursor: usize, cx: DecodeContext) -> Result<usize>;

    /// Decode one value from a stream.
    fn decode_stream(&mut self, stream: &mut Stream<'_>, cx: DecodeContext) -> Result<()>;

    /// Append this value's JSON to `enc`. `quoted` wraps scalars in a string.
    fn encode(&self, enc: &mut Encoder<'_>, quoted: bool);

    /// Whether `#[plume(omit_empty)]` drops this value.
    fn is_empty(&self) -> bool {
        false
    }
}

/// Decoding written once against [`Input`], shared by both engines.
trait ReadValue {
    fn read<I: Input>(&mut self, input: &mut I, cx: DecodeContext) -> Result<()>;
}

macro_rules! decode_through_input {
    () => {
        fn decode(&mut self, buf: &[u8], cursor: usize, cx: DecodeContext) -> Result<usize> {
            let mut input = SliceInput::new(buf, cursor);
            ReadValue::read(self, &mut input, cx)?;
            Ok(input.pos())
        }

        fn decode_stream(&mut self, stream: &mut Stream<'_>, cx: DecodeContext) -> Result<()> {
            ReadValue::read(self, stream, cx)
        }
    };
}

/// Where a scalar's text came from.
enum Token {
    Null,
    /// A bare literal starting at this local position
    Bare(usize),
    /// The contents of a quoted scalar
    Quoted(String),
}

/// Locate the next scalar, honoring the quoted-scalar option. Bare tokens are
/// left unconsumed. Also returns the token's offset.
fn scalar_token<I: Input>(input: &mut I, cx: DecodeContext) -> Result<(usize, Token)> {
    let next = skip_whitespace(input)?;
    let offset = input.offset();
    let token = match next {
        None => return Err(DecodeError::eof("while looking for a value", offset)),
        Some(b'n') => {
            expect_literal(input, b"null", "in literal null")?;
            Token::Null
        }
        Some(b'"') if cx.is_quoted() => Token::Quoted(read_string(input)?.into_owned()),
        Some(_) if cx.is_quoted() => return Err(DecodeError::not_at_value(offset)),
        Some(_) => Token::Bare(input.pos()),
    };
    Ok((offset, token))
}

/// Read a number, bare or quoted. `None` for `null`.
fn number_literal<I: Input, T>(
    input: &mut I,
    cx: DecodeContext,
    target: &'static str,
    parse: impl FnOnce(&[u8], bool) -> Option<T>,
) -> Result<Option<T>> {
    let (offset, token) = scalar_token(input, cx)?;
    let parsed = match token {
        Token::Null => return Ok(None),
        Token::Bare(start) => {
            if !matches!(input.peek()?, Some(b'-' | b'0'..=b'9')) {
                return Err(DecodeError::not_at_value(offset));
            }
            let integer = scan_number(input)?;
            let literal = input.span(start);
            parse(literal, integer).ok_or_else(|| DecodeError::invalid_number(literal, target, offset))
        }
        Token::Quoted(text) => NumberGrammar::check(text.as_bytes())
            .and_then(|integer| parse(text.as_bytes(), integer))
            .ok_or_else(|| DecodeError::invalid_number(text.as_bytes(), target, offset)),
    };
    parsed.map(Some)
}

macro_rules! int_codec {
    ($($ty:ty => $wide:ty),* $(,)?) => {$(
        impl ReadValue for $ty {
            fn read<I: Input>(&mut self, input: &mut I, cx: DecodeContext) -> Result<()> {
                use lexical_parse_integer::FromLexical as _;

                let value = number_literal(input, cx, stringify!($ty), |literal, integer| {
                    if !integer {
                        return None;
                    }
                    <$wide>::from_lexical(literal)
                        .ok()
                        .and_then(|wide| <$ty>::try_from(wide).ok())
                })?;
                if let Some(value) = value {
                    *self = value;
                }
                Ok(())
            }
        }

        impl Codec for $ty {
            const QUOTABLE: bool = true;
            const SCALAR: bool = true;

            decode_through_input!();

            fn encode(&self, enc: &mut Encoder<'_>, quoted: bool) {
                enc.write_int(*self, quoted);
            }

            fn is_empty(&self) -> bool {
                *self == 0
            }
        }
    )*};
}

int_codec! {
    i8 => i64, i16 => i64, i32 => i64, i64 => i64, isize => i64,
    u8 => u64, u16 => u64, u32 => u64, u64 => u64, usize => u64,
}

macro_rules! float_codec {
    ($($ty:ty),* $(,)?) => {$(
        impl ReadValue for $ty {
            fn read<I: Input>(&mut self, input: &mut I, cx: DecodeContext) -> Result<()> {
                use lexical_parse_float::FromLexical as _;

                let value = number_literal(input, cx, stringify!($ty), |literal, _| {
                    <$ty>::from_lexical(literal).ok().filter(|f| f.is_finite())
                })?;
                if let Some(value) = value {
                    *self = value;
                }
                Ok(())
            }
        }

        impl Codec for $ty {
            const QUOTABLE: bool = true;
            const SCALAR: bool = true;

            decode_through_input!();

            fn encode(&self, enc: &mut Encoder<'_>, quoted: bool) {
                enc.write_float(*self, quoted);
            }

            fn is_empty(&self) -> bool {
                *self == 0.0
            }
        }
    )*};
}

float_codec!(f32, f64);

impl ReadValue for bool {
    fn read<I: Input>(&mut self, input: &mut I, cx: DecodeContext) -> Result<()> {
        let (offset, token) = scalar_token(input, cx)?;
        match token {
            Token::Null => {}
            Token::Bare(_) => match input.peek()? {
                Some(b't') => {
                    expect_literal(input, b"true", "in literal true")?;
                    *self = true;
                }
                Some(b'f') => {
                    expect_literal(input, b"false", "in literal false")?;
                    *self = false;
                }
                _ => return Err(DecodeError::not_at_value(offset)),
            },
            Token::Quoted(text) => {
                *self = match text.as_str() {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(DecodeError::invalid_string(
                            "quoted value is not a bool",
                            offset,
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Codec for bool {
    const QUOTABLE: bool = true;
    const SCALAR: bool = true;

    decode_through_input!();

    fn encode(&self, enc: &mut Encoder<'_>, quoted: bool) {
        enc.write_bool(*self, quoted);
    }

    fn is_empty(&self) -> bool {
        !*self
    }
}

impl ReadValue for String {
    fn read<I: Input>(&mut self, input: &mut I, cx: DecodeContext) -> Result<()> {
        let next = skip_whitespace(input)?;
        let offset = input.offset();
        match next {
            Some(b'n') => expect_literal(input, b"null", "in literal null"),
            Some(b'"') if cx.is_quoted() => {
                // the string holds a complete JSON string literal
                let outer = read_string(input)?;
                let mut inner = SliceInput::new(outer.as_bytes(), 0);
                let value = read_string(&mut inner).ok().map(Cow::into_owned);
                let value = value.filter(|_| inner.pos() == outer.len());
                match value {
                    Some(value) => {
                        *self = value;
                        Ok(())
                    }
                    None => Err(DecodeError::invalid_string(
                        "quoted value is not a string",
                        offset,
                    )),
                }
            }
            Some(b'"') => {
                let value = read_string(input)?;
                self.clear();
                self.push_str(&value);
                Ok(())
            }
            None => Err(DecodeError::eof("while looking for a string", offset)),
            Some(_) => Err(DecodeError::not_at_value(offset)),
        }
    }
}

impl Codec for String {
    const QUOTABLE: bool = true;
    const SCALAR: bool = true;

    decode_through_input!();

    fn encode(&self, enc: &mut Encoder<'_>, quoted: bool) {
        enc.write_str(self, quoted);
    }

    fn is_empty(&self) -> bool {
        String::is_empty(self)
    }
}

impl<T: Codec + Default> ReadValue for Option<T> {
    fn read<I: Input>(&mut self, input: &mut I, cx: DecodeContext) -> Result<()> {
        match skip_whitespace(input)? {
            Some(b'n') => {
                expect_literal(input, b"null", "in literal null")?;
                *self = None;
                Ok(())
            }
            None => Err(DecodeError::eof("while looking for a value", input.offset())),
            Some(_) => input.decode_codec(self.get_or_insert_with(T::default), cx),
        }
    }
}

/// `None` is `null`. The quoted-scalar option reaches through one level of
/// optionality and no further.
impl<T: Codec + Default> Codec for Option<T> {
    const QUOTABLE: bool = T::SCALAR;

    decode_through_input!();

    fn encode(&self, enc: &mut Encoder<'_>, quoted: bool) {
        match self {
            Some(value) => value.encode(enc, quoted),
            None => enc.write_null(),
        }
    }

    fn is_empty(&self) -> bool {
        self.is_none()
    }
}

impl<T: Codec> Codec for Box<T> {
    const QUOTABLE: bool = T::SCALAR;

    fn decode(&mut self, buf: &[u8], cursor: usize, cx: DecodeContext) -> Result<usize> {
        (**self).decode(buf, cursor, cx)
    }

    fn decode_stream(&mut self, stream: &mut Stream<'_>, cx: DecodeContext) -> Result<()> {
        (**self).decode_stream(stream, cx)
    }

    fn encode(&self, enc: &mut Encoder<'_>, quoted: bool) {
        (**self).encode(enc, quoted);
    }
}

impl<T: Codec + Default> ReadValue for Vec<T> {
    fn read<I: Input>(&mut self, input: &mut I, cx: DecodeContext) -> Result<()> {
        let cx = cx.with_quoted(false);
        let cx = match skip_whitespace(input)? {
            Some(b'n') => {
                expect_literal(input, b"null", "in literal null")?;
                self.clear();
                return Ok(());
            }
            Some(b'[') => {
                let cx = cx.nested(input.offset())?;
                input.bump();
                cx
            }
            None => return Err(DecodeError::eof("while looking for an array", input.offset())),
            Some(_) => return Err(DecodeError::not_at_value(input.offset())),
        };

        self.clear();
        if skip_whitespace(input)? == Some(b']') {
            input.bump();
            return Ok(());
        }
        loop {
            let mut element = T::default();
            input.decode_codec(&mut element, cx)?;
            self.push(element);
            match skip_whitespace(input)? {
                Some(b',') => input.bump(),
                Some(b']') => {
                    input.bump();
                    return Ok(());
                }
                None => return Err(DecodeError::eof("in array", input.offset())),
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

impl<T: Codec + Default> Codec for Vec<T> {
    decode_through_input!();

    fn encode(&self, enc: &mut Encoder<'_>, _quoted: bool) {
        enc.begin_array();
        for (i, element) in self.iter().enumerate() {
            enc.array_element(i == 0);
            element.encode(enc, false);
        }
        enc.end_array(self.is_empty());
    }

    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_buffer::ScanBuffer;
    use plume_testhelpers::test;

    fn decode<T: Codec + Default>(json: &str, cx: DecodeContext) -> Result<T> {
        let mut value = T::default();
        value.decode(json.as_bytes(), 0, cx)?;
        Ok(value)
    }

    fn decode_streamed<T: Codec + Default>(json: &str, cx: DecodeContext) -> Result<T> {
        let mut value = T::default();
        let mut window = ScanBuffer::with_capacity(1);
        let mut source = json.as_bytes();
        let mut stream = Stream::new(&mut window, &mut source);
        value.decode_stream(&mut stream, cx)?;
        Ok(value)
    }

    #[test]
    fn integers() {
        let cx = DecodeContext::new();
        assert_eq!(decode::<i32>(" -17", cx).unwrap(), -17);
        assert_eq!(decode::<u8>("255", cx).unwrap(), 255);
        assert_eq!(decode_streamed::<i64>("9223372036854775807", cx).unwrap(), i64::MAX);

        let err = decode::<u8>("256", cx).unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::InvalidNumber {
                literal: "256".into(),
                target: "u8",
            }
        );
        assert_eq!(decode::<i32>("1.5", cx).unwrap_err().code(), "plume::invalid_number");
        assert_eq!(decode::<i32>("1e3", cx).unwrap_err().code(), "plume::invalid_number");
        assert_eq!(decode::<u32>("-1", cx).unwrap_err().code(), "plume::invalid_number");
        assert_eq!(decode::<i32>("true", cx).unwrap_err().kind, DecodeErrorKind::NotAtBeginningOfValue);
    }

    #[test]
    fn null_leaves_scalars_untouched() {
        let mut n = 7i32;
        let end = n.decode(b"null", 0, DecodeContext::new()).unwrap();
        assert_eq!((n, end), (7, 4));

        let mut s = String::from("keep");
        s.decode(b" null", 0, DecodeContext::new()).unwrap();
        assert_eq!(s, "keep");
    }

    #[test]
    fn floats_and_bools() {
        let cx = DecodeContext::new();
        assert_eq!(decode::<f64>("-2.5e-3", cx).unwrap(), -0.0025);
        assert_eq!(decode_streamed::<f32>("0.5", cx).unwrap(), 0.5);
        assert!(decode::<bool>("true", cx).unwrap());
        assert_eq!(decode::<bool>("tru", cx).unwrap_err().code(), "plume::unexpected_end_of_input");
        assert_eq!(decode::<bool>("trUe", cx).unwrap_err().code(), "plume::invalid_character");
    }

    #[test]
    fn quoted_scalars() {
        let cx = DecodeContext::new().with_quoted(true);
        assert_eq!(decode::<i32>(r#""42""#, cx).unwrap(), 42);
        assert_eq!(decode::<f64>(r#""1.25""#, cx).unwrap(), 1.25);
        assert!(decode_streamed::<bool>(r#""true""#, cx).unwrap());
        assert_eq!(decode::<String>(r#""\"hi\"""#, cx).unwrap(), "hi");
        assert_eq!(decode_streamed::<String>(r#""\"a\\nb\"""#, cx).unwrap(), "a\nb");
        assert_eq!(decode::<Option<i32>>(r#""7""#, cx).unwrap(), Some(7));
        assert_eq!(decode::<Option<i32>>("null", cx).unwrap(), None);

        assert_eq!(decode::<i32>("42", cx).unwrap_err().kind, DecodeErrorKind::NotAtBeginningOfValue);
        assert_eq!(decode::<i32>(r#""4 2""#, cx).unwrap_err().code(), "plume::invalid_number");
        assert_eq!(decode::<String>(r#""hi""#, cx).unwrap_err().code(), "plume::invalid_string");
    }

    #[test]
    fn options_and_sequences() {
        let cx = DecodeContext::new();
        assert_eq!(decode::<Option<u16>>("12", cx).unwrap(), Some(12));
        assert_eq!(decode::<Option<Option<u16>>>("null", cx).unwrap(), None);
        assert_eq!(decode::<Box<i8>>("-3", cx).unwrap(), Box::new(-3));
        assert_eq!(decode::<Vec<i32>>(" [1, 2 ,3]", cx).unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_streamed::<Vec<String>>(r#"["a","b"]"#, cx).unwrap(), ["a", "b"]);
        assert_eq!(decode::<Vec<i32>>("[]", cx).unwrap(), Vec::<i32>::new());
        assert_eq!(
            decode::<Vec<i32>>("[1 2]", cx).unwrap_err().kind,
            DecodeErrorKind::ExpectedCommaAfterElement
        );
        assert_eq!(decode::<Vec<i32>>("[1,]", cx).unwrap_err().kind, DecodeErrorKind::NotAtBeginningOfValue);
    }

    #[test]
    fn quotability() {
        const {
            assert!(i32::QUOTABLE && String::QUOTABLE);
            assert!(<Option<i32>>::QUOTABLE && <Box<bool>>::QUOTABLE);
            assert!(!<Option<Option<i32>>>::QUOTABLE);
            assert!(!<Vec<i32>>::QUOTABLE);
        }
    }
}
