//! Decoding entry points: whole buffers and incremental readers.

use std::io::Read;

use crate::codec::{Codec, DecodeContext};
use crate::error::{DecodeError, DecodeErrorKind, Result};
use crate::scan_buffer::ScanBuffer;
use crate::scanner::{Input, SliceInput, skip_whitespace};
use crate::stream::Stream;

/// Options for decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fail on object keys that match no field instead of skipping them
    pub deny_unknown_fields: bool,
}

impl DecodeOptions {
    /// Lenient decoding.
    pub const fn new() -> Self {
        Self {
            deny_unknown_fields: false,
        }
    }

    /// Fail on unknown keys.
    pub const fn deny_unknown_fields(mut self, deny: bool) -> Self {
        self.deny_unknown_fields = deny;
        self
    }

    /// The context handed to codecs.
    pub const fn context(&self) -> DecodeContext {
        if self.deny_unknown_fields {
            DecodeContext::new().deny_unknown_fields()
        } else {
            DecodeContext::new()
        }
    }
}

/// Decode a value from a complete JSON document.
pub fn from_slice<T: Codec + Default>(input: &[u8]) -> Result<T> {
    from_slice_with_options(input, &DecodeOptions::default())
}

/// Decode a value from a complete JSON document held in a string.
pub fn from_str<T: Codec + Default>(input: &str) -> Result<T> {
    from_slice(input.as_bytes())
}

/// Decode a value from a complete JSON document with custom options.
pub fn from_slice_with_options<T: Codec + Default>(
    input: &[u8],
    options: &DecodeOptions,
) -> Result<T> {
    let mut value = T::default();
    decode_into(&mut value, input, options)?;
    Ok(value)
}

/// Decode a complete JSON document into an existing value, keeping whatever
/// the document does not mention.
pub fn decode_into<T: Codec + ?Sized>(
    value: &mut T,
    input: &[u8],
    options: &DecodeOptions,
) -> Result<()> {
    let end = value.decode(input, 0, options.context())?;
    let mut rest = SliceInput::new(input, end);
    match skip_whitespace(&mut rest)? {
        None => Ok(()),
        Some(_) => Err(DecodeError::new(
            DecodeErrorKind::TrailingCharacters,
            rest.offset(),
        )),
    }
}

/// Decode a single value from a reader, requiring nothing but whitespace after it.
pub fn from_reader<T: Codec + Default, R: Read>(reader: R) -> Result<T> {
    let mut decoder = Decoder::new(reader);
    let value = decoder.decode()?;
    decoder.end()?;
    Ok(value)
}

/// Decodes a sequence of values from a reader, one at a time.
///
/// The decoder owns a [`ScanBuffer`] that is refilled as values are read.
/// Bytes read past the end of one value stay buffered for the next.
///
/// ```
/// # use plume::{Decoder, Record};
/// #[derive(Default, Record)]
/// struct Event {
///     id: u32,
/// }
///
/// let mut decoder = Decoder::new(&br#"{"id":1} {"id":2}"#[..]);
/// assert_eq!(decoder.decode::<Event>().unwrap().id, 1);
/// assert_eq!(decoder.decode::<Event>().unwrap().id, 2);
/// decoder.end().unwrap();
/// ```
pub struct Decoder<R> {
    reader: R,
    window: ScanBuffer,
    options: DecodeOptions,
}

impl<R: Read> Decoder<R> {
    /// A decoder with the default window size.
    pub fn new(reader: R) -> Self {
        Self::with_window(reader, ScanBuffer::new())
    }

    /// A decoder whose window starts at `capacity` bytes.
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self::with_window(reader, ScanBuffer::with_capacity(capacity))
    }

    fn with_window(reader: R, window: ScanBuffer) -> Self {
        Self {
            reader,
            window,
            options: DecodeOptions::default(),
        }
    }

    /// Replace the decode options.
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Decode the next value.
    pub fn decode<T: Codec + Default>(&mut self) -> Result<T> {
        let mut value = T::default();
        self.decode_into(&mut value)?;
        Ok(value)
    }

    /// Decode the next value into an existing one.
    pub fn decode_into<T: Codec + ?Sized>(&mut self, value: &mut T) -> Result<()> {
        let mut stream = Stream::new(&mut self.window, &mut self.reader);
        value.decode_stream(&mut stream, self.options.context())?;
        stream.release();
        Ok(())
    }

    /// Whether only whitespace remains.
    pub fn is_at_end(&mut self) -> Result<bool> {
        let mut stream = Stream::new(&mut self.window, &mut self.reader);
        let next = skip_whitespace(&mut stream)?;
        stream.release();
        Ok(next.is_none())
    }

    /// Require that only whitespace remains.
    pub fn end(&mut self) -> Result<()> {
        let mut stream = Stream::new(&mut self.window, &mut self.reader);
        match skip_whitespace(&mut stream)? {
            None => Ok(()),
            Some(_) => Err(DecodeError::new(
                DecodeErrorKind::TrailingCharacters,
                stream.offset(),
            )),
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.window.discarded()
    }

    /// The underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Record;
    use plume_testhelpers::test;

    #[derive(Debug, Default, PartialEq, Record)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn trailing_characters() {
        assert_eq!(from_str::<Point>(" {\"x\":1} \n").unwrap(), Point { x: 1, y: 0 });
        let err = from_str::<Point>(r#"{"x":1} x"#).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::TrailingCharacters);
        assert_eq!(err.offset, 8);
        let err = from_reader::<Point, _>(&br#"{"x":1}{}"#[..]).unwrap_err();
        assert_eq!((err.kind, err.offset), (DecodeErrorKind::TrailingCharacters, 7));
    }

    #[test]
    fn decode_into_keeps_unmentioned_fields() {
        let mut point = Point { x: 5, y: 6 };
        decode_into(&mut point, br#"{"y":-1}"#, &DecodeOptions::new()).unwrap();
        assert_eq!(point, Point { x: 5, y: -1 });
    }

    #[test]
    fn strict_option_reaches_codecs() {
        let strict = DecodeOptions::new().deny_unknown_fields(true);
        let err = from_slice_with_options::<Point>(br#"{"z":1}"#, &strict).unwrap_err();
        assert_eq!(err.code(), "plume::unknown_field");
        assert!(from_slice::<Point>(br#"{"z":1}"#).is_ok());

        let mut decoder = Decoder::new(&br#"{"z":1}"#[..]).with_options(strict);
        assert!(decoder.decode::<Point>().is_err());
    }

    #[test]
    fn decoder_reads_a_sequence() {
        let input = "{\"x\":1}\n{\"x\":2,\"y\":3}\n  ";
        let mut decoder = Decoder::with_capacity(input.as_bytes(), 4);
        assert_eq!(decoder.decode::<Point>().unwrap(), Point { x: 1, y: 0 });
        assert_eq!(decoder.offset(), 7);
        assert!(!decoder.is_at_end().unwrap());
        assert_eq!(decoder.decode::<Point>().unwrap(), Point { x: 2, y: 3 });
        assert!(decoder.is_at_end().unwrap());
        decoder.end().unwrap();
    }
}
