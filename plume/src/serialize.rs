//! JSON output: [`EncodeOptions`], the [`Encoder`] codecs write through, and
//! the `to_*` entry points.

use std::io::{self, Write};

use crate::codec::Codec;

/// Options for JSON encoding.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Whether to pretty-print with indentation (default: false)
    pub pretty: bool,

    /// Indentation string for pretty-printing (default: "  ")
    pub indent: &'static str,

    /// Whether `<`, `>`, `&`, U+2028 and U+2029 are written as `\u` escapes
    /// inside strings and keys (default: false)
    pub escape_html: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: "  ",
            escape_html: false,
        }
    }
}

impl EncodeOptions {
    /// Create new default options (compact output).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty-printing with default indentation.
    pub const fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Set a custom indentation string (implies pretty-printing).
    pub const fn indent(mut self, indent: &'static str) -> Self {
        self.indent = indent;
        self.pretty = true;
        self
    }

    /// Escape HTML-significant characters in strings.
    pub const fn escape_html(mut self, escape_html: bool) -> Self {
        self.escape_html = escape_html;
        self
    }
}

/// Output sink for [`Codec::encode`].
///
/// Tracks nesting depth for pretty-printing. Containers report whether they
/// wrote anything when they close, so empty ones print as `{}` and `[]`.
pub struct Encoder<'o> {
    out: &'o mut Vec<u8>,
    options: &'o EncodeOptions,
    depth: usize,
}

impl<'o> Encoder<'o> {
    /// Append to `out` using `options`.
    pub fn new(out: &'o mut Vec<u8>, options: &'o EncodeOptions) -> Self {
        Self {
            out,
            options,
            depth: 0,
        }
    }

    /// Whether keys and strings are HTML-escaped.
    pub fn escape_html(&self) -> bool {
        self.options.escape_html
    }

    fn write_indent(&mut self) {
        if self.options.pretty {
            self.out.push(b'\n');
            for _ in 0..self.depth {
                self.out.extend_from_slice(self.options.indent.as_bytes());
            }
        }
    }

    /// Open an object.
    pub fn begin_object(&mut self) {
        self.out.push(b'{');
        self.depth += 1;
    }

    /// Write a member key. `key` is already quoted and escaped.
    pub fn object_key(&mut self, first: bool, key: &[u8]) {
        if !first {
            self.out.push(b',');
        }
        self.write_indent();
        self.out.extend_from_slice(key);
        self.out.push(b':');
        if self.options.pretty {
            self.out.push(b' ');
        }
    }

    /// Close an object. `empty` if no member was written.
    pub fn end_object(&mut self, empty: bool) {
        self.depth -= 1;
        if !empty {
            self.write_indent();
        }
        self.out.push(b'}');
    }

    /// Open an array.
    pub fn begin_array(&mut self) {
        self.out.push(b'[');
        self.depth += 1;
    }

    /// Start an array element.
    pub fn array_element(&mut self, first: bool) {
        if !first {
            self.out.push(b',');
        }
        self.write_indent();
    }

    /// Close an array. `empty` if no element was written.
    pub fn end_array(&mut self, empty: bool) {
        self.depth -= 1;
        if !empty {
            self.write_indent();
        }
        self.out.push(b']');
    }

    /// Write `null`.
    pub fn write_null(&mut self) {
        self.out.extend_from_slice(b"null");
    }

    /// Write a boolean, inside a string if `quoted`.
    pub fn write_bool(&mut self, value: bool, quoted: bool) {
        let text: &[u8] = if value { b"true" } else { b"false" };
        self.write_bare(text, quoted);
    }

    /// Write an integer, inside a string if `quoted`.
    pub fn write_int<I: itoa::Integer>(&mut self, value: I, quoted: bool) {
        let mut buf = itoa::Buffer::new();
        let text = buf.format(value);
        self.write_bare(text.as_bytes(), quoted);
    }

    /// Write a float, inside a string if `quoted`. Non-finite values are `null`.
    pub(crate) fn write_float<F: ryu::Float + Finite>(&mut self, value: F, quoted: bool) {
        if !value.finite() {
            self.write_null();
            return;
        }
        let mut buf = ryu::Buffer::new();
        let text = buf.format_finite(value);
        self.write_bare(text.as_bytes(), quoted);
    }

    fn write_bare(&mut self, text: &[u8], quoted: bool) {
        if quoted {
            self.out.push(b'"');
            self.out.extend_from_slice(text);
            self.out.push(b'"');
        } else {
            self.out.extend_from_slice(text);
        }
    }

    /// Write a string. When `quoted` the JSON form of the string is itself
    /// written as a string.
    pub fn write_str(&mut self, s: &str, quoted: bool) {
        if quoted {
            let mut inner = Vec::with_capacity(s.len() + 2);
            write_json_string(&mut inner, s, self.options.escape_html);
            let inner = String::from_utf8_lossy(&inner);
            write_json_string(self.out, &inner, self.options.escape_html);
        } else {
            write_json_string(self.out, s, self.options.escape_html);
        }
    }
}

/// Floats that can report whether they are finite.
pub(crate) trait Finite: Copy {
    fn finite(self) -> bool;
}

impl Finite for f32 {
    fn finite(self) -> bool {
        self.is_finite()
    }
}

impl Finite for f64 {
    fn finite(self) -> bool {
        self.is_finite()
    }
}

/// Optimized JSON string writing with a 16-byte fast path.
///
/// Windows of plain ASCII are copied as-is; anything else is escaped
/// character by character.
pub(crate) fn write_json_string(out: &mut Vec<u8>, s: &str, escape_html: bool) {
    const STEP_SIZE: usize = 16; // u128 = 16 bytes
    type Chunk = [u8; STEP_SIZE];

    out.push(b'"');

    let mut s = s;
    while let Some(Ok(chunk)) = s.as_bytes().get(..STEP_SIZE).map(Chunk::try_from) {
        let window = u128::from_ne_bytes(chunk);
        let completely_ascii = window & 0x80808080808080808080808080808080 == 0;
        let quote_free = !contains_byte(window, b'"');
        let backslash_free = !contains_byte(window, b'\\');
        let control_char_free = no_control_chars(window);
        let html_free = !escape_html
            || !(contains_byte(window, b'<') || contains_byte(window, b'>') || contains_byte(window, b'&'));

        if completely_ascii && quote_free && backslash_free && control_char_free && html_free {
            out.extend_from_slice(&chunk);
            s = &s[STEP_SIZE..];
        } else {
            let mut chars = s.chars();
            let mut count = STEP_SIZE;
            for c in &mut chars {
                write_json_escaped_char(out, c, escape_html);
                count = count.saturating_sub(c.len_utf8());
                if count == 0 {
                    break;
                }
            }
            s = chars.as_str();
        }
    }

    for c in s.chars() {
        write_json_escaped_char(out, c, escape_html);
    }

    out.push(b'"');
}

#[inline]
fn write_json_escaped_char(out: &mut Vec<u8>, c: char, escape_html: bool) {
    match c {
        '"' => out.extend_from_slice(b"\\\""),
        '\\' => out.extend_from_slice(b"\\\\"),
        '\n' => out.extend_from_slice(b"\\n"),
        '\r' => out.extend_from_slice(b"\\r"),
        '\t' => out.extend_from_slice(b"\\t"),
        '\u{08}' => out.extend_from_slice(b"\\b"),
        '\u{0C}' => out.extend_from_slice(b"\\f"),
        c if (c as u32) < 0x20 => write_unicode_escape(out, c),
        '<' | '>' | '&' | '\u{2028}' | '\u{2029}' if escape_html => write_unicode_escape(out, c),
        c if c.is_ascii() => out.push(c as u8),
        c => {
            let mut buf = [0; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
}

fn write_unicode_escape(out: &mut Vec<u8>, c: char) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let code_point = c as u32;
    out.extend_from_slice(&[
        b'\\',
        b'u',
        HEX[((code_point >> 12) & 0xF) as usize],
        HEX[((code_point >> 8) & 0xF) as usize],
        HEX[((code_point >> 4) & 0xF) as usize],
        HEX[(code_point & 0xF) as usize],
    ]);
}

/// Check if a 128-bit window contains a specific byte
#[inline]
const fn contains_byte(window: u128, byte: u8) -> bool {
    let pattern = u128::from_ne_bytes([byte; 16]);
    let xor = window ^ pattern;
    let has_zero = (xor.wrapping_sub(0x01010101010101010101010101010101))
        & !xor
        & 0x80808080808080808080808080808080;
    has_zero != 0
}

/// For each of the 16 bytes, check that at least one of the top three bits is set.
#[inline]
const fn no_control_chars(value: u128) -> bool {
    let masked = value & 0xe0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0;
    let has_zero = (masked.wrapping_sub(0x01010101010101010101010101010101))
        & !masked
        & 0x80808080808080808080808080808080;
    has_zero == 0
}

/// Encode a value to a JSON byte vector.
pub fn to_vec<T: Codec + ?Sized>(value: &T) -> Vec<u8> {
    to_vec_with_options(value, &EncodeOptions::default())
}

/// Encode a value to a JSON byte vector with custom options.
pub fn to_vec_with_options<T: Codec + ?Sized>(value: &T, options: &EncodeOptions) -> Vec<u8> {
    let mut out = Vec::new();
    let mut enc = Encoder::new(&mut out, options);
    value.encode(&mut enc, false);
    out
}

/// Encode a value to a compact JSON string.
pub fn to_string<T: Codec + ?Sized>(value: &T) -> String {
    to_string_with_options(value, &EncodeOptions::default())
}

/// Encode a value to a pretty-printed JSON string.
pub fn to_string_pretty<T: Codec + ?Sized>(value: &T) -> String {
    to_string_with_options(value, &EncodeOptions::default().pretty())
}

/// Encode a value to a JSON string with custom options.
pub fn to_string_with_options<T: Codec + ?Sized>(value: &T, options: &EncodeOptions) -> String {
    let bytes = to_vec_with_options(value, options);
    // the encoder only ever writes valid UTF-8
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Encode a value as compact JSON into a writer.
pub fn to_writer<W: Write, T: Codec + ?Sized>(writer: W, value: &T) -> io::Result<()> {
    to_writer_with_options(writer, value, &EncodeOptions::default())
}

/// Encode a value as JSON into a writer with custom options.
pub fn to_writer_with_options<W: Write, T: Codec + ?Sized>(
    mut writer: W,
    value: &T,
    options: &EncodeOptions,
) -> io::Result<()> {
    writer.write_all(&to_vec_with_options(value, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_testhelpers::test;

    fn escaped(s: &str, escape_html: bool) -> String {
        let mut out = Vec::new();
        write_json_string(&mut out, s, escape_html);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn escapes_like_serde_json() {
        let samples = [
            "",
            "plain ascii that spans more than sixteen bytes",
            "quote \" backslash \\ slash /",
            "\u{0}\u{1f}\u{7f} \u{8}\u{c}\n\r\t",
            "caf\u{e9} \u{1F600} <b>&amp;</b> \u{2028}",
        ];
        for s in samples {
            assert_eq!(escaped(s, false), serde_json::to_string(s).unwrap());
        }
    }

    #[test]
    fn escapes_html_when_asked() {
        assert_eq!(
            escaped("<a href=\"x\">&</a>\u{2028}\u{2029}", true),
            r#""\u003ca href=\"x\"\u003e\u0026\u003c/a\u003e\u2028\u2029""#
        );
    }

    #[test]
    fn pretty_containers() {
        let options = EncodeOptions::new().pretty();
        assert_eq!(to_string_with_options(&vec![1, 2], &options), "[\n  1,\n  2\n]");
        assert_eq!(to_string_with_options(&Vec::<i32>::new(), &options), "[]");
        assert_eq!(
            to_string_with_options(&vec![vec![1u8], vec![]], &options.clone().indent("\t")),
            "[\n\t[\n\t\t1\n\t],\n\t[]\n]"
        );
    }

    #[test]
    fn scalars() {
        assert_eq!(to_string(&-12i64), "-12");
        assert_eq!(to_string(&1.0f64), "1.0");
        assert_eq!(to_string(&f64::NAN), "null");
        assert_eq!(to_string(&Some(0.5f32)), "0.5");
        assert_eq!(to_string(&None::<u8>), "null");

        let mut out = Vec::new();
        let options = EncodeOptions::default();
        let mut enc = Encoder::new(&mut out, &options);
        7u16.encode(&mut enc, true);
        true.encode(&mut enc, true);
        String::from("x").encode(&mut enc, true);
        assert_eq!(out, br#""7""true""\"x\"""#);
    }
}
