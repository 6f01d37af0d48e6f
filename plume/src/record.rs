//! Object decoding and encoding driven by a compiled [`RecordPlan`].
//!
//! The buffer and stream engines are the same function instantiated over two
//! [`Input`] implementations, so they cannot disagree on structure, errors or
//! field resolution.

use crate::codec::DecodeContext;
use crate::error::{DecodeError, DecodeErrorKind, Result};
use crate::plan::RecordPlan;
use crate::scanner::{
    Input, SliceInput, decode_str, expect_colon, expect_literal, skip_value, skip_whitespace,
};
use crate::serialize::Encoder;
use crate::shape::{Presence, Record};
use crate::stream::Stream;

/// Decode one JSON object (or `null`) from `buf` at `cursor` into `record`,
/// returning the cursor just past it.
///
/// Fields whose keys do not appear keep their current values. `null`
/// leaves the whole record untouched.
pub fn decode_record<R: Record>(
    record: &mut R,
    buf: &[u8],
    cursor: usize,
    cx: DecodeContext,
) -> Result<usize> {
    let mut input = SliceInput::new(buf, cursor);
    decode_object(R::plan(), record, &mut input, cx)?;
    Ok(input.pos())
}

/// Decode one JSON object (or `null`) from `stream` into `record`.
pub fn decode_record_from_stream<R: Record>(
    record: &mut R,
    stream: &mut Stream<'_>,
    cx: DecodeContext,
) -> Result<()> {
    decode_object(R::plan(), record, stream, cx)
}

/// Append `record` as a JSON object.
pub fn encode_record<R: Record>(record: &R, enc: &mut Encoder<'_>) {
    encode_object(R::plan(), record, enc);
}

pub(crate) fn decode_object<R, I: Input>(
    plan: &RecordPlan<R>,
    record: &mut R,
    input: &mut I,
    cx: DecodeContext,
) -> Result<()>
where
    R: Record,
{
    let cx = match skip_whitespace(input)? {
        Some(b'n') => return expect_literal(input, b"null", "in literal null"),
        Some(b'{') => {
            let cx = cx.nested(input.offset())?;
            input.bump();
            cx
        }
        None => return Err(DecodeError::eof("while looking for an object", input.offset())),
        Some(_) => return Err(DecodeError::not_at_value(input.offset())),
    };

    match skip_whitespace(input)? {
        Some(b'}') => {
            input.bump();
            return Ok(());
        }
        None => return Err(DecodeError::eof("in object", input.offset())),
        Some(_) => {}
    }

    loop {
        input.release();
        skip_whitespace(input)?;
        let matched = plan.match_key(input)?;
        expect_colon(input)?;

        match skip_whitespace(input)? {
            None => return Err(DecodeError::eof("after object key", input.offset())),
            Some(b',' | b'}' | b']') => {
                return Err(DecodeError::new(
                    DecodeErrorKind::ExpectedValueAfterColon,
                    input.offset(),
                ));
            }
            Some(_) => {}
        }

        match matched.field {
            Some(index) => {
                let field = &plan.fields()[index];
                input.decode_field(field.codec(), record, cx.with_quoted(false))?;
            }
            None if cx.is_strict() => {
                return Err(unknown_field(plan, input, matched.key_start));
            }
            None => skip_value(input)?,
        }

        match skip_whitespace(input)? {
            Some(b',') => input.bump(),
            Some(b'}') => {
                input.bump();
                return Ok(());
            }
            None => return Err(DecodeError::eof("in object", input.offset())),
            Some(_) => {
                return Err(DecodeError::new(
                    DecodeErrorKind::ExpectedCommaAfterElement,
                    input.offset(),
                ));
            }
        }
    }
}

/// The error for the key starting at local position `key_start`. The key and
/// its closing quote, colon and whitespace are all still in the window.
fn unknown_field<R: Record, I: Input>(
    plan: &RecordPlan<R>,
    input: &I,
    key_start: usize,
) -> DecodeError {
    let offset = input.base() + key_start - 1;
    let span = input.span(key_start);
    // the colon was the last byte consumed; the closing quote precedes it
    let body_end = span.iter().rposition(|&b| b == b'"').unwrap_or(0);
    let body = &span[..body_end];
    let escaped = body.contains(&b'\\');
    let field = match decode_str(body, escaped, offset) {
        Ok(key) => key.into_owned(),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    };
    let suggestion = plan.suggest(&field);
    DecodeError::new(DecodeErrorKind::UnknownField { field, suggestion }, offset)
}

fn encode_object<R>(plan: &RecordPlan<R>, record: &R, enc: &mut Encoder<'_>) {
    enc.begin_object();
    let mut first = true;
    for field in plan.fields() {
        match field.codec().presence(record) {
            Presence::Absent => continue,
            Presence::Empty if field.omit_empty() => continue,
            Presence::Empty | Presence::Present => {}
        }
        enc.object_key(first, field.encoded_key(enc.escape_html()));
        field.codec().encode(record, enc);
        first = false;
    }
    enc.end_object(first);
}
