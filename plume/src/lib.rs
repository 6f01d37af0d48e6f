#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

extern crate self as plume;

mod codec;
mod deserialize;
mod error;
mod plan;
mod record;
mod scan_buffer;
mod scanner;
mod serialize;
mod shape;
mod stream;

pub use codec::{Codec, DecodeContext, MAX_DEPTH};
pub use deserialize::{
    DecodeOptions, Decoder, decode_into, from_reader, from_slice, from_slice_with_options,
    from_str,
};
pub use error::{DecodeError, DecodeErrorKind, Result};
pub use plan::{
    FieldDescriptor, MAX_FAST_PATH_FIELDS, MAX_FAST_PATH_KEY_LEN, MatcherKind, RecordPlan,
    compile_record_plan, init_plan,
};
pub use record::{decode_record, decode_record_from_stream, encode_record};
pub use scan_buffer::{DEFAULT_CAPACITY, ScanBuffer};
pub use serialize::{
    EncodeOptions, Encoder, to_string, to_string_pretty, to_string_with_options, to_vec,
    to_vec_with_options, to_writer, to_writer_with_options,
};
pub use shape::{Embed, FieldShape, Record, RecordShape, WireOptions};
pub use stream::Stream;

/// Derive [`Record`], [`Codec`] and [`Embed`] for a struct with named fields.
///
/// Field attributes, all under `#[plume(...)]`:
///
/// - `rename = "key"`: use `key` on the wire
/// - `omit_empty`: leave the field out of the output when it is empty
/// - `string`: read and write a scalar field inside a JSON string
/// - `flatten`: lift the fields of an embedded record into this one
/// - `skip`: ignore the field entirely
pub use plume_macros::Record;
