//! Record layout descriptions, as produced by `#[derive(Record)]`.
//!
//! A [`RecordShape`] lists a record's fields in declaration order. Each
//! [`FieldShape`] carries the field's byte offset and size for diagnostics,
//! its wire options, and a pair of accessor functions. Decoded values are
//! written through those accessors and never through pointer arithmetic.

use std::any::TypeId;
use std::mem::size_of;

use crate::codec::{Codec, DecodeContext};
use crate::error::Result;
use crate::plan::RecordPlan;
use crate::serialize::Encoder;
use crate::stream::Stream;

/// A record type with named fields.
///
/// Implemented by `#[derive(Record)]`; implementing it by hand is possible
/// but the derive also provides the matching [`Codec`] and [`Embed`] impls.
pub trait Record: Codec + Default + 'static {
    /// The type's name, for diagnostics.
    const NAME: &'static str;

    /// The field table. Called once per process, when the type's plan is compiled.
    fn shape() -> RecordShape<Self>;

    /// The type's compiled plan, held in a per-type `static` and filled
    /// through [`init_plan`](crate::init_plan).
    fn plan() -> &'static RecordPlan<Self>;
}

/// A field type that can be flattened into its parent with `#[plume(flatten)]`.
///
/// Implemented for every derived record (embedded by value), and for
/// `Box<R>` and `Option<Box<R>>` (embedded by pointer).
pub trait Embed: 'static {
    /// The record whose fields get lifted into the parent.
    type Target: Record;

    /// Whether the embedded record lives behind a pointer.
    const INDIRECT: bool;

    /// The embedded record, if present.
    fn embedded(&self) -> Option<&Self::Target>;

    /// The embedded record, allocating it if it is absent.
    fn embedded_mut(&mut self) -> &mut Self::Target;
}

impl<E: Record> Embed for Box<E> {
    type Target = E;
    const INDIRECT: bool = true;

    fn embedded(&self) -> Option<&E> {
        Some(&**self)
    }

    fn embedded_mut(&mut self) -> &mut E {
        &mut **self
    }
}

impl<E: Record> Embed for Option<Box<E>> {
    type Target = E;
    const INDIRECT: bool = true;

    fn embedded(&self) -> Option<&E> {
        self.as_deref()
    }

    fn embedded_mut(&mut self) -> &mut E {
        self.get_or_insert_with(Box::default)
    }
}

/// Per-field wire options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireOptions {
    /// Explicit wire key, replacing the declared field name
    pub rename: Option<&'static str>,
    /// Leave the field out of the output when its value is empty
    pub omit_empty: bool,
    /// Read and write a scalar inside a JSON string
    pub quoted: bool,
}

impl WireOptions {
    /// No options.
    pub const fn new() -> Self {
        Self {
            rename: None,
            omit_empty: false,
            quoted: false,
        }
    }

    /// Use `key` on the wire.
    pub const fn rename(mut self, key: &'static str) -> Self {
        self.rename = Some(key);
        self
    }

    /// Omit the field when empty.
    pub const fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    /// Quote the scalar value.
    pub const fn quoted(mut self) -> Self {
        self.quoted = true;
        self
    }
}

/// The ordered field table of a record.
pub struct RecordShape<R> {
    pub(crate) fields: Vec<FieldShape<R>>,
}

impl<R: Record> RecordShape<R> {
    /// An empty table.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field.
    pub fn field(mut self, field: FieldShape<R>) -> Self {
        self.fields.push(field);
        self
    }

    /// The fields in declaration order.
    pub fn fields(&self) -> &[FieldShape<R>] {
        &self.fields
    }
}

impl<R: Record> Default for RecordShape<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// One declared field of a record.
pub struct FieldShape<R> {
    pub(crate) name: &'static str,
    pub(crate) offset: usize,
    pub(crate) size: usize,
    pub(crate) options: WireOptions,
    pub(crate) kind: FieldKind<R>,
}

pub(crate) enum FieldKind<R> {
    Value(Box<dyn FieldCodec<R>>),
    Flatten(Box<dyn EmbedAccess<R>>),
}

impl<R: Record> FieldShape<R> {
    /// A field holding a value of type `V` at `offset`.
    ///
    /// # Panics
    ///
    /// If `offset + size_of::<V>()` exceeds `size_of::<R>()`.
    pub fn value<V: Codec + 'static>(
        name: &'static str,
        offset: usize,
        options: WireOptions,
        get: fn(&R) -> &V,
        get_mut: fn(&mut R) -> &mut V,
    ) -> Self {
        let size = check_layout::<R, V>(name, offset);
        Self {
            name,
            offset,
            size,
            options,
            kind: FieldKind::Value(Box::new(Direct {
                get,
                get_mut,
                quoted: options.quoted && V::QUOTABLE,
            })),
        }
    }

    /// A field whose record's fields are lifted into `R`.
    ///
    /// # Panics
    ///
    /// If `offset + size_of::<P>()` exceeds `size_of::<R>()`.
    pub fn flatten<P: Embed>(
        name: &'static str,
        offset: usize,
        get: fn(&R) -> &P,
        get_mut: fn(&mut R) -> &mut P,
    ) -> Self {
        let size = check_layout::<R, P>(name, offset);
        Self {
            name,
            offset,
            size,
            options: WireOptions::new(),
            kind: FieldKind::Flatten(Box::new(EmbedSlot {
                get,
                get_mut,
                offset,
            })),
        }
    }
}

impl<R> FieldShape<R> {
    /// The declared field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Byte offset within the record.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the field's type in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The field's wire options.
    pub fn options(&self) -> WireOptions {
        self.options
    }

    /// Whether this field is a flattened record.
    pub fn is_flatten(&self) -> bool {
        matches!(self.kind, FieldKind::Flatten(_))
    }
}

fn check_layout<R: Record, V>(name: &str, offset: usize) -> usize {
    let size = size_of::<V>();
    assert!(
        offset
            .checked_add(size)
            .is_some_and(|end| end <= size_of::<R>()),
        "field `{name}` of `{}` lies outside the record: {offset} + {size} > {}",
        R::NAME,
        size_of::<R>(),
    );
    size
}

/// Whether a field has something to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Presence {
    /// Reached through an embedded record that is not there
    Absent,
    /// Present, and empty for omit-empty purposes
    Empty,
    Present,
}

/// Decode and encode one field of `R` in place.
pub(crate) trait FieldCodec<R>: Send + Sync {
    fn decode(&self, record: &mut R, buf: &[u8], cursor: usize, cx: DecodeContext)
    -> Result<usize>;

    fn decode_stream(
        &self,
        record: &mut R,
        stream: &mut Stream<'_>,
        cx: DecodeContext,
    ) -> Result<()>;

    fn presence(&self, record: &R) -> Presence;

    fn encode(&self, record: &R, enc: &mut Encoder<'_>);
}

/// A field declared directly on `R`.
struct Direct<R, V> {
    get: fn(&R) -> &V,
    get_mut: fn(&mut R) -> &mut V,
    quoted: bool,
}

impl<R: 'static, V: Codec + 'static> FieldCodec<R> for Direct<R, V> {
    fn decode(
        &self,
        record: &mut R,
        buf: &[u8],
        cursor: usize,
        cx: DecodeContext,
    ) -> Result<usize> {
        (self.get_mut)(record).decode(buf, cursor, cx.with_quoted(self.quoted))
    }

    fn decode_stream(
        &self,
        record: &mut R,
        stream: &mut Stream<'_>,
        cx: DecodeContext,
    ) -> Result<()> {
        (self.get_mut)(record).decode_stream(stream, cx.with_quoted(self.quoted))
    }

    fn presence(&self, record: &R) -> Presence {
        if (self.get)(record).is_empty() {
            Presence::Empty
        } else {
            Presence::Present
        }
    }

    fn encode(&self, record: &R, enc: &mut Encoder<'_>) {
        (self.get)(record).encode(enc, self.quoted);
    }
}

/// A field of an embedded record, reached from `R` through `P`.
struct Through<R, P: Embed> {
    get: fn(&R) -> &P,
    get_mut: fn(&mut R) -> &mut P,
    inner: Box<dyn FieldCodec<P::Target>>,
}

impl<R: 'static, P: Embed> FieldCodec<R> for Through<R, P> {
    fn decode(
        &self,
        record: &mut R,
        buf: &[u8],
        cursor: usize,
        cx: DecodeContext,
    ) -> Result<usize> {
        let embedded = (self.get_mut)(record).embedded_mut();
        self.inner.decode(embedded, buf, cursor, cx)
    }

    fn decode_stream(
        &self,
        record: &mut R,
        stream: &mut Stream<'_>,
        cx: DecodeContext,
    ) -> Result<()> {
        let embedded = (self.get_mut)(record).embedded_mut();
        self.inner.decode_stream(embedded, stream, cx)
    }

    fn presence(&self, record: &R) -> Presence {
        match (self.get)(record).embedded() {
            Some(embedded) => self.inner.presence(embedded),
            None => Presence::Absent,
        }
    }

    fn encode(&self, record: &R, enc: &mut Encoder<'_>) {
        if let Some(embedded) = (self.get)(record).embedded() {
            self.inner.encode(embedded, enc);
        }
    }
}

/// Expands a flattened field into the embedded record's own fields, re-rooted at `R`.
pub(crate) trait EmbedAccess<R>: Send + Sync {
    fn target(&self) -> TypeId;

    fn target_name(&self) -> &'static str;

    fn lift_fields(&self) -> Vec<FieldShape<R>>;
}

/// `#[plume(flatten)]` declared directly on `R`.
struct EmbedSlot<R, P> {
    get: fn(&R) -> &P,
    get_mut: fn(&mut R) -> &mut P,
    offset: usize,
}

impl<R: 'static, P: Embed> EmbedAccess<R> for EmbedSlot<R, P> {
    fn target(&self) -> TypeId {
        TypeId::of::<P::Target>()
    }

    fn target_name(&self) -> &'static str {
        <P::Target as Record>::NAME
    }

    fn lift_fields(&self) -> Vec<FieldShape<R>> {
        let base = if P::INDIRECT { 0 } else { self.offset };
        <P::Target as Record>::shape()
            .fields
            .into_iter()
            .map(|field| lift(field, self.get, self.get_mut, base))
            .collect()
    }
}

/// A flatten declared on an embedded record, reached from `R` through `P`.
struct LiftedEmbed<R, P: Embed> {
    get: fn(&R) -> &P,
    get_mut: fn(&mut R) -> &mut P,
    base: usize,
    inner: Box<dyn EmbedAccess<P::Target>>,
}

impl<R: 'static, P: Embed> EmbedAccess<R> for LiftedEmbed<R, P> {
    fn target(&self) -> TypeId {
        self.inner.target()
    }

    fn target_name(&self) -> &'static str {
        self.inner.target_name()
    }

    fn lift_fields(&self) -> Vec<FieldShape<R>> {
        self.inner
            .lift_fields()
            .into_iter()
            .map(|field| lift(field, self.get, self.get_mut, self.base))
            .collect()
    }
}

/// Re-root a field of `P::Target` so it is reached from `R` through `P`.
///
/// Offsets of by-value embeddings compose; behind a pointer they stay
/// relative to the pointee.
fn lift<R: 'static, P: Embed>(
    field: FieldShape<P::Target>,
    get: fn(&R) -> &P,
    get_mut: fn(&mut R) -> &mut P,
    base: usize,
) -> FieldShape<R> {
    let kind = match field.kind {
        FieldKind::Value(inner) => FieldKind::Value(Box::new(Through {
            get,
            get_mut,
            inner,
        })),
        FieldKind::Flatten(inner) => FieldKind::Flatten(Box::new(LiftedEmbed {
            get,
            get_mut,
            base,
            inner,
        })),
    };
    FieldShape {
        name: field.name,
        offset: base + field.offset,
        size: field.size,
        options: field.options,
        kind,
    }
}
