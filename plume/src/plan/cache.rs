use std::sync::OnceLock;

use super::{RecordPlan, Strategy};
use crate::shape::Record;

/// The plan for `R`, compiled on first use.
///
/// Every later call is a single atomic load; only the first one per type
/// compiles, and concurrent first calls wait for that one.
pub fn compile_record_plan<R: Record>() -> &'static RecordPlan<R> {
    R::plan()
}

/// Fill `slot` with the plan for `R` unless it already holds one.
///
/// This backs [`Record::plan`]. `#[derive(Record)]` declares one `static`
/// slot per type; a hand-written impl does the same:
///
/// ```
/// use std::sync::OnceLock;
/// use plume::{Codec, DecodeContext, Encoder, FieldShape, Record, RecordPlan, RecordShape, Stream, WireOptions};
///
/// #[derive(Default)]
/// struct Point {
///     x: i32,
/// }
///
/// impl Record for Point {
///     const NAME: &'static str = "Point";
///
///     fn shape() -> RecordShape<Self> {
///         RecordShape::new().field(FieldShape::value(
///             "x",
///             core::mem::offset_of!(Point, x),
///             WireOptions::new(),
///             |p: &Point| &p.x,
///             |p: &mut Point| &mut p.x,
///         ))
///     }
///
///     fn plan() -> &'static RecordPlan<Self> {
///         static PLAN: OnceLock<RecordPlan<Point>> = OnceLock::new();
///         plume::init_plan(&PLAN)
///     }
/// }
///
/// impl Codec for Point {
///     fn decode(&mut self, buf: &[u8], cursor: usize, cx: DecodeContext) -> plume::Result<usize> {
///         plume::decode_record(self, buf, cursor, cx)
///     }
///
///     fn decode_stream(&mut self, stream: &mut Stream<'_>, cx: DecodeContext) -> plume::Result<()> {
///         plume::decode_record_from_stream(self, stream, cx)
///     }
///
///     fn encode(&self, enc: &mut Encoder<'_>, _quoted: bool) {
///         plume::encode_record(self, enc)
///     }
/// }
///
/// let p: Point = plume::from_str(r#"{"x":4}"#).unwrap();
/// assert_eq!(p.x, 4);
/// ```
pub fn init_plan<R: Record>(slot: &'static OnceLock<RecordPlan<R>>) -> &'static RecordPlan<R> {
    slot.get_or_init(|| RecordPlan::compile(Strategy::Auto))
}
