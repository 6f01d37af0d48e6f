//! Per-record decode/encode plans.
//!
//! A [`RecordPlan`] is compiled once per record type from its
//! [`RecordShape`](crate::RecordShape): flattened records are expanded in
//! place, shadowed and ambiguous keys are resolved, and a key matcher is
//! chosen. Plans are immutable and shared through [`compile_record_plan`].

mod bitmap;
mod cache;

use std::any::TypeId;
use std::collections::HashMap;

use crate::error::Result;
use crate::scanner::{Input, read_string};
use crate::serialize::write_json_string;
use crate::shape::{FieldCodec, FieldKind, FieldShape, Record};

pub(crate) use bitmap::KeyMatch;
use bitmap::BitmapTable;
pub use cache::{compile_record_plan, init_plan};

/// Records with more distinct keys than this use exact lookup.
pub const MAX_FAST_PATH_FIELDS: usize = 16;

/// Records with a key longer than this (in bytes) use exact lookup.
pub const MAX_FAST_PATH_KEY_LEN: usize = 64;

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Which key matcher a plan uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    /// Case-sensitive lookup of the fully decoded key
    Exact,
    /// Case-insensitive bitmap matching with 8-bit candidate masks
    Bitmap8,
    /// Case-insensitive bitmap matching with 16-bit candidate masks
    Bitmap16,
}

/// Lets tests compile a plan with the fast path disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strategy {
    Auto,
    Exact,
}

enum KeyMatcher {
    Exact,
    Bitmap8(BitmapTable<u8>),
    Bitmap16(BitmapTable<u16>),
}

/// One decodable, encodable field of a plan.
pub struct FieldDescriptor<R> {
    key: &'static str,
    codec: Box<dyn FieldCodec<R>>,
    offset: usize,
    depth: usize,
    tagged: bool,
    omit_empty: bool,
    encoded_key: Box<[u8]>,
    encoded_key_html: Box<[u8]>,
}

impl<R> FieldDescriptor<R> {
    /// The wire key.
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Byte offset of the field within the record that declares it.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// How many flattened records the field is nested in.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the key came from an explicit rename.
    pub fn from_explicit_tag(&self) -> bool {
        self.tagged
    }

    /// Whether the field is left out of the output when empty.
    pub fn omit_empty(&self) -> bool {
        self.omit_empty
    }

    pub(crate) fn codec(&self) -> &dyn FieldCodec<R> {
        &*self.codec
    }

    /// The quoted, escaped key as written by the encoder.
    pub(crate) fn encoded_key(&self, escape_html: bool) -> &[u8] {
        if escape_html {
            &self.encoded_key_html
        } else {
            &self.encoded_key
        }
    }
}

/// The compiled field-resolution plan of a record type.
pub struct RecordPlan<R> {
    name: &'static str,
    /// Dominant fields in encode order
    fields: Vec<FieldDescriptor<R>>,
    /// Exact wire key to index into `fields`
    by_key: HashMap<&'static str, usize>,
    matcher: KeyMatcher,
}

/// A field candidate found while flattening.
struct Candidate<R> {
    key: &'static str,
    depth: usize,
    tagged: bool,
    offset: usize,
    omit_empty: bool,
    codec: Box<dyn FieldCodec<R>>,
}

impl<R: Record> RecordPlan<R> {
    pub(crate) fn compile(strategy: Strategy) -> Self {
        let mut candidates = Vec::new();
        let mut path = vec![TypeId::of::<R>()];
        flatten(R::shape().fields, 0, &mut path, &mut candidates);

        let winners = dominant_fields(R::NAME, &candidates);
        let fields: Vec<FieldDescriptor<R>> = candidates
            .into_iter()
            .zip(winners)
            .filter(|&(_, keep)| keep)
            .map(|(candidate, _)| describe(candidate))
            .collect();

        let by_key = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.key, i))
            .collect();

        let matcher = match strategy {
            Strategy::Exact => KeyMatcher::Exact,
            Strategy::Auto => choose_matcher(&fields),
        };

        let plan = Self {
            name: R::NAME,
            fields,
            by_key,
            matcher,
        };
        tracing::debug!(
            record = plan.name,
            fields = plan.fields.len(),
            matcher = ?plan.matcher_kind(),
            "compiled record plan"
        );
        plan
    }
}

impl<R> RecordPlan<R> {
    /// The record type's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The dominant fields, in encode order.
    pub fn fields(&self) -> &[FieldDescriptor<R>] {
        &self.fields
    }

    /// Exact, case-sensitive lookup by wire key.
    pub fn field_by_key(&self, key: &str) -> Option<&FieldDescriptor<R>> {
        self.by_key.get(key).map(|&i| &self.fields[i])
    }

    /// The key matcher decoding uses.
    pub fn matcher_kind(&self) -> MatcherKind {
        match self.matcher {
            KeyMatcher::Exact => MatcherKind::Exact,
            KeyMatcher::Bitmap8(_) => MatcherKind::Bitmap8,
            KeyMatcher::Bitmap16(_) => MatcherKind::Bitmap16,
        }
    }

    /// Whether decoding uses a bitmap matcher.
    pub fn is_fast_path(&self) -> bool {
        !matches!(self.matcher, KeyMatcher::Exact)
    }

    /// Match the next object key against this plan's fields.
    pub(crate) fn match_key<I: Input>(&self, input: &mut I) -> Result<KeyMatch> {
        match &self.matcher {
            KeyMatcher::Bitmap8(table) => table.match_key(input),
            KeyMatcher::Bitmap16(table) => table.match_key(input),
            KeyMatcher::Exact => {
                let key_start = input.pos() + 1;
                let key = read_string(input)?;
                Ok(KeyMatch {
                    field: self.by_key.get(&*key).copied(),
                    key_start,
                })
            }
        }
    }

    /// The known key closest to `unknown`, if any is close enough.
    pub(crate) fn suggest(&self, unknown: &str) -> Option<&'static str> {
        self.fields
            .iter()
            .map(|field| (strsim::jaro_winkler(unknown, field.key), field.key))
            .filter(|&(similarity, _)| similarity >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, key)| key)
    }
}

/// Expand flattened records depth-first, in declaration order.
fn flatten<R: Record>(
    fields: Vec<FieldShape<R>>,
    depth: usize,
    path: &mut Vec<TypeId>,
    out: &mut Vec<Candidate<R>>,
) {
    for shape in fields {
        match shape.kind {
            FieldKind::Value(codec) => out.push(Candidate {
                key: shape.options.rename.unwrap_or(shape.name),
                depth,
                tagged: shape.options.rename.is_some(),
                offset: shape.offset,
                omit_empty: shape.options.omit_empty,
                codec,
            }),
            FieldKind::Flatten(embed) => {
                let target = embed.target();
                if path.contains(&target) {
                    tracing::trace!(
                        record = R::NAME,
                        field = shape.name,
                        embedded = embed.target_name(),
                        "skipping recursive embedding"
                    );
                    continue;
                }
                path.push(target);
                flatten(embed.lift_fields(), depth + 1, path, out);
                path.pop();
            }
        }
    }
}

/// For each key keep the shallowest candidate. Equal-depth conflicts drop the
/// key altogether.
fn dominant_fields<R>(record: &'static str, candidates: &[Candidate<R>]) -> Vec<bool> {
    let mut by_key: HashMap<&'static str, Vec<usize>> = HashMap::new();
    for (i, candidate) in candidates.iter().enumerate() {
        by_key.entry(candidate.key).or_default().push(i);
    }

    let mut keep = vec![false; candidates.len()];
    for (key, indices) in by_key {
        let shallowest = indices
            .iter()
            .map(|&i| candidates[i].depth)
            .min()
            .unwrap_or(0);
        let mut at_depth = indices
            .into_iter()
            .filter(|&i| candidates[i].depth == shallowest);
        match (at_depth.next(), at_depth.next()) {
            (Some(only), None) => keep[only] = true,
            _ => tracing::trace!(record, key, depth = shallowest, "dropping ambiguous key"),
        }
    }
    keep
}

fn describe<R>(candidate: Candidate<R>) -> FieldDescriptor<R> {
    let mut encoded_key = Vec::with_capacity(candidate.key.len() + 2);
    write_json_string(&mut encoded_key, candidate.key, false);
    let mut encoded_key_html = Vec::with_capacity(candidate.key.len() + 2);
    write_json_string(&mut encoded_key_html, candidate.key, true);

    FieldDescriptor {
        key: candidate.key,
        codec: candidate.codec,
        offset: candidate.offset,
        depth: candidate.depth,
        tagged: candidate.tagged,
        omit_empty: candidate.omit_empty,
        encoded_key: encoded_key.into_boxed_slice(),
        encoded_key_html: encoded_key_html.into_boxed_slice(),
    }
}

/// Bitmap matching needs few, short keys that appear on the wire verbatim
/// and stay distinct once lowercased.
fn choose_matcher<R>(fields: &[FieldDescriptor<R>]) -> KeyMatcher {
    if fields.is_empty() || fields.len() > MAX_FAST_PATH_FIELDS {
        return KeyMatcher::Exact;
    }
    let verbatim = |key: &str| {
        !key.is_empty()
            && key.len() <= MAX_FAST_PATH_KEY_LEN
            && !key.bytes().any(|b| matches!(b, b'"' | b'\\') || b < 0x20)
    };
    if !fields.iter().all(|field| verbatim(field.key)) {
        return KeyMatcher::Exact;
    }

    let mut keys: Vec<(String, usize)> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| (field.key.to_ascii_lowercase(), i))
        .collect();
    keys.sort();
    if keys.windows(2).any(|pair| pair[0].0 == pair[1].0) {
        return KeyMatcher::Exact;
    }

    if keys.len() <= 8 {
        KeyMatcher::Bitmap8(BitmapTable::new(&keys))
    } else {
        KeyMatcher::Bitmap16(BitmapTable::new(&keys))
    }
}
