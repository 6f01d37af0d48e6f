//! Single-pass key matching against up to 16 candidate keys.
//!
//! Every candidate key owns one bit. For each key-byte position the table
//! holds, per input byte value, the set of candidates that have that byte at
//! that position. Scanning a key ANDs those sets together; when the closing
//! quote is reached the surviving bit (filtered by the candidates whose key
//! ends exactly there) names the field.

use core::ops::{BitAnd, BitOr};

use crate::error::{DecodeError, Result};
use crate::scanner::{Input, open_string};

/// Multiplier whose top six bits, after multiplying by a single-bit value,
/// are distinct for all 64 bit positions.
const DE_BRUIJN: u64 = 0x03F5_66ED_2717_9461;

/// Bit position of a single-bit `u64`, indexed by `(bit * DE_BRUIJN) >> 58`.
pub(crate) const BIT_INDEX: [u8; 64] = {
    let mut table = [0u8; 64];
    let mut hash = DE_BRUIJN;
    let mut i = 0;
    while i < 64 {
        table[(hash >> 58) as usize] = i as u8;
        hash <<= 1;
        i += 1;
    }
    table
};

/// ASCII lowercasing for every byte value; other bytes map to themselves.
pub(crate) const LOWER: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).to_ascii_lowercase();
        i += 1;
    }
    table
};

/// Index of the only set bit of `mask`.
#[inline]
pub(crate) const fn bit_index(mask: u64) -> usize {
    BIT_INDEX[(mask.wrapping_mul(DE_BRUIJN) >> 58) as usize] as usize
}

/// A fixed-width candidate set.
pub(crate) trait KeyMask:
    Copy + Eq + BitAnd<Output = Self> + BitOr<Output = Self> + Send + Sync + 'static
{
    const BITS: usize;
    const ZERO: Self;
    const ALL: Self;

    fn bit(i: usize) -> Self;
    fn count_ones(self) -> u32;
    fn to_u64(self) -> u64;
}

macro_rules! key_mask {
    ($($ty:ty),*) => {$(
        impl KeyMask for $ty {
            const BITS: usize = <$ty>::BITS as usize;
            const ZERO: Self = 0;
            const ALL: Self = <$ty>::MAX;

            #[inline]
            fn bit(i: usize) -> Self {
                1 << i
            }

            #[inline]
            fn count_ones(self) -> u32 {
                <$ty>::count_ones(self)
            }

            #[inline]
            fn to_u64(self) -> u64 {
                self as u64
            }
        }
    )*};
}

key_mask!(u8, u16);

/// Result of matching one object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyMatch {
    /// Index into the plan's fields
    pub field: Option<usize>,
    /// Local position of the first byte after the opening quote
    pub key_start: usize,
}

/// Per-position candidate masks for a set of lowercase keys.
pub(crate) struct BitmapTable<M> {
    /// `rows[pos][byte]`: candidates with `byte` at `pos`
    rows: Vec<[M; 256]>,
    /// `ends[len]`: candidates whose key is exactly `len` bytes long
    ends: Vec<M>,
    /// Bit index to field index
    sorted: Vec<usize>,
}

impl<M: KeyMask> BitmapTable<M> {
    /// Build from `(lowercase key, field index)` pairs sorted by key.
    /// Bit `i` belongs to `keys[i]`.
    pub(crate) fn new(keys: &[(String, usize)]) -> Self {
        debug_assert!(keys.len() <= M::BITS);
        let longest = keys.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        let mut rows = vec![[M::ZERO; 256]; longest];
        let mut ends = vec![M::ZERO; longest + 1];

        for (bit, (key, _)) in keys.iter().enumerate() {
            let mask = M::bit(bit);
            for (pos, &b) in key.as_bytes().iter().enumerate() {
                rows[pos][b as usize] = rows[pos][b as usize] | mask;
            }
            ends[key.len()] = ends[key.len()] | mask;
        }

        Self {
            rows,
            ends,
            sorted: keys.iter().map(|&(_, field)| field).collect(),
        }
    }

    /// The longest key covered by the table.
    pub(crate) fn longest_key(&self) -> usize {
        self.rows.len()
    }

    /// Candidates with byte `b` at position `pos`.
    #[cfg(test)]
    pub(crate) fn row(&self, pos: usize, b: u8) -> M {
        self.rows[pos][b as usize]
    }

    /// Field index for the candidate at `bit`.
    #[cfg(test)]
    pub(crate) fn field_for_bit(&self, bit: usize) -> usize {
        self.sorted[bit]
    }

    /// Match the next object key, consuming it up to and including the
    /// closing quote. Keys are compared ASCII case-insensitively; a key with
    /// escapes never matches.
    pub(crate) fn match_key<I: Input>(&self, input: &mut I) -> Result<KeyMatch> {
        open_string(input, "while looking for an object key")?;
        let key_start = input.pos();
        let no_field = KeyMatch {
            field: None,
            key_start,
        };

        let mut mask = M::ALL;
        let mut pos = 0;
        loop {
            match input.peek()? {
                None => return Err(DecodeError::eof("in object key", input.offset())),
                Some(b'"') => {
                    input.bump();
                    break;
                }
                Some(b'\\') => {
                    input.skip_string_body()?;
                    return Ok(no_field);
                }
                Some(b) => {
                    mask = match self.rows.get(pos) {
                        Some(row) => mask & row[LOWER[b as usize] as usize],
                        None => M::ZERO,
                    };
                    input.bump();
                    pos += 1;
                    if mask == M::ZERO {
                        input.skip_string_body()?;
                        return Ok(no_field);
                    }
                }
            }
        }

        let mask = mask & self.ends.get(pos).copied().unwrap_or(M::ZERO);
        if mask.count_ones() != 1 {
            return Ok(no_field);
        }
        Ok(KeyMatch {
            field: Some(self.sorted[bit_index(mask.to_u64())]),
            key_start,
        })
    }
}
