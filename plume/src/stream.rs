//! Incremental input: a borrowed [`ScanBuffer`] plus the reader that fills it.

use std::io::Read;

use crate::codec::{Codec, DecodeContext};
use crate::error::{DecodeError, Result};
use crate::scan_buffer::ScanBuffer;
use crate::scanner::Input;
use crate::shape::FieldCodec;

/// A refillable view of streamed input, valid for one decode call.
///
/// The stream never owns its window or its source. When a read runs past the
/// bytes currently buffered it blocks on the source for more. At record key
/// boundaries the consumed prefix of the window is released, so memory stays
/// bounded by the largest single value rather than the whole input.
pub struct Stream<'w> {
    window: &'w mut ScanBuffer,
    source: &'w mut dyn Read,
    cursor: usize,
}

impl<'w> Stream<'w> {
    /// Borrow `window` and `source` for one decode. Reading resumes at the
    /// start of whatever is still buffered in `window`.
    pub fn new(window: &'w mut ScanBuffer, source: &'w mut dyn Read) -> Self {
        Self {
            window,
            source,
            cursor: 0,
        }
    }

    /// Absolute offset of the cursor in the whole input.
    pub fn offset(&self) -> usize {
        self.window.discarded() + self.cursor
    }

    /// Drop everything before the cursor from the window.
    pub fn release(&mut self) {
        self.window.discard(self.cursor);
        self.cursor = 0;
    }

    /// Pull more bytes. Returns false once the source is exhausted.
    fn fill(&mut self) -> Result<bool> {
        loop {
            if self.window.is_eof() {
                return Ok(false);
            }
            match self.window.refill(&mut *self.source) {
                Ok(0) => continue,
                Ok(n) => {
                    tracing::trace!(n, buffered = self.window.filled(), "refilled stream window");
                    return Ok(true);
                }
                Err(e) => return Err(DecodeError::io(e, self.offset())),
            }
        }
    }
}

impl Input for Stream<'_> {
    #[inline]
    fn peek(&mut self) -> Result<Option<u8>> {
        loop {
            if let Some(&b) = self.window.data().get(self.cursor) {
                return Ok(Some(b));
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    #[inline]
    fn bump(&mut self) {
        self.cursor += 1;
    }

    #[inline]
    fn pos(&self) -> usize {
        self.cursor
    }

    fn base(&self) -> usize {
        self.window.discarded()
    }

    fn span(&self, start: usize) -> &[u8] {
        &self.window.data()[start..self.cursor]
    }

    fn release(&mut self) {
        Stream::release(self);
    }

    fn decode_codec<C: Codec + ?Sized>(&mut self, value: &mut C, cx: DecodeContext) -> Result<()> {
        value.decode_stream(self, cx)
    }

    fn decode_field<R>(
        &mut self,
        field: &dyn FieldCodec<R>,
        record: &mut R,
        cx: DecodeContext,
    ) -> Result<()> {
        field.decode_stream(record, self, cx)
    }
}
