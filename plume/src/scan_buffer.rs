//! The refillable window a [`Stream`](crate::Stream) reads from.
//!
//! At record key boundaries everything before the cursor has been fully
//! consumed and is released by moving the window's start. Released bytes are
//! reclaimed lazily: a full buffer is compacted on refill when at least half
//! of it is released, and grown otherwise. `discarded` keeps error offsets
//! absolute across compactions.

use std::io::{self, Read};

/// Default window capacity (8KB)
pub const DEFAULT_CAPACITY: usize = 8 * 1024;

/// A refillable byte window over a reader.
#[derive(Debug)]
pub struct ScanBuffer {
    /// The underlying buffer
    data: Vec<u8>,
    /// Start of the window; bytes before it have been released
    start: usize,
    /// End of the window; bytes after it have not been read yet
    filled: usize,
    /// Whether EOF has been reached on the underlying reader
    eof: bool,
    /// Bytes dropped from the front so far
    discarded: usize,
}

impl ScanBuffer {
    /// Create a new buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new buffer with a specific capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)],
            start: 0,
            filled: 0,
            eof: false,
            discarded: 0,
        }
    }

    /// Get the current window contents.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[self.start..self.filled]
    }

    /// Whether the underlying reader has reached EOF.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// How many bytes are in the window.
    #[inline]
    pub fn filled(&self) -> usize {
        self.filled - self.start
    }

    /// Get the buffer's total capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Total number of bytes dropped from the front of the window.
    #[inline]
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Double the capacity. Positions into the window stay valid.
    pub fn grow(&mut self) {
        let new_capacity = self.data.len() * 2;
        self.data.resize(new_capacity, 0);
    }

    /// Drop the first `n` bytes of the window. Nothing is moved.
    pub fn discard(&mut self, n: usize) {
        let n = n.min(self.filled());
        self.start += n;
        self.discarded += n;
        if self.start == self.filled {
            self.start = 0;
            self.filled = 0;
        }
    }

    /// Move the window to the front of the buffer.
    fn compact(&mut self) {
        self.data.copy_within(self.start..self.filled, 0);
        self.filled -= self.start;
        self.start = 0;
    }

    /// Read more data into the unfilled portion of the buffer, making room
    /// first if it is full.
    ///
    /// Returns the number of bytes read, or 0 once the reader is exhausted.
    /// Interrupted reads are retried.
    pub fn refill<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        if self.filled == self.data.len() {
            if self.start > 0 && self.start >= self.data.len() / 2 {
                self.compact();
            } else {
                self.grow();
            }
        }

        loop {
            match reader.read(&mut self.data[self.filled..]) {
                Ok(n) => {
                    self.filled += n;
                    if n == 0 {
                        self.eof = true;
                    }
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::new()
    }
}
