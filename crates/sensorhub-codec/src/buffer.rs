//! Growable write buffer and its paired read cursor.
//!
//! Alignment is always computed against the number of bytes already written
//! (or already consumed, on the read side), so a buffer that is later mapped
//! into memory at an aligned address sees every scalar at its natural
//! alignment.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Number of zero bytes needed to bring `existing` up to a multiple of
/// `alignment`. Alignments of 0 and 1 never pad.
pub fn alignment_padding(alignment: usize, existing: usize) -> usize {
    if alignment <= 1 {
        return 0;
    }
    let leftover = existing % alignment;
    if leftover == 0 {
        0
    } else {
        alignment - leftover
    }
}

/// Append-only byte buffer used as the encoding target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    inner: BytesMut,
}

impl Buffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_BUFFER_CAPACITY)
    }

    /// Create an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Append `count` zero bytes.
    pub fn append_padding(&mut self, count: usize) {
        self.inner.put_bytes(0, count);
    }

    /// Append raw bytes with no padding.
    pub fn append(&mut self, bytes: &[u8]) {
        self.inner.put_slice(bytes);
    }

    /// Pad to `alignment`, then append `bytes`.
    pub fn append_aligned(&mut self, bytes: &[u8], alignment: usize) {
        self.append_padding(alignment_padding(alignment, self.len()));
        self.append(bytes);
    }

    /// Borrow the encoded bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Start a reader over the bytes written so far.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(&self.inner)
    }

    /// Finish writing and hand out the encoded bytes.
    pub fn freeze(self) -> Bytes {
        self.inner.freeze()
    }

    /// Drop all written bytes, keeping the allocation.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Read cursor over an encoded byte slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far, padding included.
    pub fn bytes_read(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Skip `count` padding bytes.
    pub fn skip_padding(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    /// Read exactly `count` raw bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(CodecError::TruncatedBuffer {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += count;
        Ok(&self.data[start..self.pos])
    }

    /// Skip alignment padding, then read `count` raw bytes.
    ///
    /// Padding and value are checked together so a truncated read reports
    /// the full number of bytes it was short of.
    pub fn read_aligned(&mut self, count: usize, alignment: usize) -> Result<&'a [u8]> {
        let padding = alignment_padding(alignment, self.pos);
        let needed = padding + count;
        if needed > self.remaining() {
            return Err(CodecError::TruncatedBuffer {
                needed,
                remaining: self.remaining(),
            });
        }
        self.pos += padding;
        self.read_bytes(count)
    }
}
