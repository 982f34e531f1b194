//! Line reading with a reusable, growable buffer.
//!
//! A [`LineReader`] owns its scratch buffer and hands out borrowed [`Line`]s.
//! Lines of any length are returned whole: the buffer keeps growing until the
//! terminating newline (or end of stream) is seen, so a long line is never cut
//! short. An optional cap turns pathological lines into an error instead.

use crate::error::{LineseekError, Result};
use std::io::{BufRead, ErrorKind};

/// Initial scratch buffer capacity
pub const DEFAULT_BUFFER_CAPACITY: usize = 512 * 1024;

/// Reads one logical line at a time from a buffered stream.
#[derive(Debug)]
pub struct LineReader {
    buf: Vec<u8>,
    max_line_length: Option<usize>,
    offset: u64,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReader {
    /// Create a reader with an unbounded line length.
    pub fn new() -> Self {
        LineReader {
            buf: Vec::with_capacity(DEFAULT_BUFFER_CAPACITY),
            max_line_length: None,
            offset: 0,
        }
    }

    /// Cap the length of a single line. `None` allows unbounded growth.
    pub fn with_max_line_length(mut self, limit: Option<usize>) -> Self {
        self.max_line_length = limit;
        self
    }

    /// Tell the reader the stream position, used in error reports.
    ///
    /// Must be called after the caller seeks the underlying stream.
    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// Read the next line, including its newline if present.
    ///
    /// At end of stream an empty line is returned.
    pub fn read_line<R: BufRead + ?Sized>(&mut self, stream: &mut R) -> Result<Line<'_>> {
        self.buf.clear();
        loop {
            let available = match stream.fill_buf() {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if available.is_empty() {
                break;
            }

            let (chunk_len, done) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };

            if let Some(limit) = self.max_line_length {
                if self.buf.len() + chunk_len > limit {
                    return Err(LineseekError::LineTooLong {
                        offset: self.offset,
                        limit,
                    });
                }
            }

            self.buf.extend_from_slice(&available[..chunk_len]);
            stream.consume(chunk_len);
            if done {
                break;
            }
        }

        self.offset += self.buf.len() as u64;
        Ok(Line { bytes: &self.buf })
    }
}

/// A line borrowed from a [`LineReader`]'s buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    bytes: &'a [u8],
}

impl<'a> Line<'a> {
    /// Full line bytes including the terminating newline, if any
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Number of bytes consumed from the stream
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True at end of stream
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Leading `snap_length` bytes, minus a newline if the cut lands on it.
    ///
    /// Returns `None` when `snap_length` is zero or at end of stream.
    pub fn fragment(&self, snap_length: usize) -> Option<&'a [u8]> {
        if snap_length == 0 || self.bytes.is_empty() {
            return None;
        }
        let mut end = snap_length.min(self.bytes.len());
        if self.bytes[end - 1] == b'\n' {
            end -= 1;
        }
        Some(&self.bytes[..end])
    }
}
