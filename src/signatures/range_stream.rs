//! Read-only view over the signed byte ranges of a pre-closed document.

use crate::error::{Error, Result};
use crate::writer::OutputSink;
use std::io::{self, Read};

/// Reads the bytes of a document covered by a ByteRange, skipping the gaps.
///
/// This is what an external signer hashes.
pub struct RangeStream<'a> {
    sink: &'a mut OutputSink,
    ranges: Vec<(u64, u64)>,
    index: usize,
    position: u64,
}

impl<'a> RangeStream<'a> {
    /// Create a stream over `byte_range` (`[offset, length, ...]`) of `sink`.
    pub fn new(sink: &'a mut OutputSink, byte_range: &[i64]) -> Result<Self> {
        if byte_range.len() % 2 != 0 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange has an odd number of entries ({})",
                byte_range.len()
            )));
        }
        let mut ranges = Vec::with_capacity(byte_range.len() / 2);
        for pair in byte_range.chunks(2) {
            let (offset, length) = (pair[0].max(0) as u64, pair[1].max(0) as u64);
            if offset + length > sink.len() {
                return Err(Error::InvalidPdf(format!(
                    "range {} + {} exceeds output of {} bytes",
                    offset,
                    length,
                    sink.len()
                )));
            }
            ranges.push((offset, length));
        }
        Ok(Self {
            sink,
            ranges,
            index: 0,
            position: 0,
        })
    }

    /// Total number of bytes the stream yields.
    pub fn len(&self) -> u64 {
        self.ranges.iter().map(|(_, len)| len).sum()
    }

    /// Whether the stream yields nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read everything that is left.
    pub fn read_all(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len() as usize);
        self.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for RangeStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(&(start, length)) = self.ranges.get(self.index) {
            if self.position >= length {
                self.index += 1;
                self.position = 0;
                continue;
            }
            let n = ((length - self.position) as usize).min(buf.len());
            if n == 0 {
                return Ok(0);
            }
            self.sink
                .read_at(start + self.position, &mut buf[..n])
                .map_err(|e| match e {
                    Error::Io(io) => io,
                    other => io::Error::new(io::ErrorKind::Other, other),
                })?;
            self.position += n as u64;
            return Ok(n);
        }
        Ok(0)
    }
}
