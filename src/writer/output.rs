//! Output buffers for documents under construction.
//!
//! Bytes are appended while objects are serialized; a finished revision can
//! still be patched in place inside reserved windows (signature values) and
//! read back for hashing. The buffer lives in memory or in a temporary file
//! that is deleted when the sink is dropped.

use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Where serialized bytes accumulate.
#[derive(Debug)]
pub enum OutputSink {
    /// In-memory buffer
    Memory(Vec<u8>),
    /// Temporary file, removed on drop
    TempFile {
        /// Backing file
        file: NamedTempFile,
        /// Bytes written so far
        len: u64,
    },
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::memory()
    }
}

impl OutputSink {
    /// Empty in-memory sink.
    pub fn memory() -> Self {
        Self::Memory(Vec::new())
    }

    /// Sink backed by a temporary file, in `dir` or the system temp directory.
    pub fn temp_file(dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdf_graft").suffix(".pdf");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        log::debug!("Output backed by {}", file.path().display());
        Ok(Self::TempFile { file, len: 0 })
    }

    /// Number of bytes written.
    pub fn len(&self) -> u64 {
        match self {
            Self::Memory(buf) => buf.len() as u64,
            Self::TempFile { len, .. } => *len,
        }
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory(_) => None,
            Self::TempFile { file, .. } => Some(file.path()),
        }
    }

    /// Overwrite already-written bytes. Never extends the output.
    pub fn patch(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "patch of {} bytes at {} outside output of {} bytes",
                    bytes.len(),
                    offset,
                    self.len()
                ))
            })?;
        match self {
            Self::Memory(buf) => buf[offset as usize..end as usize].copy_from_slice(bytes),
            Self::TempFile { file, .. } => {
                let f = file.as_file_mut();
                f.seek(SeekFrom::Start(offset))?;
                f.write_all(bytes)?;
            },
        }
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `offset`.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset.saturating_add(buf.len() as u64);
        if end > self.len() {
            return Err(Error::UnexpectedEof);
        }
        match self {
            Self::Memory(data) => buf.copy_from_slice(&data[offset as usize..end as usize]),
            Self::TempFile { file, .. } => {
                let f = file.as_file_mut();
                f.seek(SeekFrom::Start(offset))?;
                f.read_exact(buf)?;
            },
        }
        Ok(())
    }

    /// Copy everything written to `out`.
    pub fn copy_to<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<u64> {
        match self {
            Self::Memory(data) => {
                out.write_all(data)?;
                Ok(data.len() as u64)
            },
            Self::TempFile { file, len } => {
                let f = file.as_file_mut();
                f.seek(SeekFrom::Start(0))?;
                let copied = std::io::copy(&mut f.take(*len), out)?;
                Ok(copied)
            },
        }
    }

    /// All bytes written, as one buffer.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        match self {
            Self::Memory(data) => Ok(data),
            Self::TempFile { .. } => {
                let mut out = Vec::with_capacity(self.len() as usize);
                self.copy_to(&mut out)?;
                Ok(out)
            },
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Memory(data) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            },
            Self::TempFile { file, len } => {
                let f = file.as_file_mut();
                f.seek(SeekFrom::Start(*len))?;
                let n = f.write(buf)?;
                *len += n as u64;
                Ok(n)
            },
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::TempFile { file, .. } => file.as_file_mut().flush(),
        }
    }
}
