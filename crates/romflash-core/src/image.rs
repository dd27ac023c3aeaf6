//! Program images and chunk planning
//!
//! Images are exchanged with the operator as text: one line per byte, each
//! line an 8-character binary string, in address order:
//!
//! ```text
//! 01001101
//! 00000000
//! 11111111
//! ```
//!
//! The controller returns memory dumps as decimal byte values separated by
//! `\r\n`. Both forms decode into a [`ProgramImage`].

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::error::{Error, Result};

/// Default number of bytes per flow-controlled write chunk
pub const DEFAULT_CHUNK_SIZE: usize = 16;

/// Separator between records of a memory dump
pub const RECORD_SEPARATOR: &str = "\r\n";

/// The full intended contents of a memory region, in address order
///
/// An image is never mutated once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramImage {
    bytes: Vec<u8>,
}

impl ProgramImage {
    /// Create an image from raw bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Parse the textual 8-bit binary format
    ///
    /// Blank lines are skipped; every other line must hold exactly eight
    /// `0`/`1` characters (surrounding whitespace is ignored).
    pub fn from_binary_text(text: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            bytes.push(parse_binary_line(line).ok_or(Error::InvalidImageLine { line: idx + 1 })?);
        }
        Ok(Self { bytes })
    }

    /// Decode a memory dump received from the controller
    ///
    /// Records are decimal byte values separated by `\r\n`. Empty records
    /// (including the one after a trailing separator) are skipped.
    pub fn from_readback_records(text: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        for (record, value) in text.split(RECORD_SEPARATOR).enumerate() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let byte: u8 = value
                .parse()
                .map_err(|_| Error::InvalidReadbackRecord { record })?;
            bytes.push(byte);
        }
        Ok(Self { bytes })
    }

    /// Render in the textual 8-bit binary format, newline terminated
    pub fn to_binary_text(&self) -> String {
        let mut out = String::with_capacity(self.bytes.len() * 9);
        for byte in &self.bytes {
            // Writing to a String cannot fail
            let _ = writeln!(out, "{:08b}", byte);
        }
        out
    }

    /// Render as a controller memory dump (decimal records)
    pub fn to_readback_records(&self) -> String {
        readback_records(&self.bytes)
    }

    /// Image contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Image length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the image holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Split the image into flow-control chunks of `chunk_size` bytes
    pub fn chunks(&self, chunk_size: usize) -> Result<Chunks<'_>> {
        Chunks::new(&self.bytes, chunk_size)
    }
}

impl From<Vec<u8>> for ProgramImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

#[cfg(feature = "std")]
impl ProgramImage {
    /// Load an image from a file in the 8-bit binary text format
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        Self::from_binary_text(&content)
    }

    /// Store the image to a file in the 8-bit binary text format
    pub fn to_file(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_binary_text()).map_err(|e| io_error(path, e))
    }
}

#[cfg(feature = "std")]
fn io_error(path: &std::path::Path, e: std::io::Error) -> Error {
    // The core error is Copy, so the cause only reaches the log
    log::debug!("{}: {}", path.display(), e);
    Error::IoError
}

/// Encode bytes as decimal read-back records, one per byte
///
/// This is the format the controller streams during a read phase and the
/// inverse of [`ProgramImage::from_readback_records`].
pub fn readback_records(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 5);
    for byte in bytes {
        // Writing to a String cannot fail
        let _ = write!(out, "{}{}", byte, RECORD_SEPARATOR);
    }
    out
}

fn parse_binary_line(line: &str) -> Option<u8> {
    if line.len() != 8 || !line.bytes().all(|b| b == b'0' || b == b'1') {
        return None;
    }
    u8::from_str_radix(line, 2).ok()
}

/// How a transfer of `len` bytes splits into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Number of chunks carrying exactly `chunk_size` bytes
    pub full_chunks: usize,
    /// Length of the trailing partial chunk, 0 when there is none
    pub tail_len: usize,
}

impl ChunkPlan {
    /// Plan a transfer of `len` bytes
    pub fn new(len: usize, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        Ok(Self {
            full_chunks: len / chunk_size,
            tail_len: len % chunk_size,
        })
    }

    /// Number of chunks that go on the wire
    ///
    /// A zero-length tail is never transmitted.
    pub fn total_chunks(&self) -> usize {
        self.full_chunks + usize::from(self.tail_len != 0)
    }
}

/// Iterator over the flow-control chunks of a byte slice
///
/// Yields `full_chunks` slices of `chunk_size` bytes, then the tail slice
/// only if it is non-empty.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    data: &'a [u8],
    chunk_size: usize,
    plan: ChunkPlan,
    index: usize,
}

impl<'a> Chunks<'a> {
    /// Create a chunk iterator over `data`
    pub fn new(data: &'a [u8], chunk_size: usize) -> Result<Self> {
        let plan = ChunkPlan::new(data.len(), chunk_size)?;
        Ok(Self {
            data,
            chunk_size,
            plan,
            index: 0,
        })
    }

    /// The chunk plan driving this iterator
    pub fn plan(&self) -> ChunkPlan {
        self.plan
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.index * self.chunk_size;
        let chunk = if self.index < self.plan.full_chunks {
            &self.data[start..start + self.chunk_size]
        } else if self.index == self.plan.full_chunks && self.plan.tail_len != 0 {
            &self.data[start..start + self.plan.tail_len]
        } else {
            return None;
        };
        self.index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.total_chunks().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}
