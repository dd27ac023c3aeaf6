//! Error types for romflash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Device errors
    /// Memory type designation is not in the catalogue
    UnknownMemoryType,
    /// Program image does not fit into the target memory
    ImageTooLarge {
        /// Image length in bytes
        len: usize,
        /// Capacity of the target memory in bytes
        capacity: usize,
    },

    // Transfer errors
    /// Chunk size must be at least one byte
    InvalidChunkSize,

    // Artifact errors
    /// A line of a program image is not an 8-character binary string
    InvalidImageLine {
        /// 1-based line number
        line: usize,
    },
    /// A record of a memory dump is not a decimal byte value
    InvalidReadbackRecord {
        /// 0-based record index
        record: usize,
    },

    // Verification errors
    /// Read-back returned fewer bytes than were written
    ShortReadback {
        /// Bytes expected (image length)
        expected: usize,
        /// Bytes actually read back
        actual: usize,
    },
    /// Read-back differs from the program image
    VerificationMismatch {
        /// Number of differing bytes
        differing: usize,
    },

    // I/O errors
    /// I/O error occurred while loading or storing an artifact
    IoError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMemoryType => write!(f, "unknown memory type"),
            Self::ImageTooLarge { len, capacity } => write!(
                f,
                "image ({} bytes) exceeds memory capacity ({} bytes)",
                len, capacity
            ),
            Self::InvalidChunkSize => write!(f, "chunk size must be non-zero"),
            Self::InvalidImageLine { line } => {
                write!(f, "line {} is not an 8-bit binary value", line)
            }
            Self::InvalidReadbackRecord { record } => {
                write!(f, "read-back record {} is not a byte value", record)
            }
            Self::ShortReadback { expected, actual } => write!(
                f,
                "read-back too short: expected {} bytes, got {}",
                expected, actual
            ),
            Self::VerificationMismatch { differing } => {
                write!(f, "verification failed: {} byte(s) differ", differing)
            }
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
