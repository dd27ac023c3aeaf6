//! Error types for link operations

use thiserror::Error;

/// Link-level errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// Device could not be found or opened
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// An expected handshake code did not arrive within the wait bound
    #[error("Protocol stall: controller never sent <{expected}>")]
    ProtocolStall {
        /// The code that was being waited for
        expected: String,
    },

    /// A single bounded read elapsed without data
    #[error("Communication timeout")]
    TimedOut,

    /// The operator declined a gated step
    #[error("Aborted by operator")]
    Aborted,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    Io(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Data model error (sizing, artifacts, verification)
    #[error(transparent)]
    Core(#[from] romflash_core::Error),
}

/// Result type for link operations
pub type Result<T> = core::result::Result<T, LinkError>;

impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        LinkError::Io(e.to_string())
    }
}
