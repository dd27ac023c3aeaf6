//! Wire protocol constants and request encoding
//!
//! Control messages are ASCII codes wrapped in start/end markers, e.g.
//! `<READY>`. Markers are never escaped, so only printable codes and decimal
//! dump records travel inside them. Image data goes the other way as raw,
//! unframed chunks whose length the controller already knows from the write
//! request.

use romflash_core::memory::MemoryType;

/// Start-of-message marker
pub const START_MARKER: u8 = b'<';
/// End-of-message marker
pub const END_MARKER: u8 = b'>';

/// Fixed link speed of the controller
pub const DEFAULT_BAUD: u32 = 115200;

/// Control codes sent by the controller
pub mod codes {
    /// Controller booted and is waiting for a request
    pub const READY: &str = "READY";
    /// Alternative start-up code used by some firmware builds
    pub const INIT: &str = "INIT";
    /// Controller accepted a write request and waits for data
    pub const WRITE_READY: &str = "WRITE-READY";
    /// Controller programmed a chunk and wants the next one
    pub const CONTINUE: &str = "CONTINUE";
    /// Read dump or write finished
    pub const DONE: &str = "DONE";
}

/// Direction of a memory request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Dump the memory
    Read,
    /// Program the memory
    Write,
}

impl RequestKind {
    fn letter(self) -> char {
        match self {
            RequestKind::Read => 'R',
            RequestKind::Write => 'W',
        }
    }
}

/// A read or write request: `<type>|R<size>` or `<type>|W<size>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Read or write
    pub kind: RequestKind,
    /// Target device
    pub memory: MemoryType,
    /// Byte count to dump or to program
    pub size: usize,
}

impl Request {
    /// Request a dump of `size` bytes
    pub fn read(memory: MemoryType, size: usize) -> Self {
        Self {
            kind: RequestKind::Read,
            memory,
            size,
        }
    }

    /// Announce a write of `size` bytes
    pub fn write(memory: MemoryType, size: usize) -> Self {
        Self {
            kind: RequestKind::Write,
            memory,
            size,
        }
    }

    /// Encode as a control code (without markers)
    pub fn encode(&self) -> String {
        format!(
            "{}|{}{}",
            self.memory.type_code(),
            self.kind.letter(),
            self.size
        )
    }

    /// Parse a control code produced by [`Request::encode`]
    pub fn parse(code: &str) -> Option<Self> {
        let (type_code, rest) = code.split_once('|')?;
        let memory = MemoryType::from_type_code(type_code.parse().ok()?)?;
        let mut chars = rest.chars();
        let kind = match chars.next()? {
            'R' => RequestKind::Read,
            'W' => RequestKind::Write,
            _ => return None,
        };
        let size = chars.as_str().parse().ok()?;
        Some(Self { kind, memory, size })
    }
}

/// Wrap a payload between the start and end markers
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(payload.len() + 2);
    message.push(START_MARKER);
    message.extend_from_slice(payload);
    message.push(END_MARKER);
    message
}
