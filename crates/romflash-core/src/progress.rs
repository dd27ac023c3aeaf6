//! Progress reporting for programming sessions
//!
//! The transfer engine never prints anything itself. It reports through a
//! [`TransferProgress`] implementation supplied by the caller; use
//! [`NoProgress`] when nothing needs to be displayed.

use core::fmt;
use core::time::Duration;

/// Phases of a programming session, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for the controller to announce itself
    AwaitReady,
    /// Reading the chip before programming
    ReadBefore,
    /// Sending the program image
    Write,
    /// Reading the chip after programming
    ReadAfter,
    /// Comparing the image with the read-back
    Verify,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::AwaitReady => "await-ready",
            Phase::ReadBefore => "read-before",
            Phase::Write => "write",
            Phase::ReadAfter => "read-after",
            Phase::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Statistics about a finished session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Bytes decoded from the read before programming
    pub bytes_read_before: usize,
    /// Image bytes sent to the controller
    pub bytes_written: usize,
    /// Number of chunks put on the wire
    pub chunks_sent: usize,
    /// Bytes decoded from the read after programming
    pub bytes_read_after: usize,
    /// Time spent in the read-before phase
    pub read_before_time: Duration,
    /// Time spent in the write phase
    pub write_time: Duration,
    /// Time spent in the read-after phase
    pub read_after_time: Duration,
    /// Time since the session was opened
    pub total_time: Duration,
}

/// Callback for progress reporting during a session
pub trait TransferProgress {
    /// Called when the session enters a new phase
    fn phase(&mut self, phase: Phase);

    /// Called when a read starts, with the number of bytes the memory holds
    fn reading(&mut self, expected_bytes: usize);

    /// Called after each received dump message
    fn read_progress(&mut self, bytes_read: usize);

    /// Called when the write phase starts
    fn writing(&mut self, total_bytes: usize);

    /// Called after each chunk has been sent
    fn write_progress(&mut self, bytes_written: usize);

    /// Called when the session is complete
    fn complete(&mut self, stats: &TransferStats);
}

/// A no-op progress reporter
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn phase(&mut self, _phase: Phase) {}
    fn reading(&mut self, _expected_bytes: usize) {}
    fn read_progress(&mut self, _bytes_read: usize) {}
    fn writing(&mut self, _total_bytes: usize) {}
    fn write_progress(&mut self, _bytes_written: usize) {}
    fn complete(&mut self, _stats: &TransferStats) {}
}

impl<P: TransferProgress + ?Sized> TransferProgress for &mut P {
    fn phase(&mut self, phase: Phase) {
        (**self).phase(phase)
    }

    fn reading(&mut self, expected_bytes: usize) {
        (**self).reading(expected_bytes)
    }

    fn read_progress(&mut self, bytes_read: usize) {
        (**self).read_progress(bytes_read)
    }

    fn writing(&mut self, total_bytes: usize) {
        (**self).writing(total_bytes)
    }

    fn write_progress(&mut self, bytes_written: usize) {
        (**self).write_progress(bytes_written)
    }

    fn complete(&mut self, stats: &TransferStats) {
        (**self).complete(stats)
    }
}

/// Fraction of `total` covered by `done`, in `0.0..=1.0`
///
/// An empty transfer counts as complete.
pub fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (done.min(total)) as f64 / total as f64
}
