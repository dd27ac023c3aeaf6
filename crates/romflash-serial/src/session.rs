//! Programming session state machine
//!
//! A [`TransferSession`] owns the link for its whole lifetime and walks the
//! controller through the protocol:
//!
//! 1. wait for the ready code
//! 2. dump the memory (read-before)
//! 3. optionally program an image in flow-controlled chunks
//! 4. dump the memory again (read-after) and verify it against the image
//!
//! The link is released when the session is dropped, on every exit path.

use std::fmt;
use std::time::Instant;

use romflash_core::image::{ChunkPlan, ProgramImage, DEFAULT_CHUNK_SIZE};
use romflash_core::memory::MemoryRegion;
use romflash_core::progress::{fraction, Phase, TransferProgress, TransferStats};
use romflash_core::verify::{self, VerificationReport};

use crate::error::{LinkError, Result};
use crate::framer::{Framer, WaitPolicy, DEFAULT_WAIT};
use crate::handshake::{stall_on_timeout, Handshake};
use crate::protocol::{codes, Request};
use crate::transport::Transport;

/// Tunables of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bytes per flow-controlled write chunk
    pub chunk_size: usize,
    /// Bound on each handshake wait and on each dump message
    pub wait: WaitPolicy,
    /// Code the controller sends once it is ready for requests
    pub ready_code: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            wait: WaitPolicy::Bounded(DEFAULT_WAIT),
            ready_code: codes::READY.to_string(),
        }
    }
}

/// Manual steps the operator performs between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorStep {
    /// Apply the programming voltage before the write phase
    ApplyProgrammingVoltage,
    /// Remove the programming voltage before reading back
    RemoveProgrammingVoltage,
}

impl fmt::Display for OperatorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorStep::ApplyProgrammingVoltage => write!(f, "Apply VPP"),
            OperatorStep::RemoveProgrammingVoltage => write!(f, "Remove VPP"),
        }
    }
}

/// The caller's side of a session: manual gates and artifact storage
pub trait Operator {
    /// Ask the operator to perform `step`; `false` aborts the session
    fn confirm(&mut self, step: OperatorStep) -> bool;

    /// Hand over a memory dump as soon as a read phase completes
    fn store(&mut self, phase: Phase, image: &ProgramImage) -> Result<()> {
        let _ = (phase, image);
        Ok(())
    }
}

/// Operator that confirms every step and keeps nothing
pub struct AutoConfirm;

impl Operator for AutoConfirm {
    fn confirm(&mut self, _step: OperatorStep) -> bool {
        true
    }
}

/// Everything a completed session produced
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Memory contents before programming
    pub before: ProgramImage,
    /// Memory contents after programming, if an image was written
    pub after: Option<ProgramImage>,
    /// Comparison of the image with `after`, if an image was written
    pub report: Option<VerificationReport>,
    /// Session statistics
    pub stats: TransferStats,
}

impl SessionOutcome {
    /// True unless a written image failed verification
    pub fn is_verified(&self) -> bool {
        self.report.as_ref().map_or(true, |r| r.is_success())
    }
}

/// One programming session over an exclusively owned link
pub struct TransferSession<T: Transport> {
    framer: Framer<T>,
    handshake: Handshake,
    region: MemoryRegion,
    config: SessionConfig,
    started: Instant,
    bytes_sent: usize,
    bytes_received: usize,
    write_total: usize,
    stats: TransferStats,
}

impl<T: Transport> TransferSession<T> {
    /// Open a session on `transport` for the given memory region
    pub fn new(transport: T, region: MemoryRegion, config: SessionConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(romflash_core::Error::InvalidChunkSize.into());
        }
        if config.ready_code.is_empty() {
            return Err(LinkError::InvalidParameter("ready code must not be empty".into()));
        }

        log::debug!(
            "session: {} ({} bytes), chunk size {}, wait {:?}",
            region.memory_type(),
            region.capacity(),
            config.chunk_size,
            config.wait
        );

        Ok(Self {
            framer: Framer::new(transport),
            handshake: Handshake::new(config.wait),
            region,
            config,
            started: Instant::now(),
            bytes_sent: 0,
            bytes_received: 0,
            write_total: 0,
            stats: TransferStats::default(),
        })
    }

    /// Run the full session: ready, read-before, write, read-after, verify
    ///
    /// Without an image the session stops after the first read. The image
    /// size is checked against the region before anything is sent.
    pub fn run<O, P>(
        mut self,
        image: Option<&ProgramImage>,
        operator: &mut O,
        progress: &mut P,
    ) -> Result<SessionOutcome>
    where
        O: Operator + ?Sized,
        P: TransferProgress + ?Sized,
    {
        if let Some(image) = image {
            self.region.check_fits(image.len())?;
        }

        self.await_ready(progress)?;

        let before = self.read_memory(Phase::ReadBefore, progress)?;
        operator.store(Phase::ReadBefore, &before)?;

        let Some(image) = image else {
            let stats = self.finish(progress);
            return Ok(SessionOutcome {
                before,
                after: None,
                report: None,
                stats,
            });
        };

        if !operator.confirm(OperatorStep::ApplyProgrammingVoltage) {
            return Err(LinkError::Aborted);
        }
        self.write_image(image, progress)?;

        if !operator.confirm(OperatorStep::RemoveProgrammingVoltage) {
            return Err(LinkError::Aborted);
        }
        let after = self.read_memory(Phase::ReadAfter, progress)?;
        operator.store(Phase::ReadAfter, &after)?;

        progress.phase(Phase::Verify);
        let report = verify::compare(image.as_bytes(), after.as_bytes())?;
        if report.is_success() {
            log::info!("Verification passed ({} bytes)", report.compared());
        } else {
            log::warn!(
                "Verification failed: {} of {} bytes differ",
                report.mismatches().len(),
                report.compared()
            );
        }

        let stats = self.finish(progress);
        Ok(SessionOutcome {
            before,
            after: Some(after),
            report: Some(report),
            stats,
        })
    }

    /// Block until the controller sends the ready code
    pub fn await_ready<P: TransferProgress + ?Sized>(&mut self, progress: &mut P) -> Result<()> {
        progress.phase(Phase::AwaitReady);
        log::info!("Waiting for controller ({})", self.config.ready_code);
        let discarded = self
            .handshake
            .wait_for(&mut self.framer, &self.config.ready_code)?;
        if discarded > 0 {
            log::debug!("session: skipped {} message(s) before ready", discarded);
        }
        log::info!("Controller ready");
        Ok(())
    }

    /// Dump the whole memory region
    ///
    /// Every message up to `DONE` is part of the dump. The wait bound
    /// applies to each message separately.
    pub fn read_memory<P: TransferProgress + ?Sized>(
        &mut self,
        phase: Phase,
        progress: &mut P,
    ) -> Result<ProgramImage> {
        let started = Instant::now();
        let capacity = self.region.capacity();
        progress.phase(phase);
        log::info!(
            "Reading {} ({} bytes)",
            self.region.memory_type(),
            capacity
        );

        let request = Request::read(self.region.memory_type(), capacity);
        self.framer.send_code(&request.encode())?;
        progress.reading(capacity);

        self.bytes_received = 0;
        let mut dump = Vec::new();
        let mut records = 0usize;
        loop {
            let message = self
                .framer
                .read_message(self.config.wait)
                .map_err(|e| stall_on_timeout(e, codes::DONE))?;
            if message.is(codes::DONE) {
                break;
            }

            records += message.payload().iter().filter(|&&b| b == b'\n').count();
            self.bytes_received += message.len();
            dump.extend_from_slice(message.payload());
            progress.read_progress(records.min(capacity));
        }

        let image = ProgramImage::from_readback_records(&String::from_utf8_lossy(&dump))?;
        let elapsed = started.elapsed();
        log::info!(
            "Read {} bytes ({} on the wire) in {:.2?}",
            image.len(),
            self.bytes_received,
            elapsed
        );
        if image.len() < capacity {
            log::warn!(
                "Controller returned {} bytes, {} expected",
                image.len(),
                capacity
            );
        }

        match phase {
            Phase::ReadAfter => {
                self.stats.bytes_read_after = image.len();
                self.stats.read_after_time = elapsed;
            }
            _ => {
                self.stats.bytes_read_before = image.len();
                self.stats.read_before_time = elapsed;
            }
        }
        Ok(image)
    }

    /// Program `image` in chunks of the configured size
    ///
    /// Each chunk but the last is acknowledged with `CONTINUE`; the write
    /// ends with `DONE`. An image that is an exact multiple of the chunk
    /// size gets no trailing empty chunk.
    pub fn write_image<P: TransferProgress + ?Sized>(
        &mut self,
        image: &ProgramImage,
        progress: &mut P,
    ) -> Result<()> {
        self.region.check_fits(image.len())?;
        let chunks = image.chunks(self.config.chunk_size)?;
        let plan: ChunkPlan = chunks.plan();
        let total_chunks = plan.total_chunks();

        progress.phase(Phase::Write);
        self.write_total = image.len();
        self.bytes_sent = 0;
        if image.is_empty() {
            log::warn!("Program image is empty, nothing to write");
            return Ok(());
        }

        let started = Instant::now();
        log::info!(
            "Writing {} bytes to {} in {} chunk(s)",
            image.len(),
            self.region.memory_type(),
            total_chunks
        );

        let request = Request::write(self.region.memory_type(), image.len());
        self.framer.send_code(&request.encode())?;
        self.handshake
            .wait_for(&mut self.framer, codes::WRITE_READY)?;
        progress.writing(image.len());

        for (index, chunk) in chunks.enumerate() {
            self.framer.send_bytes(chunk)?;
            self.bytes_sent += chunk.len();
            self.stats.chunks_sent += 1;
            progress.write_progress(self.bytes_sent);
            log::trace!(
                "session: chunk {}/{} ({} bytes), {:.0}%",
                index + 1,
                total_chunks,
                chunk.len(),
                self.write_fraction() * 100.0
            );

            if index + 1 < total_chunks {
                self.handshake.wait_for(&mut self.framer, codes::CONTINUE)?;
            }
        }
        self.handshake.wait_for(&mut self.framer, codes::DONE)?;

        self.stats.bytes_written = self.bytes_sent;
        self.stats.write_time = started.elapsed();
        log::info!(
            "Wrote {} bytes in {:.2?}",
            self.bytes_sent,
            self.stats.write_time
        );
        Ok(())
    }

    /// Image bytes sent in the current write phase
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Payload bytes received in the current read phase
    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    /// Fraction of the current write that has been sent
    pub fn write_fraction(&self) -> f64 {
        fraction(self.bytes_sent, self.write_total)
    }

    /// Statistics collected so far
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// End the session and return the transport
    pub fn into_transport(self) -> T {
        self.framer.into_inner()
    }

    /// Close the statistics and report them to `progress`
    ///
    /// [`TransferSession::run`] does this itself; callers driving the
    /// phases one by one call it once they are done.
    pub fn finish<P: TransferProgress + ?Sized>(&mut self, progress: &mut P) -> TransferStats {
        self.stats.total_time = self.started.elapsed();
        progress.complete(&self.stats);
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::mock::ScriptedTransport;
    use romflash_core::memory::MemoryType;
    use romflash_core::progress::NoProgress;
    use std::time::Duration;

    fn session(script: &[u8], chunk_size: usize) -> TransferSession<ScriptedTransport> {
        let config = SessionConfig {
            chunk_size,
            ..SessionConfig::default()
        };
        TransferSession::new(
            ScriptedTransport::new(script),
            MemoryType::M2732.region(),
            config,
        )
        .unwrap()
    }

    /// Records every progress callback
    #[derive(Default)]
    struct Recorder {
        phases: Vec<Phase>,
        writes: Vec<usize>,
        completed: bool,
    }

    impl TransferProgress for Recorder {
        fn phase(&mut self, phase: Phase) {
            self.phases.push(phase);
        }
        fn reading(&mut self, _expected_bytes: usize) {}
        fn read_progress(&mut self, _bytes_read: usize) {}
        fn writing(&mut self, _total_bytes: usize) {}
        fn write_progress(&mut self, bytes_written: usize) {
            self.writes.push(bytes_written);
        }
        fn complete(&mut self, _stats: &TransferStats) {
            self.completed = true;
        }
    }

    #[test]
    fn test_write_sends_chunks_between_acknowledgements() {
        let mut s = session(b"<WRITE-READY><CONTINUE><DONE>", 2);
        let image = ProgramImage::new(vec![0b0000_0001, 0b1111_1111, 0b0000_0000]);
        let mut progress = Recorder::default();

        s.write_image(&image, &mut progress).unwrap();
        assert_eq!(s.bytes_sent(), 3);
        assert_eq!(s.write_fraction(), 1.0);
        assert_eq!(s.stats().chunks_sent, 2);
        assert_eq!(progress.writes, vec![2, 3]);

        let t = s.into_transport();
        assert_eq!(
            t.writes,
            vec![b"<32|W3>".to_vec(), vec![1, 255], vec![0]]
        );
        // First chunk only after WRITE-READY, second only after CONTINUE
        assert_eq!(t.consumed_at_write, vec![0, 13, 23]);
        assert!(t.incoming.is_empty());

        let data_bytes: usize = t.writes[1..].iter().map(Vec::len).sum();
        assert_eq!(data_bytes, 3);
    }

    #[test]
    fn test_exact_multiple_sends_no_empty_chunk() {
        let mut s = session(b"<WRITE-READY><CONTINUE><CONTINUE><DONE>", 2);
        let image = ProgramImage::new(vec![1, 2, 3, 4]);
        s.write_image(&image, &mut NoProgress).unwrap();

        let t = s.into_transport();
        assert_eq!(t.writes.len(), 3);
        assert!(t.writes.iter().all(|w| !w.is_empty()));
        assert_eq!(t.writes[1..].to_vec(), vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_write_rejects_oversized_image() {
        let mut s = session(b"", 16);
        let image = ProgramImage::new(vec![0; 4097]);
        let err = s.write_image(&image, &mut NoProgress).unwrap_err();
        assert!(matches!(
            err,
            LinkError::Core(romflash_core::Error::ImageTooLarge {
                len: 4097,
                capacity: 4096
            })
        ));
        assert!(s.into_transport().writes.is_empty());
    }

    #[test]
    fn test_run_rejects_oversized_image_before_handshake() {
        let s = session(b"<READY>", 16);
        let image = ProgramImage::new(vec![0; 4097]);
        let result = s.run(Some(&image), &mut AutoConfirm, &mut NoProgress);
        assert!(matches!(
            result,
            Err(LinkError::Core(romflash_core::Error::ImageTooLarge { .. }))
        ));
    }

    #[test]
    fn test_read_accumulates_until_done() {
        let mut s = session(b"<READY><1\r\n2><3\r\n255\r\n><DONE>", 16);
        s.await_ready(&mut NoProgress).unwrap();
        let image = s.read_memory(Phase::ReadBefore, &mut NoProgress).unwrap();
        assert_eq!(image.as_bytes(), &[1, 23, 255]);
        assert_eq!(s.bytes_received(), 12);
        assert_eq!(s.stats().bytes_read_before, 3);

        let t = s.into_transport();
        assert_eq!(t.writes, vec![b"<32|R4096>".to_vec()]);
    }

    #[test]
    fn test_read_only_session() {
        let s = session(b"<READY><7\r\n8\r\n><DONE>", 16);
        let mut progress = Recorder::default();
        let outcome = s.run(None, &mut AutoConfirm, &mut progress).unwrap();
        assert_eq!(outcome.before.as_bytes(), &[7, 8]);
        assert!(outcome.after.is_none());
        assert!(outcome.is_verified());
        assert_eq!(progress.phases, vec![Phase::AwaitReady, Phase::ReadBefore]);
        assert!(progress.completed);
    }

    #[test]
    fn test_full_session_verifies() {
        let script = b"<READY><255\r\n255\r\n255\r\n><DONE>\
                       <WRITE-READY><CONTINUE><DONE>\
                       <1\r\n255\r\n0\r\n><DONE>";
        let s = session(script, 2);
        let image = ProgramImage::new(vec![1, 255, 0]);
        let mut progress = Recorder::default();

        let outcome = s.run(Some(&image), &mut AutoConfirm, &mut progress).unwrap();
        assert_eq!(outcome.before.as_bytes(), &[255, 255, 255]);
        assert_eq!(outcome.after.as_ref().unwrap().as_bytes(), &[1, 255, 0]);
        assert!(outcome.is_verified());
        assert_eq!(outcome.stats.bytes_written, 3);
        assert_eq!(outcome.stats.chunks_sent, 2);
        assert_eq!(
            progress.phases,
            vec![
                Phase::AwaitReady,
                Phase::ReadBefore,
                Phase::Write,
                Phase::ReadAfter,
                Phase::Verify
            ]
        );
    }

    #[test]
    fn test_short_readback_is_an_error() {
        let script = b"<READY><><DONE><WRITE-READY><DONE><1\r\n><DONE>";
        let s = session(script, 16);
        let image = ProgramImage::new(vec![1, 2]);
        let result = s.run(Some(&image), &mut AutoConfirm, &mut NoProgress);
        assert!(matches!(
            result,
            Err(LinkError::Core(romflash_core::Error::ShortReadback {
                expected: 2,
                actual: 1
            }))
        ));
    }

    #[test]
    fn test_operator_can_abort_before_write() {
        struct Decline;
        impl Operator for Decline {
            fn confirm(&mut self, _step: OperatorStep) -> bool {
                false
            }
        }

        let s = session(b"<READY><DONE>", 16);
        let image = ProgramImage::new(vec![1]);
        let result = s.run(Some(&image), &mut Decline, &mut NoProgress);
        assert!(matches!(result, Err(LinkError::Aborted)));
    }

    #[test]
    fn test_missing_done_stalls_with_bounded_wait() {
        let config = SessionConfig {
            wait: WaitPolicy::Bounded(Duration::from_millis(20)),
            ..SessionConfig::default()
        };
        let mut s = TransferSession::new(
            ScriptedTransport::new(b"<1\r\n"),
            MemoryType::M2716.region(),
            config,
        )
        .unwrap();
        match s.read_memory(Phase::ReadBefore, &mut NoProgress) {
            Err(LinkError::ProtocolStall { expected }) => assert_eq!(expected, "DONE"),
            other => panic!("expected stall, got {:?}", other.map(|i| i.len())),
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SessionConfig {
            chunk_size: 0,
            ..SessionConfig::default()
        };
        assert!(TransferSession::new(
            ScriptedTransport::default(),
            MemoryType::M2716.region(),
            config
        )
        .is_err());
    }
}
