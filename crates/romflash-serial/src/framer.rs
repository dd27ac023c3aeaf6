//! Delimited message framing over a [`Transport`]
//!
//! Incoming bytes are consumed one at a time. A start marker discards any
//! partial payload and begins a new one, an end marker completes the current
//! message, and every other byte is payload. There is no escaping and no
//! length limit: a message that is never terminated keeps the reader
//! waiting.
//!
//! Outgoing control codes are framed and written in a single write. Image
//! chunks are written raw; their length is implied by the write request.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use crate::error::{LinkError, Result};
use crate::protocol::{frame, END_MARKER, START_MARKER};
use crate::transport::Transport;

/// Wait bound used unless the caller picks another
pub const DEFAULT_WAIT: Duration = Duration::from_secs(30);

/// How long a read may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Block until data arrives, however long that takes
    Forever,
    /// Give up with a timeout after the given duration
    Bounded(Duration),
}

impl WaitPolicy {
    /// Bounded wait from a millisecond count, 0 meaning forever
    pub fn from_millis(timeout_ms: u64) -> Self {
        match timeout_ms {
            0 => WaitPolicy::Forever,
            ms => WaitPolicy::Bounded(Duration::from_millis(ms)),
        }
    }

    /// Deadline for a wait starting now
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            WaitPolicy::Forever => None,
            WaitPolicy::Bounded(d) => Some(Instant::now() + *d),
        }
    }
}

/// One complete message with the markers stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Vec<u8>,
}

impl Message {
    /// Create a message from a payload
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// Raw payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as text, with invalid UTF-8 replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Whether the payload is exactly `code`
    pub fn is(&self, code: &str) -> bool {
        self.payload == code.as_bytes()
    }
}

/// Message framer owning the transport
pub struct Framer<T: Transport> {
    transport: T,
    /// Payload accumulated since the last start marker
    pending: Vec<u8>,
    /// Whether a start marker has been seen for `pending`
    in_message: bool,
    bytes_in: usize,
    bytes_out: usize,
}

impl<T: Transport> Framer<T> {
    /// Create a framer over the given transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pending: Vec::new(),
            in_message: false,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Read the next complete message, blocking according to `wait`
    ///
    /// On timeout the partial payload is kept, so a later call resumes the
    /// same message.
    pub fn read_message(&mut self, wait: WaitPolicy) -> Result<Message> {
        self.read_message_until(wait.deadline())
    }

    /// Read the next complete message, giving up at `deadline`
    pub fn read_message_until(&mut self, deadline: Option<Instant>) -> Result<Message> {
        loop {
            let byte = self.next_byte(deadline)?;
            self.bytes_in += 1;
            match byte {
                START_MARKER => {
                    if !self.pending.is_empty() {
                        log::trace!(
                            "framer: start marker discards {} byte(s) of partial payload",
                            self.pending.len()
                        );
                    }
                    self.pending.clear();
                    self.in_message = true;
                }
                END_MARKER => {
                    self.in_message = false;
                    let message = Message::new(std::mem::take(&mut self.pending));
                    log::trace!("framer: received <{}>", message.text());
                    return Ok(message);
                }
                other => self.pending.push(other),
            }
        }
    }

    /// Iterate over incoming messages, waiting forever for each
    pub fn messages(&mut self) -> Messages<'_, T> {
        Messages { framer: self }
    }

    /// Frame `code` and write it in one write
    pub fn send_code(&mut self, code: &str) -> Result<()> {
        let message = frame(code.as_bytes());
        log::debug!("framer: sending <{}>", code);
        self.transport.write(&message)?;
        self.transport.flush()?;
        self.bytes_out += message.len();
        Ok(())
    }

    /// Write raw bytes with no framing markers
    ///
    /// An empty slice is not written at all.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        log::trace!("framer: sending {} raw byte(s)", bytes.len());
        self.transport.write(bytes)?;
        self.transport.flush()?;
        self.bytes_out += bytes.len();
        Ok(())
    }

    /// Whether a message has been started but not yet completed
    pub fn has_partial_message(&self) -> bool {
        self.in_message
    }

    /// Total bytes read from the transport
    pub fn bytes_received(&self) -> usize {
        self.bytes_in
    }

    /// Total bytes written to the transport
    pub fn bytes_sent(&self) -> usize {
        self.bytes_out
    }

    /// Access the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the framer and return the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn next_byte(&mut self, deadline: Option<Instant>) -> Result<u8> {
        let mut byte = [0u8];
        let Some(deadline) = deadline else {
            self.transport.read(&mut byte)?;
            return Ok(byte[0]);
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LinkError::TimedOut);
            }
            let timeout_ms = u32::try_from(remaining.as_millis()).unwrap_or(u32::MAX);
            if self.transport.read_nonblock(&mut byte, timeout_ms)? == 1 {
                return Ok(byte[0]);
            }
        }
    }
}

/// Endless sequence of messages read from a [`Framer`]
pub struct Messages<'a, T: Transport> {
    framer: &'a mut Framer<T>,
}

impl<T: Transport> Iterator for Messages<'_, T> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.framer.read_message(WaitPolicy::Forever))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for unit tests

    use super::*;
    use std::collections::VecDeque;

    /// Transport replaying a fixed byte script and recording every write
    #[derive(Default)]
    pub struct ScriptedTransport {
        pub incoming: VecDeque<u8>,
        pub writes: Vec<Vec<u8>>,
        /// Script bytes consumed when each write happened
        pub consumed_at_write: Vec<usize>,
        consumed: usize,
    }

    impl ScriptedTransport {
        pub fn new(incoming: &[u8]) -> Self {
            Self {
                incoming: incoming.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.writes.push(data.to_vec());
            self.consumed_at_write.push(self.consumed);
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            if self.incoming.len() < buf.len() {
                return Err(LinkError::Io("script exhausted".into()));
            }
            for b in buf.iter_mut() {
                *b = self.incoming.pop_front().unwrap_or_default();
            }
            self.consumed += buf.len();
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize> {
            let n = std::cmp::min(buf.len(), self.incoming.len());
            for b in buf[..n].iter_mut() {
                *b = self.incoming.pop_front().unwrap_or_default();
            }
            self.consumed += n;
            Ok(n)
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::ScriptedTransport;
    use super::*;

    fn framer(script: &[u8]) -> Framer<ScriptedTransport> {
        Framer::new(ScriptedTransport::new(script))
    }

    #[test]
    fn test_read_simple_message() {
        let mut f = framer(b"<READY>");
        let msg = f.read_message(WaitPolicy::Forever).unwrap();
        assert_eq!(msg.payload(), b"READY");
        assert!(msg.is("READY"));
        assert_eq!(f.bytes_received(), 7);
    }

    #[test]
    fn test_payloads_round_trip_through_framing() {
        for payload in ["", "DONE", "WRITE-READY", "1\r\n255\r\n0\r\n", "32|R4096"] {
            let mut f = framer(&frame(payload.as_bytes()));
            let msg = f.read_message(WaitPolicy::Forever).unwrap();
            assert_eq!(msg.text(), payload);
        }
    }

    #[test]
    fn test_start_marker_resets_payload() {
        let mut f = framer(b"<ab<cd>");
        let msg = f.read_message(WaitPolicy::Forever).unwrap();
        assert_eq!(msg.payload(), b"cd");
    }

    #[test]
    fn test_bytes_before_start_marker_are_dropped() {
        let mut f = framer(b"noise<DONE>");
        assert!(f.read_message(WaitPolicy::Forever).unwrap().is("DONE"));
    }

    #[test]
    fn test_consecutive_messages() {
        let mut f = framer(b"<BOOT><READY>");
        let messages: Vec<Message> = f.messages().take(2).map(|m| m.unwrap()).collect();
        assert!(messages[0].is("BOOT"));
        assert!(messages[1].is("READY"));
    }

    #[test]
    fn test_bounded_read_times_out_and_resumes() {
        let mut f = framer(b"<CONT");
        let wait = WaitPolicy::Bounded(Duration::from_millis(20));
        assert!(matches!(f.read_message(wait), Err(LinkError::TimedOut)));
        assert!(f.has_partial_message());

        f.transport_mut().incoming.extend(b"INUE>".iter().copied());
        assert!(f.read_message(wait).unwrap().is("CONTINUE"));
        assert!(!f.has_partial_message());
    }

    #[test]
    fn test_send_code_is_one_framed_write() {
        let mut f = framer(b"");
        f.send_code("32|W3").unwrap();
        let t = f.into_inner();
        assert_eq!(t.writes, vec![b"<32|W3>".to_vec()]);
    }

    #[test]
    fn test_send_bytes_is_unframed() {
        let mut f = framer(b"");
        f.send_bytes(&[b'<', 0x00, b'>']).unwrap();
        f.send_bytes(&[]).unwrap();
        assert_eq!(f.bytes_sent(), 3);
        let t = f.into_inner();
        assert_eq!(t.writes, vec![vec![b'<', 0x00, b'>']]);
    }

    #[test]
    fn test_wait_policy_from_millis() {
        assert_eq!(WaitPolicy::from_millis(0), WaitPolicy::Forever);
        assert_eq!(
            WaitPolicy::from_millis(250),
            WaitPolicy::Bounded(Duration::from_millis(250))
        );
        assert!(WaitPolicy::Forever.deadline().is_none());
    }
}
