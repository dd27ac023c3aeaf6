//! romflash-dummy - Emulated EPROM programming controller for testing
//!
//! This crate provides a controller that speaks the framed link protocol
//! against an EPROM held in memory. It implements
//! [`Transport`](romflash_serial::Transport), so a
//! [`TransferSession`](romflash_serial::TransferSession) can run against it
//! without hardware.
//!
//! The emulated chip behaves like a UV-erasable EPROM: it starts out blank
//! (all `0xFF`) and programming can only clear bits.

use std::collections::VecDeque;

use romflash_core::image::{readback_records, DEFAULT_CHUNK_SIZE};
use romflash_core::memory::MemoryType;
use romflash_serial::protocol::{codes, frame, Request, RequestKind, END_MARKER, START_MARKER};
use romflash_serial::{LinkError, Result, Transport};

/// Value of an erased EPROM cell
pub const BLANK: u8 = 0xFF;

/// Configuration for the dummy controller
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Socketed memory type
    pub memory: MemoryType,
    /// Code announced once the controller is ready
    pub ready_code: String,
    /// Messages sent before the ready code, e.g. boot chatter
    pub boot_banner: Vec<String>,
    /// Bytes programmed between two `CONTINUE` acknowledgements
    pub chunk_size: usize,
    /// Dump records packed into one message
    pub records_per_message: usize,
    /// Cap on the number of bytes a dump returns
    pub dump_limit: Option<usize>,
    /// Also acknowledge the last chunk with `CONTINUE` before `DONE`
    pub continue_after_last: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            memory: MemoryType::M2732,
            ready_code: codes::READY.to_string(),
            boot_banner: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            records_per_message: 16,
            dump_limit: None,
            continue_after_last: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Parsing framed requests
    Idle,
    /// Programming raw image bytes
    Receiving {
        total: usize,
        received: usize,
        since_ack: usize,
    },
}

/// Emulated controller with an EPROM in memory
pub struct DummyController {
    config: DummyConfig,
    data: Vec<u8>,
    outbox: VecDeque<u8>,
    pending: Vec<u8>,
    state: State,
    requests: Vec<Request>,
}

impl DummyController {
    /// Create a controller with a blank chip
    ///
    /// The boot banner and ready code are queued immediately.
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![BLANK; config.memory.capacity()];
        let mut controller = Self {
            config,
            data,
            outbox: VecDeque::new(),
            pending: Vec::new(),
            state: State::Idle,
            requests: Vec::new(),
        };

        let banner = controller.config.boot_banner.clone();
        for message in &banner {
            controller.send(message.as_bytes());
        }
        let ready = controller.config.ready_code.clone();
        controller.send(ready.as_bytes());
        controller
    }

    /// Create a controller with a blank 2732
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a controller whose chip already holds `initial_data`
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut controller = Self::new(config);
        let len = core::cmp::min(initial_data.len(), controller.data.len());
        controller.data[..len].copy_from_slice(&initial_data[..len]);
        controller
    }

    /// Get a reference to the chip contents
    pub fn memory(&self) -> &[u8] {
        &self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Whether a write is still waiting for image bytes
    pub fn is_receiving(&self) -> bool {
        matches!(self.state, State::Receiving { .. })
    }

    fn send(&mut self, payload: &[u8]) {
        self.outbox.extend(frame(payload));
    }

    fn handle_byte(&mut self, byte: u8) {
        match self.state {
            State::Receiving { .. } => self.program_byte(byte),
            State::Idle => match byte {
                START_MARKER => self.pending.clear(),
                END_MARKER => {
                    let code = std::mem::take(&mut self.pending);
                    self.handle_code(&String::from_utf8_lossy(&code));
                }
                other => self.pending.push(other),
            },
        }
    }

    fn handle_code(&mut self, code: &str) {
        let Some(request) = Request::parse(code) else {
            log::debug!("dummy: ignoring <{}>", code);
            return;
        };
        log::debug!("dummy: request <{}>", code);
        self.requests.push(request);

        match request.kind {
            RequestKind::Read => self.dump(request.size),
            RequestKind::Write => {
                self.send(codes::WRITE_READY.as_bytes());
                if request.size == 0 {
                    self.send(codes::DONE.as_bytes());
                } else {
                    self.state = State::Receiving {
                        total: request.size,
                        received: 0,
                        since_ack: 0,
                    };
                }
            }
        }
    }

    fn dump(&mut self, size: usize) {
        let mut len = core::cmp::min(size, self.data.len());
        if let Some(limit) = self.config.dump_limit {
            len = core::cmp::min(len, limit);
        }

        let per_message = self.config.records_per_message.max(1);
        let records: Vec<String> = self.data[..len]
            .chunks(per_message)
            .map(readback_records)
            .collect();
        for message in records {
            self.send(message.as_bytes());
        }
        self.send(codes::DONE.as_bytes());
    }

    fn program_byte(&mut self, byte: u8) {
        let State::Receiving {
            total,
            mut received,
            mut since_ack,
        } = self.state
        else {
            return;
        };

        // EPROM programming can only change 1 -> 0
        if let Some(cell) = self.data.get_mut(received) {
            *cell &= byte;
        }
        received += 1;
        since_ack += 1;

        if received == total {
            if self.config.continue_after_last {
                self.send(codes::CONTINUE.as_bytes());
            }
            self.send(codes::DONE.as_bytes());
            self.state = State::Idle;
        } else if since_ack == self.config.chunk_size {
            self.send(codes::CONTINUE.as_bytes());
            self.state = State::Receiving {
                total,
                received,
                since_ack: 0,
            };
        } else {
            self.state = State::Receiving {
                total,
                received,
                since_ack,
            };
        }
    }
}

impl Transport for DummyController {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        for &byte in data {
            self.handle_byte(byte);
        }
        Ok(())
    }

    /// Never blocks: with too little queued output this fails instead
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.outbox.len() < buf.len() {
            return Err(LinkError::Io("dummy controller has nothing to send".into()));
        }
        for b in buf.iter_mut() {
            *b = self.outbox.pop_front().unwrap_or(BLANK);
        }
        Ok(())
    }

    fn read_nonblock(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize> {
        let n = core::cmp::min(buf.len(), self.outbox.len());
        for b in buf[..n].iter_mut() {
            *b = self.outbox.pop_front().unwrap_or(BLANK);
        }
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
