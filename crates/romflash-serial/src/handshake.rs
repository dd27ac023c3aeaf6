//! Handshake synchronization
//!
//! Every phase transition is gated on the controller sending one exact,
//! case-sensitive code. Messages that do not match are left over from
//! earlier protocol steps and are discarded.

use std::time::Instant;

use crate::error::{LinkError, Result};
use crate::framer::{Framer, WaitPolicy};
use crate::transport::Transport;

/// Waits for expected control codes on a [`Framer`]
#[derive(Debug, Clone, Copy)]
pub struct Handshake {
    wait: WaitPolicy,
}

impl Handshake {
    /// Create a handshake controller with the given wait bound
    ///
    /// The bound applies to each call of [`Handshake::wait_for`] as a whole,
    /// not to individual messages.
    pub fn new(wait: WaitPolicy) -> Self {
        Self { wait }
    }

    /// The configured wait bound
    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait
    }

    /// Block until a message equal to `expected` arrives
    ///
    /// Returns the number of non-matching messages discarded on the way.
    /// If the wait bound elapses first, fails with
    /// [`LinkError::ProtocolStall`].
    pub fn wait_for<T: Transport>(&self, framer: &mut Framer<T>, expected: &str) -> Result<usize> {
        let deadline: Option<Instant> = self.wait.deadline();
        let mut discarded = 0;

        loop {
            let message = framer
                .read_message_until(deadline)
                .map_err(|e| stall_on_timeout(e, expected))?;

            if message.is(expected) {
                log::debug!("handshake: got <{}>", expected);
                return Ok(discarded);
            }

            discarded += 1;
            log::debug!(
                "handshake: discarding <{}> while waiting for <{}>",
                message.text(),
                expected
            );
        }
    }
}

/// Map a read timeout to a stall on `expected`
pub(crate) fn stall_on_timeout(e: LinkError, expected: &str) -> LinkError {
    match e {
        LinkError::TimedOut => LinkError::ProtocolStall {
            expected: expected.to_string(),
        },
        other => other,
    }
}
