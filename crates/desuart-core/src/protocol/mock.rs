//! Scripted in-memory transport
//!
//! Stands in for the board in tests and dry runs. Replies are queued up
//! front; every call the driver makes is recorded so tests can check what
//! went over the wire and in which order.

use std::collections::VecDeque;

use super::transport::Transport;
use super::ProtocolError;

/// One call made against a [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bytes passed to one `write` call
    Write(Vec<u8>),
    /// A `read` call
    Read {
        /// Bytes asked for
        requested: usize,
        /// Bytes handed back
        returned: usize,
    },
    /// Buffers cleared
    Flush,
    /// First `close` on an open transport
    Close,
}

/// Transport that plays back queued replies
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Vec<u8>>,
    pending: VecDeque<u8>,
    events: Vec<TransportEvent>,
    closed: bool,
    fail_writes: bool,
}

impl ScriptedTransport {
    /// Create an open transport with no replies queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an open transport that will answer reads with `replies`, one per read call
    pub fn with_replies<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self {
            replies: replies.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Bytes already sitting in the input buffer, as if left over from an
    /// earlier exchange
    pub fn with_stale_input(mut self, bytes: &[u8]) -> Self {
        self.pending.extend(bytes);
        self
    }

    /// Make every write fail as if the device went away
    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Every call made so far
    pub fn events(&self) -> &[TransportEvent] {
        &self.events
    }

    /// Every byte written, in order
    pub fn written(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Write(bytes) => Some(bytes.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Number of write calls made
    pub fn write_calls(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TransportEvent::Write(_)))
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if self.closed {
            return Err(ProtocolError::NotConnected);
        }
        if self.fail_writes {
            return Err(ProtocolError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device disconnected",
            )));
        }
        self.events.push(TransportEvent::Write(bytes.to_vec()));
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError> {
        if self.closed {
            return Err(ProtocolError::NotConnected);
        }
        if self.pending.is_empty() {
            if let Some(reply) = self.replies.pop_front() {
                self.pending.extend(reply);
            }
        }
        let take = n.min(self.pending.len());
        let out: Vec<u8> = self.pending.drain(..take).collect();
        self.events.push(TransportEvent::Read {
            requested: n,
            returned: out.len(),
        });
        Ok(out)
    }

    fn flush(&mut self) -> Result<(), ProtocolError> {
        if self.closed {
            return Err(ProtocolError::NotConnected);
        }
        self.pending.clear();
        self.events.push(TransportEvent::Flush);
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.events.push(TransportEvent::Close);
        }
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}
