//! Byte transport
//!
//! The driver talks to the board through [`Transport`]. [`SerialTransport`]
//! is the real UART; tests use [`super::mock::ScriptedTransport`].

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use super::serial::{clear_buffers, open_port};
use super::{ProtocolError, RESPONSE_FRAME_SIZE};

/// Blocking byte pipe to the board
pub trait Transport {
    /// Write every byte or fail
    fn write(&mut self, bytes: &[u8]) -> Result<(), ProtocolError>;

    /// Read up to `n` bytes, returning early once `n` have arrived.
    ///
    /// A timeout is not an error: the returned buffer is simply shorter
    /// than `n`.
    fn read(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError>;

    /// Discard unread input and unsent output
    fn flush(&mut self) -> Result<(), ProtocolError>;

    /// Release the underlying device. Safe to call more than once.
    fn close(&mut self);

    /// Whether the transport still holds an open device
    fn is_open(&self) -> bool;
}

/// How often to check for incoming bytes while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Largest single read from the port
const READ_CHUNK: usize = 256;

/// [`Transport`] over a `serialport` handle
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    timeout: Duration,
}

impl SerialTransport {
    /// Open `name` at `baud_rate` with 8N1 framing and clear stale buffers
    pub fn open(name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ProtocolError> {
        let mut port = open_port(name, baud_rate, timeout)?;
        clear_buffers(port.as_mut()).map_err(|e| e.at_open(name))?;
        tracing::info!(port = name, baud_rate, "serial port opened");
        Ok(Self {
            port: Some(port),
            name: name.to_string(),
            timeout,
        })
    }

    /// A transport that was never opened
    pub fn closed(name: &str) -> Self {
        Self {
            port: None,
            name: name.to_string(),
            timeout: Duration::from_millis(super::DEFAULT_TIMEOUT_MS),
        }
    }

    /// Port name this transport was created for
    pub fn name(&self) -> &str {
        &self.name
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, ProtocolError> {
        self.port.as_mut().ok_or(ProtocolError::NotConnected)
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        Ok(())
    }

    // Polls bytes_to_read() rather than blocking in read(), so the overall
    // deadline holds regardless of how the driver splits the timeout. The
    // buffer grows with what arrives, not with what was asked for.
    fn read(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError> {
        let timeout = self.timeout;
        let port = self.port_mut()?;
        let mut buf = Vec::with_capacity(n.min(RESPONSE_FRAME_SIZE));
        let mut chunk = [0u8; READ_CHUNK];
        let start = Instant::now();

        while buf.len() < n {
            if start.elapsed() > timeout {
                tracing::debug!(received = buf.len(), expected = n, "read timed out");
                break;
            }

            let available = port.bytes_to_read()? as usize;
            if available == 0 {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }

            let to_read = available.min(n - buf.len()).min(READ_CHUNK);
            match port.read(&mut chunk[..to_read]) {
                Ok(0) => {
                    tracing::debug!(received = buf.len(), "read hit EOF");
                    break;
                }
                Ok(read) => {
                    tracing::trace!(bytes = ?&chunk[..read], "read");
                    buf.extend_from_slice(&chunk[..read]);
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(ProtocolError::IoError(e)),
            }
        }

        Ok(buf)
    }

    fn flush(&mut self) -> Result<(), ProtocolError> {
        let port = self.port_mut()?;
        clear_buffers(port.as_mut())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!(port = %self.name, "serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}
