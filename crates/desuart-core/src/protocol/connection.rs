//! Connection management
//!
//! Handles the connection lifecycle and the request/response exchange with
//! the board. Exchanges are strictly sequential: a request is only sent once
//! the previous response has arrived or timed out.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{
    transport::SerialTransport, Block, Key, Mode, ProtocolError, Request, Response, Transport,
    DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS, RESPONSE_FRAME_SIZE,
};
use crate::report::ExchangeRecord;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connected and ready
    Connected,
}

/// Where the current (or last) exchange got to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangePhase {
    /// No exchange in flight
    Idle,
    /// Writing the request frame
    Sending,
    /// Request written, waiting for the response frame
    AwaitingResponse,
    /// Full response received
    Complete,
    /// Response did not arrive in full
    TimedOut,
    /// Writing or reading failed; the next request starts afresh
    Failed,
}

/// Optional delays around the exchange.
///
/// None of these carry protocol meaning; they give slow receivers on the
/// board side room to keep up. Zero disables a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Wait after opening the port before the first request
    pub settle_delay_ms: u64,
    /// Wait after each of the mode, block and key writes
    pub inter_write_delay_ms: u64,
    /// Wait after the request is written before reading the response
    pub processing_delay_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle_delay_ms: 100,
            inter_write_delay_ms: 10,
            processing_delay_ms: 100,
        }
    }
}

impl Pacing {
    /// No delays at all
    pub fn none() -> Self {
        Self {
            settle_delay_ms: 0,
            inter_write_delay_ms: 0,
            processing_delay_ms: 0,
        }
    }
}

fn pause(ms: u64) {
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Response timeout in milliseconds
    pub timeout_ms: u64,
    /// Delays around each exchange
    pub pacing: Pacing,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            pacing: Pacing::default(),
        }
    }
}

impl ConnectionConfig {
    /// Config for `port_name` with every other setting at its default
    pub fn for_port(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Response timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Cumulative traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficCounters {
    /// Bytes written, framed or raw
    pub tx_bytes: u64,
    /// Bytes read, including short reads
    pub rx_bytes: u64,
    /// Request frames written in full
    pub tx_frames: u64,
    /// Complete response frames received
    pub rx_frames: u64,
}

/// Exclusive session with one board
pub struct Connection<T: Transport = SerialTransport> {
    /// Byte transport
    transport: T,
    /// Current connection state
    state: ConnectionState,
    /// Connection configuration
    config: ConnectionConfig,
    /// Progress of the current or last exchange
    phase: ExchangePhase,
    counters: TrafficCounters,
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl Connection<SerialTransport> {
    /// Open the serial port named in `config` and wait for it to settle
    pub fn open(config: ConnectionConfig) -> Result<Self, ProtocolError> {
        tracing::debug!(
            port = %config.port_name,
            baud_rate = config.baud_rate,
            timeout_ms = config.timeout_ms,
            "opening connection"
        );
        if config.port_name.is_empty() {
            return Err(ProtocolError::PortNotFound("<empty>".to_string()));
        }

        let mut transport =
            SerialTransport::open(&config.port_name, config.baud_rate, config.timeout())?;

        // Let the board side settle, then drop anything it emitted meanwhile
        pause(config.pacing.settle_delay_ms);
        transport
            .flush()
            .map_err(|e| e.at_open(&config.port_name))?;

        tracing::info!(
            port = %config.port_name,
            baud_rate = config.baud_rate,
            "connected"
        );
        Ok(Self {
            transport,
            state: ConnectionState::Connected,
            config,
            phase: ExchangePhase::Idle,
            counters: TrafficCounters::default(),
        })
    }

    /// A session that was never opened; every exchange fails with
    /// [`ProtocolError::NotConnected`]
    pub fn disconnected(config: ConnectionConfig) -> Self {
        let transport = SerialTransport::closed(&config.port_name);
        Self {
            transport,
            state: ConnectionState::Disconnected,
            config,
            phase: ExchangePhase::Idle,
            counters: TrafficCounters::default(),
        }
    }
}

impl<T: Transport> Connection<T> {
    /// Wrap an already open transport
    pub fn with_transport(config: ConnectionConfig, transport: T) -> Self {
        let state = if transport.is_open() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        Self {
            transport,
            state,
            config,
            phase: ExchangePhase::Idle,
            counters: TrafficCounters::default(),
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Progress of the current or last exchange
    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// Get cumulative tx/rx counters
    pub fn counters(&self) -> TrafficCounters {
        self.counters
    }

    /// Settings this session was opened with
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Check if the session can exchange frames
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.transport.is_open()
    }

    /// Close the connection. Closing twice, or closing a session that was
    /// never opened, is a no-op.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Disconnected {
            tracing::info!(port = %self.config.port_name, "disconnecting");
        }
        self.transport.close();
        self.state = ConnectionState::Disconnected;
        self.phase = ExchangePhase::Idle;
    }

    /// Encrypt `block_hex` under `key_hex` on the board
    pub fn encrypt(&mut self, block_hex: &str, key_hex: &str) -> Result<String, ProtocolError> {
        self.transform(block_hex, key_hex, Mode::Encrypt)
    }

    /// Decrypt `block_hex` under `key_hex` on the board
    pub fn decrypt(&mut self, block_hex: &str, key_hex: &str) -> Result<String, ProtocolError> {
        self.transform(block_hex, key_hex, Mode::Decrypt)
    }

    /// Validate hex operands, run one exchange and return the result as
    /// 16 uppercase hex characters.
    ///
    /// Malformed operands fail before anything is written to the transport.
    pub fn transform(
        &mut self,
        block_hex: &str,
        key_hex: &str,
        mode: Mode,
    ) -> Result<String, ProtocolError> {
        let request = Request::from_hex(mode, block_hex, key_hex)?;
        let record = self.exchange(request)?;
        Ok(record.output.to_hex())
    }

    /// Typed form of [`Connection::transform`]
    pub fn transform_block(
        &mut self,
        block: Block,
        key: Key,
        mode: Mode,
    ) -> Result<Block, ProtocolError> {
        self.exchange(Request::new(mode, block, key))
            .map(|record| record.output)
    }

    /// Send one request and wait for its response
    pub fn exchange(&mut self, request: Request) -> Result<ExchangeRecord, ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }

        let started_at = Utc::now();
        let start = Instant::now();

        self.phase = ExchangePhase::Sending;
        let frame = request.to_bytes();
        tracing::debug!(
            mode = %request.mode,
            block = %request.block,
            key = %request.key,
            "sending request frame {:02x?}",
            frame
        );
        // The port stays open after a failed write; each later request
        // reports its own outcome
        if let Err(e) = self.send_frame(&frame) {
            tracing::warn!("request write failed: {e}");
            self.phase = ExchangePhase::Failed;
            return Err(e);
        }

        self.phase = ExchangePhase::AwaitingResponse;
        pause(self.config.pacing.processing_delay_ms);

        let bytes = match self.transport.read(RESPONSE_FRAME_SIZE) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("response read failed: {e}");
                self.phase = ExchangePhase::Failed;
                return Err(e);
            }
        };
        self.counters.rx_bytes = self.counters.rx_bytes.saturating_add(bytes.len() as u64);
        if bytes.len() < RESPONSE_FRAME_SIZE {
            tracing::warn!(
                expected = RESPONSE_FRAME_SIZE,
                received = bytes.len(),
                "response timed out"
            );
            self.phase = ExchangePhase::TimedOut;
            return Err(ProtocolError::Timeout {
                expected: RESPONSE_FRAME_SIZE,
                received: bytes.len(),
            });
        }

        let response = Response::from_bytes(&bytes)?;
        self.counters.rx_frames = self.counters.rx_frames.saturating_add(1);
        self.phase = ExchangePhase::Complete;

        let elapsed = start.elapsed();
        tracing::debug!(
            result = %response.block,
            elapsed_ms = elapsed.as_millis() as u64,
            "received response"
        );

        Ok(ExchangeRecord {
            mode: request.mode,
            input: request.block,
            key: request.key,
            output: response.block,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    /// Flush, then write mode, block and key as separate writes
    fn send_frame(&mut self, frame: &[u8; super::REQUEST_FRAME_SIZE]) -> Result<(), ProtocolError> {
        self.transport.flush()?;
        for segment in Request::segments(frame) {
            self.transport.write(segment)?;
            self.counters.tx_bytes = self.counters.tx_bytes.saturating_add(segment.len() as u64);
            pause(self.config.pacing.inter_write_delay_ms);
        }
        self.counters.tx_frames = self.counters.tx_frames.saturating_add(1);
        Ok(())
    }

    /// Write arbitrary bytes without framing or flushing
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        if bytes.is_empty() {
            return Ok(());
        }
        tracing::debug!("send_raw: {} bytes: {:02x?}", bytes.len(), bytes);
        self.transport.write(bytes)?;
        self.counters.tx_bytes = self.counters.tx_bytes.saturating_add(bytes.len() as u64);
        Ok(())
    }

    /// Read up to `n` bytes; a short result means the timeout elapsed
    pub fn receive_raw(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        let bytes = self.transport.read(n)?;
        self.counters.rx_bytes = self.counters.rx_bytes.saturating_add(bytes.len() as u64);
        if bytes.len() < n {
            tracing::warn!(expected = n, received = bytes.len(), "raw read came up short");
        }
        Ok(bytes)
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}
