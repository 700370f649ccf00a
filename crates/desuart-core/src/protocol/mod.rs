//! Serial Protocol Communication
//!
//! Implements the fixed-frame request/response protocol spoken by the DES
//! core on the board.
//!
//! A request is one mode byte followed by an 8-byte block and an 8-byte key.
//! The board answers every request with exactly one 8-byte block.

pub mod commands;
mod connection;
mod error;
mod frame;
pub mod mock;
mod operand;
pub mod serial;
pub mod transport;

pub use commands::Mode;
pub use connection::{
    Connection, ConnectionConfig, ConnectionState, ExchangePhase, Pacing, TrafficCounters,
};
pub use error::{ErrorKind, ProtocolError};
pub use frame::{Request, Response};
pub use operand::{encode_hex, normalize_input, parse_hex_bytes, Block, HexError, Key, HEX_LEN};
pub use serial::{list_ports, open_port, PortInfo};
pub use transport::{SerialTransport, Transport};

/// Default baud rate for the board UART
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default timeout for responses in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Size of a DES block or key in bytes
pub const BLOCK_SIZE: usize = 8;

/// Size of an encoded request frame (mode + block + key)
pub const REQUEST_FRAME_SIZE: usize = 1 + 2 * BLOCK_SIZE;

/// Size of an encoded response frame
pub const RESPONSE_FRAME_SIZE: usize = BLOCK_SIZE;
