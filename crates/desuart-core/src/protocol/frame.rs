//! Frame encoding/decoding
//!
//! Request format:
//! - 1 byte: mode (0x01 encrypt, 0x02 decrypt)
//! - 8 bytes: data block, big-endian
//! - 8 bytes: key, big-endian
//!
//! Response format:
//! - 8 bytes: resulting block, big-endian
//!
//! There is no length prefix and no checksum; both directions are fixed size.

use serde::{Deserialize, Serialize};

use super::{Block, Key, Mode, ProtocolError, BLOCK_SIZE, REQUEST_FRAME_SIZE, RESPONSE_FRAME_SIZE};

/// A request frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Operation to perform
    pub mode: Mode,
    /// Plaintext or ciphertext
    pub block: Block,
    /// DES key
    pub key: Key,
}

impl Request {
    /// Create a request from typed operands
    pub fn new(mode: Mode, block: Block, key: Key) -> Self {
        Self { mode, block, key }
    }

    /// Create a request from hex strings, validating both operands
    pub fn from_hex(mode: Mode, block_hex: &str, key_hex: &str) -> Result<Self, ProtocolError> {
        let block = Block::from_hex(block_hex)?;
        let key = Key::from_hex(key_hex)?;
        Ok(Self::new(mode, block, key))
    }

    /// Encode the frame to raw bytes
    pub fn to_bytes(&self) -> [u8; REQUEST_FRAME_SIZE] {
        let mut bytes = [0u8; REQUEST_FRAME_SIZE];
        bytes[0] = self.mode.byte();
        bytes[1..1 + BLOCK_SIZE].copy_from_slice(self.block.as_bytes());
        bytes[1 + BLOCK_SIZE..].copy_from_slice(self.key.as_bytes());
        bytes
    }

    /// Split an encoded frame into the pieces written one after another:
    /// mode byte, block, key
    pub fn segments(frame: &[u8; REQUEST_FRAME_SIZE]) -> [&[u8]; 3] {
        let (mode, rest) = frame.split_at(1);
        let (block, key) = rest.split_at(BLOCK_SIZE);
        [mode, block, key]
    }
}

/// A response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Block produced by the board
    pub block: Block,
}

impl Response {
    /// Decode a response; anything other than exactly 8 bytes is rejected
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let bytes: [u8; RESPONSE_FRAME_SIZE] = data.try_into().map_err(|_| {
            ProtocolError::InvalidFrame(format!(
                "response must be {RESPONSE_FRAME_SIZE} bytes, got {}",
                data.len()
            ))
        })?;
        Ok(Self {
            block: Block::new(bytes),
        })
    }
}
