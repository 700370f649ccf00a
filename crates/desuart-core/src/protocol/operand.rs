//! Block and key operands
//!
//! Blocks and keys cross the human interface as exactly 16 hexadecimal
//! characters (big-endian, two characters per byte, no separators).

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::BLOCK_SIZE;

/// Number of hex characters in a block or key
pub const HEX_LEN: usize = BLOCK_SIZE * 2;

/// Malformed hex input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    /// Operand is not exactly 16 characters
    #[error("{field} must be exactly {expected} hex characters, got {actual}")]
    InvalidLength {
        /// Which operand
        field: &'static str,
        /// Required character count
        expected: usize,
        /// Characters supplied
        actual: usize,
    },

    /// Something other than 0-9, A-F
    #[error("{field} contains non-hex character {character:?} at position {index}")]
    InvalidCharacter {
        /// Which operand
        field: &'static str,
        /// The offending character
        character: char,
        /// Character position, counting from zero
        index: usize,
    },

    /// Raw data with a dangling half byte
    #[error("hex data must have an even number of characters, got {0}")]
    OddLength(usize),

    /// Nothing to decode
    #[error("hex data is empty")]
    Empty,
}

/// Reject anything that is not an ASCII hex digit
fn check_digits(field: &'static str, s: &str) -> Result<(), HexError> {
    match s.chars().enumerate().find(|(_, c)| !c.is_ascii_hexdigit()) {
        Some((index, character)) => Err(HexError::InvalidCharacter {
            field,
            character,
            index,
        }),
        None => Ok(()),
    }
}

/// Decode exactly [`HEX_LEN`] hex characters into 8 bytes
fn decode_operand(field: &'static str, s: &str) -> Result<[u8; BLOCK_SIZE], HexError> {
    let actual = s.chars().count();
    if actual != HEX_LEN {
        return Err(HexError::InvalidLength {
            field,
            expected: HEX_LEN,
            actual,
        });
    }
    check_digits(field, s)?;

    let mut out = [0u8; BLOCK_SIZE];
    hex::decode_to_slice(s, &mut out).map_err(|_| HexError::InvalidLength {
        field,
        expected: HEX_LEN,
        actual,
    })?;
    Ok(out)
}

/// An 8-byte plaintext or ciphertext operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Block([u8; BLOCK_SIZE]);

/// An 8-byte DES key (parity bits are passed through untouched)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Key([u8; BLOCK_SIZE]);

impl Block {
    /// Wrap raw bytes
    pub const fn new(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a 16-character hex string
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        decode_operand("block", s).map(Self)
    }

    /// Render as 16 uppercase hex characters
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Build from a big-endian integer
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; BLOCK_SIZE];
        BigEndian::write_u64(&mut bytes, value);
        Self(bytes)
    }

    /// Big-endian integer view
    pub fn as_u64(&self) -> u64 {
        BigEndian::read_u64(&self.0)
    }

    /// Bytes in wire order
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }
}

impl Key {
    /// Wrap raw bytes
    pub const fn new(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a 16-character hex string
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        decode_operand("key", s).map(Self)
    }

    /// Render as 16 uppercase hex characters
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Build from a big-endian integer
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; BLOCK_SIZE];
        BigEndian::write_u64(&mut bytes, value);
        Self(bytes)
    }

    /// Big-endian integer view
    pub fn as_u64(&self) -> u64 {
        BigEndian::read_u64(&self.0)
    }

    /// Bytes in wire order
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Block> for String {
    fn from(block: Block) -> Self {
        block.to_hex()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_hex()
    }
}

impl TryFrom<String> for Block {
    type Error = HexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl TryFrom<String> for Key {
    type Error = HexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

/// Clean up hex typed by a person: drops whitespace and `0x` prefixes,
/// uppercases the rest. Does not validate.
pub fn normalize_input(raw: &str) -> String {
    let upper: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    upper.replace("0X", "")
}

/// Render arbitrary bytes as uppercase hex without separators
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decode an arbitrary even-length hex string into bytes
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, HexError> {
    if s.is_empty() {
        return Err(HexError::Empty);
    }
    let len = s.chars().count();
    if len % 2 != 0 {
        return Err(HexError::OddLength(len));
    }
    check_digits("data", s)?;
    hex::decode(s).map_err(|_| HexError::OddLength(len))
}
