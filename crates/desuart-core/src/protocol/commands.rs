//! Protocol commands
//!
//! The first byte of every request selects what the DES core does with the
//! block that follows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation requested from the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Encrypt the block (0x01)
    Encrypt,

    /// Decrypt the block (0x02)
    Decrypt,
}

impl Mode {
    /// Get the mode byte sent on the wire
    pub fn byte(&self) -> u8 {
        match self {
            Mode::Encrypt => 0x01,
            Mode::Decrypt => 0x02,
        }
    }

    /// The mode that undoes this one
    pub fn inverse(&self) -> Mode {
        match self {
            Mode::Encrypt => Mode::Decrypt,
            Mode::Decrypt => Mode::Encrypt,
        }
    }

    /// What the input block is called in this mode
    pub fn input_label(&self) -> &'static str {
        match self {
            Mode::Encrypt => "plaintext",
            Mode::Decrypt => "ciphertext",
        }
    }

    /// What the returned block is called in this mode
    pub fn output_label(&self) -> &'static str {
        self.inverse().input_label()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Encrypt => f.write_str("encrypt"),
            Mode::Decrypt => f.write_str("decrypt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bytes() {
        assert_eq!(Mode::Encrypt.byte(), 0x01);
        assert_eq!(Mode::Decrypt.byte(), 0x02);
        assert_eq!(Mode::Encrypt.inverse(), Mode::Decrypt);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Mode::Encrypt.input_label(), "plaintext");
        assert_eq!(Mode::Encrypt.output_label(), "ciphertext");
        assert_eq!(Mode::Decrypt.output_label(), "plaintext");
    }

    #[test]
    fn test_display_and_serde_agree() {
        assert_eq!(Mode::Decrypt.to_string(), "decrypt");
        assert_eq!(serde_json::to_string(&Mode::Encrypt).unwrap(), "\"encrypt\"");
    }
}
