//! # desuart Core Library
//!
//! Host side of a serial test harness for DES encrypt/decrypt cores running
//! on FPGA or microcontroller boards.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The fixed-frame request/response protocol spoken over the UART
//! - Serial port discovery and 8N1 transport
//! - Harness configuration (defaults, `config.json`, overrides)
//! - Round-trip self-tests and serializable exchange reports
//!
//! No DES arithmetic happens on the host; the board does the work.
//!
//! ## Example
//!
//! ```rust,no_run
//! use desuart_core::protocol::{Connection, ConnectionConfig};
//!
//! let mut conn = Connection::open(ConnectionConfig::for_port("/dev/ttyUSB0"))?;
//! let ciphertext = conn.encrypt("0123456789ABCDEF", "133457799BBCDFF1")?;
//! let plaintext = conn.decrypt(&ciphertext, "133457799BBCDFF1")?;
//! assert_eq!(plaintext, "0123456789ABCDEF");
//! # Ok::<(), desuart_core::protocol::ProtocolError>(())
//! ```

pub mod config;
pub mod protocol;
pub mod report;
pub mod selftest;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::HarnessConfig;
    pub use crate::protocol::{
        Block, Connection, ConnectionConfig, ConnectionState, ErrorKind, Key, Mode, Pacing,
        ProtocolError, Transport,
    };
    pub use crate::report::{ExchangeRecord, RoundTripReport, SelfTestSummary};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
