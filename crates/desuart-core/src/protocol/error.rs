//! Protocol errors

use thiserror::Error;

use super::operand::HexError;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The device exists but could not be opened or prepared
    #[error("Failed to open {port}: {reason}")]
    ConnectionFailed {
        /// Port that was being opened
        port: String,
        /// What went wrong
        reason: String,
    },

    /// No device by that name
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Malformed hex operand
    #[error("Invalid input: {0}")]
    Validation(#[from] HexError),

    /// The session is closed
    #[error("Not connected to board")]
    NotConnected,

    /// Error reported by the serial driver on an open port
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Fewer bytes than expected arrived before the timeout
    #[error("Timeout: expected {expected} bytes, got {received}")]
    Timeout {
        /// Bytes the frame should have
        expected: usize,
        /// Bytes that actually arrived
        received: usize,
    },

    /// A frame of the wrong shape
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Read or write failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification of a [`ProtocolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The device could not be opened or closed
    Connection,
    /// Caller input was malformed; nothing was sent
    Validation,
    /// Reading or writing an open connection failed
    Io,
    /// The response did not arrive in full before the timeout
    Timeout,
}

impl ProtocolError {
    /// Which of the four failure categories this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::ConnectionFailed { .. } | ProtocolError::PortNotFound(_) => {
                ErrorKind::Connection
            }
            ProtocolError::Validation(_) => ErrorKind::Validation,
            ProtocolError::Timeout { .. } => ErrorKind::Timeout,
            ProtocolError::NotConnected
            | ProtocolError::SerialError(_)
            | ProtocolError::InvalidFrame(_)
            | ProtocolError::IoError(_) => ErrorKind::Io,
        }
    }

    /// Build a connection error from a `serialport` open failure
    pub(crate) fn from_open(port: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => ProtocolError::PortNotFound(port.to_string()),
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                ProtocolError::PortNotFound(port.to_string())
            }
            _ => ProtocolError::ConnectionFailed {
                port: port.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

impl ProtocolError {
    /// Reclassify a failure hit while preparing a freshly opened port.
    ///
    /// The device never became usable, so I/O-level errors become
    /// [`ProtocolError::ConnectionFailed`]; connection errors pass through.
    pub(crate) fn at_open(self, port: &str) -> Self {
        match self.kind() {
            ErrorKind::Connection => self,
            _ => ProtocolError::ConnectionFailed {
                port: port.to_string(),
                reason: self.to_string(),
            },
        }
    }
}

impl From<serialport::Error> for ProtocolError {
    fn from(err: serialport::Error) -> Self {
        ProtocolError::SerialError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let timeout = ProtocolError::Timeout {
            expected: 8,
            received: 3,
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(timeout.to_string(), "Timeout: expected 8 bytes, got 3");

        let invalid = ProtocolError::from(HexError::InvalidLength {
            field: "key",
            expected: 16,
            actual: 15,
        });
        assert_eq!(invalid.kind(), ErrorKind::Validation);

        assert_eq!(ProtocolError::NotConnected.kind(), ErrorKind::Io);
        assert_eq!(
            ProtocolError::PortNotFound("/dev/ttyUSB9".into()).kind(),
            ErrorKind::Connection
        );
    }

    #[test]
    fn test_open_error_mapping() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(matches!(
            ProtocolError::from_open("COM7", err),
            ProtocolError::PortNotFound(ref p) if p == "COM7"
        ));

        let err = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "denied",
        );
        let mapped = ProtocolError::from_open("/dev/ttyUSB0", err);
        assert_eq!(mapped.kind(), ErrorKind::Connection);
        assert!(mapped.to_string().contains("/dev/ttyUSB0"));
    }

    #[test]
    fn test_prepare_failure_is_connection_error() {
        let err = ProtocolError::SerialError("tcflush failed".into()).at_open("/dev/ttyACM0");
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(
            err.to_string(),
            "Failed to open /dev/ttyACM0: Serial port error: tcflush failed"
        );

        let io = ProtocolError::IoError(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        assert_eq!(io.at_open("COM3").kind(), ErrorKind::Connection);

        let missing = ProtocolError::PortNotFound("COM3".into()).at_open("COM3");
        assert!(matches!(missing, ProtocolError::PortNotFound(_)));
    }
}
