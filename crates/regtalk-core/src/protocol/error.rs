//! Protocol errors

use thiserror::Error;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid packet length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("Invalid frame header: {0:#06x}")]
    InvalidHeader(u16),

    #[error("Response timeout")]
    Timeout,

    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed by target")]
    ConnectionClosed,

    #[error("Invalid transport target: {0}")]
    InvalidTarget(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// Codec errors concern a single packet and leave the session usable
    pub fn is_packet_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidLength { .. }
                | ProtocolError::CrcMismatch { .. }
                | ProtocolError::InvalidHeader(_)
        )
    }
}
