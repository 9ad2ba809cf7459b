//! Error types for bridge operations.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error types for bus communication and frame handling.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Communication timeout (no complete frame from the peer)
    #[error("Communication timeout")]
    Timeout,

    /// Another transaction currently owns the bus
    #[error("Bus busy")]
    BusBusy,

    /// Response failed structural validation
    #[error("Invalid frame: {0}")]
    InvalidFrame(#[from] ValidationError),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Data parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Reasons a received response frame is rejected.
///
/// The `Display` text is the human readable failure reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Frame too short, or the return code is not success
    #[error("error code={code} len={length}")]
    ErrorCode {
        /// Return code field, `?` if the frame is too short to carry one
        code: String,
        /// Length of the received frame
        length: usize,
    },

    /// Response came from a different address than the one queried
    #[error("address mismatch (expected {expected}, got {actual})")]
    AddressMismatch {
        /// Address that was queried
        expected: u8,
        /// Address decoded from the response
        actual: u8,
    },

    /// Address field is not two hex digits
    #[error("malformed address {field:?}")]
    MalformedAddress {
        /// Raw address field
        field: String,
    },

    /// Recomputed checksum differs from the transmitted one
    #[error("checksum mismatch")]
    ChecksumMismatch,
}
