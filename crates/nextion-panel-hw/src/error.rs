//! Error types for the Nextion panel hardware library.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::ReturnCode;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the display.
#[derive(Error, Debug)]
pub enum Error {
    /// A frame outgrew the receive buffer before its terminator arrived.
    #[error("Frame overflow: discarded {discarded} bytes without a terminator")]
    FrameOverflow { discarded: usize },

    /// The link did not accept the outgoing bytes in time.
    #[error("Transmit timed out after {0:?}")]
    TransmitTimeout(Duration),

    /// The reply to a get request did not arrive in time.
    #[error("No response from display within {0:?}")]
    ResponseTimeout(Duration),

    /// The component registry is full.
    #[error("Component registry full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// A get request is already waiting for its reply.
    #[error("Another get request is already outstanding")]
    Busy,

    /// The display answered a request with an error return code.
    #[error("Display rejected the request: {0}")]
    Rejected(ReturnCode),

    /// A reply frame had a length that does not fit its opcode.
    #[error("Reply frame 0x{opcode:02X} has unexpected length {len}; possible embedded terminator")]
    AmbiguousFrame { opcode: u8, len: usize },

    /// The component was registered without an object name.
    #[error("Component at page {page} id {id} has no object name")]
    Unnamed { page: u8, id: u8 },

    /// Object name cannot be used in a command.
    #[error("Invalid object name: {0:?}")]
    InvalidObjectName(String),

    /// The receiver stopped before the reply arrived.
    #[error("Link closed")]
    LinkClosed,

    /// Serial port not found or not accessible.
    #[error("Serial port not found at {0}")]
    PortNotFound(String),

    /// Serial port communication error.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Serial I/O error.
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}
