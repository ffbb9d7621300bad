// Packet decode error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Decode error code constants
///
/// Error code range: 1001-1003
pub struct DecodeErrorCodes {}

impl DecodeErrorCodes {
    /// Packet is not exactly 20 bytes long
    pub const INVALID_LENGTH: i32 = 1001;

    /// Mode byte does not name a known stream
    pub const UNKNOWN_MODE: i32 = 1002;

    /// Packet was routed to a channel that does not accept its mode
    pub const WRONG_STREAM: i32 = 1003;
}

/// Log a decode error with structured context
///
/// The packet is rejected by the caller; this only records why.
pub fn log_decode_error(err: &DecodeError, context: &str) {
    error!(
        "Decode error in {}: code={}, component=PacketDecoder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Malformed or misrouted packets
///
/// Always fatal for the packet in question, never for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Packet length differs from the fixed envelope size
    InvalidLength { expected: usize, actual: usize },

    /// Byte 19 holds a mode that is neither 1, 2 nor 3
    UnknownMode { mode: u8 },

    /// A direct-control frame was submitted as a motion sample or vice versa
    WrongStream { expected: &'static str, mode: u8 },
}

impl ErrorCode for DecodeError {
    fn code(&self) -> i32 {
        match self {
            DecodeError::InvalidLength { .. } => DecodeErrorCodes::INVALID_LENGTH,
            DecodeError::UnknownMode { .. } => DecodeErrorCodes::UNKNOWN_MODE,
            DecodeError::WrongStream { .. } => DecodeErrorCodes::WRONG_STREAM,
        }
    }

    fn message(&self) -> String {
        match self {
            DecodeError::InvalidLength { expected, actual } => {
                format!("Packet must be {} bytes (got {})", expected, actual)
            }
            DecodeError::UnknownMode { mode } => format!("Unknown packet mode {}", mode),
            DecodeError::WrongStream { expected, mode } => {
                format!("Expected a {} packet, got mode {}", expected, mode)
            }
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DecodeError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DecodeError {}
