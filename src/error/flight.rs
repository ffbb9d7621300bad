// Flight control error types and constants

use crate::error::ErrorCode;
use log::{error, warn};
use std::fmt;

/// Flight error code constants
///
/// Error code range: 3001-3003
pub struct FlightErrorCodes {}

impl FlightErrorCodes {
    /// Waypoint operation on an empty stack
    pub const EMPTY_WAYPOINT_STACK: i32 = 3001;

    /// Vehicle rejected a command twice in a row
    pub const ACTUATION_FAILED: i32 = 3002;

    /// Vehicle position could not be read
    pub const POSITION_UNAVAILABLE: i32 = 3003;
}

/// Log a flight error with structured context
///
/// State errors are recoverable and logged at warn level; everything else
/// halts the control loop and is logged as an error.
pub fn log_flight_error(err: &FlightError, context: &str) {
    if err.is_recoverable() {
        warn!(
            "Flight warning in {}: code={}, component=FlightController, message={}",
            context,
            err.code(),
            err.message()
        );
    } else {
        error!(
            "Flight error in {}: code={}, component=FlightController, message={}",
            context,
            err.code(),
            err.message()
        );
    }
}

/// Errors raised by the flight command state machine and the actuation layer
#[derive(Debug, Clone, PartialEq)]
pub enum FlightError {
    /// Waypoint operation requested while no waypoint is stored
    EmptyWaypointStack { operation: &'static str },

    /// Vehicle rejected a command on the first attempt and the retry
    ActuationFailed { command: String, reason: String },

    /// Current position could not be captured for a waypoint
    PositionUnavailable { reason: String },
}

impl FlightError {
    /// State errors are absorbed as a no-op with a warning
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FlightError::EmptyWaypointStack { .. })
    }
}

impl ErrorCode for FlightError {
    fn code(&self) -> i32 {
        match self {
            FlightError::EmptyWaypointStack { .. } => FlightErrorCodes::EMPTY_WAYPOINT_STACK,
            FlightError::ActuationFailed { .. } => FlightErrorCodes::ACTUATION_FAILED,
            FlightError::PositionUnavailable { .. } => FlightErrorCodes::POSITION_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            FlightError::EmptyWaypointStack { operation } => {
                format!("Cannot {}: waypoint stack is empty", operation)
            }
            FlightError::ActuationFailed { command, reason } => {
                format!("Vehicle rejected {} after retry: {}", command, reason)
            }
            FlightError::PositionUnavailable { reason } => {
                format!("Vehicle position unavailable: {}", reason)
            }
        }
    }
}

impl fmt::Display for FlightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FlightError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for FlightError {}
