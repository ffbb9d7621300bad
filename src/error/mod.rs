// Error types for the gesture pilot pipeline
//
// Each component owns one error enum with a disjoint numeric code range so
// that log lines and telemetry can be filtered by component without string
// matching.

mod classification;
mod decode;
mod flight;
mod pipeline;

pub use classification::{log_classification_error, ClassificationError, ClassificationErrorCodes};
pub use decode::{log_decode_error, DecodeError, DecodeErrorCodes};
pub use flight::{log_flight_error, FlightError, FlightErrorCodes};
pub use pipeline::{log_pipeline_error, PipelineError, PipelineErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the worker boundaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
