// Pipeline boundary error types and constants

use crate::error::{DecodeError, ErrorCode};
use log::error;
use std::fmt;

/// Pipeline error code constants
///
/// Error code range: 4001-4002. Decode failures keep their own codes.
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Downstream worker is gone, the channel no longer accepts elements
    pub const CHANNEL_CLOSED: i32 = 4001;

    /// Worker thread panicked instead of returning
    pub const WORKER_PANICKED: i32 = 4002;
}

/// Log a pipeline error with structured context
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, component=Pipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised at the pipeline's submit and shutdown boundary
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Packet rejected before enqueueing
    Decode(DecodeError),

    /// Receiving worker has exited
    ChannelClosed { channel: &'static str },

    /// Worker thread panicked
    WorkerPanicked { worker: &'static str },
}

impl From<DecodeError> for PipelineError {
    fn from(err: DecodeError) -> Self {
        PipelineError::Decode(err)
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::Decode(inner) => inner.code(),
            PipelineError::ChannelClosed { .. } => PipelineErrorCodes::CHANNEL_CLOSED,
            PipelineError::WorkerPanicked { .. } => PipelineErrorCodes::WORKER_PANICKED,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::Decode(inner) => inner.message(),
            PipelineError::ChannelClosed { channel } => {
                format!("The {} channel is closed", channel)
            }
            PipelineError::WorkerPanicked { worker } => {
                format!("The {} worker panicked", worker)
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Decode(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_codes() {
        assert_eq!(
            PipelineError::ChannelClosed { channel: "gesture" }.code(),
            4001
        );
        assert_eq!(
            PipelineError::WorkerPanicked {
                worker: "classification"
            }
            .code(),
            4002
        );
    }

    #[test]
    fn test_decode_errors_keep_their_code() {
        let err = PipelineError::from(DecodeError::UnknownMode { mode: 4 });
        assert_eq!(err.code(), 1002);
        assert_eq!(err.message(), "Unknown packet mode 4");
        assert!(std::error::Error::source(&err).is_some());
    }
}
